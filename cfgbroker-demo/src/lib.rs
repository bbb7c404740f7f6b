pub mod compartments;
pub mod config;
pub mod params;
pub mod runtime;
