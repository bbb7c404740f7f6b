pub mod authority;
pub mod broker;
pub mod claim;
pub mod delivery;
pub mod error;
pub mod manifest;
pub mod registry;
pub mod token;
pub mod validator;
pub mod value;
