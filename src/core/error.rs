use std::io;
use thiserror::Error;
use crate::core::token::Direction;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Invalid capability token")]
    InvalidToken,

    #[error("Not a {expected} capability for {item}")]
    WrongDirection { item: String, expected: Direction },

    #[error("Size {size} exceeds capability limit {max_size} for {item}")]
    SizeExceedsCapability { item: String, size: usize, max_size: usize },

    #[error("Size {size} exceeds supplied buffer of {extent} bytes")]
    SizeExceedsBuffer { size: usize, extent: usize },

    #[error("Failed to allocate {size} bytes for {item}")]
    AllocationFailed { item: String, size: usize },

    #[error("Storage quota exceeded: {requested} bytes requested, {available} available")]
    QuotaExceeded { requested: usize, available: usize },

    #[error("Invalid capability declaration: {0}")]
    InvalidDeclaration(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Coarse classification of rejections, stable for callers that only care
/// about why an operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    Size,
    Allocation,
    Configuration,
}

impl BrokerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::InvalidToken | BrokerError::WrongDirection { .. } => {
                ErrorKind::Authorization
            }
            BrokerError::SizeExceedsCapability { .. } | BrokerError::SizeExceedsBuffer { .. } => {
                ErrorKind::Size
            }
            BrokerError::AllocationFailed { .. } | BrokerError::QuotaExceeded { .. } => {
                ErrorKind::Allocation
            }
            BrokerError::InvalidDeclaration(_) | BrokerError::Config(_) | BrokerError::Io(_) => {
                ErrorKind::Configuration
            }
        }
    }
}
