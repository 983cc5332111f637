// Central Error Type for the Application

use thiserror::Error;

use crate::domain::{ConfigError, UnsupportedOperation};
use crate::port::TransportError;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unsupported operation: {0}")]
    Unsupported(#[from] UnsupportedOperation),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The unsupported-operation details, if this is one
    pub fn as_unsupported(&self) -> Option<&UnsupportedOperation> {
        match self {
            AppError::Unsupported(op) => Some(op),
            _ => None,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        self.as_unsupported().is_some()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
