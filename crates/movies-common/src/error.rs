//! Shared error types

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised by shared infrastructure
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging configuration error: {0}")]
    Logging(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
