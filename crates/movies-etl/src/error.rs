//! Error types for the ETL service

use thiserror::Error;

/// Result type alias for ETL operations
pub type Result<T> = std::result::Result<T, EtlError>;

/// Main error type for the ETL service
#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Search index request failed: {0}")]
    Search(#[from] reqwest::Error),

    #[error("Search index returned {status} for {operation}: {body}")]
    SearchStatus {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("Bulk load rejected {failed} of {total} documents")]
    BulkRejected { failed: usize, total: usize },

    #[error("Malformed aggregate row: {0}")]
    MalformedRow(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Index schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EtlError {
    /// Whether the error is a transient infrastructure failure that is safe
    /// to retry. Data and schema errors are never transient: retrying them
    /// would loop forever on the same bad input.
    pub fn is_transient(&self) -> bool {
        match self {
            EtlError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Tls(_)
            ),
            EtlError::Search(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}
