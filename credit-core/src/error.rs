//! Error types for the credit core

use thiserror::Error;

/// Result type for credit core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Credit core errors
#[derive(Error, Debug)]
pub enum Error {
    /// Invoice code already taken
    #[error("Duplicate invoice code: {0}")]
    DuplicateInvoiceCode(String),

    /// Invoice not found
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    /// Invalid invoice parameters
    #[error("Invalid invoice: {0}")]
    InvalidInvoice(String),

    /// Backend storage error (database, connection pool, ...)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Storage(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Storage(msg.to_string())
    }
}
