//! Error types for the reconciliation engine

use thiserror::Error;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement errors
///
/// "No payment yet" and "already settled" are outcomes, not errors; see
/// [`crate::CheckOutcome`].
#[derive(Error, Debug)]
pub enum Error {
    /// No invoice with this code
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    /// Feed could not be queried; retry later
    #[error("Ledger feed unavailable: {0}")]
    Feed(#[from] ton_feed::FeedError),

    /// Store failure
    #[error("Store error: {0}")]
    Store(#[from] credit_core::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
