//! Error types for the feed client
//!
//! Every variant is a transport-level failure. "No matching payment" is not
//! an error and never shows up here.

use thiserror::Error;

/// Result type for feed operations
pub type Result<T> = std::result::Result<T, FeedError>;

/// Feed errors
#[derive(Error, Debug)]
pub enum FeedError {
    /// Connection, TLS or protocol failure
    #[error("Feed HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("Feed returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (may be empty)
        body: String,
    },

    /// The query did not finish in time
    #[error("Feed query timed out after {0} ms")]
    Timeout(u64),

    /// Body was not the expected JSON shape
    #[error("Invalid feed response: {0}")]
    Decode(String),

    /// Client could not be built
    #[error("Feed configuration error: {0}")]
    Config(String),
}
