//! TON event feed client
//!
//! Reads recent events of the service wallet from an indexer (TonAPI by
//! default) and looks for the transfer that pays a given invoice code.
//!
//! # Matching
//!
//! The feed is treated as an untrusted, loosely shaped source. Matching is a
//! two-tier heuristic, not a parser:
//!
//! 1. **Structured**: `actions[].TonTransfer` and `in_messages[]`/`messages[]`
//! 2. **Raw**: substring / regex search over the serialized event
//!
//! The first event in feed order that mentions the code, falls inside the
//! time window and carries at least the required amount wins.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod finder;
pub mod matcher;

// Re-exports
pub use client::{EventFeed, TonApiClient};
pub use config::FeedConfig;
pub use error::{FeedError, Result};
pub use event::FeedEvent;
pub use finder::LedgerClient;
pub use matcher::{match_payment, ConfirmedPayment, PaymentCheck};
