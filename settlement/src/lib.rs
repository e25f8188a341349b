//! Payment Reconciliation Engine
//!
//! Settles top-up invoices against the on-chain feed.
//!
//! # Flow
//!
//! 1. **Lookup**: load the invoice; a paid one returns its recorded receipt
//! 2. **Match**: ask the ledger client for a qualifying transfer inside the
//!    invoice window (`created_at - grace ..= expires_at + grace`)
//! 3. **Commit**: mark paid, credit the payer and pay referral bonuses in one
//!    atomic store operation
//!
//! A check is safe to repeat at any time. Concurrent checks of the same
//! invoice credit at most once; the loser sees the winner's receipt.
//!
//! # Example
//!
//! ```no_run
//! use settlement::{CheckOutcome, Config, ReconciliationEngine};
//! use std::sync::Arc;
//!
//! async fn check(engine: &ReconciliationEngine) -> settlement::Result<()> {
//!     match engine.check_and_settle("A1B2C3").await? {
//!         CheckOutcome::Settled(receipt) => println!("+{} credits", receipt.credits_awarded),
//!         CheckOutcome::AlreadySettled(invoice) => println!("already paid: {:?}", invoice.paid_at),
//!         CheckOutcome::NoPaymentYet => println!("not yet"),
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod types;

// Re-exports
pub use config::Config;
pub use engine::{credits_for, ReconciliationEngine};
pub use error::{Error, Result};
pub use metrics::Metrics;
pub use types::CheckOutcome;
