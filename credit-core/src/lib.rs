//! TON Credit Core
//!
//! Users, credit balances, referrals and top-up invoices behind one
//! injectable store.
//!
//! # Architecture
//!
//! - **Store**: every component talks to [`Store`], never to a concrete map
//! - **Invoices**: short human-typeable codes, pending → paid exactly once
//! - **Balances**: additive adjustments only, each one journaled
//! - **Referrals**: first referral wins, activation is one-shot

#![forbid(unsafe_code)]
//!
//! # Invariants
//!
//! - An invoice never leaves `paid`
//! - A paid invoice always carries the receipt of the credit it produced
//! - At most one referral per referee, never self-referral
//! - Concurrent adjustments to one account are never lost

#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod store;
pub mod memory;
pub mod invoice;
pub mod balance;
pub mod referral;
pub mod refcode;
pub mod code;
pub mod payment_link;
pub mod error;
pub mod config;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    Invoice, InvoiceStatus, JournalEntry, JournalKind, Referral, ReferralStats, ReferrerBonus,
    SettlementReceipt, User, UserId, UserProfile,
};
pub use store::{SettlementCommit, SettlementPlan, Store};
pub use memory::MemoryStore;
pub use invoice::InvoiceStore;
pub use balance::BalanceLedger;
pub use referral::ReferralGraph;
pub use code::{CodeGenerator, HexCodeGenerator};
pub use config::Config;
