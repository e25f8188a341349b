//! Store capability interface
//!
//! Every component depends on [`Store`], never on a concrete backend. The
//! in-memory backend lives in [`crate::memory`]; the gateway provides a
//! Postgres one.
//!
//! Fine-grained operations are atomic per key. [`Store::commit_settlement`]
//! is the single place where invoice status, balances and referral
//! activation change together, so a backend can make it one transaction.

use crate::types::{
    Invoice, JournalEntry, JournalKind, Referral, ReferralStats, SettlementReceipt, User, UserId,
    UserProfile,
};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Everything a backend needs to settle one invoice atomically
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPlan {
    /// Invoice being settled
    pub code: String,
    /// Matched on-chain transaction
    pub tx_hash: Option<String>,
    /// Sender wallet
    pub from_address: Option<String>,
    /// Confirmed transfer amount (nanotons)
    pub amount_nanoton: i64,
    /// Base credits for the payer
    pub credits: i64,
    /// Paid to the referrer if this settlement activates a referral
    pub referrer_bonus: i64,
    /// Paid to the payer if this settlement activates a referral
    pub referee_bonus: i64,
    /// Settlement time
    pub paid_at: DateTime<Utc>,
}

/// Result of [`Store::commit_settlement`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementCommit {
    /// This call moved the invoice to paid and applied every credit
    Applied(SettlementReceipt),
    /// The invoice was already paid; nothing changed
    AlreadySettled(Invoice),
}

/// Storage capabilities shared by all components
#[async_trait]
pub trait Store: Send + Sync {
    /// Create or refresh a user from a transport profile. Keeps `created_at`
    /// of an existing user and makes sure the account exists.
    async fn upsert_user(&self, profile: &UserProfile) -> Result<User>;

    /// Look up a user
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>>;

    /// Current balance, creating an empty account on first reference
    async fn get_balance(&self, user_id: UserId) -> Result<i64>;

    /// Add `delta` to the balance and journal it, atomically. Returns the new balance.
    async fn adjust_balance(
        &self,
        user_id: UserId,
        delta: i64,
        kind: JournalKind,
        meta: serde_json::Value,
    ) -> Result<i64>;

    /// Journal entries of one user, oldest first
    async fn journal(&self, user_id: UserId) -> Result<Vec<JournalEntry>>;

    /// Insert a referral edge unless the referee already has one or it is a
    /// self-referral. Returns whether an edge was created.
    async fn insert_referral(&self, referrer_id: UserId, referee_id: UserId) -> Result<bool>;

    /// Referral of a referee
    async fn get_referral(&self, referee_id: UserId) -> Result<Option<Referral>>;

    /// Flip `activated` once. Returns the referrer only on the flipping call.
    async fn activate_referral(&self, referee_id: UserId) -> Result<Option<UserId>>;

    /// Counters for a referrer
    async fn referral_stats(&self, referrer_id: UserId) -> Result<ReferralStats>;

    /// Insert a new invoice. Fails with `DuplicateInvoiceCode` if the code exists.
    async fn insert_invoice(&self, invoice: Invoice) -> Result<()>;

    /// Look up an invoice
    async fn get_invoice(&self, code: &str) -> Result<Option<Invoice>>;

    /// Compare-and-set pending → paid. Returns `false` if absent or already paid.
    async fn mark_invoice_paid(
        &self,
        code: &str,
        tx_hash: Option<&str>,
        paid_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Mark paid, credit the payer, activate the referral and pay both
    /// bonuses as one unit. Concurrent calls for the same code apply once.
    async fn commit_settlement(&self, plan: SettlementPlan) -> Result<SettlementCommit>;
}
