//! Core types for users, balances, referrals and invoices
//!
//! Amounts are integers throughout:
//! - invoice and transfer amounts in nanotons (1 TON = 10^9)
//! - balances and bonuses in credits

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chat user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Wrap a raw id
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw id
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity as reported by the chat transport on each interaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User id
    pub user_id: i64,
    /// Handle, if the user has one
    #[serde(default)]
    pub username: Option<String>,
    /// First name
    #[serde(default)]
    pub first_name: Option<String>,
    /// Last name
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User id
    pub user_id: UserId,
    /// Handle
    pub username: Option<String>,
    /// First name
    pub first_name: Option<String>,
    /// Last name
    pub last_name: Option<String>,
    /// First interaction
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Build a user record from a transport profile
    pub fn from_profile(profile: &UserProfile, now: DateTime<Utc>) -> Self {
        Self {
            user_id: UserId::new(profile.user_id),
            username: profile.username.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            created_at: now,
        }
    }
}

/// Referral edge, keyed by referee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    /// Referred user (unique)
    pub referee_id: UserId,
    /// User who shared the referral code
    pub referrer_id: UserId,
    /// Set once, on the referee's first paid invoice
    pub activated: bool,
    /// Link time
    pub created_at: DateTime<Utc>,
    /// Activation time
    pub activated_at: Option<DateTime<Utc>>,
}

/// Per-referrer counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralStats {
    /// Referees linked to this referrer
    pub invited: u64,
    /// Referees that completed a first payment
    pub activated: u64,
}

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Waiting for a matching transfer
    Pending,
    /// Settled (terminal)
    Paid,
}

impl InvoiceStatus {
    /// Persisted representation
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
        }
    }

    /// Parse from persisted representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InvoiceStatus::Pending),
            "paid" => Some(InvoiceStatus::Paid),
            _ => None,
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-up invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Short code the payer puts in the transfer memo
    pub code: String,
    /// Payer
    pub user_id: UserId,
    /// Required amount (nanotons)
    pub amount_nanoton: i64,
    /// Current status
    pub status: InvoiceStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Nominal expiry
    pub expires_at: DateTime<Utc>,
    /// Settlement time
    pub paid_at: Option<DateTime<Utc>>,
    /// Matched on-chain transaction
    pub tx_hash: Option<String>,
    /// Outcome of the settlement that paid this invoice
    pub receipt: Option<SettlementReceipt>,
}

impl Invoice {
    /// New pending invoice valid for `ttl` from `created_at`
    pub fn new(
        code: impl Into<String>,
        user_id: UserId,
        amount_nanoton: i64,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            code: code.into(),
            user_id,
            amount_nanoton,
            status: InvoiceStatus::Pending,
            created_at,
            expires_at: created_at + ttl,
            paid_at: None,
            tx_hash: None,
            receipt: None,
        }
    }

    /// Still waiting for payment
    pub fn is_pending(&self) -> bool {
        self.status == InvoiceStatus::Pending
    }

    /// Past its nominal expiry
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Bonus paid to a referrer when their referee settles a first invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferrerBonus {
    /// Referrer
    pub user_id: UserId,
    /// Credits added to the referrer
    pub bonus: i64,
}

/// What a settlement did. Stored on the invoice so re-checks return it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    /// Invoice code
    pub code: String,
    /// Payer
    pub user_id: UserId,
    /// Matched transaction
    pub tx_hash: Option<String>,
    /// Sender wallet, when the feed exposes it
    pub from_address: Option<String>,
    /// Confirmed transfer amount (nanotons)
    pub amount_nanoton: i64,
    /// Base credits from the exchange rate
    pub credits_awarded: i64,
    /// Referee bonus added on top of the base credits (0 if none)
    pub referee_bonus: i64,
    /// Referrer bonus, when this settlement activated a referral
    pub referrer: Option<ReferrerBonus>,
    /// Payer balance after every credit of this settlement
    pub new_balance: i64,
    /// Settlement time
    pub paid_at: DateTime<Utc>,
}

impl SettlementReceipt {
    /// Everything credited to the payer
    pub fn total_credited(&self) -> i64 {
        self.credits_awarded + self.referee_bonus
    }
}

/// Journal entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalKind {
    /// Credits bought with a TON transfer
    Topup,
    /// Referral bonus (either side)
    ReferralBonus,
    /// Direct adjustment
    Adjustment,
}

impl JournalKind {
    /// Persisted representation
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalKind::Topup => "topup",
            JournalKind::ReferralBonus => "referral_bonus",
            JournalKind::Adjustment => "adjustment",
        }
    }

    /// Parse from persisted representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "topup" => Some(JournalKind::Topup),
            "referral_bonus" => Some(JournalKind::ReferralBonus),
            "adjustment" => Some(JournalKind::Adjustment),
            _ => None,
        }
    }
}

/// One balance movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Sequence number assigned by the store
    pub id: i64,
    /// Account owner
    pub user_id: UserId,
    /// Movement kind
    pub kind: JournalKind,
    /// Signed amount (credits)
    pub amount: i64,
    /// Free-form context (invoice code, tx hash, referee, ...)
    pub meta: serde_json::Value,
    /// Time of the movement
    pub created_at: DateTime<Utc>,
}
