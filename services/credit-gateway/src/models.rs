use chrono::{DateTime, Utc};
use credit_core::{JournalEntry, SettlementReceipt, User, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// First contact from the chat transport, optionally with a referral code
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StartRequest {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Payload of `/start <code>`
    pub ref_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StartResponse {
    pub user: User,
    pub balance: i64,
    /// A referral edge was created by this call
    pub referral_linked: bool,
    pub referral_code: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BalanceResponse {
    pub user_id: UserId,
    pub balance: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateInvoiceRequest {
    pub user_id: i64,
}

/// Everything the chat transport needs to render a payment prompt
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InvoiceResponse {
    pub code: String,
    pub user_id: UserId,
    pub amount_ton: Decimal,
    pub amount_nanoton: i64,
    pub wallet_address: String,
    pub payment_link: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Settled,
    AlreadySettled,
    Pending,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckResponse {
    pub code: String,
    pub status: CheckStatus,
    pub receipt: Option<SettlementReceipt>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReferralInfo {
    pub user_id: UserId,
    pub referral_code: String,
    pub invite_link: String,
    pub invited: u64,
    pub activated: u64,
    pub referrer_bonus: i64,
    pub referee_bonus: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryResponse {
    pub user_id: UserId,
    pub balance: i64,
    pub entries: Vec<JournalEntry>,
}
