//! Postgres implementation of the credit store
//!
//! Per-key atomicity comes from single-statement upserts; a settlement runs in
//! one transaction whose first statement is the pending → paid
//! compare-and-set, so a racing settlement blocks on the invoice row and then
//! finds it paid. Account rows touched by a settlement are locked in ascending
//! user id order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use credit_core::{
    Invoice, InvoiceStatus, JournalEntry, JournalKind, Referral, ReferralStats, ReferrerBonus,
    SettlementCommit, SettlementPlan, SettlementReceipt, Store, User, UserId, UserProfile,
};
use serde_json::json;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, Pool, Postgres, Transaction};
use std::time::Duration;
use tracing::info;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        user_id     BIGINT PRIMARY KEY,
        username    TEXT,
        first_name  TEXT,
        last_name   TEXT,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        user_id     BIGINT PRIMARY KEY,
        balance     BIGINT NOT NULL DEFAULT 0,
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS referrals (
        referee_id   BIGINT PRIMARY KEY,
        referrer_id  BIGINT NOT NULL,
        activated    BOOLEAN NOT NULL DEFAULT FALSE,
        created_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
        activated_at TIMESTAMPTZ,
        CHECK (referrer_id <> referee_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS referrals_referrer_idx ON referrals (referrer_id)",
    r#"
    CREATE TABLE IF NOT EXISTS invoices (
        code            TEXT PRIMARY KEY,
        user_id         BIGINT NOT NULL,
        amount_nanoton  BIGINT NOT NULL,
        status          TEXT NOT NULL DEFAULT 'pending',
        created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
        expires_at      TIMESTAMPTZ NOT NULL,
        paid_at         TIMESTAMPTZ,
        tx_hash         TEXT,
        receipt         JSONB
    )
    "#,
    "CREATE INDEX IF NOT EXISTS invoices_user_idx ON invoices (user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        id          BIGSERIAL PRIMARY KEY,
        user_id     BIGINT NOT NULL,
        kind        TEXT NOT NULL,
        amount      BIGINT NOT NULL,
        meta        JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS transactions_user_idx ON transactions (user_id, id)",
];

const INVOICE_COLUMNS: &str =
    "code, user_id, amount_nanoton, status, created_at, expires_at, paid_at, tx_hash, receipt";

#[derive(Debug, FromRow)]
struct UserRow {
    user_id: i64,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            user_id: UserId::new(row.user_id),
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ReferralRow {
    referee_id: i64,
    referrer_id: i64,
    activated: bool,
    created_at: DateTime<Utc>,
    activated_at: Option<DateTime<Utc>>,
}

impl From<ReferralRow> for Referral {
    fn from(row: ReferralRow) -> Self {
        Referral {
            referee_id: UserId::new(row.referee_id),
            referrer_id: UserId::new(row.referrer_id),
            activated: row.activated,
            created_at: row.created_at,
            activated_at: row.activated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct InvoiceRow {
    code: String,
    user_id: i64,
    amount_nanoton: i64,
    status: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    tx_hash: Option<String>,
    receipt: Option<Json<SettlementReceipt>>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = credit_core::Error;

    fn try_from(row: InvoiceRow) -> credit_core::Result<Self> {
        let status = InvoiceStatus::parse(&row.status).ok_or_else(|| {
            credit_core::Error::Storage(format!(
                "invoice {} has unknown status {:?}",
                row.code, row.status
            ))
        })?;

        Ok(Invoice {
            code: row.code,
            user_id: UserId::new(row.user_id),
            amount_nanoton: row.amount_nanoton,
            status,
            created_at: row.created_at,
            expires_at: row.expires_at,
            paid_at: row.paid_at,
            tx_hash: row.tx_hash,
            receipt: row.receipt.map(|r| r.0),
        })
    }
}

#[derive(Debug, FromRow)]
struct JournalRow {
    id: i64,
    user_id: i64,
    kind: String,
    amount: i64,
    meta: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<JournalRow> for JournalEntry {
    type Error = credit_core::Error;

    fn try_from(row: JournalRow) -> credit_core::Result<Self> {
        let kind = JournalKind::parse(&row.kind).ok_or_else(|| {
            credit_core::Error::Storage(format!(
                "journal entry {} has unknown kind {:?}",
                row.id, row.kind
            ))
        })?;

        Ok(JournalEntry {
            id: row.id,
            user_id: UserId::new(row.user_id),
            kind,
            amount: row.amount,
            meta: row.meta,
            created_at: row.created_at,
        })
    }
}

fn storage(err: sqlx::Error) -> credit_core::Error {
    credit_core::Error::Storage(err.to_string())
}

/// Postgres-backed [`Store`]
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub async fn new(database_url: &str, max_connections: u32) -> crate::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(PgStore { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist
    pub async fn ensure_schema(&self) -> crate::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema ready");
        Ok(())
    }

    /// Row-lock the given accounts, creating missing ones, in ascending id
    /// order so two settlements touching the same pair cannot deadlock
    async fn lock_accounts(
        tx: &mut Transaction<'_, Postgres>,
        mut user_ids: Vec<UserId>,
    ) -> credit_core::Result<()> {
        user_ids.sort();
        user_ids.dedup();

        for user_id in user_ids {
            sqlx::query(
                r#"
                INSERT INTO accounts (user_id) VALUES ($1)
                ON CONFLICT (user_id) DO UPDATE SET balance = accounts.balance
                "#,
            )
            .bind(user_id.get())
            .execute(&mut **tx)
            .await
            .map_err(storage)?;
        }
        Ok(())
    }

    async fn credit(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        delta: i64,
        kind: JournalKind,
        meta: serde_json::Value,
        at: DateTime<Utc>,
    ) -> credit_core::Result<i64> {
        let balance: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO accounts (user_id, balance, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id)
            DO UPDATE SET balance = accounts.balance + EXCLUDED.balance,
                          updated_at = EXCLUDED.updated_at
            RETURNING balance
            "#,
        )
        .bind(user_id.get())
        .bind(delta)
        .bind(at)
        .fetch_one(&mut **tx)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            INSERT INTO transactions (user_id, kind, amount, meta, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id.get())
        .bind(kind.as_str())
        .bind(delta)
        .bind(meta)
        .bind(at)
        .execute(&mut **tx)
        .await
        .map_err(storage)?;

        Ok(balance)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_user(&self, profile: &UserProfile) -> credit_core::Result<User> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (user_id, username, first_name, last_name, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id)
            DO UPDATE SET username = EXCLUDED.username,
                          first_name = EXCLUDED.first_name,
                          last_name = EXCLUDED.last_name
            RETURNING user_id, username, first_name, last_name, created_at
            "#,
        )
        .bind(profile.user_id)
        .bind(&profile.username)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(storage)?;

        sqlx::query("INSERT INTO accounts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(profile.user_id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(row.into())
    }

    async fn get_user(&self, user_id: UserId) -> credit_core::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT user_id, username, first_name, last_name, created_at FROM users WHERE user_id = $1",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(row.map(User::from))
    }

    async fn get_balance(&self, user_id: UserId) -> credit_core::Result<i64> {
        sqlx::query("INSERT INTO accounts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id.get())
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        sqlx::query_scalar("SELECT balance FROM accounts WHERE user_id = $1")
            .bind(user_id.get())
            .fetch_one(&self.pool)
            .await
            .map_err(storage)
    }

    async fn adjust_balance(
        &self,
        user_id: UserId,
        delta: i64,
        kind: JournalKind,
        meta: serde_json::Value,
    ) -> credit_core::Result<i64> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let balance = Self::credit(&mut tx, user_id, delta, kind, meta, Utc::now()).await?;
        tx.commit().await.map_err(storage)?;
        Ok(balance)
    }

    async fn journal(&self, user_id: UserId) -> credit_core::Result<Vec<JournalEntry>> {
        let rows = sqlx::query_as::<_, JournalRow>(
            r#"
            SELECT id, user_id, kind, amount, meta, created_at
            FROM transactions
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter().map(JournalEntry::try_from).collect()
    }

    async fn insert_referral(
        &self,
        referrer_id: UserId,
        referee_id: UserId,
    ) -> credit_core::Result<bool> {
        if referrer_id == referee_id {
            return Ok(false);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO referrals (referee_id, referrer_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (referee_id) DO NOTHING
            "#,
        )
        .bind(referee_id.get())
        .bind(referrer_id.get())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_referral(&self, referee_id: UserId) -> credit_core::Result<Option<Referral>> {
        let row = sqlx::query_as::<_, ReferralRow>(
            r#"
            SELECT referee_id, referrer_id, activated, created_at, activated_at
            FROM referrals
            WHERE referee_id = $1
            "#,
        )
        .bind(referee_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(row.map(Referral::from))
    }

    async fn activate_referral(&self, referee_id: UserId) -> credit_core::Result<Option<UserId>> {
        let referrer: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE referrals
            SET activated = TRUE, activated_at = $2
            WHERE referee_id = $1 AND NOT activated
            RETURNING referrer_id
            "#,
        )
        .bind(referee_id.get())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(referrer.map(UserId::new))
    }

    async fn referral_stats(&self, referrer_id: UserId) -> credit_core::Result<ReferralStats> {
        let (invited, activated): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE activated)
            FROM referrals
            WHERE referrer_id = $1
            "#,
        )
        .bind(referrer_id.get())
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        Ok(ReferralStats {
            invited: invited.max(0) as u64,
            activated: activated.max(0) as u64,
        })
    }

    async fn insert_invoice(&self, invoice: Invoice) -> credit_core::Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO invoices (code, user_id, amount_nanoton, status, created_at, expires_at, paid_at, tx_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(&invoice.code)
        .bind(invoice.user_id.get())
        .bind(invoice.amount_nanoton)
        .bind(invoice.status.as_str())
        .bind(invoice.created_at)
        .bind(invoice.expires_at)
        .bind(invoice.paid_at)
        .bind(&invoice.tx_hash)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(credit_core::Error::DuplicateInvoiceCode(invoice.code));
        }
        Ok(())
    }

    async fn get_invoice(&self, code: &str) -> credit_core::Result<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE code = $1",
            INVOICE_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.map(Invoice::try_from).transpose()
    }

    async fn mark_invoice_paid(
        &self,
        code: &str,
        tx_hash: Option<&str>,
        paid_at: DateTime<Utc>,
    ) -> credit_core::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'paid', paid_at = $2, tx_hash = $3
            WHERE code = $1 AND status = 'pending'
            "#,
        )
        .bind(code)
        .bind(paid_at)
        .bind(tx_hash)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(result.rows_affected() == 1)
    }

    async fn commit_settlement(&self, plan: SettlementPlan) -> credit_core::Result<SettlementCommit> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        // Step 1: claim the invoice
        let payer: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE invoices
            SET status = 'paid', paid_at = $2, tx_hash = $3
            WHERE code = $1 AND status = 'pending'
            RETURNING user_id
            "#,
        )
        .bind(&plan.code)
        .bind(plan.paid_at)
        .bind(&plan.tx_hash)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?;

        let payer = match payer {
            Some(id) => UserId::new(id),
            None => {
                tx.rollback().await.map_err(storage)?;
                return match self.get_invoice(&plan.code).await? {
                    Some(invoice) => Ok(SettlementCommit::AlreadySettled(invoice)),
                    None => Err(credit_core::Error::InvoiceNotFound(plan.code)),
                };
            }
        };

        // Step 2: first top-up activates the referral
        let referrer: Option<UserId> = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE referrals
            SET activated = TRUE, activated_at = $2
            WHERE referee_id = $1 AND NOT activated
            RETURNING referrer_id
            "#,
        )
        .bind(payer.get())
        .bind(plan.paid_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?
        .map(UserId::new);

        // Step 3: credits, with account rows locked in id order
        let mut accounts = vec![payer];
        accounts.extend(referrer);
        Self::lock_accounts(&mut tx, accounts).await?;

        let mut new_balance = Self::credit(
            &mut tx,
            payer,
            plan.credits,
            JournalKind::Topup,
            json!({
                "invoice": plan.code,
                "tx_hash": plan.tx_hash,
                "amount_nanoton": plan.amount_nanoton,
            }),
            plan.paid_at,
        )
        .await?;

        let mut referee_bonus = 0;
        let mut referrer_bonus = None;
        if let Some(referrer_id) = referrer {
            Self::credit(
                &mut tx,
                referrer_id,
                plan.referrer_bonus,
                JournalKind::ReferralBonus,
                json!({ "referee": payer, "invoice": plan.code }),
                plan.paid_at,
            )
            .await?;
            new_balance = Self::credit(
                &mut tx,
                payer,
                plan.referee_bonus,
                JournalKind::ReferralBonus,
                json!({ "referrer": referrer_id, "invoice": plan.code }),
                plan.paid_at,
            )
            .await?;
            referee_bonus = plan.referee_bonus;
            referrer_bonus = Some(ReferrerBonus {
                user_id: referrer_id,
                bonus: plan.referrer_bonus,
            });
        }

        // Step 4: record the receipt
        let receipt = SettlementReceipt {
            code: plan.code,
            user_id: payer,
            tx_hash: plan.tx_hash,
            from_address: plan.from_address,
            amount_nanoton: plan.amount_nanoton,
            credits_awarded: plan.credits,
            referee_bonus,
            referrer: referrer_bonus,
            new_balance,
            paid_at: plan.paid_at,
        };

        sqlx::query("UPDATE invoices SET receipt = $2 WHERE code = $1")
            .bind(&receipt.code)
            .bind(Json(&receipt))
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(SettlementCommit::Applied(receipt))
    }
}
