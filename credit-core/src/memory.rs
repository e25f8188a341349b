//! In-process store backed by concurrent maps
//!
//! Lock order is invoices → referrals → accounts → journal. Every method
//! takes a prefix of that order, so no two callers can wait on each other.

use crate::store::{SettlementCommit, SettlementPlan, Store};
use crate::types::{
    Invoice, InvoiceStatus, JournalEntry, JournalKind, Referral, ReferralStats, ReferrerBonus,
    SettlementReceipt, User, UserId, UserProfile,
};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::json;

/// In-memory [`Store`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<UserId, User>,
    accounts: DashMap<UserId, i64>,
    referrals: DashMap<UserId, Referral>,
    invoices: DashMap<String, Invoice>,
    journal: Mutex<Vec<JournalEntry>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn credit(
        &self,
        user_id: UserId,
        delta: i64,
        kind: JournalKind,
        meta: serde_json::Value,
        at: DateTime<Utc>,
    ) -> i64 {
        let mut account = self.accounts.entry(user_id).or_insert(0);
        *account += delta;
        let balance = *account;

        // Journal while the account entry is held so entries follow balance order
        let mut journal = self.journal.lock();
        let id = journal.len() as i64 + 1;
        journal.push(JournalEntry {
            id,
            user_id,
            kind,
            amount: delta,
            meta,
            created_at: at,
        });

        balance
    }

    fn activate(&self, referee_id: UserId, at: DateTime<Utc>) -> Option<UserId> {
        let mut referral = self.referrals.get_mut(&referee_id)?;
        if referral.activated {
            return None;
        }
        referral.activated = true;
        referral.activated_at = Some(at);
        Some(referral.referrer_id)
    }

    fn apply_settlement(&self, plan: SettlementPlan) -> Result<SettlementCommit> {
        let mut invoice = self
            .invoices
            .get_mut(&plan.code)
            .ok_or_else(|| Error::InvoiceNotFound(plan.code.clone()))?;

        if !invoice.is_pending() {
            return Ok(SettlementCommit::AlreadySettled(invoice.value().clone()));
        }

        let payer = invoice.user_id;
        let mut new_balance = self.credit(
            payer,
            plan.credits,
            JournalKind::Topup,
            json!({
                "invoice": plan.code,
                "tx_hash": plan.tx_hash,
                "amount_nanoton": plan.amount_nanoton,
            }),
            plan.paid_at,
        );

        let mut referee_bonus = 0;
        let mut referrer = None;
        if let Some(referrer_id) = self.activate(payer, plan.paid_at) {
            self.credit(
                referrer_id,
                plan.referrer_bonus,
                JournalKind::ReferralBonus,
                json!({ "referee": payer, "invoice": plan.code }),
                plan.paid_at,
            );
            new_balance = self.credit(
                payer,
                plan.referee_bonus,
                JournalKind::ReferralBonus,
                json!({ "referrer": referrer_id, "invoice": plan.code }),
                plan.paid_at,
            );
            referee_bonus = plan.referee_bonus;
            referrer = Some(ReferrerBonus {
                user_id: referrer_id,
                bonus: plan.referrer_bonus,
            });
        }

        let receipt = SettlementReceipt {
            code: plan.code,
            user_id: payer,
            tx_hash: plan.tx_hash,
            from_address: plan.from_address,
            amount_nanoton: plan.amount_nanoton,
            credits_awarded: plan.credits,
            referee_bonus,
            referrer,
            new_balance,
            paid_at: plan.paid_at,
        };

        invoice.status = InvoiceStatus::Paid;
        invoice.paid_at = Some(receipt.paid_at);
        invoice.tx_hash = receipt.tx_hash.clone();
        invoice.receipt = Some(receipt.clone());

        Ok(SettlementCommit::Applied(receipt))
    }

    fn upsert_user_sync(&self, profile: &UserProfile) -> User {
        let user_id = UserId::new(profile.user_id);
        let user = match self.users.entry(user_id) {
            Entry::Occupied(mut existing) => {
                let user = existing.get_mut();
                user.username = profile.username.clone();
                user.first_name = profile.first_name.clone();
                user.last_name = profile.last_name.clone();
                user.clone()
            }
            Entry::Vacant(vacant) => vacant
                .insert(User::from_profile(profile, Utc::now()))
                .value()
                .clone(),
        };
        self.accounts.entry(user_id).or_insert(0);
        user
    }

    fn insert_referral_sync(&self, referrer_id: UserId, referee_id: UserId) -> bool {
        if referrer_id == referee_id {
            return false;
        }
        match self.referrals.entry(referee_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(Referral {
                    referee_id,
                    referrer_id,
                    activated: false,
                    created_at: Utc::now(),
                    activated_at: None,
                });
                true
            }
        }
    }

    fn insert_invoice_sync(&self, invoice: Invoice) -> Result<()> {
        match self.invoices.entry(invoice.code.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicateInvoiceCode(invoice.code)),
            Entry::Vacant(vacant) => {
                vacant.insert(invoice);
                Ok(())
            }
        }
    }

    fn mark_paid_sync(&self, code: &str, tx_hash: Option<&str>, paid_at: DateTime<Utc>) -> bool {
        match self.invoices.get_mut(code) {
            Some(mut invoice) if invoice.is_pending() => {
                invoice.status = InvoiceStatus::Paid;
                invoice.paid_at = Some(paid_at);
                invoice.tx_hash = tx_hash.map(str::to_string);
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_user(&self, profile: &UserProfile) -> Result<User> {
        Ok(self.upsert_user_sync(profile))
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        Ok(self.users.get(&user_id).map(|u| u.value().clone()))
    }

    async fn get_balance(&self, user_id: UserId) -> Result<i64> {
        Ok(*self.accounts.entry(user_id).or_insert(0))
    }

    async fn adjust_balance(
        &self,
        user_id: UserId,
        delta: i64,
        kind: JournalKind,
        meta: serde_json::Value,
    ) -> Result<i64> {
        Ok(self.credit(user_id, delta, kind, meta, Utc::now()))
    }

    async fn journal(&self, user_id: UserId) -> Result<Vec<JournalEntry>> {
        let journal = self.journal.lock();
        Ok(journal
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_referral(&self, referrer_id: UserId, referee_id: UserId) -> Result<bool> {
        Ok(self.insert_referral_sync(referrer_id, referee_id))
    }

    async fn get_referral(&self, referee_id: UserId) -> Result<Option<Referral>> {
        Ok(self.referrals.get(&referee_id).map(|r| r.value().clone()))
    }

    async fn activate_referral(&self, referee_id: UserId) -> Result<Option<UserId>> {
        Ok(self.activate(referee_id, Utc::now()))
    }

    async fn referral_stats(&self, referrer_id: UserId) -> Result<ReferralStats> {
        let mut stats = ReferralStats::default();
        for referral in self.referrals.iter() {
            if referral.referrer_id == referrer_id {
                stats.invited += 1;
                if referral.activated {
                    stats.activated += 1;
                }
            }
        }
        Ok(stats)
    }

    async fn insert_invoice(&self, invoice: Invoice) -> Result<()> {
        self.insert_invoice_sync(invoice)
    }

    async fn get_invoice(&self, code: &str) -> Result<Option<Invoice>> {
        Ok(self.invoices.get(code).map(|i| i.value().clone()))
    }

    async fn mark_invoice_paid(
        &self,
        code: &str,
        tx_hash: Option<&str>,
        paid_at: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self.mark_paid_sync(code, tx_hash, paid_at))
    }

    async fn commit_settlement(&self, plan: SettlementPlan) -> Result<SettlementCommit> {
        self.apply_settlement(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn plan(code: &str, credits: i64) -> SettlementPlan {
        SettlementPlan {
            code: code.to_string(),
            tx_hash: Some("tx-1".to_string()),
            from_address: Some("EQsender".to_string()),
            amount_nanoton: 100_000_000,
            credits,
            referrer_bonus: 20,
            referee_bonus: 10,
            paid_at: Utc::now(),
        }
    }

    async fn store_with_invoice(code: &str, payer: i64) -> MemoryStore {
        let store = MemoryStore::new();
        let invoice = Invoice::new(code, UserId::new(payer), 100_000_000, Utc::now(), Duration::seconds(900));
        store.insert_invoice(invoice).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_upsert_user_keeps_created_at() {
        let store = MemoryStore::new();
        let mut profile = UserProfile {
            user_id: 5,
            username: Some("alice".into()),
            ..Default::default()
        };

        let first = store.upsert_user(&profile).await.unwrap();
        profile.username = Some("alice_new".into());
        let second = store.upsert_user(&profile).await.unwrap();

        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.username.as_deref(), Some("alice_new"));
        assert_eq!(store.get_balance(UserId::new(5)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_invoice_rejected() {
        let store = store_with_invoice("ABC123", 1).await;
        let dup = Invoice::new("ABC123", UserId::new(2), 1, Utc::now(), Duration::seconds(60));

        let err = store.insert_invoice(dup).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateInvoiceCode(code) if code == "ABC123"));

        // First owner keeps the code
        let invoice = store.get_invoice("ABC123").await.unwrap().unwrap();
        assert_eq!(invoice.user_id, UserId::new(1));
    }

    #[tokio::test]
    async fn test_mark_paid_is_compare_and_set() {
        let store = store_with_invoice("ABC123", 1).await;
        let now = Utc::now();

        assert!(store.mark_invoice_paid("ABC123", Some("tx"), now).await.unwrap());
        assert!(!store.mark_invoice_paid("ABC123", Some("tx2"), now).await.unwrap());
        assert!(!store.mark_invoice_paid("MISSING", None, now).await.unwrap());

        let invoice = store.get_invoice("ABC123").await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.tx_hash.as_deref(), Some("tx"));
    }

    #[tokio::test]
    async fn test_settlement_applies_once() {
        let store = store_with_invoice("ABC123", 1).await;

        let first = store.commit_settlement(plan("ABC123", 10)).await.unwrap();
        let receipt = match first {
            SettlementCommit::Applied(receipt) => receipt,
            other => panic!("expected applied, got {:?}", other),
        };
        assert_eq!(receipt.new_balance, 10);

        let second = store.commit_settlement(plan("ABC123", 10)).await.unwrap();
        match second {
            SettlementCommit::AlreadySettled(invoice) => {
                assert_eq!(invoice.receipt, Some(receipt));
            }
            other => panic!("expected already settled, got {:?}", other),
        }
        assert_eq!(store.get_balance(UserId::new(1)).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_settlement_activates_referral() {
        let store = store_with_invoice("ABC123", 2).await;
        assert!(store.insert_referral(UserId::new(1), UserId::new(2)).await.unwrap());

        let receipt = match store.commit_settlement(plan("ABC123", 10)).await.unwrap() {
            SettlementCommit::Applied(receipt) => receipt,
            other => panic!("expected applied, got {:?}", other),
        };

        assert_eq!(receipt.referee_bonus, 10);
        assert_eq!(receipt.new_balance, 20);
        assert_eq!(
            receipt.referrer,
            Some(ReferrerBonus { user_id: UserId::new(1), bonus: 20 })
        );
        assert_eq!(store.get_balance(UserId::new(1)).await.unwrap(), 20);
        assert!(store.get_referral(UserId::new(2)).await.unwrap().unwrap().activated);

        let kinds: Vec<JournalKind> = store
            .journal(UserId::new(2))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(kinds, vec![JournalKind::Topup, JournalKind::ReferralBonus]);
    }

    #[tokio::test]
    async fn test_settlement_unknown_invoice() {
        let store = MemoryStore::new();
        let err = store.commit_settlement(plan("NOPE", 1)).await.unwrap_err();
        assert!(matches!(err, Error::InvoiceNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_settlement_credits_once() {
        let store = Arc::new(store_with_invoice("RACE01", 9).await);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.commit_settlement(plan("RACE01", 10)).await.unwrap()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if let SettlementCommit::Applied(_) = handle.await.unwrap() {
                applied += 1;
            }
        }

        assert_eq!(applied, 1);
        assert_eq!(store.get_balance(UserId::new(9)).await.unwrap(), 10);
    }
}
