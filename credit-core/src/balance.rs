//! Balance ledger
//!
//! Balances change only through additive adjustments. Each adjustment is
//! journaled in the same atomic step.

use crate::store::Store;
use crate::types::{JournalEntry, JournalKind, UserId};
use crate::Result;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Per-user credit balances
#[derive(Clone)]
pub struct BalanceLedger {
    store: Arc<dyn Store>,
}

impl std::fmt::Debug for BalanceLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceLedger").finish_non_exhaustive()
    }
}

impl BalanceLedger {
    /// Wrap a store
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Current balance (0 for a user never seen before)
    pub async fn get_balance(&self, user_id: UserId) -> Result<i64> {
        self.store.get_balance(user_id).await
    }

    /// Add a signed delta and return the new balance
    pub async fn adjust_balance(&self, user_id: UserId, delta: i64) -> Result<i64> {
        let balance = self
            .store
            .adjust_balance(user_id, delta, JournalKind::Adjustment, json!({}))
            .await?;
        debug!(user_id = %user_id, delta, balance, "Balance adjusted");
        Ok(balance)
    }

    /// Balance movements of one user, oldest first
    pub async fn history(&self, user_id: UserId) -> Result<Vec<JournalEntry>> {
        self.store.journal(user_id).await
    }
}
