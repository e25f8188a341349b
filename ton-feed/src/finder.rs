//! Ledger client: one bounded payment lookup per call

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::client::EventFeed;
use crate::config::FeedConfig;
use crate::error::{FeedError, Result};
use crate::matcher::{match_payment, PaymentCheck};

/// Looks up invoice payments on the wallet feed
#[derive(Clone)]
pub struct LedgerClient {
    feed: Arc<dyn EventFeed>,
    limit: usize,
    timeout: Duration,
    skew_seconds: i64,
}

impl std::fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerClient")
            .field("limit", &self.limit)
            .field("timeout", &self.timeout)
            .field("skew_seconds", &self.skew_seconds)
            .finish()
    }
}

impl LedgerClient {
    /// Create a client over any event feed
    pub fn new(feed: Arc<dyn EventFeed>, config: &FeedConfig) -> Self {
        Self {
            feed,
            limit: config.limit,
            timeout: config.timeout(),
            skew_seconds: config.skew_seconds,
        }
    }

    /// Search recent events of `address` for a transfer paying `code`
    ///
    /// The window is `[since - skew, until + skew]`; with no `until` it is
    /// open-ended. Transport failures and timeouts are errors, never
    /// `NotFound`.
    pub async fn find_payment(
        &self,
        address: &str,
        code: &str,
        min_amount: i64,
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    ) -> Result<PaymentCheck> {
        let events = tokio::time::timeout(self.timeout, self.feed.recent_events(address, self.limit))
            .await
            .map_err(|_| {
                warn!(code, "Payment lookup timed out");
                FeedError::Timeout(self.timeout.as_millis() as u64)
            })??;

        let not_before = since.timestamp().saturating_sub(self.skew_seconds);
        let not_after = until.map(|u| u.timestamp().saturating_add(self.skew_seconds));

        let check = match_payment(&events, code, min_amount, not_before, not_after);

        if let PaymentCheck::Confirmed(payment) = &check {
            info!(
                code,
                tx_hash = ?payment.tx_hash,
                amount_nanoton = payment.amount_nanoton,
                "Payment found on chain"
            );
        }

        Ok(check)
    }
}
