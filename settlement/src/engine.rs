//! Main reconciliation engine
//!
//! Orchestrates invoice lookup, the feed query and the atomic settlement commit.

use crate::{config::Config, metrics::Metrics, types::CheckOutcome, Error, Result};
use chrono::Utc;
use credit_core::payment_link::NANOS_PER_TON;
use credit_core::{InvoiceStore, SettlementCommit, SettlementPlan, Store};
use std::sync::Arc;
use std::time::Instant;
use ton_feed::{LedgerClient, PaymentCheck};
use tracing::{debug, error, info};

/// Credits for `amount_nanoton` at `credits_per_ton`, rounded down
///
/// Computed in 128-bit so large amounts cannot overflow before the division.
pub fn credits_for(amount_nanoton: i64, credits_per_ton: i64) -> i64 {
    let credits = (amount_nanoton as i128 * credits_per_ton as i128)
        .div_euclid(NANOS_PER_TON as i128);
    credits.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Payment reconciliation engine
pub struct ReconciliationEngine {
    /// Shared store
    store: Arc<dyn Store>,

    /// Invoice access
    invoices: InvoiceStore,

    /// On-chain lookups
    ledger: LedgerClient,

    /// Configuration
    config: Config,

    /// Metrics
    metrics: Metrics,
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("ledger", &self.ledger)
            .field("config", &self.config)
            .finish()
    }
}

impl ReconciliationEngine {
    /// Create new engine
    pub fn new(store: Arc<dyn Store>, ledger: LedgerClient, config: Config, metrics: Metrics) -> Self {
        Self {
            invoices: InvoiceStore::new(store.clone()),
            store,
            ledger,
            config,
            metrics,
        }
    }

    /// Engine configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Engine metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Check one invoice and settle it if its payment is on chain
    ///
    /// Safe to call any number of times, concurrently too: the credit is
    /// applied at most once and later calls get the recorded receipt.
    pub async fn check_and_settle(&self, code: &str) -> Result<CheckOutcome> {
        let result = self.reconcile(code).await;

        match &result {
            Ok(outcome) => self.metrics.record_check(outcome.label()),
            Err(Error::InvoiceNotFound(_)) => self.metrics.record_check("not_found"),
            Err(_) => self.metrics.record_check("error"),
        }

        result
    }

    async fn reconcile(&self, code: &str) -> Result<CheckOutcome> {
        let invoice = self
            .invoices
            .get_invoice(code)
            .await?
            .ok_or_else(|| Error::InvoiceNotFound(code.to_string()))?;

        if !invoice.is_pending() {
            debug!(code, "Invoice already paid");
            return Ok(CheckOutcome::AlreadySettled(invoice));
        }

        // Step 1: Query the feed inside the invoice window
        let grace = self.config.grace();
        let since = invoice.created_at - grace;
        let until = invoice.expires_at + grace;

        let started = Instant::now();
        let check = self
            .ledger
            .find_payment(
                &self.config.wallet_address,
                &invoice.code,
                invoice.amount_nanoton,
                since,
                Some(until),
            )
            .await;
        self.metrics
            .record_feed_query(started.elapsed().as_secs_f64());

        let payment = match check {
            Ok(PaymentCheck::Confirmed(payment)) => payment,
            Ok(PaymentCheck::NotFound) => {
                debug!(code, expired = invoice.is_expired(Utc::now()), "No payment yet");
                return Ok(CheckOutcome::NoPaymentYet);
            }
            Err(e) => {
                self.metrics.record_feed_failure();
                error!(code, error = %e, "Feed query failed");
                return Err(e.into());
            }
        };

        // Step 2: Commit the settlement
        let plan = SettlementPlan {
            code: invoice.code.clone(),
            tx_hash: payment.tx_hash,
            from_address: payment.from_address,
            amount_nanoton: payment.amount_nanoton,
            credits: credits_for(payment.amount_nanoton, self.config.credits_per_ton),
            referrer_bonus: self.config.referrer_bonus,
            referee_bonus: self.config.referee_bonus,
            paid_at: Utc::now(),
        };

        match self.store.commit_settlement(plan).await? {
            SettlementCommit::Applied(receipt) => {
                info!(
                    code,
                    user_id = %receipt.user_id,
                    credits = receipt.credits_awarded,
                    referee_bonus = receipt.referee_bonus,
                    referrer = ?receipt.referrer.map(|r| r.user_id.get()),
                    new_balance = receipt.new_balance,
                    "Invoice settled"
                );
                self.metrics
                    .record_settlement(receipt.credits_awarded, receipt.referrer.is_some());
                Ok(CheckOutcome::Settled(receipt))
            }
            SettlementCommit::AlreadySettled(invoice) => {
                info!(code, "Invoice settled by a concurrent check");
                Ok(CheckOutcome::AlreadySettled(invoice))
            }
        }
    }
}
