use crate::errors::{GatewayError, Result};
use crate::models::{
    BalanceResponse, CheckResponse, CheckStatus, HistoryResponse, InvoiceResponse, ReferralInfo,
    StartRequest, StartResponse,
};
use credit_core::payment_link::{from_nanotons, to_nanotons, ton_deeplink};
use credit_core::{
    refcode, BalanceLedger, CodeGenerator, InvoiceStore, ReferralGraph, Store, UserId,
    UserProfile,
};
use prometheus::{Encoder, TextEncoder};
use settlement::{CheckOutcome, ReconciliationEngine};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Typed command surface behind the HTTP handlers
pub struct CommandService {
    store: Arc<dyn Store>,
    invoices: InvoiceStore,
    balances: BalanceLedger,
    referrals: ReferralGraph,
    engine: Arc<ReconciliationEngine>,
    codes: Arc<dyn CodeGenerator>,
    invoice_config: credit_core::Config,
    bot_username: String,
}

impl CommandService {
    pub fn new(
        store: Arc<dyn Store>,
        engine: Arc<ReconciliationEngine>,
        codes: Arc<dyn CodeGenerator>,
        invoice_config: credit_core::Config,
        bot_username: impl Into<String>,
    ) -> Self {
        CommandService {
            invoices: InvoiceStore::new(store.clone()),
            balances: BalanceLedger::new(store.clone()),
            referrals: ReferralGraph::new(store.clone()),
            store,
            engine,
            codes,
            invoice_config,
            bot_username: bot_username.into(),
        }
    }

    /// Register (or refresh) a user and link a referral from `/start <code>`
    ///
    /// A malformed code, a self-referral, an unknown referrer or an existing
    /// referral is ignored.
    pub async fn start(&self, request: StartRequest) -> Result<StartResponse> {
        let profile = UserProfile {
            user_id: request.user_id,
            username: request.username,
            first_name: request.first_name,
            last_name: request.last_name,
        };
        let user = self.store.upsert_user(&profile).await?;

        let mut referral_linked = false;
        if let Some(code) = request.ref_code.as_deref() {
            referral_linked = self.link_from_code(user.user_id, code).await?;
        }

        let balance = self.balances.get_balance(user.user_id).await?;

        Ok(StartResponse {
            referral_code: refcode::encode(user.user_id),
            user,
            balance,
            referral_linked,
        })
    }

    async fn link_from_code(&self, referee: UserId, code: &str) -> Result<bool> {
        let referrer = match refcode::decode(code) {
            Some(id) => id,
            None => {
                debug!(code, "Ignoring malformed referral code");
                return Ok(false);
            }
        };

        if referrer == referee {
            debug!(user_id = %referee, "Ignoring self-referral");
            return Ok(false);
        }

        if self.store.get_user(referrer).await?.is_none() {
            debug!(referrer = %referrer, "Ignoring referral from unknown user");
            return Ok(false);
        }

        let linked = self.referrals.link_referral(referrer, referee).await?;
        if linked {
            info!(referrer = %referrer, referee = %referee, "Referral linked");
        }
        Ok(linked)
    }

    pub async fn balance(&self, user_id: i64) -> Result<BalanceResponse> {
        let user_id = UserId::new(user_id);
        let balance = self.balances.get_balance(user_id).await?;
        Ok(BalanceResponse { user_id, balance })
    }

    /// New top-up invoice for the configured amount and lifetime
    pub async fn create_invoice(&self, user_id: i64) -> Result<InvoiceResponse> {
        let user_id = UserId::new(user_id);
        if self.store.get_user(user_id).await?.is_none() {
            return Err(GatewayError::UserNotFound(user_id.get()));
        }

        let amount_nanoton = to_nanotons(self.invoice_config.invoice_amount_ton)?;
        let ttl = self.invoice_config.invoice_ttl();

        let attempts = self.invoice_config.code_attempts.max(1);
        for attempt in 1..=attempts {
            let code = self.codes.generate();
            match self
                .invoices
                .create_invoice(&code, user_id, amount_nanoton, ttl)
                .await
            {
                Ok(invoice) => {
                    let wallet = self.engine.config().wallet_address.clone();
                    return Ok(InvoiceResponse {
                        payment_link: ton_deeplink(&wallet, invoice.amount_nanoton, &invoice.code),
                        amount_ton: from_nanotons(invoice.amount_nanoton),
                        amount_nanoton: invoice.amount_nanoton,
                        wallet_address: wallet,
                        code: invoice.code,
                        user_id: invoice.user_id,
                        created_at: invoice.created_at,
                        expires_at: invoice.expires_at,
                    });
                }
                Err(credit_core::Error::DuplicateInvoiceCode(_)) => {
                    debug!(attempt, "Drawing a new invoice code");
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(user_id = %user_id, attempts, "Invoice code space exhausted");
        Err(GatewayError::CodeSpaceExhausted(attempts))
    }

    pub async fn check_invoice(&self, code: &str) -> Result<CheckResponse> {
        let outcome = self.engine.check_and_settle(code).await?;

        let (status, message) = match &outcome {
            CheckOutcome::Settled(receipt) => (
                CheckStatus::Settled,
                format!(
                    "Payment found: +{} credits, balance {}",
                    receipt.total_credited(),
                    receipt.new_balance
                ),
            ),
            CheckOutcome::AlreadySettled(_) => (
                CheckStatus::AlreadySettled,
                "Invoice already paid".to_string(),
            ),
            CheckOutcome::NoPaymentYet => (
                CheckStatus::Pending,
                "No payment yet, try again in a minute".to_string(),
            ),
        };

        Ok(CheckResponse {
            code: code.to_string(),
            status,
            receipt: outcome.receipt().cloned(),
            message,
        })
    }

    pub async fn referral_stats(&self, user_id: i64) -> Result<ReferralInfo> {
        let user_id = UserId::new(user_id);
        let stats = self.referrals.stats(user_id).await?;
        let code = refcode::encode(user_id);
        let config = self.engine.config();

        Ok(ReferralInfo {
            user_id,
            invite_link: format!("https://t.me/{}?start={}", self.bot_username, code),
            referral_code: code,
            invited: stats.invited,
            activated: stats.activated,
            referrer_bonus: config.referrer_bonus,
            referee_bonus: config.referee_bonus,
        })
    }

    pub async fn history(&self, user_id: i64) -> Result<HistoryResponse> {
        let user_id = UserId::new(user_id);
        let entries = self.balances.history(user_id).await?;
        let balance = self.balances.get_balance(user_id).await?;
        Ok(HistoryResponse {
            user_id,
            balance,
            entries,
        })
    }

    /// Prometheus text exposition of the engine metrics
    pub fn metrics_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.engine.metrics().registry().gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| GatewayError::Internal(e.to_string()))
    }
}
