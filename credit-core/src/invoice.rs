//! Invoice store
//!
//! Invoices are created by the command surface and only ever move to `paid`
//! through a settlement. There is no expiry sweep: expiry is a read-time
//! comparison against `expires_at`.

use crate::store::Store;
use crate::types::{Invoice, UserId};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Keyed access to invoices
#[derive(Clone)]
pub struct InvoiceStore {
    store: Arc<dyn Store>,
}

impl std::fmt::Debug for InvoiceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvoiceStore").finish_non_exhaustive()
    }
}

impl InvoiceStore {
    /// Wrap a store
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create a pending invoice valid for `ttl`.
    ///
    /// A code collision is reported as `DuplicateInvoiceCode`, never overwritten.
    pub async fn create_invoice(
        &self,
        code: &str,
        user_id: UserId,
        amount_nanoton: i64,
        ttl: Duration,
    ) -> Result<Invoice> {
        if code.is_empty() {
            return Err(Error::InvalidInvoice("empty code".to_string()));
        }
        if amount_nanoton <= 0 {
            return Err(Error::InvalidInvoice(format!(
                "amount must be positive, got {}",
                amount_nanoton
            )));
        }

        let invoice = Invoice::new(code, user_id, amount_nanoton, Utc::now(), ttl);
        match self.store.insert_invoice(invoice.clone()).await {
            Ok(()) => {
                info!(
                    code = %invoice.code,
                    user_id = %user_id,
                    amount_nanoton,
                    expires_at = %invoice.expires_at,
                    "Invoice created"
                );
                Ok(invoice)
            }
            Err(Error::DuplicateInvoiceCode(code)) => {
                warn!(code = %code, "Invoice code collision");
                Err(Error::DuplicateInvoiceCode(code))
            }
            Err(e) => Err(e),
        }
    }

    /// Look up an invoice
    pub async fn get_invoice(&self, code: &str) -> Result<Option<Invoice>> {
        self.store.get_invoice(code).await
    }

    /// Move a pending invoice to paid. Returns `false` without touching
    /// anything when the invoice is absent or already paid.
    pub async fn mark_paid(
        &self,
        code: &str,
        tx_ref: Option<&str>,
        paid_at: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self.store.mark_invoice_paid(code, tx_ref, paid_at).await?;
        if changed {
            info!(code = %code, tx_ref = ?tx_ref, "Invoice marked paid");
        }
        Ok(changed)
    }
}
