//! Outcome types for reconciliation

use credit_core::{Invoice, SettlementReceipt};
use serde::{Deserialize, Serialize};

/// Result of checking one invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// This check found the payment and applied it
    Settled(SettlementReceipt),

    /// The invoice was paid before; nothing changed
    ///
    /// The invoice carries the receipt recorded when it was settled.
    AlreadySettled(Invoice),

    /// No qualifying transfer yet; check again later
    NoPaymentYet,
}

impl CheckOutcome {
    /// Receipt of the settlement, whether it happened now or earlier
    pub fn receipt(&self) -> Option<&SettlementReceipt> {
        match self {
            CheckOutcome::Settled(receipt) => Some(receipt),
            CheckOutcome::AlreadySettled(invoice) => invoice.receipt.as_ref(),
            CheckOutcome::NoPaymentYet => None,
        }
    }

    /// Label used for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            CheckOutcome::Settled(_) => "settled",
            CheckOutcome::AlreadySettled(_) => "already_settled",
            CheckOutcome::NoPaymentYet => "no_payment_yet",
        }
    }
}
