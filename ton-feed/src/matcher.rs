//! Payment matching over a batch of feed events
//!
//! Pure function over already-fetched events; no I/O, no clock.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::event::FeedEvent;

/// Payment found on chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedPayment {
    /// Transaction reference, if the event carried one
    pub tx_hash: Option<String>,
    /// Payer address, if the event carried one
    pub from_address: Option<String>,
    /// Amount observed, in nanotons
    pub amount_nanoton: i64,
    /// Event time (unix seconds), if known
    pub timestamp: Option<i64>,
    /// The event itself
    pub event: FeedEvent,
}

/// Result of a payment lookup
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentCheck {
    /// A qualifying transfer exists
    Confirmed(ConfirmedPayment),
    /// Nothing qualifies (yet)
    NotFound,
}

impl PaymentCheck {
    /// Confirmed payment, if any
    pub fn confirmed(&self) -> Option<&ConfirmedPayment> {
        match self {
            PaymentCheck::Confirmed(p) => Some(p),
            PaymentCheck::NotFound => None,
        }
    }
}

/// Find the first event (feed order) that pays `code`
///
/// An event qualifies when it mentions `code`, its amount is at least
/// `min_amount` and its timestamp, when present, lies in
/// `[not_before, not_after]`. Events without a timestamp are not filtered by
/// time.
pub fn match_payment(
    events: &[FeedEvent],
    code: &str,
    min_amount: i64,
    not_before: i64,
    not_after: Option<i64>,
) -> PaymentCheck {
    for (idx, event) in events.iter().enumerate() {
        let timestamp = event.timestamp();

        if let Some(ts) = timestamp {
            if ts < not_before {
                debug!(idx, ts, not_before, "Event before window");
                continue;
            }
            if not_after.map_or(false, |limit| ts > limit) {
                debug!(idx, ts, ?not_after, "Event after window");
                continue;
            }
        }

        if !event.mentions(code) {
            continue;
        }

        let amount = event.amount_for(code);
        if amount < min_amount {
            debug!(idx, code, amount, min_amount, "Underpaid transfer");
            continue;
        }

        return PaymentCheck::Confirmed(ConfirmedPayment {
            tx_hash: event.tx_hash(),
            from_address: event.sender_for(code),
            amount_nanoton: amount,
            timestamp,
            event: event.clone(),
        });
    }

    PaymentCheck::NotFound
}
