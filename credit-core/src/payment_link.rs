//! TON amounts and wallet deep links

use crate::{Error, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use url::form_urlencoded;

/// Nanotons per TON
pub const NANOS_PER_TON: i64 = 1_000_000_000;

/// Convert a TON amount to nanotons, rounding to the nearest nanoton
pub fn to_nanotons(amount_ton: Decimal) -> Result<i64> {
    if amount_ton.is_sign_negative() {
        return Err(Error::InvalidInvoice(format!(
            "negative TON amount: {}",
            amount_ton
        )));
    }
    amount_ton
        .checked_mul(Decimal::from(NANOS_PER_TON))
        .and_then(|n| n.round().to_i64())
        .ok_or_else(|| Error::InvalidInvoice(format!("TON amount out of range: {}", amount_ton)))
}

/// Convert nanotons back to TON
pub fn from_nanotons(nanotons: i64) -> Decimal {
    Decimal::new(nanotons, 9).normalize()
}

/// Wallet transfer link: `ton://transfer/<address>?amount=<nanotons>&text=<comment>`
pub fn ton_deeplink(address: &str, amount_nanoton: i64, comment: &str) -> String {
    let text: String = form_urlencoded::byte_serialize(comment.as_bytes()).collect();
    format!(
        "ton://transfer/{}?amount={}&text={}",
        address, amount_nanoton, text
    )
}
