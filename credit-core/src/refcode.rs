//! Referral codes
//!
//! A code is the marker `R` followed by the user id in uppercase base 36.
//! Decoding is case-insensitive and rejects anything that is not a positive
//! id in that form.

use crate::types::UserId;

/// Leading marker of every referral code
pub const MARKER: char = 'R';

/// Digit alphabet
pub const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Encode a user id. Ids below 1 encode as 1.
pub fn encode(user_id: UserId) -> String {
    let base = ALPHABET.len() as u64;
    let mut n = user_id.get().max(1) as u64;

    let mut digits = Vec::new();
    while n > 0 {
        digits.push(ALPHABET[(n % base) as usize] as char);
        n /= base;
    }

    let mut code = String::with_capacity(digits.len() + 1);
    code.push(MARKER);
    code.extend(digits.iter().rev());
    code
}

/// Decode a referral code. `None` on a missing marker, a foreign character,
/// overflow, or an id below 1.
pub fn decode(code: &str) -> Option<UserId> {
    let mut chars = code.chars();
    let marker = chars.next()?;
    if marker.to_ascii_uppercase() != MARKER {
        return None;
    }

    let base = ALPHABET.len() as i64;
    let mut n: i64 = 0;
    for ch in chars {
        let digit = ch.to_digit(36)? as i64;
        n = n.checked_mul(base)?.checked_add(digit)?;
    }

    (n > 0).then(|| UserId::new(n))
}
