//! Loosely typed feed events
//!
//! Indexer payloads differ between providers and API versions, so an event is
//! kept as raw JSON and fields are pulled out on demand. Structured locations
//! are tried first; the serialized event is the fallback.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `"value": "123456789"` or `"value": 123456789` anywhere in the event.
/// Six digits minimum so small unrelated counters are not taken for amounts.
static RAW_VALUE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#""value"\s*:\s*"?(\d{6,})"?"#).ok());

/// One event from the account feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedEvent(Value);

impl FeedEvent {
    /// Wrap a raw JSON event
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    /// Raw JSON
    pub fn raw(&self) -> &Value {
        &self.0
    }

    /// Event time in unix seconds, if the event carries one
    ///
    /// The first non-empty of `timestamp`, `utime` and `created_at` is the
    /// event time. If that value does not parse, the event counts as untimed
    /// and later keys are not consulted.
    pub fn timestamp(&self) -> Option<i64> {
        ["timestamp", "utime", "created_at"]
            .iter()
            .filter_map(|key| self.0.get(*key))
            .find(|value| is_set(value))
            .and_then(as_integer)
            .filter(|ts| *ts != 0)
    }

    /// Transaction reference (`event_id`, `hash` or `transaction_id`)
    pub fn tx_hash(&self) -> Option<String> {
        ["event_id", "hash", "transaction_id"]
            .iter()
            .filter_map(|key| self.0.get(*key))
            .find_map(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }

    /// Whether the event mentions `code` in a memo, or anywhere at all
    pub fn mentions(&self, code: &str) -> bool {
        if code.is_empty() {
            return false;
        }

        self.transfers().any(|t| t.memo_contains(code))
            || serde_json::to_string(&self.0)
                .map(|raw| raw.contains(code))
                .unwrap_or(false)
    }

    /// Amount in nanotons, 0 when none can be found
    ///
    /// Prefers the transfer whose memo carries `code`, then the first
    /// structured transfer with an amount, then the first large `"value"`
    /// in the serialized event.
    pub fn amount_for(&self, code: &str) -> i64 {
        self.transfers()
            .find(|t| t.memo_contains(code) && t.amount.is_some())
            .or_else(|| self.transfers().find(|t| t.amount.is_some()))
            .and_then(|t| t.amount)
            .or_else(|| self.raw_amount())
            .unwrap_or(0)
    }

    /// Sender address, preferring the transfer whose memo carries `code`
    pub fn sender_for(&self, code: &str) -> Option<String> {
        self.transfers()
            .find(|t| t.memo_contains(code) && t.sender.is_some())
            .or_else(|| self.transfers().find(|t| t.sender.is_some()))
            .and_then(|t| t.sender)
    }

    fn raw_amount(&self) -> Option<i64> {
        let raw = serde_json::to_string(&self.0).ok()?;
        let re = RAW_VALUE.as_ref()?;
        re.captures(&raw)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    /// Structured transfers: `actions[].TonTransfer`, then
    /// `in_messages[]` (or `messages[]` when there are no inbound ones)
    fn transfers(&self) -> impl Iterator<Item = Transfer<'_>> + '_ {
        let actions = self
            .0
            .get("actions")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|action| action.get("TonTransfer"))
            .map(Transfer::from_action);

        let messages = self
            .0
            .get("in_messages")
            .and_then(Value::as_array)
            .filter(|list| !list.is_empty())
            .or_else(|| self.0.get("messages").and_then(Value::as_array))
            .into_iter()
            .flatten()
            .map(Transfer::from_message);

        actions.chain(messages)
    }
}

impl From<Value> for FeedEvent {
    fn from(raw: Value) -> Self {
        Self(raw)
    }
}

/// Fields of one structured transfer
#[derive(Debug)]
struct Transfer<'a> {
    memo: Option<&'a Value>,
    amount: Option<i64>,
    sender: Option<String>,
}

impl<'a> Transfer<'a> {
    /// TonAPI action: `{"comment", "amount", "sender": {"address"}}`
    fn from_action(action: &'a Value) -> Self {
        Self {
            memo: action.get("comment"),
            amount: action.get("amount").and_then(as_integer),
            sender: action.get("sender").and_then(as_address),
        }
    }

    /// Message shape: `{"message"|"comment", "value", "source"|"from"}`
    fn from_message(msg: &'a Value) -> Self {
        let memo = ["message", "comment"]
            .iter()
            .filter_map(|key| msg.get(*key))
            .find(|v| !v.is_null());
        let sender = ["source", "from"]
            .iter()
            .filter_map(|key| msg.get(*key))
            .find_map(as_address);

        Self {
            memo,
            amount: msg.get("value").and_then(as_integer),
            sender,
        }
    }

    fn memo_contains(&self, code: &str) -> bool {
        match self.memo {
            Some(Value::String(s)) => s.contains(code),
            Some(other) => other.to_string().contains(code),
            None => false,
        }
    }
}

/// Integer or all-digit string
/// Null, false, zero and empty values count as unset
fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(list) => !list.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().ok()
        }
        _ => None,
    }
}

/// Address given as a string or as `{"address"}` / `{"account"}`
fn as_address(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => map
            .get("address")
            .or_else(|| map.get("account"))
            .and_then(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Object(_) => as_address(v),
                _ => None,
            }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tonapi_action_shape() {
        let event = FeedEvent::new(json!({
            "event_id": "abc",
            "timestamp": 1_700_000_000,
            "actions": [{
                "type": "TonTransfer",
                "status": "ok",
                "TonTransfer": {
                    "sender": {"address": "0:sender"},
                    "recipient": {"address": "0:wallet"},
                    "amount": 100_000_000,
                    "comment": "A1B2C3"
                }
            }]
        }));

        assert!(event.mentions("A1B2C3"));
        assert!(!event.mentions("FFFFFF"));
        assert_eq!(event.amount_for("A1B2C3"), 100_000_000);
        assert_eq!(event.sender_for("A1B2C3").as_deref(), Some("0:sender"));
        assert_eq!(event.tx_hash().as_deref(), Some("abc"));
        assert_eq!(event.timestamp(), Some(1_700_000_000));
    }

    #[test]
    fn test_message_shape() {
        let event = FeedEvent::new(json!({
            "hash": "h1",
            "utime": "1700000000",
            "in_messages": [{
                "source": "EQsource",
                "value": "250000000",
                "message": "pay ABC123"
            }]
        }));

        assert!(event.mentions("ABC123"));
        assert_eq!(event.amount_for("ABC123"), 250_000_000);
        assert_eq!(event.sender_for("ABC123").as_deref(), Some("EQsource"));
        assert_eq!(event.tx_hash().as_deref(), Some("h1"));
        assert_eq!(event.timestamp(), Some(1_700_000_000));
    }

    #[test]
    fn test_messages_used_when_no_inbound() {
        let event = FeedEvent::new(json!({
            "transaction_id": "t1",
            "in_messages": [],
            "messages": [{
                "from": {"account": "EQfrom"},
                "value": 7,
                "comment": "XYZ"
            }]
        }));

        assert!(event.mentions("XYZ"));
        assert_eq!(event.amount_for("XYZ"), 7);
        assert_eq!(event.sender_for("XYZ").as_deref(), Some("EQfrom"));
    }

    #[test]
    fn test_raw_fallback() {
        let event = FeedEvent::new(json!({
            "id": 1,
            "payload": {"note": "order C0FFEE", "value": "5000000"}
        }));

        assert!(event.mentions("C0FFEE"));
        assert_eq!(event.amount_for("C0FFEE"), 5_000_000);
        assert!(event.sender_for("C0FFEE").is_none());
        assert!(event.tx_hash().is_none());
    }

    #[test]
    fn test_raw_value_needs_six_digits() {
        let event = FeedEvent::new(json!({"note": "C0FFEE", "value": 12345}));
        assert_eq!(event.amount_for("C0FFEE"), 0);
    }

    #[test]
    fn test_matching_transfer_preferred() {
        let event = FeedEvent::new(json!({
            "actions": [
                {"TonTransfer": {"amount": 1, "comment": "other", "sender": {"address": "a"}}},
                {"TonTransfer": {"amount": 2, "comment": "CODE", "sender": {"address": "b"}}}
            ]
        }));

        assert_eq!(event.amount_for("CODE"), 2);
        assert_eq!(event.sender_for("CODE").as_deref(), Some("b"));
        assert_eq!(event.amount_for("NONE"), 1);
    }

    #[test]
    fn test_missing_timestamp() {
        assert_eq!(FeedEvent::new(json!({})).timestamp(), None);
        assert_eq!(FeedEvent::new(json!({"timestamp": 0})).timestamp(), None);
        assert_eq!(FeedEvent::new(json!({"timestamp": "soon"})).timestamp(), None);
    }

    #[test]
    fn test_first_set_timestamp_key_wins() {
        // An unparsable value makes the event untimed; later keys are ignored
        let event = FeedEvent::new(json!({"timestamp": "soon", "utime": 100}));
        assert_eq!(event.timestamp(), None);

        let event = FeedEvent::new(json!({"timestamp": 0, "utime": 100}));
        assert_eq!(event.timestamp(), Some(100));

        let event = FeedEvent::new(json!({"timestamp": null, "utime": "", "created_at": "250"}));
        assert_eq!(event.timestamp(), Some(250));
    }

    #[test]
    fn test_empty_code_never_matches() {
        let event = FeedEvent::new(json!({"comment": ""}));
        assert!(!event.mentions(""));
    }
}
