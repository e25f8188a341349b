//! Scenario tests for the reconciliation engine over an in-memory store and a
//! scripted feed

use async_trait::async_trait;
use chrono::{Duration, Utc};
use credit_core::{
    BalanceLedger, Invoice, InvoiceStatus, InvoiceStore, MemoryStore, ReferralGraph, Store,
    UserId,
};
use serde_json::json;
use settlement::{CheckOutcome, Config, Error, Metrics, ReconciliationEngine};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use ton_feed::{EventFeed, FeedConfig, FeedError, FeedEvent, LedgerClient};

const WALLET: &str = "EQservice";
const TENTH_TON: i64 = 100_000_000;

/// Feed returning whatever the test put in, or failing on demand
#[derive(Default)]
struct ScriptedFeed {
    events: Mutex<Vec<FeedEvent>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedFeed {
    fn push_transfer(&self, code: &str, amount: i64, timestamp: i64) {
        let mut events = self.events.lock().unwrap();
        let id = format!("tx-{}", events.len() + 1);
        events.push(FeedEvent::new(json!({
            "event_id": id,
            "timestamp": timestamp,
            "actions": [{
                "type": "TonTransfer",
                "TonTransfer": {
                    "sender": {"address": "EQpayer"},
                    "recipient": {"address": WALLET},
                    "amount": amount,
                    "comment": code
                }
            }]
        })));
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventFeed for ScriptedFeed {
    async fn recent_events(&self, address: &str, _limit: usize) -> ton_feed::Result<Vec<FeedEvent>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(address, WALLET);

        if self.failing.load(Ordering::SeqCst) {
            return Err(FeedError::Status {
                status: 503,
                body: "indexer down".to_string(),
            });
        }
        Ok(self.events.lock().unwrap().clone())
    }
}

struct Harness {
    store: Arc<dyn Store>,
    feed: Arc<ScriptedFeed>,
    engine: Arc<ReconciliationEngine>,
}

impl Harness {
    fn new() -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let feed = Arc::new(ScriptedFeed::default());
        let ledger = LedgerClient::new(feed.clone(), &FeedConfig::default());
        let config = Config {
            wallet_address: WALLET.to_string(),
            ..Config::default()
        };
        let engine = ReconciliationEngine::new(store.clone(), ledger, config, Metrics::new().unwrap());

        Self {
            store,
            feed,
            engine: Arc::new(engine),
        }
    }

    async fn invoice(&self, code: &str, user: i64, amount: i64) -> Invoice {
        InvoiceStore::new(self.store.clone())
            .create_invoice(code, UserId::new(user), amount, Duration::seconds(900))
            .await
            .unwrap()
    }

    async fn balance(&self, user: i64) -> i64 {
        BalanceLedger::new(self.store.clone())
            .get_balance(UserId::new(user))
            .await
            .unwrap()
    }
}

fn now_ts() -> i64 {
    Utc::now().timestamp()
}

#[tokio::test]
async fn test_tenth_ton_grants_ten_credits() {
    let h = Harness::new();
    h.invoice("Z1", 1, TENTH_TON).await;
    h.feed.push_transfer("Z1", TENTH_TON, now_ts());

    let outcome = h.engine.check_and_settle("Z1").await.unwrap();
    let receipt = match outcome {
        CheckOutcome::Settled(receipt) => receipt,
        other => panic!("expected settlement, got {:?}", other),
    };

    assert_eq!(receipt.credits_awarded, 10);
    assert_eq!(receipt.referee_bonus, 0);
    assert!(receipt.referrer.is_none());
    assert_eq!(receipt.new_balance, 10);
    assert_eq!(receipt.tx_hash.as_deref(), Some("tx-1"));
    assert_eq!(receipt.from_address.as_deref(), Some("EQpayer"));
    assert_eq!(h.balance(1).await, 10);

    let invoice = h.store.get_invoice("Z1").await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert_eq!(invoice.tx_hash.as_deref(), Some("tx-1"));
}

#[tokio::test]
async fn test_recheck_returns_recorded_receipt() {
    let h = Harness::new();
    h.invoice("Z2", 1, TENTH_TON).await;
    h.feed.push_transfer("Z2", TENTH_TON, now_ts());

    let first = h.engine.check_and_settle("Z2").await.unwrap();
    let second = h.engine.check_and_settle("Z2").await.unwrap();

    assert!(matches!(first, CheckOutcome::Settled(_)));
    assert!(matches!(second, CheckOutcome::AlreadySettled(_)));
    assert_eq!(first.receipt(), second.receipt());
    assert_eq!(h.balance(1).await, 10);

    // A paid invoice never goes back to the feed
    assert_eq!(h.feed.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checks_credit_once() {
    let h = Harness::new();
    h.invoice("RACE", 1, TENTH_TON).await;
    h.feed.push_transfer("RACE", TENTH_TON, now_ts());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.check_and_settle("RACE").await.unwrap() })
        })
        .collect();

    let mut settled = 0;
    let mut receipts = Vec::new();
    for handle in handles {
        let outcome = handle.await.unwrap();
        if matches!(outcome, CheckOutcome::Settled(_)) {
            settled += 1;
        }
        receipts.push(outcome.receipt().cloned().unwrap());
    }

    assert_eq!(settled, 1);
    assert!(receipts.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(h.balance(1).await, 10);
    assert_eq!(BalanceLedger::new(h.store.clone()).history(UserId::new(1)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_no_payment_yet() {
    let h = Harness::new();
    h.invoice("WAIT", 1, TENTH_TON).await;
    h.feed.push_transfer("OTHER", TENTH_TON, now_ts());

    let outcome = h.engine.check_and_settle("WAIT").await.unwrap();
    assert_eq!(outcome, CheckOutcome::NoPaymentYet);
    assert_eq!(h.balance(1).await, 0);
}

#[tokio::test]
async fn test_underpayment_is_not_settled() {
    let h = Harness::new();
    h.invoice("LOW", 1, TENTH_TON).await;
    h.feed.push_transfer("LOW", TENTH_TON - 1, now_ts());

    let outcome = h.engine.check_and_settle("LOW").await.unwrap();
    assert_eq!(outcome, CheckOutcome::NoPaymentYet);
}

#[tokio::test]
async fn test_overpayment_credits_confirmed_amount() {
    let h = Harness::new();
    h.invoice("HIGH", 1, TENTH_TON).await;
    h.feed.push_transfer("HIGH", 5 * TENTH_TON, now_ts());

    let outcome = h.engine.check_and_settle("HIGH").await.unwrap();
    let receipt = outcome.receipt().unwrap();
    assert_eq!(receipt.amount_nanoton, 5 * TENTH_TON);
    assert_eq!(receipt.credits_awarded, 50);
}

#[tokio::test]
async fn test_expired_invoice_stays_unpaid() {
    let h = Harness::new();
    let created = Utc::now() - Duration::hours(2);
    h.store
        .insert_invoice(Invoice::new("OLD", UserId::new(1), TENTH_TON, created, Duration::seconds(900)))
        .await
        .unwrap();

    // Paid long after expiry and grace
    h.feed.push_transfer("OLD", TENTH_TON, now_ts());

    for _ in 0..3 {
        let outcome = h.engine.check_and_settle("OLD").await.unwrap();
        assert_eq!(outcome, CheckOutcome::NoPaymentYet);
    }

    let invoice = h.store.get_invoice("OLD").await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert_eq!(h.balance(1).await, 0);
}

#[tokio::test]
async fn test_payment_inside_grace_is_accepted() {
    let h = Harness::new();
    let created = Utc::now() - Duration::seconds(1_000);
    h.store
        .insert_invoice(Invoice::new("LATE", UserId::new(1), TENTH_TON, created, Duration::seconds(900)))
        .await
        .unwrap();

    // 30 s after expiry, inside the 60 s grace
    let paid = (created + Duration::seconds(930)).timestamp();
    h.feed.push_transfer("LATE", TENTH_TON, paid);

    let outcome = h.engine.check_and_settle("LATE").await.unwrap();
    assert!(matches!(outcome, CheckOutcome::Settled(_)));
}

#[tokio::test]
async fn test_payment_before_invoice_is_ignored() {
    let h = Harness::new();
    h.invoice("EARLY", 1, TENTH_TON).await;
    h.feed.push_transfer("EARLY", TENTH_TON, now_ts() - 3_600);

    let outcome = h.engine.check_and_settle("EARLY").await.unwrap();
    assert_eq!(outcome, CheckOutcome::NoPaymentYet);
}

#[tokio::test]
async fn test_feed_failure_is_an_error() {
    let h = Harness::new();
    h.invoice("DOWN", 1, TENTH_TON).await;
    h.feed.push_transfer("DOWN", TENTH_TON, now_ts());
    h.feed.set_failing(true);

    let result = h.engine.check_and_settle("DOWN").await;
    assert!(matches!(result, Err(Error::Feed(FeedError::Status { status: 503, .. }))));

    let invoice = h.store.get_invoice("DOWN").await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert_eq!(h.engine.metrics().feed_failures.get(), 1);

    // Recovers on retry
    h.feed.set_failing(false);
    let outcome = h.engine.check_and_settle("DOWN").await.unwrap();
    assert!(matches!(outcome, CheckOutcome::Settled(_)));
}

#[tokio::test]
async fn test_unknown_invoice() {
    let h = Harness::new();

    let result = h.engine.check_and_settle("NOPE").await;
    assert!(matches!(result, Err(Error::InvoiceNotFound(code)) if code == "NOPE"));
    assert_eq!(h.feed.calls(), 0);
}

#[tokio::test]
async fn test_first_topup_pays_referral_bonuses() {
    let h = Harness::new();
    let graph = ReferralGraph::new(h.store.clone());
    assert!(graph.link_referral(UserId::new(1), UserId::new(2)).await.unwrap());

    h.invoice("REF1", 2, TENTH_TON).await;
    h.feed.push_transfer("REF1", TENTH_TON, now_ts());

    let outcome = h.engine.check_and_settle("REF1").await.unwrap();
    let receipt = outcome.receipt().unwrap().clone();
    assert_eq!(receipt.credits_awarded, 10);
    assert_eq!(receipt.referee_bonus, 10);
    assert_eq!(receipt.referrer.map(|r| (r.user_id, r.bonus)), Some((UserId::new(1), 20)));
    assert_eq!(receipt.new_balance, 20);
    assert_eq!(receipt.total_credited(), 20);

    assert_eq!(h.balance(2).await, 20);
    assert_eq!(h.balance(1).await, 20);

    let referral = graph.get_referral(UserId::new(2)).await.unwrap().unwrap();
    assert!(referral.activated);
    assert_eq!(h.engine.metrics().referral_activations.get(), 1);

    // Second top-up: no more bonuses
    h.invoice("REF2", 2, TENTH_TON).await;
    h.feed.push_transfer("REF2", TENTH_TON, now_ts());

    let outcome = h.engine.check_and_settle("REF2").await.unwrap();
    let receipt = outcome.receipt().unwrap();
    assert_eq!(receipt.referee_bonus, 0);
    assert!(receipt.referrer.is_none());
    assert_eq!(h.balance(2).await, 30);
    assert_eq!(h.balance(1).await, 20);
}

#[tokio::test]
async fn test_outcomes_are_counted() {
    let h = Harness::new();
    h.invoice("M1", 1, TENTH_TON).await;

    h.engine.check_and_settle("M1").await.unwrap();
    h.feed.push_transfer("M1", TENTH_TON, now_ts());
    h.engine.check_and_settle("M1").await.unwrap();
    h.engine.check_and_settle("M1").await.unwrap();
    let _ = h.engine.check_and_settle("NOPE").await;

    let checks = &h.engine.metrics().checks_total;
    assert_eq!(checks.with_label_values(&["no_payment_yet"]).get(), 1);
    assert_eq!(checks.with_label_values(&["settled"]).get(), 1);
    assert_eq!(checks.with_label_values(&["already_settled"]).get(), 1);
    assert_eq!(checks.with_label_values(&["not_found"]).get(), 1);
    assert_eq!(h.engine.metrics().credits_awarded.get(), 10);
}
