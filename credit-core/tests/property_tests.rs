//! Property-based tests for credit core invariants
//!
//! - Referral codes round-trip and stay inside their alphabet
//! - Concurrent balance adjustments never lose an update
//! - The first referral of a referee is the one that sticks

use credit_core::{
    refcode, BalanceLedger, MemoryStore, ReferralGraph, Store, UserId,
};
use proptest::prelude::*;
use std::sync::Arc;

/// Strategy for valid user ids
fn user_id_strategy() -> impl Strategy<Value = i64> {
    prop_oneof![1i64..1_000, 1i64..i64::MAX]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: decode(encode(id)) == id
    #[test]
    fn prop_refcode_roundtrip(id in user_id_strategy()) {
        let code = refcode::encode(UserId::new(id));
        prop_assert_eq!(refcode::decode(&code), Some(UserId::new(id)));
        prop_assert_eq!(refcode::decode(&code.to_lowercase()), Some(UserId::new(id)));
    }

    /// Property: codes start with the marker and use only the alphabet
    #[test]
    fn prop_refcode_alphabet(id in any::<i64>()) {
        let code = refcode::encode(UserId::new(id));
        prop_assert!(code.starts_with(refcode::MARKER));
        prop_assert!(code.len() > 1);
        prop_assert!(code[1..].bytes().all(|b| refcode::ALPHABET.contains(&b)));
    }

    /// Property: decode never panics and never yields a non-positive id
    #[test]
    fn prop_refcode_decode_total(input in "\\PC{0,16}") {
        if let Some(id) = refcode::decode(&input) {
            prop_assert!(id.get() > 0);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: final balance equals the sum of all deltas, whatever the interleaving
    #[test]
    fn prop_concurrent_adjustments_sum(deltas in prop::collection::vec(-1_000i64..1_000, 1..64)) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .build()
            .unwrap();

        let expected: i64 = deltas.iter().sum();
        let balance = rt.block_on(async {
            let ledger = BalanceLedger::new(Arc::new(MemoryStore::new()));
            let user = UserId::new(1);

            let handles: Vec<_> = deltas
                .into_iter()
                .map(|delta| {
                    let ledger = ledger.clone();
                    tokio::spawn(async move { ledger.adjust_balance(user, delta).await.unwrap() })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap();
            }

            ledger.get_balance(user).await.unwrap()
        });

        prop_assert_eq!(balance, expected);
    }

    /// Property: whatever referrers come later, the first one stays
    #[test]
    fn prop_first_referral_wins(referrers in prop::collection::vec(2i64..100, 1..10)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
            let graph = ReferralGraph::new(store);
            let referee = UserId::new(1);

            for referrer in &referrers {
                graph.link_referral(UserId::new(*referrer), referee).await.unwrap();
            }

            let referral = graph.get_referral(referee).await.unwrap().unwrap();
            assert_eq!(referral.referrer_id, UserId::new(referrers[0]));
        });
    }
}
