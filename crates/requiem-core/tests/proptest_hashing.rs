// crates/requiem-core/tests/proptest_hashing.rs
// ============================================================================
// Module: Digest Determinism Property Tests
// Description: Property tests backing Testable Property 1 (digest
//              determinism) and the key-order invariance canonicalization
//              relies on.
// Purpose: Detect any input shape under which hashing becomes unstable.
// ============================================================================

//! Property-based tests for canonical-JSON digest determinism.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "test assertions favor directness over propagation"
)]

use proptest::prelude::*;
use requiem_core::hashing::hash_canonical;
use requiem_core::hashing::hash_short;
use serde_json::Value;

fn json_value_strategy(max_depth: u32) -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|v| Value::Number(v.into())),
        "[a-zA-Z0-9 ]{0,32}".prop_map(Value::String),
    ];

    leaf.prop_recursive(max_depth, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(|map| {
                let mut object = serde_json::Map::new();
                for (key, value) in map {
                    object.insert(key, value);
                }
                Value::Object(object)
            }),
        ]
    })
}

proptest! {
    #[test]
    fn digest_is_stable_across_repeated_calls(value in json_value_strategy(3)) {
        let first = hash_canonical(&value).expect("canonical hash");
        for _ in 0..10 {
            let next = hash_canonical(&value).expect("canonical hash");
            prop_assert_eq!(&first, &next);
        }
        prop_assert_eq!(first.len(), 64);
    }

    #[test]
    fn object_key_order_never_affects_the_digest(entries in prop::collection::vec(("[a-z]{1,6}", any::<i64>()), 1..8)) {
        let mut forward = serde_json::Map::new();
        for (key, value) in &entries {
            forward.insert(key.clone(), Value::Number((*value).into()));
        }
        let mut reversed = serde_json::Map::new();
        for (key, value) in entries.iter().rev() {
            reversed.insert(key.clone(), Value::Number((*value).into()));
        }
        let forward_hash = hash_canonical(&Value::Object(forward)).expect("hash forward");
        let reversed_hash = hash_canonical(&Value::Object(reversed)).expect("hash reversed");
        prop_assert_eq!(forward_hash, reversed_hash);
    }

    #[test]
    fn hash_short_is_always_a_length_bounded_prefix(value in json_value_strategy(2)) {
        let digest = hash_canonical(&value).expect("canonical hash");
        let short = hash_short(&digest);
        prop_assert!(digest.starts_with(short));
        prop_assert!(short.len() <= 16);
    }

    #[test]
    fn any_structural_perturbation_changes_the_digest(
        entries in prop::collection::vec(("[a-z]{1,6}", any::<i64>()), 1..8),
        extra_key in "[a-z]{1,6}",
        extra_value in any::<i64>(),
    ) {
        let mut object = serde_json::Map::new();
        for (key, value) in &entries {
            object.insert(key.clone(), Value::Number((*value).into()));
        }
        let before = hash_canonical(&Value::Object(object.clone())).expect("hash before");
        object.insert(extra_key, Value::Number(extra_value.into()));
        let after = hash_canonical(&Value::Object(object)).expect("hash after");
        prop_assert_ne!(before, after);
    }
}
