// crates/requiem-decision/tests/determinism.rs
// ============================================================================
// Module: Determinism Property Tests
// Description: Property tests for the evaluator's purity/determinism
//              contract across random outcome matrices and algorithms.
// Purpose: Detect any hidden non-determinism (iteration-order leaks, float
//          formatting drift) across a wide input range.
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "test-only assertions are permitted"
)]

use proptest::prelude::*;
use requiem_decision::Algorithm;
use requiem_decision::DecisionRequest;
use requiem_decision::evaluate;

fn algorithm_strategy() -> impl Strategy<Value = Algorithm> {
    prop_oneof![
        Just(Algorithm::MinimaxRegret),
        Just(Algorithm::Maximin),
        Just(Algorithm::WeightedSum),
        Just(Algorithm::Softmax),
        Just(Algorithm::Hurwicz),
        Just(Algorithm::HodgesLehmann),
        Just(Algorithm::Pareto),
        Just(Algorithm::EpsilonContamination),
        Just(Algorithm::Topsis),
    ]
}

fn outcome_matrix_strategy(actions: usize, states: usize) -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(
        prop::collection::vec(-1000.0..1000.0_f64, states..=states),
        actions..=actions,
    )
}

proptest! {
    #[test]
    fn ten_successive_runs_are_byte_identical(
        outcomes in outcome_matrix_strategy(4, 3),
        algorithm in algorithm_strategy(),
    ) {
        let request = DecisionRequest {
            actions: vec!["a0".to_string(), "a1".to_string(), "a2".to_string(), "a3".to_string()],
            states: vec!["s0".to_string(), "s1".to_string(), "s2".to_string()],
            outcomes,
            algorithm,
            weights: None,
            strict: false,
            temperature: None,
            optimism: None,
            epsilon: None,
        };
        let first = evaluate(&request, 42, 7).expect("first evaluation");
        let first_json = serde_json::to_string(&first).expect("serialize");
        for _ in 0..9 {
            let next = evaluate(&request, 42, 7).expect("repeat evaluation");
            let next_json = serde_json::to_string(&next).expect("serialize");
            prop_assert_eq!(&first_json, &next_json);
        }
        prop_assert_eq!(first.recommended_action, first.ranking[0].clone());
    }

    #[test]
    fn ranking_is_always_a_permutation_of_actions(
        outcomes in outcome_matrix_strategy(3, 2),
        algorithm in algorithm_strategy(),
    ) {
        let actions = vec!["x".to_string(), "y".to_string(), "z".to_string()];
        let request = DecisionRequest {
            actions: actions.clone(),
            states: vec!["s0".to_string(), "s1".to_string()],
            outcomes,
            algorithm,
            weights: None,
            strict: false,
            temperature: None,
            optimism: None,
            epsilon: None,
        };
        let output = evaluate(&request, 0, 0).expect("evaluate");
        let mut ranked = output.ranking.clone();
        ranked.sort();
        let mut expected = actions;
        expected.sort();
        prop_assert_eq!(ranked, expected);
    }
}
