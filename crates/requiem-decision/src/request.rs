// crates/requiem-decision/src/request.rs
// ============================================================================
// Module: Decision Request
// Description: Input shape and validation for the decision evaluator.
// Purpose: Reject malformed requests before any algorithm runs a single
//          floating-point operation.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`DecisionRequest`] is an outcome matrix (`actions` rows by `states`
//! columns) plus an [`Algorithm`] selector and algorithm-specific tuning
//! knobs. [`DecisionRequest::validate`] is the only gate between untrusted
//! input and the scoring functions in [`crate::algorithms`] — every
//! non-finite value, shape mismatch, or out-of-range weight is rejected
//! here, never discovered mid-computation.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// The nine supported ranking algorithms (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Minimizes the worst-case regret against the best achievable outcome
    /// per state.
    MinimaxRegret,
    /// Wald's maximin: maximizes the worst-case outcome.
    Maximin,
    /// Weighted expectation over states; uniform weights is the Laplace
    /// criterion.
    WeightedSum,
    /// Temperature-scaled softmax over each action's average outcome.
    Softmax,
    /// Hurwicz optimism-weighted blend of best and worst case.
    Hurwicz,
    /// Laplace score minus minimax regret.
    HodgesLehmann,
    /// Count of states in which an action weakly dominates every other.
    Pareto,
    /// Epsilon-weighted blend of Laplace and maximin.
    EpsilonContamination,
    /// Closeness to the per-state ideal point, normalized by Euclidean norm.
    Topsis,
}

/// Input to a decision evaluation.
///
/// # Invariants
/// - `outcomes.len() == actions.len()`, and every row's length equals
///   `states.len()`; enforced by [`Self::validate`], never assumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// Candidate actions, in the stable order ties are broken by.
    pub actions: Vec<String>,
    /// States of the world the outcome matrix is indexed by.
    pub states: Vec<String>,
    /// `outcomes[action_index][state_index]`, a finite real per cell.
    pub outcomes: Vec<Vec<f64>>,
    /// The algorithm to score with.
    pub algorithm: Algorithm,
    /// Per-state weights for [`Algorithm::WeightedSum`]; renormalized
    /// unless `strict` is set.
    pub weights: Option<Vec<f64>>,
    /// When true, `weights` must already sum to 1.0 (tolerance `1e-9`) with
    /// every entry in `[0, 1]`, or validation fails instead of renormalizing.
    pub strict: bool,
    /// Softmax temperature; defaults to `1.0`.
    pub temperature: Option<f64>,
    /// Hurwicz optimism coefficient; defaults to `0.5`.
    pub optimism: Option<f64>,
    /// Epsilon-contamination mixing coefficient; defaults to `0.1`.
    pub epsilon: Option<f64>,
}

/// Tolerance for the `strict`-mode weight-sum check.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Rejections raised while validating a [`DecisionRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionError {
    /// `actions` was empty.
    EmptyActions,
    /// `states` was empty.
    EmptyStates,
    /// `outcomes` did not have one row per action.
    RowCountMismatch {
        /// Number of actions.
        expected: usize,
        /// Number of outcome rows actually present.
        actual: usize,
    },
    /// A row of `outcomes` did not have one column per state.
    ColumnCountMismatch {
        /// Index of the offending row.
        action_index: usize,
        /// Number of states.
        expected: usize,
        /// Number of columns actually present.
        actual: usize,
    },
    /// An outcome cell was `NaN` or infinite.
    NonFiniteOutcome {
        /// Row index of the offending cell.
        action_index: usize,
        /// Column index of the offending cell.
        state_index: usize,
    },
    /// `weights` was present but not one entry per state.
    WeightCountMismatch {
        /// Number of states.
        expected: usize,
        /// Number of weights actually present.
        actual: usize,
    },
    /// `strict` mode requires every weight in `[0, 1]`.
    WeightOutOfRange {
        /// Index of the offending weight.
        index: usize,
        /// The offending value.
        value: f64,
    },
    /// `strict` mode requires weights to sum to `1.0` within tolerance.
    WeightSumNotOne {
        /// The actual sum observed.
        sum: f64,
    },
}

impl fmt::Display for DecisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyActions => write!(f, "actions must not be empty"),
            Self::EmptyStates => write!(f, "states must not be empty"),
            Self::RowCountMismatch { expected, actual } => {
                write!(f, "outcomes has {actual} rows, expected {expected} (one per action)")
            }
            Self::ColumnCountMismatch { action_index, expected, actual } => write!(
                f,
                "outcomes row {action_index} has {actual} columns, expected {expected} (one per state)"
            ),
            Self::NonFiniteOutcome { action_index, state_index } => {
                write!(f, "outcomes[{action_index}][{state_index}] is not a finite real")
            }
            Self::WeightCountMismatch { expected, actual } => {
                write!(f, "weights has {actual} entries, expected {expected} (one per state)")
            }
            Self::WeightOutOfRange { index, value } => {
                write!(f, "weights[{index}] = {value} is outside the required [0, 1] range")
            }
            Self::WeightSumNotOne { sum } => {
                write!(f, "weights sum to {sum}, which is not 1.0 within tolerance")
            }
        }
    }
}

impl std::error::Error for DecisionError {}

impl DecisionRequest {
    /// Validates shape and finiteness, returning effective per-state
    /// weights (renormalized in non-strict mode, uniform when absent).
    ///
    /// # Errors
    ///
    /// Returns the first [`DecisionError`] encountered; see the variant
    /// list for every rejection rule.
    pub fn validate(&self) -> Result<Vec<f64>, DecisionError> {
        if self.actions.is_empty() {
            return Err(DecisionError::EmptyActions);
        }
        if self.states.is_empty() {
            return Err(DecisionError::EmptyStates);
        }
        if self.outcomes.len() != self.actions.len() {
            return Err(DecisionError::RowCountMismatch {
                expected: self.actions.len(),
                actual: self.outcomes.len(),
            });
        }
        for (action_index, row) in self.outcomes.iter().enumerate() {
            if row.len() != self.states.len() {
                return Err(DecisionError::ColumnCountMismatch {
                    action_index,
                    expected: self.states.len(),
                    actual: row.len(),
                });
            }
            for (state_index, value) in row.iter().enumerate() {
                if !value.is_finite() {
                    return Err(DecisionError::NonFiniteOutcome { action_index, state_index });
                }
            }
        }
        self.effective_weights()
    }

    /// Resolves the per-state weight vector `weighted_sum` should use.
    fn effective_weights(&self) -> Result<Vec<f64>, DecisionError> {
        let state_count = self.states.len();
        let Some(weights) = &self.weights else {
            return Ok(uniform_weights(state_count));
        };
        if weights.len() != state_count {
            return Err(DecisionError::WeightCountMismatch { expected: state_count, actual: weights.len() });
        }
        if self.strict {
            for (index, value) in weights.iter().enumerate() {
                if !(0.0..=1.0).contains(value) {
                    return Err(DecisionError::WeightOutOfRange { index, value: *value });
                }
            }
            let sum: f64 = weights.iter().sum();
            if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                return Err(DecisionError::WeightSumNotOne { sum });
            }
            return Ok(weights.clone());
        }
        let sum: f64 = weights.iter().sum();
        if sum.abs() < f64::EPSILON {
            return Ok(uniform_weights(state_count));
        }
        Ok(weights.iter().map(|w| w / sum).collect())
    }
}

/// Returns `1 / n` repeated `n` times.
fn uniform_weights(state_count: usize) -> Vec<f64> {
    #[allow(
        clippy::cast_precision_loss,
        reason = "state counts are small (dozens at most); no meaningful precision loss"
    )]
    let share = 1.0 / state_count as f64;
    vec![share; state_count]
}

#[cfg(test)]
mod tests {
    use super::Algorithm;
    use super::DecisionError;
    use super::DecisionRequest;

    fn request(outcomes: Vec<Vec<f64>>) -> DecisionRequest {
        DecisionRequest {
            actions: vec!["a".to_string(), "b".to_string()],
            states: vec!["s1".to_string(), "s2".to_string()],
            outcomes,
            algorithm: Algorithm::Maximin,
            weights: None,
            strict: false,
            temperature: None,
            optimism: None,
            epsilon: None,
        }
    }

    #[test]
    fn missing_weights_default_to_uniform() {
        let req = request(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let weights = req.validate().expect("valid");
        assert_eq!(weights, vec![0.5, 0.5]);
    }

    #[test]
    fn non_finite_outcome_is_rejected() {
        let req = request(vec![vec![1.0, f64::NAN], vec![3.0, 4.0]]);
        let err = req.validate().expect_err("should reject NaN");
        assert_eq!(err, DecisionError::NonFiniteOutcome { action_index: 0, state_index: 1 });
    }

    #[test]
    fn row_count_mismatch_is_rejected() {
        let req = request(vec![vec![1.0, 2.0]]);
        let err = req.validate().expect_err("should reject");
        assert_eq!(err, DecisionError::RowCountMismatch { expected: 2, actual: 1 });
    }

    #[test]
    fn strict_mode_rejects_weights_not_summing_to_one() {
        let mut req = request(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        req.strict = true;
        req.weights = Some(vec![0.3, 0.3]);
        let err = req.validate().expect_err("should reject");
        assert!(matches!(err, DecisionError::WeightSumNotOne { .. }));
    }

    #[test]
    fn non_strict_mode_renormalizes_weights() {
        let mut req = request(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        req.weights = Some(vec![1.0, 3.0]);
        let weights = req.validate().expect("valid");
        assert_eq!(weights, vec![0.25, 0.75]);
    }

    #[test]
    fn zero_sum_weights_fall_back_to_uniform() {
        let mut req = request(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        req.weights = Some(vec![0.0, 0.0]);
        let weights = req.validate().expect("valid");
        assert_eq!(weights, vec![0.5, 0.5]);
    }
}
