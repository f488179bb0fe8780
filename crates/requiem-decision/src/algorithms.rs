// crates/requiem-decision/src/algorithms.rs
// ============================================================================
// Module: Ranking Algorithms
// Description: The nine scoring functions spec §4.8 names, plus the stable
//              ranking they're ordered by.
// Purpose: Give a validated outcome matrix a per-action score and a total
//          order, with identical input always yielding identical output.
// Dependencies: crate::request::{Algorithm, DecisionRequest}
// ============================================================================

//! ## Overview
//! Every function here is a pure, total function of its inputs: no clock,
//! no RNG, no hidden state. `rank` breaks ties using `Vec::sort_by`'s
//! stability, which preserves each action's original input-array position
//! whenever two scores compare equal — this is the same mechanism spec
//! §4.8's "ties broken by stable order of actions" calls for, not a
//! separate tie-break pass.

use crate::request::Algorithm;
use crate::request::DecisionRequest;

/// Default softmax temperature.
const DEFAULT_TEMPERATURE: f64 = 1.0;
/// Default Hurwicz optimism coefficient.
const DEFAULT_OPTIMISM: f64 = 0.5;
/// Default epsilon-contamination mixing coefficient.
const DEFAULT_EPSILON: f64 = 0.1;

/// Per-action scores plus whether a higher score ranks better.
pub struct Scored {
    /// One score per action, in `actions` order.
    pub scores: Vec<f64>,
    /// `true` when the best action has the highest score (most algorithms);
    /// `false` for `minimax_regret`, where lower regret is better.
    pub higher_is_better: bool,
}

/// Computes scores for `request` under its selected algorithm, given the
/// already-resolved per-state `weights` (see
/// [`crate::request::DecisionRequest::validate`]).
#[must_use]
pub fn score(request: &DecisionRequest, weights: &[f64]) -> Scored {
    match request.algorithm {
        Algorithm::MinimaxRegret => {
            Scored { scores: minimax_regret_scores(&request.outcomes), higher_is_better: false }
        }
        Algorithm::Maximin => Scored { scores: maximin_scores(&request.outcomes), higher_is_better: true },
        Algorithm::WeightedSum => {
            Scored { scores: weighted_sum_scores(&request.outcomes, weights), higher_is_better: true }
        }
        Algorithm::Softmax => {
            let temperature = request.temperature.unwrap_or(DEFAULT_TEMPERATURE);
            Scored { scores: softmax_scores(&request.outcomes, temperature), higher_is_better: true }
        }
        Algorithm::Hurwicz => {
            let optimism = request.optimism.unwrap_or(DEFAULT_OPTIMISM);
            Scored { scores: hurwicz_scores(&request.outcomes, optimism), higher_is_better: true }
        }
        Algorithm::HodgesLehmann => {
            Scored { scores: hodges_lehmann_scores(&request.outcomes), higher_is_better: true }
        }
        Algorithm::Pareto => Scored { scores: pareto_scores(&request.outcomes), higher_is_better: true },
        Algorithm::EpsilonContamination => {
            let epsilon = request.epsilon.unwrap_or(DEFAULT_EPSILON);
            Scored { scores: epsilon_contamination_scores(&request.outcomes, epsilon), higher_is_better: true }
        }
        Algorithm::Topsis => Scored { scores: topsis_scores(&request.outcomes), higher_is_better: true },
    }
}

/// `best[s] = max over a of outcomes[a][s]`.
fn best_per_state(outcomes: &[Vec<f64>]) -> Vec<f64> {
    let state_count = outcomes[0].len();
    (0..state_count)
        .map(|s| outcomes.iter().map(|row| row[s]).fold(f64::NEG_INFINITY, f64::max))
        .collect()
}

/// `worst[s] = min over a of outcomes[a][s]`.
fn worst_per_state(outcomes: &[Vec<f64>]) -> Vec<f64> {
    let state_count = outcomes[0].len();
    (0..state_count)
        .map(|s| outcomes.iter().map(|row| row[s]).fold(f64::INFINITY, f64::min))
        .collect()
}

/// `regret[a][s] = best[s] - outcomes[a][s]`; `score[a] = max over s`.
fn minimax_regret_scores(outcomes: &[Vec<f64>]) -> Vec<f64> {
    let best = best_per_state(outcomes);
    outcomes
        .iter()
        .map(|row| row.iter().zip(&best).map(|(value, best)| best - value).fold(f64::NEG_INFINITY, f64::max))
        .collect()
}

/// `score[a] = min over s of outcomes[a][s]`.
fn maximin_scores(outcomes: &[Vec<f64>]) -> Vec<f64> {
    outcomes.iter().map(|row| row.iter().copied().fold(f64::INFINITY, f64::min)).collect()
}

/// `score[a] = max over s of outcomes[a][s]`.
fn maximax_scores(outcomes: &[Vec<f64>]) -> Vec<f64> {
    outcomes.iter().map(|row| row.iter().copied().fold(f64::NEG_INFINITY, f64::max)).collect()
}

/// `score[a] = sum_s outcomes[a][s] * weights[s]`.
fn weighted_sum_scores(outcomes: &[Vec<f64>], weights: &[f64]) -> Vec<f64> {
    outcomes.iter().map(|row| row.iter().zip(weights).map(|(value, weight)| value * weight).sum()).collect()
}

/// Uniform-weight average, independent of any request-supplied weights —
/// this is the "Laplace" criterion the spec reuses inside
/// `hodges_lehmann` and `epsilon_contamination`.
fn laplace_scores(outcomes: &[Vec<f64>]) -> Vec<f64> {
    #[allow(
        clippy::cast_precision_loss,
        reason = "state counts are small (dozens at most); no meaningful precision loss"
    )]
    let state_count = outcomes[0].len() as f64;
    outcomes.iter().map(|row| row.iter().sum::<f64>() / state_count).collect()
}

/// `score[a] = exp(avg[a] / tau) / sum(exp(avg / tau))`, where `avg` is the
/// Laplace (uniform) mean.
fn softmax_scores(outcomes: &[Vec<f64>], temperature: f64) -> Vec<f64> {
    let averages = laplace_scores(outcomes);
    let exponentials: Vec<f64> = averages.iter().map(|avg| (avg / temperature).exp()).collect();
    let total: f64 = exponentials.iter().sum();
    exponentials.iter().map(|value| value / total).collect()
}

/// `score[a] = optimism * max[a] + (1 - optimism) * min[a]`.
fn hurwicz_scores(outcomes: &[Vec<f64>], optimism: f64) -> Vec<f64> {
    let best = maximax_scores(outcomes);
    let worst = maximin_scores(outcomes);
    best.iter().zip(&worst).map(|(max, min)| optimism * max + (1.0 - optimism) * min).collect()
}

/// `score[a] = laplace[a] - minimax_regret[a]`.
fn hodges_lehmann_scores(outcomes: &[Vec<f64>]) -> Vec<f64> {
    let laplace = laplace_scores(outcomes);
    let regret = minimax_regret_scores(outcomes);
    laplace.iter().zip(&regret).map(|(l, r)| l - r).collect()
}

/// `score[a]` = count of states where `a` is weakly dominant (its outcome
/// is `>=` every other action's outcome at that state).
fn pareto_scores(outcomes: &[Vec<f64>]) -> Vec<f64> {
    let state_count = outcomes[0].len();
    outcomes
        .iter()
        .map(|row| {
            #[allow(
                clippy::cast_precision_loss,
                reason = "dominance counts are bounded by state_count, a small integer"
            )]
            let count = (0..state_count)
                .filter(|&s| outcomes.iter().all(|other| row[s] >= other[s]))
                .count() as f64;
            count
        })
        .collect()
}

/// `score[a] = (1 - epsilon) * laplace[a] + epsilon * maximin[a]`.
fn epsilon_contamination_scores(outcomes: &[Vec<f64>], epsilon: f64) -> Vec<f64> {
    let laplace = laplace_scores(outcomes);
    let maximin = maximin_scores(outcomes);
    laplace.iter().zip(&maximin).map(|(l, m)| (1.0 - epsilon) * l + epsilon * m).collect()
}

/// Euclidean norm of column `s` across all actions.
fn column_norm(outcomes: &[Vec<f64>], state_index: usize) -> f64 {
    outcomes.iter().map(|row| row[state_index].powi(2)).sum::<f64>().sqrt()
}

/// Normalizes each column by its Euclidean norm, then scores each action by
/// its relative closeness to the per-state ideal point.
fn topsis_scores(outcomes: &[Vec<f64>]) -> Vec<f64> {
    let state_count = outcomes[0].len();
    let norms: Vec<f64> = (0..state_count).map(|s| column_norm(outcomes, s)).collect();
    let normalized: Vec<Vec<f64>> = outcomes
        .iter()
        .map(|row| {
            row.iter()
                .zip(&norms)
                .map(|(value, norm)| if *norm == 0.0 { 0.0 } else { value / norm })
                .collect()
        })
        .collect();
    let ideal = best_per_state(&normalized);
    let anti_ideal = worst_per_state(&normalized);

    normalized
        .iter()
        .map(|row| {
            let distance_ideal = euclidean_distance(row, &ideal);
            let distance_anti = euclidean_distance(row, &anti_ideal);
            let denominator = distance_ideal + distance_anti;
            if denominator == 0.0 { 0.0 } else { distance_anti / denominator }
        })
        .collect()
}

/// Straight-line distance between two equal-length vectors.
fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

/// Ranks action indices best-first, using `Vec::sort_by`'s stability to
/// break ties by original input order.
#[must_use]
pub fn rank_indices(scored: &Scored) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..scored.scores.len()).collect();
    indices.sort_by(|&left, &right| {
        let ordering = scored.scores[left]
            .partial_cmp(&scored.scores[right])
            .unwrap_or(std::cmp::Ordering::Equal);
        if scored.higher_is_better { ordering.reverse() } else { ordering }
    });
    indices
}

#[cfg(test)]
mod tests {
    use super::hurwicz_scores;
    use super::maximin_scores;
    use super::minimax_regret_scores;
    use super::pareto_scores;
    use super::rank_indices;
    use super::topsis_scores;
    use super::weighted_sum_scores;
    use super::Scored;

    fn matrix() -> Vec<Vec<f64>> {
        vec![vec![10.0, 2.0], vec![4.0, 8.0], vec![6.0, 6.0]]
    }

    #[test]
    fn maximin_picks_worst_case_per_action() {
        let scores = maximin_scores(&matrix());
        assert_eq!(scores, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn minimax_regret_scores_best_action_has_zero_regret_somewhere() {
        let scores = minimax_regret_scores(&matrix());
        assert_eq!(scores, vec![6.0, 6.0, 4.0]);
    }

    #[test]
    fn weighted_sum_matches_hand_computed_value() {
        let scores = weighted_sum_scores(&matrix(), &[0.5, 0.5]);
        assert_eq!(scores, vec![6.0, 6.0, 6.0]);
    }

    #[test]
    fn hurwicz_blends_best_and_worst() {
        let scores = hurwicz_scores(&matrix(), 1.0);
        assert_eq!(scores, vec![10.0, 8.0, 6.0]);
        let scores = hurwicz_scores(&matrix(), 0.0);
        assert_eq!(scores, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn pareto_counts_weakly_dominant_states() {
        let scores = pareto_scores(&matrix());
        assert_eq!(scores, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn topsis_scores_are_between_zero_and_one() {
        let scores = topsis_scores(&matrix());
        for score in scores {
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn rank_indices_breaks_ties_by_original_order() {
        let scored = Scored { scores: vec![1.0, 1.0, 2.0], higher_is_better: true };
        assert_eq!(rank_indices(&scored), vec![2, 0, 1]);
    }

    #[test]
    fn rank_indices_respects_ascending_direction() {
        let scored = Scored { scores: vec![3.0, 1.0, 2.0], higher_is_better: false };
        assert_eq!(rank_indices(&scored), vec![1, 2, 0]);
    }
}
