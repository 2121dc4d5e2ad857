//! Retrieval and answer-quality metrics.
//!
//! Pure functions used by the evaluation harness:
//!
//! - [`hit_rate`]: 1.0 if any expected source was referenced.
//! - [`first_hit_rank`] / [`reciprocal_rank`]: position of the first
//!   expected source among the distinct sources, in encounter order.
//! - [`combined_score`]: blends retrieval success, judge score, and token cost.
//! - [`summarize`]: dataset-level means plus best combined score.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::models::{EvaluationSummary, QuestionResult};

/// Exponents of the combined score formula.
///
/// ```text
///                  hit_rate^α × judge_score^γ
/// combined = ──────────────────────────────────
///                  (num_tokens / 1000)^β
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            alpha: 2.0,
            beta: 0.5,
            gamma: 1.5,
        }
    }
}

impl ScoreWeights {
    /// All exponents must be finite and positive.
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [("alpha", self.alpha), ("beta", self.beta), ("gamma", self.gamma)] {
            if !v.is_finite() || v <= 0.0 {
                return Err(CoreError::InvalidParameter(format!(
                    "score weight {} must be a positive number, got {}",
                    name, v
                )));
            }
        }
        Ok(())
    }
}

/// 1.0 if any expected source appears among the referenced sources.
pub fn hit_rate(expected: &[String], sources: &[String]) -> f64 {
    if sources.iter().any(|s| expected.contains(s)) {
        1.0
    } else {
        0.0
    }
}

/// 1-based rank of the first expected source within `sources`.
///
/// `sources` must already be the distinct sources in encounter order.
pub fn first_hit_rank(expected: &[String], sources: &[String]) -> Option<usize> {
    sources
        .iter()
        .position(|s| expected.contains(s))
        .map(|p| p + 1)
}

/// `1 / rank` of the first expected source, or 0.0 if none was found.
pub fn reciprocal_rank(expected: &[String], sources: &[String]) -> f64 {
    first_hit_rank(expected, sources)
        .map(|r| 1.0 / r as f64)
        .unwrap_or(0.0)
}

/// Combined score of one question.
///
/// Fails with [`CoreError::DegenerateTokenCount`] when `num_tokens` is 0.
pub fn combined_score(
    hit_rate: f64,
    judge_score: f64,
    num_tokens: u64,
    weights: &ScoreWeights,
) -> Result<f64> {
    if num_tokens == 0 {
        return Err(CoreError::DegenerateTokenCount);
    }
    let numerator = hit_rate.powf(weights.alpha) * judge_score.powf(weights.gamma);
    let denominator = (num_tokens as f64 / 1000.0).powf(weights.beta);
    Ok(numerator / denominator)
}

/// Aggregate per-question rows. Failed rows count as zeros.
pub fn summarize(results: &[QuestionResult]) -> EvaluationSummary {
    if results.is_empty() {
        return EvaluationSummary::default();
    }
    let n = results.len() as f64;
    let mean = |f: fn(&QuestionResult) -> f64| results.iter().map(f).sum::<f64>() / n;
    let total_tokens: u64 = results.iter().map(|r| r.num_tokens).sum();

    EvaluationSummary {
        avg_hit_rate: mean(|r| r.hit_rate),
        avg_mrr: mean(|r| r.mrr),
        avg_judge_score: mean(|r| r.judge_score),
        avg_num_tokens: total_tokens as f64 / n,
        total_tokens,
        avg_combined_score: mean(|r| r.combined_score),
        best_combined_score: results
            .iter()
            .map(|r| r.combined_score)
            .fold(f64::NEG_INFINITY, f64::max),
        failed: results.iter().filter(|r| r.is_failed()).count(),
    }
}
