//! Weighted aggregation of independent judge votes.

use crate::judge::{Judge, JudgeError, JudgeRequest};
use flowforge_core::config::{EvaluationConfig, JudgeWeights};
use flowforge_core::error::{ConfigurationError, JudgeUnavailable};
use flowforge_core::execution::JudgeVote;
use flowforge_runtime::metrics::JudgeMetrics;
use futures::future::join_all;
use std::time::Duration;

/// Standard deviation at which agreement reaches zero. Scores live in
/// `[0, 1]`, so 0.5 is the largest possible spread.
const MAX_SPREAD: f64 = 0.5;

/// Aggregate of the successful votes for one answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    /// Weighted mean score
    pub score: f64,
    /// `1 - weighted_std / 0.5`, clamped to `[0, 1]`; 1 for a single vote
    pub agreement: f64,
    /// `0.5 * score + 0.5 * agreement`
    pub confidence: f64,
}

/// Combine votes with per-judge weights.
///
/// Returns `None` when there is no vote with positive weight.
#[must_use]
pub fn aggregate_votes(votes: &[JudgeVote], weights: &JudgeWeights) -> Option<Aggregate> {
    let total: f64 = votes.iter().map(|v| weights.weight(v.judge)).sum();
    if votes.is_empty() || total <= 0.0 || !total.is_finite() {
        return None;
    }

    let score = votes
        .iter()
        .map(|v| weights.weight(v.judge) * v.score)
        .sum::<f64>()
        / total;

    let agreement = if votes.len() == 1 {
        1.0
    } else {
        let variance = votes
            .iter()
            .map(|v| weights.weight(v.judge) * (v.score - score).powi(2))
            .sum::<f64>()
            / total;
        (1.0 - variance.sqrt() / MAX_SPREAD).clamp(0.0, 1.0)
    };

    Some(Aggregate {
        score,
        agreement,
        confidence: 0.5 * score + 0.5 * agreement,
    })
}

/// Judged answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// Aggregate over successful votes
    pub aggregate: Aggregate,
    /// `judge: rationale` per successful vote, joined with `; `
    pub rationale: String,
    /// Successful votes, in ensemble order
    pub votes: Vec<JudgeVote>,
}

/// A fixed set of judges with aggregation weights.
#[derive(Debug, Clone)]
pub struct JudgeEnsemble {
    judges: Vec<Judge>,
    weights: JudgeWeights,
    timeout: Duration,
}

impl JudgeEnsemble {
    /// Create an ensemble.
    #[must_use]
    pub const fn new(judges: Vec<Judge>, weights: JudgeWeights, timeout: Duration) -> Self {
        Self {
            judges,
            weights,
            timeout,
        }
    }

    /// Build the configured judges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Invalid`] if a judge cannot be built,
    /// e.g. the rubric judge without an API key.
    pub fn from_config(config: &EvaluationConfig) -> Result<Self, ConfigurationError> {
        let judges = config
            .judges
            .iter()
            .map(|kind| {
                Judge::from_kind(*kind, config)
                    .map_err(|e| ConfigurationError::Invalid(format!("judge {kind}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(judges, config.judge_weights, config.call_timeout()))
    }

    /// Judges in vote order.
    #[must_use]
    pub fn judges(&self) -> &[Judge] {
        &self.judges
    }

    /// Ask every judge concurrently and aggregate the answers.
    ///
    /// A judge that fails or times out is left out of the aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`JudgeUnavailable`] when no judge produced a vote.
    pub async fn judge(&self, request: JudgeRequest<'_>) -> Result<Verdict, JudgeUnavailable> {
        let timeout = self.timeout;
        let results = join_all(self.judges.iter().map(|judge| async move {
            let outcome = tokio::time::timeout(timeout, judge.score(&request))
                .await
                .unwrap_or_else(|_| {
                    Err(JudgeError::Timeout {
                        after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    })
                });
            (judge.kind(), outcome)
        }))
        .await;

        let mut votes = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (kind, outcome) in results {
            match outcome {
                Ok(score) => {
                    JudgeMetrics::record_vote(kind.as_str(), "ok");
                    votes.push(JudgeVote {
                        judge: kind,
                        score: score.value,
                        rationale: score.rationale,
                    });
                }
                Err(err) => {
                    JudgeMetrics::record_vote(kind.as_str(), "error");
                    tracing::warn!(judge = %kind, error = %err, "Judge failed, excluding vote");
                    failures.push(format!("{kind}: {err}"));
                }
            }
        }

        let Some(aggregate) = aggregate_votes(&votes, &self.weights) else {
            return Err(JudgeUnavailable { failures });
        };

        let rationale = votes
            .iter()
            .map(|v| format!("{}: {}", v.judge, v.rationale))
            .collect::<Vec<_>>()
            .join("; ");

        Ok(Verdict {
            aggregate,
            rationale,
            votes,
        })
    }
}
