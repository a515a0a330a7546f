//! Split-scoped evaluation aggregates.

use crate::dataset::Split;
use crate::execution::{CaseExecution, CaseOutcome};
use crate::objective::ObjectiveInputs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Why a low-scoring case failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Answer not grounded in what was executed
    ExecutionGrounding,
    /// Missing or wrong tool
    ToolSelection,
    /// Task was not broken down correctly
    Decomposition,
    /// Verifier disagreed with the answer
    VerifierMismatch,
    /// Nothing more specific matched
    Other,
}

impl FailureCategory {
    /// Stable snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExecutionGrounding => "execution_grounding",
            Self::ToolSelection => "tool_selection",
            Self::Decomposition => "decomposition",
            Self::VerifierMismatch => "verifier_mismatch",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate over the scored executions of one split.
///
/// Invalid cases are counted but never contribute to means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    /// Evaluated blueprint
    pub blueprint_id: String,
    /// Split the cases came from
    pub split: Split,
    /// Cases attempted
    pub case_count: usize,
    /// Cases excluded after retries or judge failure
    pub invalid_count: usize,
    /// `invalid_count / case_count` (0 when no cases)
    pub invalid_fraction: f64,
    /// Invalid fraction exceeded the configured threshold
    pub degraded: bool,
    /// Mean aggregated score
    pub mean_score: f64,
    /// Population standard deviation of scores
    pub score_std: f64,
    /// Mean latency in milliseconds
    pub mean_latency_ms: f64,
    /// Mean token cost
    pub mean_token_cost: f64,
    /// Mean confidence
    pub mean_confidence: f64,
    /// Mean agreement
    pub mean_agreement: f64,
    /// Blueprint complexity
    pub complexity: f64,
    /// `(1 - mean_agreement) + score_std`
    pub uncertainty: f64,
    /// Objective value
    pub objective: f64,
    /// Low-score cases per failure category
    pub failure_histogram: BTreeMap<FailureCategory, usize>,
    /// Reflection text over the lowest-scoring cases
    pub reflection: String,
    /// Per-case outcomes in case order
    pub outcomes: Vec<CaseOutcome>,
}

impl EvaluationSummary {
    /// Number of cases that contributed to the aggregates.
    #[must_use]
    pub const fn valid_count(&self) -> usize {
        self.case_count - self.invalid_count
    }

    /// Whether at least one case was scored.
    #[must_use]
    pub const fn has_valid_cases(&self) -> bool {
        self.valid_count() > 0
    }

    /// Scored executions in case order.
    pub fn executions(&self) -> impl Iterator<Item = &CaseExecution> {
        self.outcomes.iter().filter_map(CaseOutcome::as_scored)
    }

    /// Scored executions below `threshold`.
    pub fn low_score_cases(&self, threshold: f64) -> impl Iterator<Item = &CaseExecution> {
        self.executions().filter(move |exec| exec.score < threshold)
    }

    /// The objective inputs this summary carries.
    #[must_use]
    pub const fn objective_inputs(&self) -> ObjectiveInputs {
        ObjectiveInputs {
            mean_score: self.mean_score,
            score_std: self.score_std,
            mean_confidence: self.mean_confidence,
            mean_agreement: self.mean_agreement,
            mean_latency_ms: self.mean_latency_ms,
            mean_token_cost: self.mean_token_cost,
            complexity: self.complexity,
        }
    }

    /// Most frequent failure category, ties broken by category order.
    #[must_use]
    pub fn dominant_failure(&self) -> Option<FailureCategory> {
        self.failure_histogram
            .iter()
            .filter(|(_, count)| **count > 0)
            .max_by(|(a_cat, a), (b_cat, b)| a.cmp(b).then_with(|| b_cat.cmp(a_cat)))
            .map(|(category, _)| *category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(histogram: BTreeMap<FailureCategory, usize>) -> EvaluationSummary {
        EvaluationSummary {
            blueprint_id: "bp-0000".into(),
            split: Split::Train,
            case_count: 4,
            invalid_count: 1,
            invalid_fraction: 0.25,
            degraded: false,
            mean_score: 0.5,
            score_std: 0.1,
            mean_latency_ms: 100.0,
            mean_token_cost: 0.01,
            mean_confidence: 0.6,
            mean_agreement: 0.7,
            complexity: 0.4,
            uncertainty: 0.4,
            objective: 0.4,
            failure_histogram: histogram,
            reflection: String::new(),
            outcomes: Vec::new(),
        }
    }

    #[test]
    fn test_dominant_failure_prefers_count_then_order() {
        let s = summary(BTreeMap::from([
            (FailureCategory::Decomposition, 2),
            (FailureCategory::ToolSelection, 2),
            (FailureCategory::Other, 1),
        ]));
        assert_eq!(s.dominant_failure(), Some(FailureCategory::ToolSelection));
        assert_eq!(s.valid_count(), 3);
    }

    #[test]
    fn test_dominant_failure_empty() {
        assert_eq!(summary(BTreeMap::new()).dominant_failure(), None);
    }
}
