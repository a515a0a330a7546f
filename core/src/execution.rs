//! Per-case execution records.

use crate::dataset::Split;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the runtime returned for one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeOutput {
    /// Raw answer text
    pub raw_output: String,
    /// Wall-clock latency in milliseconds
    pub latency_ms: f64,
    /// Token cost in currency units
    pub token_cost: f64,
}

/// Judge strategy that produced a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeKind {
    /// Exact / keyword match
    Rule,
    /// Lexical overlap
    Heuristic,
    /// LLM-backed rubric
    LlmRubric,
}

impl JudgeKind {
    /// Stable name used in logs, weights, and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Heuristic => "heuristic",
            Self::LlmRubric => "llm_rubric",
        }
    }
}

impl fmt::Display for JudgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One judge's score for one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeVote {
    /// Judge that voted
    pub judge: JudgeKind,
    /// Score in [0, 1]
    pub score: f64,
    /// Short justification
    pub rationale: String,
}

/// A scored run of one blueprint against one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseExecution {
    /// Case id
    pub case_id: String,
    /// Split of the case
    pub split: Split,
    /// Whether the case is a hard negative
    pub hard_negative: bool,
    /// Question text, kept for reflection
    pub question: String,
    /// Runtime output
    pub output: RuntimeOutput,
    /// Votes from every judge that answered
    pub votes: Vec<JudgeVote>,
    /// Aggregated score
    pub score: f64,
    /// Aggregated confidence
    pub confidence: f64,
    /// Inter-judge agreement
    pub agreement: f64,
    /// Combined rationale
    pub rationale: String,
    /// Runtime attempts made, including the successful one
    pub attempts: u32,
}

/// Result of evaluating one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CaseOutcome {
    /// Runtime and judges succeeded
    Scored(CaseExecution),
    /// Excluded from aggregates
    Invalid {
        /// Case id
        case_id: String,
        /// Split of the case
        split: Split,
        /// Failure kind (`timeout`, `invocation`, `judge_unavailable`, ...)
        reason: String,
        /// Failure detail
        detail: String,
        /// Runtime attempts made
        attempts: u32,
    },
}

impl CaseOutcome {
    /// The execution, if the case was scored.
    #[must_use]
    pub const fn as_scored(&self) -> Option<&CaseExecution> {
        match self {
            Self::Scored(execution) => Some(execution),
            Self::Invalid { .. } => None,
        }
    }

    /// Whether the case was excluded.
    #[must_use]
    pub const fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }
}
