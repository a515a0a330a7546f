//! Judge strategies.
//!
//! Judges are a closed set of variants dispatched through [`Judge::score`].
//! Each returns its own score in `[0, 1]` with a short rationale; the
//! [`crate::ensemble::JudgeEnsemble`] combines them.

mod heuristic;
mod rubric;
mod rule;

pub use heuristic::HeuristicJudge;
pub use rubric::RubricJudge;
pub use rule::RuleJudge;

use flowforge_core::config::EvaluationConfig;
use flowforge_core::execution::JudgeKind;
use thiserror::Error;

/// Everything a judge sees about one answer.
#[derive(Debug, Clone, Copy)]
pub struct JudgeRequest<'a> {
    /// Case question
    pub question: &'a str,
    /// Expected answer sketch
    pub expected: &'a str,
    /// Runtime output
    pub produced: &'a str,
    /// The case is unanswerable by construction
    pub hard_negative: bool,
}

impl JudgeRequest<'_> {
    /// Whether the correct answer is an abstention.
    #[must_use]
    pub fn expects_abstention(&self) -> bool {
        self.hard_negative || self.expected.trim().eq_ignore_ascii_case("unknown")
    }
}

/// One judge's score and rationale.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    /// Score in `[0, 1]`
    pub value: f64,
    /// Short justification
    pub rationale: String,
}

impl Score {
    /// Create a score, clamped to `[0, 1]`.
    #[must_use]
    pub fn new(value: f64, rationale: impl Into<String>) -> Self {
        Self {
            value: value.clamp(0.0, 1.0),
            rationale: rationale.into(),
        }
    }
}

/// Failure of a single judge. The voter is excluded from aggregation.
#[derive(Debug, Error)]
pub enum JudgeError {
    /// No API key configured for the rubric judge
    #[error("Missing API key for the rubric judge")]
    MissingApiKey,

    /// HTTP request failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Reply could not be parsed into a verdict
    #[error("Response parsing failed: {0}")]
    ResponseParseFailed(String),

    /// Rate limited
    #[error("Rate limited - too many requests")]
    RateLimited,

    /// Invalid API key
    #[error("Unauthorized - invalid API key")]
    Unauthorized,

    /// API returned an error status
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error body
        message: String,
    },

    /// The judge did not answer in time
    #[error("Judge timed out after {after_ms}ms")]
    Timeout {
        /// Timeout that elapsed
        after_ms: u64,
    },
}

/// A judge strategy.
#[derive(Debug, Clone)]
pub enum Judge {
    /// Exact / keyword match
    Rule(RuleJudge),
    /// Lexical overlap
    Heuristic(HeuristicJudge),
    /// LLM-backed rubric
    LlmRubric(RubricJudge),
}

impl Judge {
    /// Build the judge of `kind` from evaluation settings.
    ///
    /// # Errors
    ///
    /// Returns [`JudgeError::MissingApiKey`] for the rubric judge without a key.
    pub fn from_kind(kind: JudgeKind, config: &EvaluationConfig) -> Result<Self, JudgeError> {
        Ok(match kind {
            JudgeKind::Rule => Self::Rule(RuleJudge),
            JudgeKind::Heuristic => Self::Heuristic(HeuristicJudge),
            JudgeKind::LlmRubric => Self::LlmRubric(RubricJudge::from_config(&config.rubric)?),
        })
    }

    /// Which strategy this is.
    #[must_use]
    pub const fn kind(&self) -> JudgeKind {
        match self {
            Self::Rule(_) => JudgeKind::Rule,
            Self::Heuristic(_) => JudgeKind::Heuristic,
            Self::LlmRubric(_) => JudgeKind::LlmRubric,
        }
    }

    /// Score one answer.
    ///
    /// # Errors
    ///
    /// Only the rubric judge fails; see [`RubricJudge::score`].
    pub async fn score(&self, request: &JudgeRequest<'_>) -> Result<Score, JudgeError> {
        match self {
            Self::Rule(judge) => Ok(judge.score(request)),
            Self::Heuristic(judge) => Ok(judge.score(request)),
            Self::LlmRubric(judge) => judge.score(request).await,
        }
    }
}
