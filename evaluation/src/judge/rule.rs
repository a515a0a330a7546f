//! Exact and keyword match judge.

use super::{JudgeRequest, Score};
use crate::text;

/// Partial keyword matches earn half credit per matched keyword.
const PARTIAL_CREDIT: f64 = 0.5;

/// Scores by exact match, then by the expected keywords present.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleJudge;

impl RuleJudge {
    /// Score one answer.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn score(&self, request: &JudgeRequest<'_>) -> Score {
        let produced = text::normalize(request.produced);
        if produced.is_empty() {
            return Score::new(0.0, "empty output");
        }

        if request.expects_abstention() {
            return if text::abstains(request.produced) {
                Score::new(1.0, "abstained as expected")
            } else {
                Score::new(0.0, "expected an abstention but the answer asserts a result")
            };
        }

        let expected = text::tokens(request.expected);
        if produced == expected.join(" ") {
            return Score::new(1.0, "exact match");
        }
        if expected.is_empty() {
            return Score::new(0.0, "no expected keywords");
        }

        let produced_tokens = text::tokens(request.produced);
        let matched = expected
            .iter()
            .filter(|keyword| produced_tokens.contains(keyword))
            .count();

        if matched == expected.len() {
            Score::new(1.0, "all expected keywords present")
        } else {
            let fraction = matched as f64 / expected.len() as f64;
            Score::new(
                fraction * PARTIAL_CREDIT,
                format!("{matched}/{} expected keywords present", expected.len()),
            )
        }
    }
}
