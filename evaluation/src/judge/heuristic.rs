//! Lexical-overlap judge that needs no external model.

use super::{JudgeRequest, Score};
use crate::text;

const ABSTAIN_SCORE: f64 = 0.9;
const OVERCONFIDENT_SCORE: f64 = 0.1;

/// Scores by the share of expected tokens that appear in the answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicJudge;

impl HeuristicJudge {
    /// Score one answer.
    #[must_use]
    pub fn score(&self, request: &JudgeRequest<'_>) -> Score {
        let produced = text::tokens(request.produced);
        if produced.is_empty() {
            return Score::new(0.0, "empty output");
        }

        if request.expects_abstention() {
            return if text::abstains(request.produced) {
                Score::new(ABSTAIN_SCORE, "declined an unanswerable question")
            } else {
                Score::new(
                    OVERCONFIDENT_SCORE,
                    "answered an unanswerable question; expected abstention",
                )
            };
        }

        let expected = text::tokens(request.expected);
        let overlap = overlap(&expected, &produced);
        Score::new(overlap, format!("token overlap={overlap:.2}"))
    }
}

/// Share of `expected` tokens found in `produced` (0 when nothing is expected).
#[allow(clippy::cast_precision_loss)]
fn overlap(expected: &[String], produced: &[String]) -> f64 {
    if expected.is_empty() {
        return 0.0;
    }
    let hits = expected.iter().filter(|token| produced.contains(token)).count();
    hits as f64 / expected.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_counts_expected_tokens() {
        let req = JudgeRequest {
            question: "q",
            expected: "query: Person OWNS",
            produced: "missing tool for query; best guess about Person",
            hard_negative: false,
        };
        let score = HeuristicJudge.score(&req);
        assert!((score.value - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(score.rationale, "token overlap=0.67");
    }

    #[test]
    fn test_hard_negative_scores() {
        let mut req = JudgeRequest {
            question: "Which Person MENTORS a Loan?",
            expected: "UNKNOWN",
            produced: "UNKNOWN: cannot be inferred",
            hard_negative: true,
        };
        assert!((HeuristicJudge.score(&req).value - ABSTAIN_SCORE).abs() < 1e-9);

        req.produced = "query: Person Loan has 3 matching records";
        assert!((HeuristicJudge.score(&req).value - OVERCONFIDENT_SCORE).abs() < 1e-9);
    }
}
