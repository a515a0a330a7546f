//! Keyword-driven failure taxonomy for low-scoring cases.

use crate::text;
use flowforge_core::execution::CaseExecution;
use flowforge_core::summary::FailureCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const EXECUTION_KEYWORDS: [&str; 8] = [
    "runtime error",
    "timeout",
    "timed out",
    "circuit open",
    "execution error",
    "exception",
    "query failed",
    "syntax error",
];

const TOOL_KEYWORDS: [&str; 8] = [
    "missing tool",
    "wrong tool",
    "tool",
    "action",
    "executor",
    "schemagetter",
    "cypherexecutor",
    "pagerankexecutor",
];

const DECOMPOSITION_KEYWORDS: [&str; 8] = [
    "decompose",
    "decomposition",
    "subtask",
    "multi step",
    "missing step",
    "planning",
    "workflow order",
    "reasoning chain",
];

const VERIFIER_KEYWORDS: [&str; 7] = [
    "verifier",
    "expected",
    "mismatch",
    "not aligned",
    "format",
    "answer differs",
    "incorrect final answer",
];

/// How far below the low-score threshold a case fell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureSeverity {
    /// Gap under 0.2
    Mild,
    /// Gap in [0.2, 0.4)
    Moderate,
    /// Gap of 0.4 or more
    Severe,
}

impl FailureSeverity {
    /// Severity of a score gap.
    #[must_use]
    pub fn from_gap(gap: f64) -> Self {
        let gap = gap.max(0.0) + 1e-9;
        if gap >= 0.4 {
            Self::Severe
        } else if gap >= 0.2 {
            Self::Moderate
        } else {
            Self::Mild
        }
    }

    /// Stable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
        }
    }
}

impl fmt::Display for FailureSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one failing case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSignal {
    /// Case id
    pub case_id: String,
    /// Category
    pub category: FailureCategory,
    /// Severity against the low-score threshold
    pub severity: FailureSeverity,
    /// Keyword that decided the category, or `no_keyword_match`
    pub signal: String,
}

/// Category and deciding keyword for one execution.
///
/// Output and rationale are searched for keywords in fixed priority order:
/// execution grounding, tool selection, decomposition, verifier mismatch.
#[must_use]
pub fn classify_failure(execution: &CaseExecution) -> (FailureCategory, &'static str) {
    let combined = text::normalize(&format!(
        "{}\n{}",
        execution.output.raw_output, execution.rationale
    ));

    let ordered: [(FailureCategory, &[&'static str]); 4] = [
        (FailureCategory::ExecutionGrounding, &EXECUTION_KEYWORDS),
        (FailureCategory::ToolSelection, &TOOL_KEYWORDS),
        (FailureCategory::Decomposition, &DECOMPOSITION_KEYWORDS),
        (FailureCategory::VerifierMismatch, &VERIFIER_KEYWORDS),
    ];

    ordered
        .into_iter()
        .find_map(|(category, keywords)| {
            keywords
                .iter()
                .find(|keyword| text::contains_phrase(&combined, keyword))
                .map(|keyword| (category, *keyword))
        })
        .unwrap_or((FailureCategory::Other, "no_keyword_match"))
}

/// Classify every execution scoring below `threshold`.
pub fn classify_low_scores<'a, I>(executions: I, threshold: f64) -> Vec<FailureSignal>
where
    I: IntoIterator<Item = &'a CaseExecution>,
{
    executions
        .into_iter()
        .filter(|exec| exec.score < threshold)
        .map(|exec| {
            let (category, signal) = classify_failure(exec);
            FailureSignal {
                case_id: exec.case_id.clone(),
                category,
                severity: FailureSeverity::from_gap(threshold - exec.score),
                signal: signal.to_string(),
            }
        })
        .collect()
}

/// Count signals per category.
#[must_use]
pub fn histogram(signals: &[FailureSignal]) -> BTreeMap<FailureCategory, usize> {
    let mut counts = BTreeMap::new();
    for signal in signals {
        *counts.entry(signal.category).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowforge_core::dataset::Split;
    use flowforge_core::execution::RuntimeOutput;

    fn execution(output: &str, rationale: &str, score: f64) -> CaseExecution {
        CaseExecution {
            case_id: "case-0001".into(),
            split: Split::Train,
            hard_negative: false,
            question: "q".into(),
            output: RuntimeOutput {
                raw_output: output.into(),
                latency_ms: 1.0,
                token_cost: 0.0,
            },
            votes: Vec::new(),
            score,
            confidence: score,
            agreement: 1.0,
            rationale: rationale.into(),
            attempts: 1,
        }
    }

    #[test]
    fn test_missing_tool_is_tool_selection() {
        let exec = execution(
            "missing tool for analytics; best guess about Account",
            "rule: 1/3 expected keywords present",
            0.3,
        );
        assert_eq!(
            classify_failure(&exec),
            (FailureCategory::ToolSelection, "missing tool")
        );
    }

    #[test]
    fn test_overconfident_answer_is_verifier_mismatch() {
        let exec = execution(
            "query: Person Transaction has 3 matching records",
            "rule: expected an abstention but the answer asserts a result",
            0.05,
        );
        // "Transaction" must not match the tool keyword "action"
        assert_eq!(
            classify_failure(&exec),
            (FailureCategory::VerifierMismatch, "expected")
        );
    }

    #[test]
    fn test_execution_keywords_take_priority() {
        let exec = execution("query failed: tool crashed", "", 0.0);
        assert_eq!(classify_failure(&exec).0, FailureCategory::ExecutionGrounding);
    }

    #[test]
    fn test_unmatched_is_other() {
        let exec = execution("something", "vague", 0.2);
        assert_eq!(classify_failure(&exec), (FailureCategory::Other, "no_keyword_match"));
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(FailureSeverity::from_gap(0.05), FailureSeverity::Mild);
        assert_eq!(FailureSeverity::from_gap(0.2), FailureSeverity::Moderate);
        assert_eq!(FailureSeverity::from_gap(0.55), FailureSeverity::Severe);
    }

    #[test]
    fn test_low_scores_only() {
        let execs = [
            execution("missing tool for qa", "", 0.3),
            execution("qa: Person", "", 0.9),
        ];
        let signals = classify_low_scores(&execs, 0.6);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].severity, FailureSeverity::Moderate);
        assert_eq!(histogram(&signals)[&FailureCategory::ToolSelection], 1);
    }
}
