//! Structured feedback over low-scoring cases.
//!
//! [`reflect`] is a pure function: the evaluator stores its text on each
//! summary, and prompt mutation consumes the structured form directly.

use crate::taxonomy::classify_failure;
use flowforge_core::execution::CaseExecution;
use flowforge_core::summary::FailureCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reflection text when nothing failed.
pub const STABLE_REFLECTION: &str =
    "stable candidate: keep the current constraints and evidence discipline";

/// Failing cases quoted in the reflection text.
const MAX_SNIPPETS: usize = 3;

/// Feedback derived from a set of low-scoring cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionFeedback {
    /// Number of cases reflected on
    pub low_score_count: usize,
    /// Case count per failure category
    pub categories: BTreeMap<FailureCategory, usize>,
    /// Most frequent category, ties broken by category order
    pub dominant: Option<FailureCategory>,
    /// Hard negatives answered instead of declined
    pub abstention_failures: usize,
    /// Terms a revised prompt should mention, in category order
    pub failure_keywords: Vec<String>,
    /// Up to three `case score reason` snippets
    pub snippets: Vec<String>,
    /// Human-readable reflection
    pub text: String,
}

impl ReflectionFeedback {
    /// Whether there was nothing to reflect on.
    #[must_use]
    pub const fn is_stable(&self) -> bool {
        self.low_score_count == 0
    }
}

/// Terms that address a failure category in an operator prompt.
#[must_use]
pub const fn remedy_keywords(category: FailureCategory) -> &'static [&'static str] {
    match category {
        FailureCategory::ExecutionGrounding => &["evidence", "grounded"],
        FailureCategory::ToolSelection => &["tool", "capability"],
        FailureCategory::Decomposition => &["step", "plan"],
        FailureCategory::VerifierMismatch => &["unknown", "verify"],
        FailureCategory::Other => &["evidence"],
    }
}

const fn guidance(category: FailureCategory) -> &'static str {
    match category {
        FailureCategory::ExecutionGrounding => {
            "Ground every claim in executed evidence and surface runtime errors."
        }
        FailureCategory::ToolSelection => {
            "Bind a tool that serves the missing capability and prune noisy tools."
        }
        FailureCategory::Decomposition => "Break the task into explicit steps before answering.",
        FailureCategory::VerifierMismatch => {
            "Answer UNKNOWN when the schema cannot support the question and add reviewer checks."
        }
        FailureCategory::Other => {
            "Improve prompt grounding, prune noisy tools, and add reviewer checks."
        }
    }
}

/// Reflect on low-scoring cases.
#[must_use]
pub fn reflect(low_score_cases: &[&CaseExecution]) -> ReflectionFeedback {
    let mut categories = BTreeMap::new();
    for execution in low_score_cases {
        *categories.entry(classify_failure(execution).0).or_insert(0) += 1;
    }

    let dominant = categories
        .iter()
        .max_by(|(a_cat, a), (b_cat, b)| a.cmp(b).then_with(|| b_cat.cmp(a_cat)))
        .map(|(category, _)| *category);

    let abstention_failures = low_score_cases
        .iter()
        .filter(|execution| execution.hard_negative)
        .count();

    let mut failure_keywords: Vec<String> = Vec::new();
    for category in categories.keys() {
        for keyword in remedy_keywords(*category) {
            if !failure_keywords.iter().any(|k| k == keyword) {
                failure_keywords.push((*keyword).to_string());
            }
        }
    }

    let snippets: Vec<String> = low_score_cases
        .iter()
        .take(MAX_SNIPPETS)
        .map(|execution| {
            format!(
                "{} score={:.2} reason={}",
                execution.case_id, execution.score, execution.rationale
            )
        })
        .collect();

    let text = match dominant {
        None => STABLE_REFLECTION.to_string(),
        Some(category) => {
            let mut parts = snippets.clone();
            parts.push(guidance(category).to_string());
            parts.join(" | ")
        }
    };

    ReflectionFeedback {
        low_score_count: low_score_cases.len(),
        categories,
        dominant,
        abstention_failures,
        failure_keywords,
        snippets,
        text,
    }
}
