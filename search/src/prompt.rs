//! Reflection-driven prompt rewriting and the per-run variant registry.

use flowforge_evaluation::reflection::ReflectionFeedback;
use serde::{Deserialize, Serialize};

/// Marks the start of an appended prompt section.
const SECTION_MARKER: &str = "\n\n[";

/// A scored prompt rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptVariant {
    /// Registry id (`pv-0001`, ...)
    pub variant_id: String,
    /// Blueprint the rewrite was generated for
    pub blueprint_id: String,
    /// Operator whose prompt was rewritten
    pub operator: String,
    /// Rewrite strategy
    pub source: String,
    /// Full prompt text
    pub prompt: String,
    /// Heuristic score in [0, 1]
    pub score: f64,
    /// Failure keywords the score was computed against
    pub failure_keywords: Vec<String>,
    /// Prompt length in bytes
    pub length: usize,
    /// Whether this variant was applied
    pub selected: bool,
}

/// Every prompt variant generated during one run, in generation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptVariantRegistry {
    variants: Vec<PromptVariant>,
}

impl PromptVariantRegistry {
    /// Id the next variant will get.
    #[must_use]
    pub fn next_id(&self) -> String {
        format!("pv-{:04}", self.variants.len() + 1)
    }

    /// Record a variant.
    pub fn add(&mut self, variant: PromptVariant) {
        self.variants.push(variant);
    }

    /// Recorded variants.
    #[must_use]
    pub fn variants(&self) -> &[PromptVariant] {
        &self.variants
    }

    /// Number of recorded variants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Take the variants out.
    #[must_use]
    pub fn into_variants(self) -> Vec<PromptVariant> {
        self.variants
    }
}

/// An unscored rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptCandidate {
    /// Rewrite strategy
    pub source: &'static str,
    /// Full prompt text
    pub prompt: String,
}

/// Generates rewrites of an operator prompt and keeps the best one.
///
/// Rewrites append one guidance section to the prompt's base text (the text
/// before any earlier section), so repeated rewrites replace rather than
/// accumulate sections.
#[derive(Debug, Clone, Copy)]
pub struct PromptOptimizer {
    max_candidates: usize,
}

impl PromptOptimizer {
    /// Optimizer producing at most `max_candidates` rewrites (at least 2).
    #[must_use]
    pub fn new(max_candidates: usize) -> Self {
        Self {
            max_candidates: max_candidates.max(2),
        }
    }

    /// Distinct rewrites of `prompt`, none equal to `prompt` itself.
    #[must_use]
    pub fn generate_candidates(
        &self,
        prompt: &str,
        feedback: &ReflectionFeedback,
        task_description: &str,
    ) -> Vec<PromptCandidate> {
        let base = base_prompt(prompt);
        let failure_text = if feedback.is_stable() {
            "no explicit failure"
        } else {
            feedback.text.as_str()
        };

        let drafts = [
            (
                "refined_constraints",
                format!(
                    "{base}\n\n[Refined Constraints]\n\
                     - Use graph-tool evidence for every claim.\n\
                     - State unknown instead of hallucinating.\n\
                     - Prior failure pattern: {failure_text}."
                ),
            ),
            (
                "task_intent",
                format!(
                    "{base}\n\n[Task Intent]\n{task_description}\n\
                     [Output Discipline]\n1) Answer\n2) Evidence\n3) Assumptions"
                ),
            ),
            (
                "safety_checks",
                format!(
                    "{base}\n\n[Safety Checks]\n\
                     - Validate schema alignment before answering.\n\
                     - If tools disagree, explain the discrepancy and choose the conservative output."
                ),
            ),
            (
                "failure_recovery",
                format!(
                    "{base}\n\n[Failure Recovery]\n\
                     - If a tool call fails, retry with a fallback query plan.\n\
                     - Summarize the fallback and your confidence in the final answer."
                ),
            ),
        ];

        let mut seen = vec![normalize(prompt)];
        let mut candidates = Vec::new();
        for (source, text) in drafts {
            let key = normalize(&text);
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            candidates.push(PromptCandidate {
                source,
                prompt: text,
            });
            if candidates.len() >= self.max_candidates {
                break;
            }
        }
        candidates
    }

    /// Heuristic quality of a prompt against failure keywords.
    ///
    /// Starts at 0.5; mentions of evidence, unknown, and fallback add 0.15,
    /// 0.1, and 0.05; keyword coverage adds up to 0.2; length costs up to 0.12.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn score(prompt: &str, failure_keywords: &[String]) -> f64 {
        let lowered = prompt.to_lowercase();
        let mut score = 0.5;
        if lowered.contains("evidence") {
            score += 0.15;
        }
        if lowered.contains("unknown") {
            score += 0.1;
        }
        if lowered.contains("fallback") {
            score += 0.05;
        }
        if !failure_keywords.is_empty() {
            let covered = failure_keywords
                .iter()
                .filter(|keyword| lowered.contains(keyword.as_str()))
                .count();
            score += 0.2 * covered as f64 / failure_keywords.len() as f64;
        }
        score -= (prompt.len() as f64 / 6000.0).min(0.12);
        score.clamp(0.0, 1.0)
    }

    /// Generate, score, and record rewrites; return the selected one.
    ///
    /// Every candidate lands in `registry`. Ties go to the earlier candidate.
    /// If no rewrite differs from `prompt`, the prompt itself is recorded and
    /// selected.
    pub fn optimize(
        &self,
        registry: &mut PromptVariantRegistry,
        blueprint_id: &str,
        operator: &str,
        prompt: &str,
        feedback: &ReflectionFeedback,
        task_description: &str,
    ) -> PromptVariant {
        let mut candidates = self.generate_candidates(prompt, feedback, task_description);
        if candidates.is_empty() {
            candidates.push(PromptCandidate {
                source: "unchanged",
                prompt: prompt.to_string(),
            });
        }

        let scores: Vec<f64> = candidates
            .iter()
            .map(|candidate| Self::score(&candidate.prompt, &feedback.failure_keywords))
            .collect();
        let mut best = 0;
        for (index, score) in scores.iter().enumerate() {
            if *score > scores[best] {
                best = index;
            }
        }

        let mut selected = None;
        for (index, (candidate, score)) in candidates.into_iter().zip(scores).enumerate() {
            let variant = PromptVariant {
                variant_id: registry.next_id(),
                blueprint_id: blueprint_id.to_string(),
                operator: operator.to_string(),
                source: candidate.source.to_string(),
                length: candidate.prompt.len(),
                prompt: candidate.prompt,
                score,
                failure_keywords: feedback.failure_keywords.clone(),
                selected: index == best,
            };
            if index == best {
                selected = Some(variant.clone());
            }
            registry.add(variant);
        }

        let selected = selected.unwrap_or_else(|| PromptVariant {
            variant_id: registry.next_id(),
            blueprint_id: blueprint_id.to_string(),
            operator: operator.to_string(),
            source: "unchanged".to_string(),
            prompt: prompt.to_string(),
            score: 0.0,
            failure_keywords: Vec::new(),
            length: prompt.len(),
            selected: true,
        });
        tracing::debug!(
            blueprint = blueprint_id,
            operator,
            variant = %selected.variant_id,
            source = %selected.source,
            score = selected.score,
            "Selected prompt rewrite"
        );
        selected
    }
}

/// The appended guidance sections of `prompt`, empty if there are none.
#[must_use]
pub fn learned_sections(prompt: &str) -> &str {
    prompt.find(SECTION_MARKER).map_or("", |start| &prompt[start..])
}

fn base_prompt(prompt: &str) -> &str {
    prompt
        .find(SECTION_MARKER)
        .map_or(prompt, |end| &prompt[..end])
        .trim()
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowforge_evaluation::reflection::reflect;

    const PROMPT: &str = "Execute the plan step by step and collect graph evidence.";

    fn stable() -> ReflectionFeedback {
        reflect(&[])
    }

    fn failing() -> ReflectionFeedback {
        ReflectionFeedback {
            failure_keywords: vec!["unknown".into(), "verify".into()],
            low_score_count: 1,
            text: "case-0006 score=0.10 reason=answered | verify before answering".into(),
            ..stable()
        }
    }

    #[test]
    fn test_candidates_are_capped_and_distinct() {
        let optimizer = PromptOptimizer::new(3);
        let candidates = optimizer.generate_candidates(PROMPT, &stable(), "find accounts");
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().all(|c| c.prompt.starts_with(PROMPT)));
        assert_eq!(candidates[0].source, "refined_constraints");
    }

    #[test]
    fn test_rewrites_replace_earlier_sections() {
        let optimizer = PromptOptimizer::new(4);
        let once = &optimizer.generate_candidates(PROMPT, &stable(), "t")[1].prompt;
        let twice = optimizer.generate_candidates(once, &stable(), "t");
        assert!(twice.iter().all(|c| c.prompt.matches("\n\n[").count() == 1));
        assert!(twice.iter().all(|c| c.prompt != *once));
        assert_eq!(twice.len(), 3);
    }

    #[test]
    fn test_score_rewards_coverage_and_penalizes_length() {
        let keywords = vec!["verify".to_string()];
        let short = PromptOptimizer::score("verify the evidence", &keywords);
        assert!((short - (0.5 + 0.15 + 0.2 - 19.0 / 6000.0)).abs() < 1e-9);
        let long = PromptOptimizer::score(&"x".repeat(10_000), &keywords);
        assert!((long - 0.38).abs() < 1e-9);
    }

    #[test]
    fn test_learned_sections() {
        assert_eq!(learned_sections(PROMPT), "");
        let rewritten = format!("{PROMPT}\n\n[Safety Checks]\n- check");
        assert_eq!(learned_sections(&rewritten), "\n\n[Safety Checks]\n- check");
    }

    #[test]
    fn test_optimize_records_every_candidate() {
        let optimizer = PromptOptimizer::new(4);
        let mut registry = PromptVariantRegistry::default();
        let selected =
            optimizer.optimize(&mut registry, "bp-0001", "worker", PROMPT, &failing(), "find accounts");

        assert_eq!(registry.len(), 4);
        assert_eq!(registry.variants().iter().filter(|v| v.selected).count(), 1);
        assert_eq!(selected.source, "refined_constraints");
        assert_eq!(selected.variant_id, "pv-0001");
        assert_eq!(registry.next_id(), "pv-0005");
    }
}
