//! # Flowforge Synthesis
//!
//! Builds a small, schema-grounded evaluation dataset from a task description.
//!
//! The pipeline is:
//!
//! 1. infer task intents from the description ([`infer_intents`])
//! 2. render intent templates against sampled schema labels and relations
//! 3. paraphrase a subset of the rendered questions
//! 4. inject hard negatives, which ask about edge types the schema lacks
//! 5. deduplicate on normalized question text
//! 6. clip to the target size, keeping at least one case per intent
//! 7. assign train / validation / test labels in a seeded shuffle order
//!
//! The same seed, schema, and configuration always yield the same dataset.
//!
//! # Example
//!
//! ```rust
//! use flowforge_core::config::DatasetConfig;
//! use flowforge_core::dataset::Split;
//! use flowforge_core::schema::SchemaSnapshot;
//! use flowforge_synthesis::synthesize;
//!
//! let schema = SchemaSnapshot::new(["Person", "Account"], ["OWNS", "TRANSFERS"]);
//! let dataset = synthesize("find risky accounts", &schema, &DatasetConfig::default(), 7)?;
//! assert_eq!(dataset.len(), 12);
//! assert!(dataset.split_len(Split::Test) >= 1);
//! # Ok::<(), flowforge_core::error::SynthesisError>(())
//! ```

pub mod intents;
pub mod templates;

pub use intents::{FALLBACK_INTENTS, infer_intents};

use flowforge_core::config::DatasetConfig;
use flowforge_core::dataset::{
    Case, CaseLineage, Difficulty, Split, SynthesisReport, SyntheticDataset, TaskIntent,
};
use flowforge_core::error::SynthesisError;
use flowforge_core::schema::SchemaSnapshot;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashSet};
use templates::{FABRICATED_RELATIONS, HARD_NEGATIVE_TEMPLATE, Template};

/// Expected answer of a hard negative.
pub const ABSTAIN_ANSWER: &str = "UNKNOWN";

/// Chance that a rendered question also gets a paraphrased copy.
const PARAPHRASE_PROBABILITY: f64 = 0.5;

/// Render attempts allowed per requested case before giving up on uniqueness.
const ATTEMPTS_PER_CASE: usize = 4;

/// Synthesize a split dataset for `task_description`.
///
/// # Errors
///
/// - [`SynthesisError::EmptySchema`] if the schema has neither labels nor relations
/// - [`SynthesisError::InsufficientCoverage`] if an inferred intent has no
///   template the schema can fill
/// - [`SynthesisError::SplitUnsatisfiable`] if too few unique cases exist to
///   put `min_per_split` cases in every split
/// - [`SynthesisError::InsufficientCases`] if the schema cannot produce
///   `target_size` unique cases
pub fn synthesize(
    task_description: &str,
    schema: &SchemaSnapshot,
    config: &DatasetConfig,
    seed: u64,
) -> Result<SyntheticDataset, SynthesisError> {
    if schema.entities.is_empty() && schema.relations.is_empty() {
        return Err(SynthesisError::EmptySchema);
    }

    let intents = infer_intents(task_description, schema);
    let mut synthesizer = Synthesizer::new(schema, seed);

    let mut plans = Vec::with_capacity(intents.len());
    for intent in &intents {
        let usable: Vec<Template> = templates::templates_for(*intent)
            .iter()
            .copied()
            .filter(|t| t.renderable(synthesizer.has_labels(), synthesizer.has_relations()))
            .collect();
        if usable.is_empty() {
            return Err(SynthesisError::InsufficientCoverage {
                intent: intent.to_string(),
            });
        }
        plans.push((*intent, usable));
    }

    let target = config.target_size;
    let negative_target = if config.hard_negatives {
        hard_negative_target(target, config.hard_negative_ratio)
    } else {
        0
    };

    let negatives = synthesizer.render_hard_negatives(&intents, negative_target);
    let positive_target = target.saturating_sub(negatives.len());
    let positives = synthesizer.render_positives(&plans, positive_target, config.paraphrase);
    let positives = clip_preserving_coverage(positives, positive_target);

    let drafts: Vec<Draft> = positives.into_iter().chain(negatives).collect();
    let size = drafts.len();
    let split_sizes = split_sizes(size, config)?;
    if size < target {
        return Err(SynthesisError::InsufficientCases {
            requested: target,
            available: size,
        });
    }

    let cases = synthesizer.assign_splits(drafts, split_sizes);
    let report = synthesizer.report(target, intents, &cases);

    tracing::info!(
        final_size = report.final_size,
        hard_negatives = report.hard_negative_count,
        paraphrases = report.paraphrase_count,
        dedup_rate = report.dedup_rate,
        "Synthesized dataset"
    );

    Ok(SyntheticDataset::new(cases, report))
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn hard_negative_target(target: usize, ratio: f64) -> usize {
    let count = (target as f64 * ratio.clamp(0.0, 1.0)).round() as usize;
    count.min(target / 2)
}

/// A case before ids, difficulty, and split are assigned.
#[derive(Debug, Clone)]
struct Draft {
    question: String,
    expected: String,
    intent: TaskIntent,
    template_id: &'static str,
    paraphrased: bool,
    hard_negative: bool,
}

struct Synthesizer<'a> {
    schema: &'a SchemaSnapshot,
    rng: StdRng,
    seen: HashSet<String>,
    rendered: usize,
    duplicates: usize,
}

impl<'a> Synthesizer<'a> {
    fn new(schema: &'a SchemaSnapshot, seed: u64) -> Self {
        Self {
            schema,
            rng: StdRng::seed_from_u64(seed),
            seen: HashSet::new(),
            rendered: 0,
            duplicates: 0,
        }
    }

    fn has_labels(&self) -> bool {
        !self.schema.entities.is_empty()
    }

    fn has_relations(&self) -> bool {
        !self.schema.relations.is_empty()
    }

    /// Record a draft unless its normalized question was already seen.
    fn admit(&mut self, draft: Draft, into: &mut Vec<Draft>) {
        self.rendered += 1;
        if self.seen.insert(normalize(&draft.question)) {
            into.push(draft);
        } else {
            self.duplicates += 1;
        }
    }

    fn render_positives(
        &mut self,
        plans: &[(TaskIntent, Vec<Template>)],
        target: usize,
        paraphrase: bool,
    ) -> Vec<Draft> {
        let mut drafts = Vec::with_capacity(target + 1);
        if plans.is_empty() {
            return drafts;
        }

        let attempts = target.max(plans.len()) * ATTEMPTS_PER_CASE;
        for attempt in 0..attempts {
            if drafts.len() >= target && attempt >= plans.len() {
                break;
            }
            let (intent, usable) = &plans[attempt % plans.len()];
            let Some(template) = usable.choose(&mut self.rng).copied() else {
                continue;
            };

            let label = template
                .needs_label()
                .then(|| self.schema.entities.choose(&mut self.rng).cloned())
                .flatten();
            let relation = template
                .needs_relation()
                .then(|| self.schema.relations.choose(&mut self.rng).cloned())
                .flatten();

            let question = template.render(label.as_deref(), relation.as_deref());
            let expected = expected_answer(*intent, label.as_deref(), relation.as_deref());
            let draft = Draft {
                question,
                expected,
                intent: *intent,
                template_id: template.id,
                paraphrased: false,
                hard_negative: false,
            };

            let rewrite = if paraphrase && self.rng.gen_bool(PARAPHRASE_PROBABILITY) {
                templates::paraphrase(&draft.question)
            } else {
                None
            };
            let variant = rewrite.map(|question| Draft {
                question,
                paraphrased: true,
                ..draft.clone()
            });

            self.admit(draft, &mut drafts);
            if let Some(variant) = variant {
                self.admit(variant, &mut drafts);
            }
        }

        if drafts.len() < target {
            self.sweep_positives(plans, target, &mut drafts);
        }
        drafts
    }

    /// Walk every template and slot binding in order until `target` drafts exist.
    fn sweep_positives(
        &mut self,
        plans: &[(TaskIntent, Vec<Template>)],
        target: usize,
        drafts: &mut Vec<Draft>,
    ) {
        let schema = self.schema;
        let slots = |needed: bool, terms: &'a [String]| -> Vec<Option<&'a str>> {
            if needed {
                terms.iter().map(|term| Some(term.as_str())).collect()
            } else {
                vec![None]
            }
        };

        for (intent, usable) in plans {
            for template in usable {
                for label in slots(template.needs_label(), &schema.entities) {
                    for relation in slots(template.needs_relation(), &schema.relations) {
                        if drafts.len() >= target {
                            return;
                        }
                        let draft = Draft {
                            question: template.render(label, relation),
                            expected: expected_answer(*intent, label, relation),
                            intent: *intent,
                            template_id: template.id,
                            paraphrased: false,
                            hard_negative: false,
                        };
                        self.admit(draft, drafts);
                    }
                }
            }
        }
    }

    fn render_hard_negatives(&mut self, intents: &[TaskIntent], target: usize) -> Vec<Draft> {
        let mut drafts = Vec::with_capacity(target);
        if target == 0 || intents.is_empty() || !self.has_labels() {
            return drafts;
        }

        let fabricated: Vec<&'static str> = FABRICATED_RELATIONS
            .into_iter()
            .filter(|candidate| {
                !self
                    .schema
                    .relations
                    .iter()
                    .any(|relation| relation.eq_ignore_ascii_case(candidate))
            })
            .collect();
        if fabricated.is_empty() {
            tracing::warn!("Schema contains every fabricated relation; skipping hard negatives");
            return drafts;
        }

        for attempt in 0..target * ATTEMPTS_PER_CASE {
            if drafts.len() >= target {
                break;
            }
            let (Some(subject), Some(relation), Some(object)) = (
                self.schema.entities.choose(&mut self.rng).cloned(),
                fabricated.choose(&mut self.rng).copied(),
                self.schema.entities.choose(&mut self.rng).cloned(),
            ) else {
                break;
            };
            let draft = Draft {
                question: templates::hard_negative(&subject, relation, &object),
                expected: ABSTAIN_ANSWER.to_string(),
                intent: intents[attempt % intents.len()],
                template_id: HARD_NEGATIVE_TEMPLATE,
                paraphrased: false,
                hard_negative: true,
            };
            self.admit(draft, &mut drafts);
        }
        drafts
    }

    fn assign_splits(&mut self, drafts: Vec<Draft>, sizes: [usize; 3]) -> Vec<Case> {
        let mut cases: Vec<Case> = drafts
            .into_iter()
            .enumerate()
            .map(|(index, draft)| Case {
                id: format!("case-{index:04}"),
                question: draft.question,
                expected: draft.expected,
                intent: draft.intent,
                split: Split::Train,
                lineage: CaseLineage {
                    template_id: draft.template_id.to_string(),
                    paraphrased: draft.paraphrased,
                    hard_negative: draft.hard_negative,
                    difficulty: Difficulty::cycle(index),
                },
            })
            .collect();

        cases.shuffle(&mut self.rng);

        let labels = Split::ALL
            .into_iter()
            .zip(sizes)
            .flat_map(|(split, count)| std::iter::repeat_n(split, count));
        for (case, split) in cases.iter_mut().zip(labels) {
            case.split = split;
        }
        cases
    }

    #[allow(clippy::cast_precision_loss)]
    fn report(&self, requested: usize, intents: Vec<TaskIntent>, cases: &[Case]) -> SynthesisReport {
        let final_size = cases.len();
        let hard_negative_count = cases.iter().filter(|c| c.is_hard_negative()).count();
        let paraphrase_count = cases.iter().filter(|c| c.lineage.paraphrased).count();

        let mut intent_coverage = BTreeMap::new();
        let mut split_sizes = BTreeMap::new();
        for case in cases {
            *intent_coverage.entry(case.intent).or_insert(0) += 1;
            *split_sizes.entry(case.split).or_insert(0) += 1;
        }

        let mentioned = |terms: &[String]| -> Vec<String> {
            terms
                .iter()
                .filter(|term| {
                    cases
                        .iter()
                        .any(|case| crate::intents::words(&case.question).contains(&term.to_lowercase()))
                })
                .cloned()
                .collect()
        };

        SynthesisReport {
            requested_size: requested,
            final_size,
            intents,
            sampled_labels: mentioned(&self.schema.entities),
            sampled_relations: mentioned(&self.schema.relations),
            hard_negative_count,
            hard_negative_ratio: ratio(hard_negative_count, final_size),
            paraphrase_count,
            dedup_rate: ratio(self.duplicates, self.rendered),
            intent_coverage,
            split_sizes,
        }
    }
}

/// Expected answer sketch of a positive case: the intent and the bound terms.
fn expected_answer(intent: TaskIntent, label: Option<&str>, relation: Option<&str>) -> String {
    let terms: Vec<&str> = [label, relation].into_iter().flatten().collect();
    format!("{intent}: {}", terms.join(" "))
}

fn normalize(question: &str) -> String {
    question
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Keep `limit` drafts: the first draft of every intent, then the earliest
/// of the rest. Original order is preserved.
fn clip_preserving_coverage(drafts: Vec<Draft>, limit: usize) -> Vec<Draft> {
    if drafts.len() <= limit {
        return drafts;
    }

    let mut keep = vec![false; drafts.len()];
    let mut covered = HashSet::new();
    let mut kept = 0;
    for (index, draft) in drafts.iter().enumerate() {
        if kept < limit && covered.insert(draft.intent) {
            keep[index] = true;
            kept += 1;
        }
    }
    for flag in &mut keep {
        if kept >= limit {
            break;
        }
        if !*flag {
            *flag = true;
            kept += 1;
        }
    }

    drafts
        .into_iter()
        .zip(keep)
        .filter_map(|(draft, keep)| keep.then_some(draft))
        .collect()
}

/// Train / validation / test sizes for `size` cases.
///
/// Sizes follow the configured ratios (floored, remainder to test), then
/// splits below `min_per_split` borrow from the largest split.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn split_sizes(size: usize, config: &DatasetConfig) -> Result<[usize; 3], SynthesisError> {
    let min = config.min_per_split;
    if size < min.saturating_mul(3) || size == 0 {
        return Err(SynthesisError::SplitUnsatisfiable {
            size,
            min_per_split: min,
        });
    }

    let ratios = &config.split_ratios;
    let train = (size as f64 * ratios.train).floor() as usize;
    let val = ((size as f64 * ratios.val).floor() as usize).min(size - train);
    let mut sizes = [train, val, size - train - val];

    for split in 0..3 {
        while sizes[split] < min {
            let donor = (0..3)
                .filter(|&i| i != split && sizes[i] > min)
                .max_by_key(|&i| (sizes[i], std::cmp::Reverse(i)));
            let Some(donor) = donor else {
                return Err(SynthesisError::SplitUnsatisfiable {
                    size,
                    min_per_split: min,
                });
            };
            sizes[donor] -= 1;
            sizes[split] += 1;
        }
    }
    Ok(sizes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowforge_core::config::SplitRatios;

    fn schema() -> SchemaSnapshot {
        SchemaSnapshot::new(
            ["Person", "Account", "Loan", "Transaction"],
            ["OWNS", "TRANSFERS", "BORROWS", "DEPOSITS_TO"],
        )
    }

    fn config(target_size: usize) -> DatasetConfig {
        DatasetConfig {
            target_size,
            ..DatasetConfig::default()
        }
    }

    #[test]
    fn test_default_dataset_has_target_size_and_all_splits() {
        let dataset = synthesize("find risky accounts", &schema(), &config(12), 7).unwrap();
        assert_eq!(dataset.len(), 12);
        assert_eq!(dataset.split_len(Split::Train), 7);
        assert_eq!(dataset.split_len(Split::Validation), 2);
        assert_eq!(dataset.split_len(Split::Test), 3);
        assert_eq!(dataset.report().final_size, 12);
    }

    #[test]
    fn test_same_seed_same_dataset() {
        let a = synthesize("rank accounts", &schema(), &config(20), 42).unwrap();
        let b = synthesize("rank accounts", &schema(), &config(20), 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seed_changes_assignment() {
        let a = synthesize("rank accounts", &schema(), &config(20), 1).unwrap();
        let b = synthesize("rank accounts", &schema(), &config(20), 2).unwrap();
        assert_ne!(a.cases(), b.cases());
    }

    #[test]
    fn test_hard_negatives_are_bounded_and_abstain() {
        let dataset = synthesize("find accounts", &schema(), &config(20), 3).unwrap();
        let negatives: Vec<_> = dataset.cases().iter().filter(|c| c.is_hard_negative()).collect();
        assert_eq!(negatives.len(), 4);
        assert!(negatives.iter().all(|c| c.expected == ABSTAIN_ANSWER));
        assert!((dataset.report().hard_negative_ratio - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_hard_negatives_can_be_disabled() {
        let cfg = DatasetConfig {
            hard_negatives: false,
            ..config(12)
        };
        let dataset = synthesize("find accounts", &schema(), &cfg, 3).unwrap();
        assert_eq!(dataset.report().hard_negative_count, 0);
    }

    #[test]
    fn test_every_inferred_intent_is_covered() {
        let dataset = synthesize(
            "find, rank, model, import and explain the graph",
            &schema(),
            &config(6),
            9,
        )
        .unwrap();
        let report = dataset.report();
        assert_eq!(report.intents.len(), 5);
        for intent in &report.intents {
            assert!(report.intent_coverage.get(intent).copied().unwrap_or(0) >= 1, "{intent}");
        }
    }

    #[test]
    fn test_positive_expectation_names_bound_terms() {
        let dataset = synthesize("find accounts", &schema(), &config(12), 5).unwrap();
        for case in dataset.cases().iter().filter(|c| !c.is_hard_negative()) {
            let bound = case.expected.strip_prefix("query: ").unwrap();
            assert!(
                bound.split(' ').all(|term| case.question.contains(term)),
                "{}",
                case.question
            );
        }
    }

    #[test]
    fn test_empty_schema_is_rejected() {
        let empty = SchemaSnapshot::new(Vec::<String>::new(), Vec::<String>::new());
        assert_eq!(
            synthesize("find", &empty, &config(12), 0),
            Err(SynthesisError::EmptySchema)
        );
    }

    #[test]
    fn test_relation_only_schema_lacks_query_coverage() {
        let relations_only = SchemaSnapshot::new(Vec::<String>::new(), ["OWNS"]);
        assert_eq!(
            synthesize("find owners", &relations_only, &config(12), 0),
            Err(SynthesisError::InsufficientCoverage {
                intent: "query".into()
            })
        );
    }

    #[test]
    fn test_tiny_schema_cannot_fill_splits() {
        let tiny = SchemaSnapshot::new(["Person"], Vec::<String>::new());
        let cfg = DatasetConfig {
            min_per_split: 2,
            ..config(12)
        };
        let result = synthesize("find people", &tiny, &cfg, 0);
        assert!(matches!(result, Err(SynthesisError::SplitUnsatisfiable { .. })));
    }

    #[test]
    fn test_sparse_schema_reports_shortfall() {
        let sparse = SchemaSnapshot::new(["Person"], ["OWNS"]);
        let result = synthesize("find people", &sparse, &config(30), 0);
        assert!(matches!(
            result,
            Err(SynthesisError::InsufficientCases { requested: 30, available }) if available < 30
        ));
    }

    #[test]
    fn test_sweep_fills_small_schema_exactly() {
        let small = SchemaSnapshot::new(["Person", "Account"], ["OWNS", "TRANSFERS"]);
        for seed in 0..8 {
            let dataset = synthesize("find accounts", &small, &config(12), seed).unwrap();
            assert_eq!(dataset.len(), 12, "seed {seed}");
        }
    }

    #[test]
    fn test_split_sizes_borrow_for_minimum() {
        let cfg = DatasetConfig {
            split_ratios: SplitRatios {
                train: 0.9,
                val: 0.05,
                test: 0.05,
            },
            min_per_split: 1,
            ..config(6)
        };
        assert_eq!(split_sizes(6, &cfg).unwrap(), [4, 1, 1]);
    }

    #[test]
    fn test_clip_keeps_first_case_of_each_intent() {
        let draft = |intent| Draft {
            question: String::new(),
            expected: String::new(),
            intent,
            template_id: "t",
            paraphrased: false,
            hard_negative: false,
        };
        let drafts = vec![
            draft(TaskIntent::Query),
            draft(TaskIntent::Query),
            draft(TaskIntent::Query),
            draft(TaskIntent::Qa),
        ];
        let clipped = clip_preserving_coverage(drafts, 2);
        let intents: Vec<_> = clipped.iter().map(|d| d.intent).collect();
        assert_eq!(intents, vec![TaskIntent::Query, TaskIntent::Qa]);
    }
}
