//! Hand-built fixtures over the mock schema and catalog.

#![allow(clippy::missing_panics_doc)]

use flowforge_core::blueprint::{TopologyMode, WorkflowBlueprint, build_initial_blueprint};
use flowforge_core::dataset::{
    Case, CaseLineage, Difficulty, Split, SynthesisReport, SyntheticDataset, TaskIntent,
};
use flowforge_core::schema::{SchemaSnapshot, ToolDescriptor};
use flowforge_runtime::mock::{mock_catalog, mock_schema};
use std::collections::BTreeMap;

/// The schema the mock runtime serves.
#[must_use]
pub fn sample_schema() -> SchemaSnapshot {
    mock_schema()
}

/// The catalog the mock runtime serves.
#[must_use]
pub fn sample_catalog() -> Vec<ToolDescriptor> {
    mock_catalog()
}

/// Root blueprint over the first three catalog tools, with a reviewer.
#[must_use]
#[allow(clippy::expect_used)]
pub fn sample_blueprint(catalog: &[ToolDescriptor]) -> WorkflowBlueprint {
    build_initial_blueprint(
        "bp-0000",
        "flowforge-test",
        "find accounts by owner and rank risky transfers",
        catalog.iter().take(3).cloned().collect(),
        TopologyMode::PlannerWorkerReviewer,
    )
    .expect("fixture catalog has unique tool ids")
}

/// Case `index` of the fixture dataset, labelled with `split`.
///
/// Intents cycle through the vocabulary and every seventh case is a hard
/// negative. Questions are distinct for the first sixteen indices.
#[must_use]
pub fn case_fixture(index: usize, split: Split) -> Case {
    let schema = mock_schema();
    let entity = &schema.entities[index % schema.entities.len()];
    let relation = &schema.relations[(index / schema.entities.len()) % schema.relations.len()];
    let intent = TaskIntent::ALL[index % TaskIntent::ALL.len()];
    let hard_negative = index % 7 == 6;

    let (question, expected) = if hard_negative {
        let other = &schema.entities[(index + 1) % schema.entities.len()];
        (
            format!("Which {entity} MENTORS a {other}, and through how many hops?"),
            "UNKNOWN".to_string(),
        )
    } else {
        let question = match intent {
            TaskIntent::Query => format!("Find each {entity} connected through {relation}"),
            TaskIntent::Analytics => format!("Rank every {entity} by {relation} degree"),
            TaskIntent::Modeling => format!("Design constraints for {entity} along {relation}"),
            TaskIntent::Import => {
                format!("Plan an import of {entity} records with {relation} edges")
            }
            TaskIntent::Qa => format!("Explain what {relation} means for a {entity}"),
        };
        (question, format!("{intent}: {entity} {relation}"))
    };

    Case {
        id: format!("case-{index:04}"),
        question,
        expected,
        intent,
        split,
        lineage: CaseLineage {
            template_id: if hard_negative {
                "hard-negative".to_string()
            } else {
                format!("fixture-{intent}")
            },
            paraphrased: false,
            hard_negative,
            difficulty: Difficulty::cycle(index),
        },
    }
}

/// A dataset of `size` fixture cases.
///
/// Splits follow a 3:1:1 pattern (`train, train, train, validation, test`),
/// so ten cases give six train, two validation, and two test cases.
#[must_use]
pub fn dataset_fixture(size: usize) -> SyntheticDataset {
    let cases: Vec<Case> = (0..size)
        .map(|index| {
            let split = match index % 5 {
                0..=2 => Split::Train,
                3 => Split::Validation,
                _ => Split::Test,
            };
            case_fixture(index, split)
        })
        .collect();

    let mut intent_coverage = BTreeMap::new();
    let mut split_sizes = BTreeMap::new();
    for case in &cases {
        *intent_coverage.entry(case.intent).or_insert(0) += 1;
        *split_sizes.entry(case.split).or_insert(0) += 1;
    }
    let hard_negative_count = cases.iter().filter(|c| c.is_hard_negative()).count();

    #[allow(clippy::cast_precision_loss)]
    let hard_negative_ratio = if size == 0 {
        0.0
    } else {
        hard_negative_count as f64 / size as f64
    };

    let report = SynthesisReport {
        requested_size: size,
        final_size: size,
        intents: intent_coverage.keys().copied().collect(),
        hard_negative_count,
        hard_negative_ratio,
        intent_coverage,
        split_sizes,
        ..SynthesisReport::default()
    };
    SyntheticDataset::new(cases, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_dataset_fixture_split_pattern() {
        let dataset = dataset_fixture(10);
        assert_eq!(dataset.split_len(Split::Train), 6);
        assert_eq!(dataset.split_len(Split::Validation), 2);
        assert_eq!(dataset.split_len(Split::Test), 2);
        assert_eq!(dataset.report().split_sizes[&Split::Train], 6);
    }

    #[test]
    fn test_fixture_questions_are_distinct() {
        let dataset = dataset_fixture(16);
        let questions: HashSet<&str> = dataset.cases().iter().map(|c| c.question.as_str()).collect();
        assert_eq!(questions.len(), 16);
    }

    #[test]
    fn test_hard_negatives_expect_abstention() {
        let case = case_fixture(6, Split::Train);
        assert!(case.is_hard_negative());
        assert_eq!(case.expected, "UNKNOWN");
        assert!(!case_fixture(5, Split::Train).is_hard_negative());
    }

    #[test]
    fn test_sample_blueprint_has_reviewer() {
        let blueprint = sample_blueprint(&sample_catalog());
        assert!(blueprint.has_verifier());
        assert_eq!(blueprint.tools().len(), 3);
    }
}
