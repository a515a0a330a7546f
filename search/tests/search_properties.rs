//! Structural properties of the search tree and its trace.

use flowforge_core::blueprint::{TopologyMode, build_initial_blueprint};
use flowforge_core::cancel::CancellationFlag;
use flowforge_core::config::{DatasetConfig, SearchConfig};
use flowforge_core::trace::StopReason;
use flowforge_core::dataset::SyntheticDataset;
use flowforge_evaluation::WorkflowEvaluator;
use flowforge_search::tools::ToolSelector;
use flowforge_search::{SearchEngine, SearchOutcome};
use flowforge_synthesis::{infer_intents, synthesize};
use flowforge_testing::strategies::{arb_search_config, fast_evaluation};
use flowforge_testing::{ScriptedRuntime, sample_catalog, sample_schema};
use proptest::prelude::*;

const TASK: &str = "find accounts owned by a person and rank risky transfers";

fn dataset(seed: u64) -> SyntheticDataset {
    let config = DatasetConfig {
        target_size: 15,
        ..DatasetConfig::default()
    };
    synthesize(TASK, &sample_schema(), &config, seed).unwrap()
}

async fn search(config: SearchConfig, seed: u64) -> SearchOutcome {
    let schema = sample_schema();
    let catalog = sample_catalog();
    let intents = infer_intents(TASK, &schema);
    let ranked = ToolSelector::rank(TASK, &intents, &catalog, None)
        .into_iter()
        .take(config.initial_tool_count)
        .collect();
    let root = build_initial_blueprint("bp-0000", "demo", TASK, ranked, config.initial_topology)
        .unwrap();
    let evaluator = WorkflowEvaluator::from_config(ScriptedRuntime::default(), &config).unwrap();
    SearchEngine::new(evaluator, config, seed)
        .run(root, &dataset(seed), &intents, &catalog, &CancellationFlag::new())
        .await
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_every_blueprint_is_referentially_sound(
        config in arb_search_config(),
        seed in 0u64..1_000,
    ) {
        let outcome = tokio_test::block_on(search(config, seed));
        for node in outcome.tree.nodes() {
            prop_assert!(node.blueprint.validate().is_ok());
            if let Some(parent) = node.parent {
                let parent = &outcome.tree.nodes()[parent];
                prop_assert_eq!(node.blueprint.parent_id(), Some(parent.blueprint.id()));
                prop_assert_eq!(
                    node.blueprint.lineage().len(),
                    parent.blueprint.lineage().len() + 1
                );
                prop_assert_eq!(node.blueprint.lineage().last(), node.mutation.as_ref());
            }
        }
    }

    #[test]
    fn prop_visits_count_every_descendant(
        config in arb_search_config(),
        seed in 0u64..1_000,
    ) {
        let max_children = config.max_children;
        let outcome = tokio_test::block_on(search(config, seed));
        let nodes = outcome.tree.nodes();
        for node in nodes {
            let below: u32 = node.children.iter().map(|c| nodes[*c].visits).sum();
            prop_assert_eq!(node.visits, below + 1);
            prop_assert!(node.children.len() <= max_children);
        }
        let root_visits = outcome.tree.root().map(|root| root.visits).unwrap_or_default();
        prop_assert_eq!(root_visits as usize, nodes.len());
    }

    #[test]
    fn prop_best_train_objective_is_running_max(
        config in arb_search_config(),
        seed in 0u64..1_000,
    ) {
        let outcome = tokio_test::block_on(search(config, seed));
        let root_train = outcome.tree.root().map(|root| root.train.objective).unwrap_or_default();
        let mut running = root_train;
        for trace in &outcome.traces {
            running = running.max(trace.train_objective);
            prop_assert_eq!(trace.best_train_objective, running);
            prop_assert!(trace.best_train_objective >= trace.train_objective);
        }
    }

    #[test]
    fn prop_regret_is_shortfall_against_best(
        config in arb_search_config(),
        seed in 0u64..1_000,
    ) {
        let min_improvement = config.min_improvement;
        let outcome = tokio_test::block_on(search(config, seed));
        let mut best = f64::NEG_INFINITY;
        for trace in &outcome.traces {
            prop_assert!(trace.regret >= 0.0);
            prop_assert_eq!(trace.regret == 0.0, trace.became_best);
            prop_assert_eq!(trace.became_best, trace.improvement >= min_improvement);
            prop_assert!(trace.best_selection_score >= best);
            best = trace.best_selection_score;
        }
        let best_node = outcome.best().unwrap();
        let ceiling = outcome.best_selection_score + min_improvement;
        prop_assert!(outcome.traces.iter().all(|t| t.selection_score < ceiling));
        prop_assert_eq!(best_node.id, outcome.best_node);
    }
}

#[tokio::test]
async fn test_same_seed_same_trace() {
    let config = SearchConfig {
        rounds: 4,
        train_budget: 5,
        validation_budget: 3,
        evaluation: fast_evaluation(),
        ..SearchConfig::default()
    };
    let a = search(config.clone(), 11).await;
    let b = search(config, 11).await;

    assert_eq!(
        serde_json::to_string(&a.traces).unwrap(),
        serde_json::to_string(&b.traces).unwrap()
    );
    assert_eq!(a.best().unwrap().blueprint, b.best().unwrap().blueprint);
    assert_eq!(a.prompt_variants, b.prompt_variants);
    assert_eq!(a.tool_gains, b.tool_gains);
}

#[tokio::test]
async fn test_topology_only_search_cycles_modes() {
    let config = SearchConfig {
        rounds: 2,
        expansions_per_round: 1,
        enable_prompt_mutation: false,
        enable_tool_mutation: false,
        initial_topology: TopologyMode::Linear,
        evaluation: fast_evaluation(),
        ..SearchConfig::default()
    };
    let outcome = search(config, 3).await;
    assert!(!outcome.traces.is_empty());
    for trace in &outcome.traces {
        assert_eq!(trace.mutation.family().as_str(), "topology");
    }
}

#[tokio::test]
async fn test_stalled_rounds_stop_at_round_five_with_patience_three() {
    let config = SearchConfig {
        rounds: 10,
        patience: 3,
        min_improvement: 10.0,
        train_budget: 4,
        validation_budget: 3,
        evaluation: fast_evaluation(),
        ..SearchConfig::default()
    };
    let outcome = search(config, 5).await;

    assert_eq!(outcome.stop_reason, StopReason::EarlyStopped);
    assert_eq!(outcome.rounds_completed, 5);
    assert_eq!(outcome.traces.last().map(|t| t.round), Some(5));
}
