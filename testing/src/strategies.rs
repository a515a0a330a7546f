//! Proptest strategies for configurations and score streams.

use flowforge_core::config::{DatasetConfig, EvaluationConfig, SearchConfig};
use proptest::prelude::*;

/// Any run seed.
pub fn arb_seed() -> impl Strategy<Value = u64> {
    any::<u64>()
}

/// A score in `[0, 1]`.
pub fn arb_score() -> impl Strategy<Value = f64> {
    0.0..=1.0_f64
}

/// Between one and `max_len` scores.
pub fn arb_scores(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(arb_score(), 1..=max_len.max(1))
}

/// Evaluation settings that never wait on backoff.
#[must_use]
pub fn fast_evaluation() -> EvaluationConfig {
    EvaluationConfig {
        max_retries: 0,
        initial_backoff_ms: 1,
        max_backoff_ms: 1,
        call_timeout_ms: 2_000,
        ..EvaluationConfig::default()
    }
}

/// A small, valid search configuration with at least one mutation family.
pub fn arb_search_config() -> impl Strategy<Value = SearchConfig> {
    (
        1..=4_usize,
        1..=3_usize,
        1..=3_usize,
        (any::<bool>(), any::<bool>(), any::<bool>())
            .prop_filter("one family enabled", |(p, t, o)| *p || *t || *o),
        any::<bool>(),
        any::<bool>(),
        1..=6_usize,
    )
        .prop_map(
            |(rounds, expansions, patience, families, holdout, failure_aware, max_children)| {
                let (prompt, tool, topology) = families;
                SearchConfig {
                    rounds,
                    expansions_per_round: expansions,
                    patience,
                    use_holdout: holdout,
                    failure_aware_scheduling: failure_aware,
                    enable_prompt_mutation: prompt,
                    enable_tool_mutation: tool,
                    enable_topology_mutation: topology,
                    max_children,
                    train_budget: 4,
                    validation_budget: 3,
                    test_budget: 3,
                    evaluation: fast_evaluation(),
                    ..SearchConfig::default()
                }
            },
        )
}

/// A valid dataset configuration.
pub fn arb_dataset_config() -> impl Strategy<Value = DatasetConfig> {
    (6..=24_usize, 0.0..=0.5_f64, any::<bool>(), any::<bool>()).prop_map(
        |(target_size, hard_negative_ratio, paraphrase, hard_negatives)| DatasetConfig {
            target_size,
            min_size: 6,
            max_size: 30,
            hard_negative_ratio,
            paraphrase,
            hard_negatives,
            ..DatasetConfig::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn prop_search_configs_validate(config in arb_search_config()) {
            prop_assert!(config.validate().is_ok());
        }

        #[test]
        fn prop_dataset_configs_validate(config in arb_dataset_config()) {
            prop_assert!(config.validate().is_ok());
        }
    }
}
