//! Mutation family scheduling.

use flowforge_core::config::SearchConfig;
use flowforge_core::summary::FailureCategory;
use flowforge_core::trace::MutationFamily;
use rand::Rng;

/// Probability of following the failure signal instead of the rotation.
const FAILURE_BIAS: f64 = 0.6;

/// Family best placed to fix a failure category.
#[must_use]
pub const fn implicated_family(category: FailureCategory) -> MutationFamily {
    match category {
        FailureCategory::ToolSelection => MutationFamily::Tool,
        FailureCategory::Decomposition | FailureCategory::VerifierMismatch => {
            MutationFamily::Topology
        }
        FailureCategory::ExecutionGrounding | FailureCategory::Other => MutationFamily::Prompt,
    }
}

/// Chooses the mutation family of each expansion.
///
/// Families rotate round-robin over `(round + expansion)`. With failure-aware
/// scheduling on, the family implicated by the parent's dominant train
/// failure is taken instead with probability 0.6, when that family is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyScheduler {
    families: Vec<MutationFamily>,
    failure_aware: bool,
}

impl FamilyScheduler {
    /// Enabled families in `[Prompt, Tool, Topology]` order.
    ///
    /// The tool family is dropped when the catalog is empty.
    #[must_use]
    pub fn from_config(config: &SearchConfig, catalog_empty: bool) -> Self {
        let mut families = Vec::with_capacity(3);
        if config.enable_prompt_mutation {
            families.push(MutationFamily::Prompt);
        }
        if config.enable_tool_mutation && !catalog_empty {
            families.push(MutationFamily::Tool);
        }
        if config.enable_topology_mutation {
            families.push(MutationFamily::Topology);
        }
        Self {
            families,
            failure_aware: config.failure_aware_scheduling,
        }
    }

    /// Families this scheduler rotates through.
    #[must_use]
    pub fn families(&self) -> &[MutationFamily] {
        &self.families
    }

    /// Family for one expansion, `None` when nothing is enabled.
    pub fn choose<G: Rng>(
        &self,
        round: usize,
        expansion: usize,
        dominant_failure: Option<FailureCategory>,
        rng: &mut G,
    ) -> Option<MutationFamily> {
        if self.families.is_empty() {
            return None;
        }

        if self.failure_aware {
            if let Some(category) = dominant_failure {
                let family = implicated_family(category);
                if self.families.contains(&family) && rng.gen_bool(FAILURE_BIAS) {
                    return Some(family);
                }
            }
        }

        Some(self.families[(round + expansion) % self.families.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_round_robin_over_enabled_families() {
        let config = SearchConfig {
            failure_aware_scheduling: false,
            ..SearchConfig::default()
        };
        let scheduler = FamilyScheduler::from_config(&config, false);
        let mut rng = StdRng::seed_from_u64(1);
        let chosen: Vec<_> = (0..4)
            .map(|e| scheduler.choose(1, e, None, &mut rng).unwrap())
            .collect();
        assert_eq!(
            chosen,
            vec![
                MutationFamily::Tool,
                MutationFamily::Topology,
                MutationFamily::Prompt,
                MutationFamily::Tool
            ]
        );
    }

    #[test]
    fn test_empty_catalog_drops_tool_family() {
        let scheduler = FamilyScheduler::from_config(&SearchConfig::default(), true);
        assert_eq!(
            scheduler.families(),
            &[MutationFamily::Prompt, MutationFamily::Topology]
        );
    }

    #[test]
    fn test_failure_signal_biases_choice() {
        let scheduler = FamilyScheduler::from_config(&SearchConfig::default(), false);
        let mut rng = StdRng::seed_from_u64(7);
        let tool_picks = (0..200)
            .filter(|i| {
                scheduler.choose(*i, 1, Some(FailureCategory::ToolSelection), &mut rng)
                    == Some(MutationFamily::Tool)
            })
            .count();
        // 0.6 from the bias plus a third of the remainder from the rotation
        assert!(tool_picks > 110, "tool chosen {tool_picks} times");
    }

    #[test]
    fn test_disabled_implicated_family_falls_back_to_rotation() {
        let config = SearchConfig {
            enable_topology_mutation: false,
            ..SearchConfig::default()
        };
        let scheduler = FamilyScheduler::from_config(&config, false);
        let mut rng = StdRng::seed_from_u64(3);
        for round in 0..20 {
            let family = scheduler
                .choose(round, 0, Some(FailureCategory::Decomposition), &mut rng)
                .unwrap();
            assert_ne!(family, MutationFamily::Topology);
        }
    }

    #[test]
    fn test_nothing_enabled() {
        let config = SearchConfig {
            enable_prompt_mutation: false,
            enable_topology_mutation: false,
            ..SearchConfig::default()
        };
        let scheduler = FamilyScheduler::from_config(&config, true);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(scheduler.choose(0, 0, None, &mut rng).is_none());
    }
}
