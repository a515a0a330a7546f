//! Upper-confidence selection with a structural novelty bonus.
//!
//! ```text
//! ucb(n)     = mean_value(n) + c * sqrt(ln(visits(parent)) / visits(n)) + novelty(n)
//! novelty(n) = w_novelty * (distinct structural mutations / lineage length
//!                           + 0.5 if the topology differs from the root's)
//! ```
//!
//! The root uses its own visit count in place of the parent's.

use crate::tree::{NodeId, SearchNode, SearchTree};
use flowforge_core::config::SearchConfig;
use std::collections::HashSet;

/// Bonus for a node whose topology differs from the root's.
const TOPOLOGY_SHIFT_BONUS: f64 = 0.5;

/// Novelty bonus of `node` relative to the tree root.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn novelty_bonus(tree: &SearchTree, node: &SearchNode, novelty_weight: f64) -> f64 {
    let lineage = node.blueprint.lineage();
    let structural = if lineage.is_empty() {
        0.0
    } else {
        let distinct: HashSet<String> = lineage
            .iter()
            .filter(|m| m.is_structural())
            .map(ToString::to_string)
            .collect();
        distinct.len() as f64 / lineage.len() as f64
    };

    let shifted = tree
        .root()
        .is_some_and(|root| root.blueprint.topology() != node.blueprint.topology());

    novelty_weight * (structural + if shifted { TOPOLOGY_SHIFT_BONUS } else { 0.0 })
}

/// UCB score of `node`.
#[must_use]
pub fn ucb_score(tree: &SearchTree, node: &SearchNode, config: &SearchConfig) -> f64 {
    let parent_visits = node
        .parent
        .and_then(|parent| tree.get(parent))
        .map_or(node.visits, |parent| parent.visits);
    let visits = f64::from(node.visits.max(1));
    let exploration =
        config.exploration_weight * (f64::from(parent_visits.max(1)).ln() / visits).sqrt();

    node.mean_value() + exploration + novelty_bonus(tree, node, config.novelty_weight)
}

/// Pick the node to expand next.
///
/// Nodes with `max_children` children are not eligible. Ties go to the
/// lowest node id. Returns `None` when no node is eligible.
#[must_use]
pub fn select(tree: &SearchTree, config: &SearchConfig) -> Option<NodeId> {
    let mut best: Option<(NodeId, f64)> = None;
    for node in tree.nodes() {
        if node.children.len() >= config.max_children {
            continue;
        }
        let score = ucb_score(tree, node, config);
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((node.id, score));
        }
    }
    best.map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowforge_core::blueprint::TopologyMode;
    use flowforge_core::dataset::Split;
    use flowforge_core::objective::ObjectiveWeights;
    use flowforge_core::summary::EvaluationSummary;
    use flowforge_core::trace::Mutation;
    use flowforge_evaluation::summarize;
    use flowforge_core::blueprint::WorkflowBlueprint;
    use flowforge_testing::{sample_blueprint, sample_catalog};

    fn summary(blueprint: &WorkflowBlueprint) -> EvaluationSummary {
        summarize(blueprint, Split::Train, Vec::new(), &ObjectiveWeights::default(), 0.5, 0.6)
    }

    fn derived(parent: &WorkflowBlueprint, id: &str, mutation: Mutation) -> WorkflowBlueprint {
        let mut parts = parent.to_parts();
        parts.id = id.to_string();
        parts.parent_id = Some(parent.id().to_string());
        if let Mutation::TopologySwitch { to, .. } = &mutation {
            parts.topology = *to;
        }
        parts.lineage.push(mutation);
        WorkflowBlueprint::new(parts).unwrap()
    }

    fn config() -> SearchConfig {
        SearchConfig {
            exploration_weight: 1.0,
            novelty_weight: 0.0,
            ..SearchConfig::default()
        }
    }

    #[test]
    fn test_root_selected_when_alone() {
        let bp = sample_blueprint(&sample_catalog());
        let mut tree = SearchTree::new();
        let root = tree.insert_root(bp.clone(), summary(&bp), summary(&bp));
        tree.backpropagate(root, 0.5);
        assert_eq!(select(&tree, &config()), Some(0));
    }

    #[test]
    fn test_ties_go_to_lowest_id() {
        let bp = sample_blueprint(&sample_catalog());
        let mut tree = SearchTree::new();
        let root = tree.insert_root(bp.clone(), summary(&bp), summary(&bp));
        tree.backpropagate(root, 0.5);
        for id in ["bp-0001", "bp-0002"] {
            let child_bp = derived(&bp, id, Mutation::ToolNoop);
            let child = tree
                .add_child(root, child_bp.clone(), Mutation::ToolNoop, summary(&child_bp), summary(&child_bp))
                .unwrap();
            tree.backpropagate(child, 0.5);
        }
        let config = SearchConfig {
            max_children: 2,
            ..config()
        };
        assert_eq!(select(&tree, &config), Some(1));
    }

    #[test]
    fn test_full_nodes_are_skipped() {
        let bp = sample_blueprint(&sample_catalog());
        let mut tree = SearchTree::new();
        tree.insert_root(bp.clone(), summary(&bp), summary(&bp));
        let config = SearchConfig {
            max_children: 1,
            ..config()
        };
        tree.add_child(0, bp.clone(), Mutation::ToolNoop, summary(&bp), summary(&bp))
            .unwrap();
        tree.add_child(1, bp.clone(), Mutation::ToolNoop, summary(&bp), summary(&bp))
            .unwrap();
        assert_eq!(select(&tree, &config), Some(2));
    }

    #[test]
    fn test_novelty_rewards_topology_shift() {
        let bp = sample_blueprint(&sample_catalog());
        let mut tree = SearchTree::new();
        tree.insert_root(bp.clone(), summary(&bp), summary(&bp));

        let switch = Mutation::TopologySwitch {
            from: TopologyMode::PlannerWorkerReviewer,
            to: TopologyMode::RouterParallel,
        };
        let shifted = derived(&bp, "bp-0001", switch.clone());
        let prompt = Mutation::PromptRewrite {
            operator: "planner".into(),
            variant_id: "pv-0001".into(),
        };
        let rewritten = derived(&bp, "bp-0002", prompt.clone());
        tree.add_child(0, shifted.clone(), switch, summary(&shifted), summary(&shifted));
        tree.add_child(0, rewritten.clone(), prompt, summary(&rewritten), summary(&rewritten));

        let shifted_bonus = novelty_bonus(&tree, tree.get(1).unwrap(), 0.2);
        let prompt_bonus = novelty_bonus(&tree, tree.get(2).unwrap(), 0.2);
        assert!((shifted_bonus - 0.2 * 1.5).abs() < 1e-9);
        assert!(prompt_bonus.abs() < 1e-9);
    }

    #[test]
    fn test_empty_tree_selects_nothing() {
        assert_eq!(select(&SearchTree::new(), &config()), None);
    }
}
