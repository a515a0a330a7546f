//! Arena-backed search tree.
//!
//! Nodes live in a `Vec` indexed by [`NodeId`]. A node stores its parent as
//! an index and its children as an index list, so ancestor updates never
//! need shared ownership. Nodes are never removed.

use flowforge_core::blueprint::WorkflowBlueprint;
use flowforge_core::summary::EvaluationSummary;
use flowforge_core::trace::Mutation;

/// Index of a node in its tree.
pub type NodeId = usize;

/// One blueprint in the tree with its evaluation and visit statistics.
#[derive(Debug, Clone)]
pub struct SearchNode {
    /// Position in the arena
    pub id: NodeId,
    /// Candidate blueprint
    pub blueprint: WorkflowBlueprint,
    /// Parent node, `None` for the root
    pub parent: Option<NodeId>,
    /// Child nodes in creation order
    pub children: Vec<NodeId>,
    /// Mutation that produced this node, `None` for the root
    pub mutation: Option<Mutation>,
    /// Backpropagation count
    pub visits: u32,
    /// Sum of backpropagated train objectives
    pub value_sum: f64,
    /// Train split summary
    pub train: EvaluationSummary,
    /// Validation split summary (the train summary when holdout is off)
    pub validation: EvaluationSummary,
}

impl SearchNode {
    /// Mean backpropagated value, 0 before the first visit.
    #[must_use]
    pub fn mean_value(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.value_sum / f64::from(self.visits)
        }
    }
}

/// The search tree. Owns every node.
#[derive(Debug, Clone, Default)]
pub struct SearchTree {
    nodes: Vec<SearchNode>,
}

impl SearchTree {
    /// Empty tree.
    #[must_use]
    pub const fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Insert the root. Replaces nothing: the root is always node 0.
    pub fn insert_root(
        &mut self,
        blueprint: WorkflowBlueprint,
        train: EvaluationSummary,
        validation: EvaluationSummary,
    ) -> NodeId {
        self.nodes.clear();
        self.push(blueprint, None, None, train, validation)
    }

    /// Add a child under `parent`.
    ///
    /// Returns `None` if `parent` does not exist.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        blueprint: WorkflowBlueprint,
        mutation: Mutation,
        train: EvaluationSummary,
        validation: EvaluationSummary,
    ) -> Option<NodeId> {
        if parent >= self.nodes.len() {
            return None;
        }
        let id = self.push(blueprint, Some(parent), Some(mutation), train, validation);
        self.nodes[parent].children.push(id);
        Some(id)
    }

    fn push(
        &mut self,
        blueprint: WorkflowBlueprint,
        parent: Option<NodeId>,
        mutation: Option<Mutation>,
        train: EvaluationSummary,
        validation: EvaluationSummary,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(SearchNode {
            id,
            blueprint,
            parent,
            children: Vec::new(),
            mutation,
            visits: 0,
            value_sum: 0.0,
            train,
            validation,
        });
        id
    }

    /// Add `reward` to `node` and every ancestor, incrementing visits.
    pub fn backpropagate(&mut self, node: NodeId, reward: f64) {
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            let Some(current) = self.nodes.get_mut(id) else {
                return;
            };
            current.visits += 1;
            current.value_sum += reward;
            cursor = current.parent;
        }
    }

    /// Ids from `node` up to the root, `node` first.
    #[must_use]
    pub fn path_to_root(&self, node: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut cursor = self.nodes.get(node).map(|n| n.id);
        while let Some(id) = cursor {
            path.push(id);
            cursor = self.nodes[id].parent;
        }
        path
    }

    /// Look up a node.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&SearchNode> {
        self.nodes.get(id)
    }

    /// The root, if inserted.
    #[must_use]
    pub fn root(&self) -> Option<&SearchNode> {
        self.nodes.first()
    }

    /// All nodes in id order.
    #[must_use]
    pub fn nodes(&self) -> &[SearchNode] {
        &self.nodes
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the root has not been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowforge_core::dataset::Split;
    use flowforge_core::objective::ObjectiveWeights;
    use flowforge_evaluation::summarize;
    use flowforge_testing::{sample_blueprint, sample_catalog};

    fn summary(blueprint: &WorkflowBlueprint) -> EvaluationSummary {
        summarize(blueprint, Split::Train, Vec::new(), &ObjectiveWeights::default(), 0.5, 0.6)
    }

    fn tree_with_chain() -> SearchTree {
        let bp = sample_blueprint(&sample_catalog());
        let mut tree = SearchTree::new();
        let root = tree.insert_root(bp.clone(), summary(&bp), summary(&bp));
        tree.backpropagate(root, 0.4);
        let child = tree
            .add_child(root, bp.clone(), Mutation::ToolNoop, summary(&bp), summary(&bp))
            .unwrap();
        tree.backpropagate(child, 0.6);
        let grandchild = tree
            .add_child(child, bp.clone(), Mutation::ToolNoop, summary(&bp), summary(&bp))
            .unwrap();
        tree.backpropagate(grandchild, 0.8);
        tree
    }

    #[test]
    fn test_backpropagate_updates_ancestors() {
        let tree = tree_with_chain();
        let root = tree.root().unwrap();
        assert_eq!(root.visits, 3);
        assert!((root.mean_value() - 0.6).abs() < 1e-9);
        assert_eq!(tree.get(1).unwrap().visits, 2);
        assert_eq!(tree.get(2).unwrap().visits, 1);
    }

    #[test]
    fn test_path_to_root() {
        let tree = tree_with_chain();
        assert_eq!(tree.path_to_root(2), vec![2, 1, 0]);
        assert!(tree.path_to_root(9).is_empty());
    }

    #[test]
    fn test_add_child_to_missing_parent() {
        let mut tree = tree_with_chain();
        let bp = sample_blueprint(&sample_catalog());
        assert!(
            tree.add_child(7, bp.clone(), Mutation::ToolNoop, summary(&bp), summary(&bp))
                .is_none()
        );
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.get(0).unwrap().children, vec![1]);
    }
}
