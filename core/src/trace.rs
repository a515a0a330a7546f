//! Mutations and the append-only search round log.

use crate::blueprint::TopologyMode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three mutation families the search can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationFamily {
    /// Rewrite one operator's prompt
    Prompt,
    /// Add or remove a tool
    Tool,
    /// Switch topology mode
    Topology,
}

impl MutationFamily {
    /// Stable name used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Tool => "tool",
            Self::Topology => "topology",
        }
    }
}

impl fmt::Display for MutationFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single change that derived a blueprint from its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    /// An operator's prompt was replaced by an optimized variant
    PromptRewrite {
        /// Target operator
        operator: String,
        /// Registered prompt variant id
        variant_id: String,
    },
    /// A catalog tool was added and bound to an operator
    ToolAdd {
        /// Added tool id
        tool: String,
        /// Operator the tool was bound to
        operator: String,
    },
    /// A tool was removed from the tool set and every operator
    ToolRemove {
        /// Removed tool id
        tool: String,
    },
    /// No tool change was possible
    ToolNoop,
    /// The topology was switched and operators remapped
    TopologySwitch {
        /// Previous mode
        from: TopologyMode,
        /// New mode
        to: TopologyMode,
    },
}

impl Mutation {
    /// Family this mutation belongs to.
    #[must_use]
    pub const fn family(&self) -> MutationFamily {
        match self {
            Self::PromptRewrite { .. } => MutationFamily::Prompt,
            Self::ToolAdd { .. } | Self::ToolRemove { .. } | Self::ToolNoop => {
                MutationFamily::Tool
            }
            Self::TopologySwitch { .. } => MutationFamily::Topology,
        }
    }

    /// Whether the mutation changes structure (tool set or topology).
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::ToolAdd { .. } | Self::ToolRemove { .. } | Self::TopologySwitch { .. }
        )
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PromptRewrite {
                operator,
                variant_id,
            } => write!(f, "prompt:rewrite({operator},{variant_id})"),
            Self::ToolAdd { tool, operator } => write!(f, "tool:add({tool}->{operator})"),
            Self::ToolRemove { tool } => write!(f, "tool:remove({tool})"),
            Self::ToolNoop => f.write_str("tool:noop"),
            Self::TopologySwitch { from, to } => write!(f, "topology:switch({from}->{to})"),
        }
    }
}

/// Why a search run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// No qualifying improvement for `patience` consecutive rounds
    EarlyStopped,
    /// Every configured round ran
    BudgetExhausted,
    /// External cancellation observed at a round boundary
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EarlyStopped => "early_stopped",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Cancelled => "cancelled",
        })
    }
}

/// One expansion of the search, appended after its evaluation completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRoundTrace {
    /// Round index, starting at 1
    pub round: usize,
    /// Expansion index within the round, starting at 0
    pub expansion: usize,
    /// Node chosen by selection
    pub selected_node: usize,
    /// Blueprint id of the selected node
    pub selected_blueprint: String,
    /// Node created by this expansion
    pub child_node: usize,
    /// Blueprint id of the new child
    pub child_blueprint: String,
    /// Mutation that produced the child
    pub mutation: Mutation,
    /// Child objective on train
    pub train_objective: f64,
    /// Child objective on validation (train when holdout is disabled)
    pub val_objective: f64,
    /// Child model-selection score
    pub selection_score: f64,
    /// Best train objective seen so far, including this child
    pub best_train_objective: f64,
    /// Best model-selection score after this expansion
    pub best_selection_score: f64,
    /// Child selection score minus the previous best (may be negative)
    pub improvement: f64,
    /// Gap to the maintained best; zero exactly when the child became best
    pub regret: f64,
    /// Uncertainty of the child's validation summary
    pub uncertainty: f64,
    /// max(0, train score − validation score)
    pub generalization_gap: f64,
    /// Whether the child became the new best
    pub became_best: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_display() {
        let m = Mutation::ToolAdd {
            tool: "PageRankExecutor".into(),
            operator: "worker".into(),
        };
        assert_eq!(m.to_string(), "tool:add(PageRankExecutor->worker)");
        assert_eq!(
            Mutation::TopologySwitch {
                from: TopologyMode::Linear,
                to: TopologyMode::RouterParallel,
            }
            .to_string(),
            "topology:switch(linear->router_parallel)"
        );
    }

    #[test]
    fn test_mutation_family_and_structure() {
        let prompt = Mutation::PromptRewrite {
            operator: "solver".into(),
            variant_id: "pv-0001".into(),
        };
        assert_eq!(prompt.family(), MutationFamily::Prompt);
        assert!(!prompt.is_structural());
        assert!(!Mutation::ToolNoop.is_structural());
        assert!(Mutation::ToolRemove { tool: "x".into() }.is_structural());
    }

    #[test]
    fn test_mutation_serde_tagged() {
        let m = Mutation::ToolRemove { tool: "x".into() };
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"kind":"tool_remove","tool":"x"}"#);
    }
}
