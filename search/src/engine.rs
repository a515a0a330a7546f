//! The search loop.
//!
//! A run moves through three phases:
//!
//! 1. **Seeding**: the root is evaluated, inserted, and backpropagated once.
//! 2. **Rounds**: each round selects a node by UCB and expands it up to
//!    `expansions_per_round` times. Every expansion mutates, evaluates,
//!    backpropagates the child's train objective, and appends a trace entry.
//! 3. **Stopping**: after each round the best selection score is fed to the
//!    early stopper. Round 1's best is the baseline, so the root alone never
//!    counts as a round. Cancellation is checked at round boundaries.
//!
//! Train objectives drive backpropagation; only validation-based selection
//! scores decide the best node. The test split is never touched here.

use crate::context::SearchContext;
use crate::early_stop::EarlyStopper;
use crate::mutation::Mutator;
use crate::prompt::PromptVariantRegistry;
use crate::schedule::FamilyScheduler;
use crate::select::select;
use crate::tools::ToolGains;
use crate::tree::{NodeId, SearchNode, SearchTree};
use flowforge_core::blueprint::WorkflowBlueprint;
use flowforge_core::cancel::CancellationFlag;
use flowforge_core::config::SearchConfig;
use flowforge_core::dataset::{Split, SyntheticDataset, TaskIntent};
use flowforge_core::error::BlueprintError;
use flowforge_core::objective::generalization_gap;
use flowforge_core::runtime::WorkflowRuntime;
use flowforge_core::schema::ToolDescriptor;
use flowforge_core::summary::EvaluationSummary;
use flowforge_core::trace::{Mutation, SearchRoundTrace, StopReason};
use flowforge_evaluation::evaluator::WorkflowEvaluator;
use flowforge_runtime::metrics::SearchMetrics;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that abort a search run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// A mutation produced a blueprint that breaks the referential invariant
    #[error("Mutation produced an invalid blueprint: {0}")]
    Blueprint(#[from] BlueprintError),

    /// There is nothing to backpropagate
    #[error("Dataset has no train cases")]
    EmptyTrainSplit,

    /// The outcome names a best node the tree does not hold
    #[error("Search finished without a best node")]
    MissingBest,
}

/// Everything a finished search run produced.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// The full tree
    pub tree: SearchTree,
    /// Node with the highest selection score
    pub best_node: NodeId,
    /// Selection score of the best node
    pub best_selection_score: f64,
    /// One entry per expansion, in order
    pub traces: Vec<SearchRoundTrace>,
    /// Why the run ended
    pub stop_reason: StopReason,
    /// Rounds that ran to completion
    pub rounds_completed: usize,
    /// Final historical tool gains
    pub tool_gains: ToolGains,
    /// Every prompt variant generated
    pub prompt_variants: PromptVariantRegistry,
}

impl SearchOutcome {
    /// The best node.
    #[must_use]
    pub fn best(&self) -> Option<&SearchNode> {
        self.tree.get(self.best_node)
    }
}

#[derive(Debug, Clone, Copy)]
struct Best {
    node: NodeId,
    selection: f64,
}

/// Drives one search over a dataset.
#[derive(Debug, Clone)]
pub struct SearchEngine<R> {
    evaluator: WorkflowEvaluator<R>,
    config: SearchConfig,
    seed: u64,
}

impl<R: WorkflowRuntime> SearchEngine<R> {
    /// Create an engine. `config` is expected to be validated.
    #[must_use]
    pub const fn new(evaluator: WorkflowEvaluator<R>, config: SearchConfig, seed: u64) -> Self {
        Self {
            evaluator,
            config,
            seed,
        }
    }

    /// The evaluator used for every split.
    #[must_use]
    pub const fn evaluator(&self) -> &WorkflowEvaluator<R> {
        &self.evaluator
    }

    /// Search configuration.
    #[must_use]
    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run the search from `root`.
    ///
    /// Prompt rewrites and tool ranking use the root's task description.
    /// Train and validation splits are capped to their budgets first. When
    /// holdout is off the train summary stands in for validation.
    ///
    /// # Errors
    ///
    /// - [`SearchError::EmptyTrainSplit`] if the budgeted train split is empty
    /// - [`SearchError::Blueprint`] if a mutation breaks the referential invariant
    pub async fn run(
        &self,
        root: WorkflowBlueprint,
        dataset: &SyntheticDataset,
        intents: &[TaskIntent],
        catalog: &[ToolDescriptor],
        cancel: &CancellationFlag,
    ) -> Result<SearchOutcome, SearchError> {
        let budgets = BTreeMap::from([
            (Split::Train, self.config.train_budget),
            (Split::Validation, self.config.validation_budget),
            (Split::Test, 0),
        ]);
        let dataset = dataset.sliced(&budgets);
        if dataset.split_len(Split::Train) == 0 {
            return Err(SearchError::EmptyTrainSplit);
        }

        let task_description = root.task_description().to_string();
        let mut context = SearchContext::new(self.seed);
        let mutator = Mutator::new(&self.config, &task_description, intents, catalog);
        let scheduler = FamilyScheduler::from_config(&self.config, catalog.is_empty());
        let mut stopper = EarlyStopper::new(self.config.patience, self.config.min_improvement);
        let mut tree = SearchTree::new();
        let mut traces = Vec::new();

        tracing::info!(
            phase = "seeding",
            root = root.id(),
            seed = self.seed,
            train_cases = dataset.split_len(Split::Train),
            validation_cases = dataset.split_len(Split::Validation),
            "Search started"
        );

        let (train, validation) = self.evaluate_candidate(&root, &dataset).await;
        let reward = train.objective;
        let selection = self.selection_score(&train, &validation);
        let root_id = tree.insert_root(root, train, validation);
        tree.backpropagate(root_id, reward);
        let mut best = Best {
            node: root_id,
            selection,
        };
        let mut best_train = reward;
        SearchMetrics::record_best(selection);

        let mut stop_reason = StopReason::BudgetExhausted;
        let mut rounds_completed = 0;

        if scheduler.families().is_empty() {
            tracing::warn!("No mutation family can run, search ends after seeding");
        } else {
            for round in 1..=self.config.rounds {
                if cancel.is_cancelled() {
                    tracing::info!(round, "Search cancelled");
                    stop_reason = StopReason::Cancelled;
                    break;
                }

                let Some(parent) = select(&tree, &self.config) else {
                    tracing::info!(round, "No expandable node left");
                    break;
                };

                for expansion in 0..self.config.expansions_per_round {
                    let Some(parent_node) = tree.get(parent) else {
                        break;
                    };
                    if parent_node.children.len() >= self.config.max_children {
                        break;
                    }

                    let Some(family) = scheduler.choose(
                        round,
                        expansion,
                        parent_node.train.dominant_failure(),
                        &mut context.rng,
                    ) else {
                        break;
                    };

                    let child_id = context.next_blueprint_id();
                    let (blueprint, mutation) = mutator.apply(
                        family,
                        &parent_node.blueprint,
                        &parent_node.train,
                        child_id,
                        &mut context,
                    )?;
                    let parent_blueprint = parent_node.blueprint.id().to_string();
                    let parent_train_objective = parent_node.train.objective;

                    let (train, validation) = self.evaluate_candidate(&blueprint, &dataset).await;
                    let child_selection = self.selection_score(&train, &validation);
                    let train_objective = train.objective;
                    let val_objective = validation.objective;
                    let uncertainty = validation.uncertainty;
                    let gap = generalization_gap(train.mean_score, validation.mean_score);
                    let child_blueprint = blueprint.id().to_string();

                    let Some(child) =
                        tree.add_child(parent, blueprint, mutation.clone(), train, validation)
                    else {
                        break;
                    };
                    tree.backpropagate(child, train_objective);
                    best_train = best_train.max(train_objective);

                    if self.config.enable_tool_historical_gain {
                        update_tool_gain(
                            &mut context.tool_gains,
                            &mutation,
                            train_objective - parent_train_objective,
                            self.config.tool_gain_decay,
                        );
                    }

                    let improvement = child_selection - best.selection;
                    let became_best = improvement >= self.config.min_improvement;
                    let regret = if became_best {
                        0.0
                    } else {
                        best.selection + self.config.min_improvement - child_selection
                    };
                    if became_best {
                        best = Best {
                            node: child,
                            selection: child_selection,
                        };
                        SearchMetrics::record_best(child_selection);
                    }
                    SearchMetrics::record_expansion(family.as_str());

                    tracing::debug!(
                        round,
                        expansion,
                        parent = %parent_blueprint,
                        child = %child_blueprint,
                        %mutation,
                        train_objective,
                        selection = child_selection,
                        became_best,
                        "Expanded node"
                    );

                    traces.push(SearchRoundTrace {
                        round,
                        expansion,
                        selected_node: parent,
                        selected_blueprint: parent_blueprint,
                        child_node: child,
                        child_blueprint,
                        mutation,
                        train_objective,
                        val_objective,
                        selection_score: child_selection,
                        best_train_objective: best_train,
                        best_selection_score: best.selection,
                        improvement,
                        regret,
                        uncertainty,
                        generalization_gap: gap,
                        became_best,
                    });
                }

                rounds_completed = round;
                tracing::info!(
                    phase = "rounds",
                    round,
                    nodes = tree.len(),
                    best_selection = best.selection,
                    "Round finished"
                );

                if stopper.observe(best.selection) {
                    tracing::info!(
                        round,
                        stalled = stopper.stalled_rounds(),
                        "Search stopped early"
                    );
                    stop_reason = StopReason::EarlyStopped;
                    break;
                }
            }
        }

        tracing::info!(
            phase = "stopping",
            reason = %stop_reason,
            rounds = rounds_completed,
            nodes = tree.len(),
            best = best.node,
            best_selection = best.selection,
            "Search finished"
        );

        Ok(SearchOutcome {
            tree,
            best_node: best.node,
            best_selection_score: best.selection,
            traces,
            stop_reason,
            rounds_completed,
            tool_gains: context.tool_gains,
            prompt_variants: context.prompts,
        })
    }

    async fn evaluate_candidate(
        &self,
        blueprint: &WorkflowBlueprint,
        dataset: &SyntheticDataset,
    ) -> (EvaluationSummary, EvaluationSummary) {
        let train = self
            .evaluator
            .evaluate_cases(blueprint, dataset.split(Split::Train), Split::Train)
            .await;
        let validation = if self.config.use_holdout {
            self.evaluator
                .evaluate_cases(blueprint, dataset.split(Split::Validation), Split::Validation)
                .await
        } else {
            train.clone()
        };
        (train, validation)
    }

    fn selection_score(&self, train: &EvaluationSummary, validation: &EvaluationSummary) -> f64 {
        self.config.objective.selection_score(
            validation.objective,
            train.mean_score,
            validation.mean_score,
        )
    }
}

/// Credit a tool mutation's train-objective change to the tool involved.
///
/// Removing a tool credits the opposite of the change: if the child improved
/// without it, the tool was hurting.
fn update_tool_gain(gains: &mut ToolGains, mutation: &Mutation, improvement: f64, decay: f64) {
    match mutation {
        Mutation::ToolAdd { tool, .. } => gains.update(tool, improvement, decay),
        Mutation::ToolRemove { tool } => gains.update(tool, -improvement, decay),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_gain_credit_direction() {
        let mut gains = ToolGains::default();
        let add = Mutation::ToolAdd {
            tool: "A".into(),
            operator: "worker".into(),
        };
        update_tool_gain(&mut gains, &add, 0.2, 0.5);
        assert!((gains.get("A") - 0.1).abs() < 1e-12);

        update_tool_gain(&mut gains, &Mutation::ToolRemove { tool: "B".into() }, 0.2, 0.5);
        assert!((gains.get("B") + 0.1).abs() < 1e-12);

        update_tool_gain(&mut gains, &Mutation::ToolNoop, 0.2, 0.5);
        assert_eq!(gains.as_map().len(), 2);
    }
}
