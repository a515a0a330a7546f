//! The `optimize` entry point.
//!
//! One call runs the whole pipeline against a runtime:
//!
//! ```text
//! config ─► schema + catalog ─► dataset ─► root blueprint ─► search ─► test report
//! ```
//!
//! Configuration is checked before the runtime is touched. The test split is
//! evaluated exactly once, on the final best blueprint, after the search ends.

use crate::context::ROOT_BLUEPRINT_ID;
use crate::engine::{SearchEngine, SearchError};
use crate::prompt::PromptVariant;
use crate::tools::{ToolGains, ToolSelector};
use flowforge_core::blueprint::{WorkflowBlueprint, build_initial_blueprint};
use flowforge_core::cancel::CancellationFlag;
use flowforge_core::config::OptimizeConfig;
use flowforge_core::dataset::{Split, SynthesisReport, TaskIntent};
use flowforge_core::error::{
    BlueprintError, ConfigurationError, RuntimeExecutionError, SynthesisError,
};
use flowforge_core::profile::ExperimentProfile;
use flowforge_core::runtime::{ArtifactHandle, WorkflowRuntime};
use flowforge_core::summary::EvaluationSummary;
use flowforge_core::trace::{SearchRoundTrace, StopReason};
use flowforge_evaluation::evaluator::WorkflowEvaluator;
use flowforge_synthesis::{infer_intents, synthesize};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// What went wrong in an optimization run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizeErrorKind {
    /// Configuration or task rejected before any work began
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The dataset could not be synthesized
    #[error("Dataset synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    /// The runtime's schema or tool catalog could not be fetched
    #[error("Runtime catalog unavailable: {0}")]
    Catalog(RuntimeExecutionError),

    /// The root blueprint could not be built
    #[error("Invalid root blueprint: {0}")]
    Blueprint(#[from] BlueprintError),

    /// The search aborted
    #[error("Search failed: {0}")]
    Search(#[from] SearchError),

    /// The best blueprint could not be rendered
    #[error("Materialization failed: {0}")]
    Materialize(RuntimeExecutionError),
}

/// Run-level failure with enough context to reproduce it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} (seed {seed})")]
pub struct OptimizeError {
    /// What failed
    #[source]
    pub kind: OptimizeErrorKind,
    /// Seed of the failed run
    pub seed: u64,
    /// The run's configuration as JSON
    pub config_snapshot: String,
}

impl OptimizeError {
    fn new(kind: impl Into<OptimizeErrorKind>, seed: u64, config: &OptimizeConfig) -> Self {
        Self {
            kind: kind.into(),
            seed,
            config_snapshot: serde_json::to_string(config).unwrap_or_default(),
        }
    }
}

/// Everything an optimization run reports.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    /// Seed the run used
    pub seed: u64,
    /// Applied experiment profile, if any
    pub profile: Option<ExperimentProfile>,
    /// Effective configuration after the profile was applied
    pub config: OptimizeConfig,
    /// Dataset synthesis report
    pub dataset_report: SynthesisReport,
    /// Intents inferred from the task
    pub intents: Vec<TaskIntent>,
    /// Best blueprint by validation selection score
    pub best_blueprint: WorkflowBlueprint,
    /// Selection score of the best blueprint
    pub best_selection_score: f64,
    /// Best blueprint on the train split
    pub train_summary: EvaluationSummary,
    /// Best blueprint on the validation split
    pub val_summary: EvaluationSummary,
    /// Best blueprint on the test split; `None` if cancelled or empty
    pub test_summary: Option<EvaluationSummary>,
    /// Whether any reported summary is degraded
    pub degraded: bool,
    /// One entry per expansion
    pub round_traces: Vec<SearchRoundTrace>,
    /// Every generated prompt variant
    pub prompt_variants: Vec<PromptVariant>,
    /// Historical tool gain at the end of the run
    pub tool_gains: ToolGains,
    /// Why the search ended
    pub stop_reason: StopReason,
    /// Completed rounds
    pub rounds_completed: usize,
    /// Nodes in the final tree, root included
    pub nodes_explored: usize,
}

impl OptimizationResult {
    /// Render the best blueprint through `runtime` into `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizeErrorKind::Materialize`] if the runtime cannot write
    /// the artifact.
    pub async fn materialize<R: WorkflowRuntime>(
        &self,
        runtime: &R,
        destination: &Path,
    ) -> Result<ArtifactHandle, OptimizeError> {
        runtime
            .materialize(&self.best_blueprint, destination)
            .await
            .map_err(|e| {
                OptimizeError::new(OptimizeErrorKind::Materialize(e), self.seed, &self.config)
            })
    }
}

/// Optimize a workflow for `task_description`.
///
/// # Errors
///
/// Returns [`OptimizeError`] carrying the seed and configuration when:
///
/// - the configuration, profile, or task is invalid (before any runtime call)
/// - the schema or tool catalog cannot be fetched
/// - the dataset cannot be synthesized
/// - the root blueprint or a mutation breaks the referential invariant
///
/// Case-level runtime and judge failures never fail the run; they show up as
/// invalid cases and degraded summaries.
pub async fn optimize<R: WorkflowRuntime>(
    runtime: R,
    task_description: &str,
    mut config: OptimizeConfig,
    seed: u64,
    cancel: &CancellationFlag,
) -> Result<OptimizationResult, OptimizeError> {
    let profile = config
        .resolve_profile()
        .map_err(|e| OptimizeError::new(e, seed, &config))?;
    config
        .validate()
        .map_err(|e| OptimizeError::new(e, seed, &config))?;
    if task_description.trim().is_empty() {
        return Err(OptimizeError::new(
            ConfigurationError::Invalid("task description must not be empty".to_string()),
            seed,
            &config,
        ));
    }

    tracing::info!(
        seed,
        profile = profile.map_or("none", ExperimentProfile::as_str),
        rounds = config.search.rounds,
        dataset_size = config.dataset.target_size,
        "Optimization started"
    );

    let schema = runtime
        .fetch_schema_snapshot()
        .await
        .map_err(|e| OptimizeError::new(OptimizeErrorKind::Catalog(e), seed, &config))?;
    let catalog = runtime
        .fetch_tool_catalog()
        .await
        .map_err(|e| OptimizeError::new(OptimizeErrorKind::Catalog(e), seed, &config))?;

    let dataset = synthesize(task_description, &schema, &config.dataset, seed)
        .map_err(|e| OptimizeError::new(e, seed, &config))?;
    let intents = infer_intents(task_description, &schema);

    let ranked: Vec<_> = ToolSelector::rank(task_description, &intents, &catalog, None)
        .into_iter()
        .take(config.search.initial_tool_count)
        .collect();
    let root = build_initial_blueprint(
        ROOT_BLUEPRINT_ID,
        config.app_name.clone(),
        task_description,
        ranked,
        config.search.initial_topology,
    )
    .map_err(|e| OptimizeError::new(e, seed, &config))?;

    let evaluator = WorkflowEvaluator::from_config(runtime, &config.search)
        .map_err(|e| OptimizeError::new(e, seed, &config))?;
    let engine = SearchEngine::new(evaluator, config.search.clone(), seed);
    let outcome = engine
        .run(root, &dataset, &intents, &catalog, cancel)
        .await
        .map_err(|e| OptimizeError::new(e, seed, &config))?;

    let Some(best) = outcome.best().cloned() else {
        return Err(OptimizeError::new(SearchError::MissingBest, seed, &config));
    };

    let test_summary = if cancel.is_cancelled() || dataset.split_len(Split::Test) == 0 {
        None
    } else {
        let cases = dataset.split(Split::Test).take(config.search.test_budget);
        Some(
            engine
                .evaluator()
                .evaluate_cases(&best.blueprint, cases, Split::Test)
                .await,
        )
    };

    let degraded = best.train.degraded
        || best.validation.degraded
        || test_summary.as_ref().is_some_and(|summary| summary.degraded);

    tracing::info!(
        seed,
        best = best.blueprint.id(),
        selection = outcome.best_selection_score,
        stop_reason = %outcome.stop_reason,
        nodes = outcome.tree.len(),
        test_score = test_summary.as_ref().map(|s| s.mean_score),
        degraded,
        "Optimization finished"
    );

    Ok(OptimizationResult {
        seed,
        profile,
        dataset_report: dataset.report().clone(),
        intents,
        best_blueprint: best.blueprint,
        best_selection_score: outcome.best_selection_score,
        train_summary: best.train,
        val_summary: best.validation,
        test_summary,
        degraded,
        nodes_explored: outcome.tree.len(),
        round_traces: outcome.traces,
        prompt_variants: outcome.prompt_variants.into_variants(),
        tool_gains: outcome.tool_gains,
        stop_reason: outcome.stop_reason,
        rounds_completed: outcome.rounds_completed,
        config,
    })
}
