//! # Flowforge Core
//!
//! Core data model and contracts for the flowforge workflow optimizer.
//!
//! This crate provides the types shared by every stage of an optimization run:
//!
//! - **Blueprint**: a candidate agent workflow (operators, tools, topology)
//! - **Dataset**: synthesized cases split into train / validation / test
//! - **Execution**: the record of running one blueprint against one case
//! - **Summary**: split-scoped aggregates and the search objective
//! - **Trace**: append-only search round log entries
//! - **Runtime**: the capability interface of the external execution runtime
//!
//! ## Architecture Principles
//!
//! - Blueprints are immutable; a mutation always builds a new one
//! - Referential integrity is checked at construction, not afterwards
//! - Configuration is validated before any work begins
//! - Case-level failures are values, run-level failures are errors
//!
//! ## Example
//!
//! ```
//! use flowforge_core::blueprint::{build_initial_blueprint, TopologyMode};
//! use flowforge_core::schema::ToolDescriptor;
//!
//! let tools = vec![ToolDescriptor::new("CypherExecutor", ["query", "cypher"], "Run Cypher")];
//! let blueprint = build_initial_blueprint(
//!     "bp-0000",
//!     "demo",
//!     "query accounts by owner",
//!     tools,
//!     TopologyMode::PlannerWorkerReviewer,
//! )?;
//! assert_eq!(blueprint.operators().len(), 3);
//! # Ok::<(), flowforge_core::error::BlueprintError>(())
//! ```

pub mod blueprint;
pub mod cancel;
pub mod config;
pub mod dataset;
pub mod error;
pub mod execution;
pub mod objective;
pub mod profile;
pub mod runtime;
pub mod schema;
pub mod summary;
pub mod trace;

pub use blueprint::{BlueprintParts, Edge, Operator, OperatorRole, TopologyMode, WorkflowBlueprint};
pub use cancel::CancellationFlag;
pub use config::{
    DatasetConfig, Environment, EvaluationConfig, OptimizeConfig, RuntimeConfig, RuntimeKind,
    SearchConfig, SplitRatios,
};
pub use dataset::{Case, CaseLineage, Difficulty, Split, SynthesisReport, SyntheticDataset, TaskIntent};
pub use error::{
    BlueprintError, ConfigurationError, JudgeUnavailable, RuntimeExecutionError, SynthesisError,
};
pub use execution::{CaseExecution, CaseOutcome, JudgeKind, JudgeVote, RuntimeOutput};
pub use objective::{ObjectiveInputs, ObjectiveWeights};
pub use profile::ExperimentProfile;
pub use runtime::{ArtifactHandle, WorkflowRuntime};
pub use schema::{SchemaSnapshot, ToolDescriptor};
pub use summary::{EvaluationSummary, FailureCategory};
pub use trace::{Mutation, MutationFamily, SearchRoundTrace, StopReason};
