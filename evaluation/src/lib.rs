//! # Flowforge Evaluation
//!
//! Scores a blueprint against dataset cases.
//!
//! - [`judge`]: rule, heuristic, and LLM rubric judges
//! - [`ensemble::JudgeEnsemble`]: concurrent voting and weighted aggregation
//! - [`evaluator::WorkflowEvaluator`]: bounded-concurrency execution with
//!   timeouts, retry, and invalid-case accounting
//! - [`taxonomy`]: failure categories for low-scoring cases
//! - [`reflection`]: textual feedback that drives prompt rewrites
//!
//! ## Example
//!
//! ```no_run
//! use flowforge_core::config::SearchConfig;
//! use flowforge_core::dataset::Split;
//! use flowforge_evaluation::WorkflowEvaluator;
//! use flowforge_runtime::MockRuntime;
//! # async fn demo(
//! #     blueprint: flowforge_core::blueprint::WorkflowBlueprint,
//! #     dataset: flowforge_core::dataset::SyntheticDataset,
//! # ) -> Result<(), flowforge_core::error::ConfigurationError> {
//! let evaluator = WorkflowEvaluator::from_config(MockRuntime::default(), &SearchConfig::default())?;
//! let summaries = evaluator.evaluate(&blueprint, &dataset, &[Split::Train]).await;
//! println!("train objective = {:.3}", summaries[&Split::Train].objective);
//! # Ok(())
//! # }
//! ```

pub mod ensemble;
pub mod evaluator;
pub mod judge;
pub mod reflection;
pub mod taxonomy;
pub mod text;

pub use ensemble::{Aggregate, JudgeEnsemble, Verdict, aggregate_votes};
pub use evaluator::{WorkflowEvaluator, summarize};
pub use judge::{Judge, JudgeError, JudgeRequest, Score};
pub use reflection::{ReflectionFeedback, reflect};
pub use taxonomy::{FailureSeverity, FailureSignal, classify_failure};
