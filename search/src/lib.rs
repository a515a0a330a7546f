//! # Flowforge Search
//!
//! Tree search over workflow blueprints, and the [`optimize`] entry point
//! that wires synthesis, evaluation, and search together.
//!
//! - [`tree`]: arena-backed search tree with visit statistics
//! - [`select`]: UCB selection with a structural novelty bonus
//! - [`mutation`]: prompt, tool, and topology mutations
//! - [`schedule`]: failure-aware mutation family scheduling
//! - [`prompt`]: prompt rewrite generation and the variant registry
//! - [`tools`]: tool ranking and historical tool gain
//! - [`early_stop`]: patience-based stopping
//! - [`engine`]: the search loop
//!
//! ## Example
//!
//! ```no_run
//! use flowforge_core::cancel::CancellationFlag;
//! use flowforge_core::config::OptimizeConfig;
//! use flowforge_runtime::MockRuntime;
//! use flowforge_search::optimize;
//!
//! # async fn demo() -> Result<(), flowforge_search::OptimizeError> {
//! let result = optimize(
//!     MockRuntime::default(),
//!     "find accounts owned by risky people and rank them",
//!     OptimizeConfig::default(),
//!     42,
//!     &CancellationFlag::new(),
//! )
//! .await?;
//! println!("{} after {} rounds", result.best_blueprint.id(), result.rounds_completed);
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod early_stop;
pub mod engine;
pub mod mutation;
pub mod optimize;
pub mod prompt;
pub mod schedule;
pub mod select;
pub mod tools;
pub mod tree;

pub use context::SearchContext;
pub use early_stop::EarlyStopper;
pub use engine::{SearchEngine, SearchError, SearchOutcome};
pub use mutation::Mutator;
pub use optimize::{OptimizationResult, OptimizeError, OptimizeErrorKind, optimize};
pub use prompt::{PromptOptimizer, PromptVariant, PromptVariantRegistry};
pub use schedule::FamilyScheduler;
pub use select::select;
pub use tools::{ToolGains, ToolSelector};
pub use tree::{NodeId, SearchNode, SearchTree};
