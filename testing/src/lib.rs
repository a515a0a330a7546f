//! # Flowforge Testing
//!
//! Test support shared by the flowforge crates.
//!
//! - [`ScriptedRuntime`]: the mock runtime plus per-case failure injection
//! - [`fixtures`]: schema, catalog, blueprint, and hand-built dataset fixtures
//! - [`strategies`]: proptest strategies for configurations and scores
//!
//! ## Example
//!
//! ```
//! use flowforge_core::runtime::WorkflowRuntime;
//! use flowforge_testing::{ScriptedRuntime, dataset_fixture, sample_blueprint, sample_catalog};
//!
//! # tokio_run(async {
//! let dataset = dataset_fixture(5);
//! let case = &dataset.cases()[0];
//! let runtime = ScriptedRuntime::default().fail_times(&case.id, 1);
//! let blueprint = sample_blueprint(&sample_catalog());
//!
//! assert!(runtime.execute_case(&blueprint, case).await.is_err());
//! assert!(runtime.execute_case(&blueprint, case).await.is_ok());
//! assert_eq!(runtime.calls(&case.id), 2);
//! # });
//! # fn tokio_run(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f);
//! # }
//! ```

pub mod fixtures;
pub mod scripted;
pub mod strategies;

pub use fixtures::{case_fixture, dataset_fixture, sample_blueprint, sample_catalog, sample_schema};
pub use scripted::ScriptedRuntime;

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
