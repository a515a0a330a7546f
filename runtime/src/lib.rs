//! # Flowforge Runtime
//!
//! Workflow runtimes and the resilience plumbing around them.
//!
//! - [`mock::MockRuntime`]: deterministic in-process runtime for dry runs and tests
//! - [`external::ExternalRuntime`]: HTTP adapter guarded by a [`circuit_breaker::CircuitBreaker`]
//! - [`backend::RuntimeBackend`]: picks one of the above from configuration
//! - [`retry`]: exponential backoff for transient runtime failures
//! - [`render`]: the JSON workflow document shared by execution and materialization
//! - [`metrics`]: Prometheus recorders for case, judge, and search activity

pub mod backend;
pub mod circuit_breaker;
pub mod external;
pub mod metrics;
pub mod mock;
pub mod render;
pub mod retry;

pub use backend::RuntimeBackend;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use external::ExternalRuntime;
pub use mock::MockRuntime;
pub use retry::{Retried, RetryPolicy, retry_with_predicate};
