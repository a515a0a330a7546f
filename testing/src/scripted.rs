//! A runtime that answers like [`MockRuntime`] unless a case is scripted.

#![allow(clippy::unwrap_used)] // Poisoned locks only happen after a test already panicked

use async_trait::async_trait;
use flowforge_core::blueprint::WorkflowBlueprint;
use flowforge_core::dataset::Case;
use flowforge_core::error::RuntimeExecutionError;
use flowforge_core::execution::RuntimeOutput;
use flowforge_core::runtime::{ArtifactHandle, WorkflowRuntime};
use flowforge_core::schema::{SchemaSnapshot, ToolDescriptor};
use flowforge_runtime::MockRuntime;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Script {
    Fail(u32),
    FailAlways,
    Malformed,
    Delay(Duration),
    Answer(String),
}

/// Deterministic runtime with per-case failure injection.
///
/// Unscripted cases get the [`MockRuntime`] answer. Call counts are shared
/// between clones so a test can inspect them after handing the runtime over.
///
/// ```
/// use flowforge_testing::ScriptedRuntime;
/// use std::time::Duration;
///
/// let runtime = ScriptedRuntime::default()
///     .fail_times("case-0000", 2)
///     .malformed("case-0001")
///     .delay("case-0002", Duration::from_millis(200));
/// assert_eq!(runtime.total_calls(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedRuntime {
    inner: MockRuntime,
    scripts: HashMap<String, Script>,
    schema_unavailable: bool,
    calls: Arc<RwLock<HashMap<String, u32>>>,
}

impl ScriptedRuntime {
    /// Scripted runtime over a custom schema and catalog.
    #[must_use]
    pub fn new(schema: SchemaSnapshot, catalog: Vec<ToolDescriptor>) -> Self {
        Self {
            inner: MockRuntime::new(schema, catalog),
            ..Self::default()
        }
    }

    /// Fail the first `times` executions of `case_id` with a retryable error.
    #[must_use]
    pub fn fail_times(mut self, case_id: &str, times: u32) -> Self {
        self.scripts.insert(case_id.to_string(), Script::Fail(times));
        self
    }

    /// Fail every execution of `case_id` with a retryable error.
    #[must_use]
    pub fn fail_always(mut self, case_id: &str) -> Self {
        self.scripts.insert(case_id.to_string(), Script::FailAlways);
        self
    }

    /// Answer `case_id` with output that cannot be parsed.
    #[must_use]
    pub fn malformed(mut self, case_id: &str) -> Self {
        self.scripts.insert(case_id.to_string(), Script::Malformed);
        self
    }

    /// Sleep before answering `case_id`.
    #[must_use]
    pub fn delay(mut self, case_id: &str, delay: Duration) -> Self {
        self.scripts.insert(case_id.to_string(), Script::Delay(delay));
        self
    }

    /// Answer `case_id` with fixed text.
    #[must_use]
    pub fn answer(mut self, case_id: &str, text: impl Into<String>) -> Self {
        self.scripts
            .insert(case_id.to_string(), Script::Answer(text.into()));
        self
    }

    /// Make schema fetches fail.
    #[must_use]
    pub const fn schema_unavailable(mut self) -> Self {
        self.schema_unavailable = true;
        self
    }

    /// Executions of `case_id` so far, including failed ones.
    ///
    /// # Panics
    ///
    /// Panics if the call counter lock is poisoned.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn calls(&self, case_id: &str) -> u32 {
        self.calls.read().unwrap().get(case_id).copied().unwrap_or(0)
    }

    /// Executions across all cases.
    ///
    /// # Panics
    ///
    /// Panics if the call counter lock is poisoned.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn total_calls(&self) -> u32 {
        self.calls.read().unwrap().values().sum()
    }

    #[allow(clippy::unwrap_used)]
    fn record_call(&self, case_id: &str) -> u32 {
        let mut calls = self.calls.write().unwrap();
        let count = calls.entry(case_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}

#[async_trait]
impl WorkflowRuntime for ScriptedRuntime {
    async fn fetch_schema_snapshot(&self) -> Result<SchemaSnapshot, RuntimeExecutionError> {
        if self.schema_unavailable {
            return Err(RuntimeExecutionError::Invocation(
                "scripted schema outage".to_string(),
            ));
        }
        self.inner.fetch_schema_snapshot().await
    }

    async fn fetch_tool_catalog(&self) -> Result<Vec<ToolDescriptor>, RuntimeExecutionError> {
        self.inner.fetch_tool_catalog().await
    }

    async fn execute_case(
        &self,
        blueprint: &WorkflowBlueprint,
        case: &Case,
    ) -> Result<RuntimeOutput, RuntimeExecutionError> {
        let attempt = self.record_call(&case.id);
        match self.scripts.get(&case.id) {
            Some(Script::Fail(times)) if attempt <= *times => Err(
                RuntimeExecutionError::Invocation(format!("scripted failure #{attempt} for {}", case.id)),
            ),
            Some(Script::FailAlways) => Err(RuntimeExecutionError::Invocation(format!(
                "scripted failure #{attempt} for {}",
                case.id
            ))),
            Some(Script::Malformed) => Err(RuntimeExecutionError::MalformedOutput(format!(
                "scripted garbage for {}",
                case.id
            ))),
            Some(Script::Delay(delay)) => {
                tokio::time::sleep(*delay).await;
                self.inner.execute_case(blueprint, case).await
            }
            Some(Script::Answer(text)) => Ok(RuntimeOutput {
                raw_output: text.clone(),
                latency_ms: 50.0,
                token_cost: 0.01,
            }),
            _ => self.inner.execute_case(blueprint, case).await,
        }
    }

    async fn materialize(
        &self,
        blueprint: &WorkflowBlueprint,
        destination: &Path,
    ) -> Result<ArtifactHandle, RuntimeExecutionError> {
        self.inner.materialize(blueprint, destination).await
    }
}
