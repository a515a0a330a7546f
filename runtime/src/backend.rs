//! Runtime selection from configuration.

use crate::external::ExternalRuntime;
use crate::mock::MockRuntime;
use async_trait::async_trait;
use flowforge_core::blueprint::WorkflowBlueprint;
use flowforge_core::config::{RuntimeConfig, RuntimeKind};
use flowforge_core::dataset::Case;
use flowforge_core::error::RuntimeExecutionError;
use flowforge_core::execution::RuntimeOutput;
use flowforge_core::runtime::{ArtifactHandle, WorkflowRuntime};
use flowforge_core::schema::{SchemaSnapshot, ToolDescriptor};
use std::path::Path;

/// The runtime chosen by [`RuntimeConfig::backend`].
#[derive(Debug, Clone)]
pub enum RuntimeBackend {
    /// Deterministic in-process runtime
    Mock(MockRuntime),
    /// HTTP runtime service
    External(ExternalRuntime),
}

impl RuntimeBackend {
    /// Build the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeExecutionError::Invocation`] if the external client
    /// cannot be built.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, RuntimeExecutionError> {
        match config.backend {
            RuntimeKind::Mock => Ok(Self::Mock(MockRuntime::default())),
            RuntimeKind::External => {
                tracing::info!(base_url = %config.base_url, "Using external runtime");
                ExternalRuntime::new(config).map(Self::External)
            }
        }
    }

    /// Short backend name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mock(_) => "mock",
            Self::External(_) => "external",
        }
    }
}

#[async_trait]
impl WorkflowRuntime for RuntimeBackend {
    async fn fetch_schema_snapshot(&self) -> Result<SchemaSnapshot, RuntimeExecutionError> {
        match self {
            Self::Mock(runtime) => runtime.fetch_schema_snapshot().await,
            Self::External(runtime) => runtime.fetch_schema_snapshot().await,
        }
    }

    async fn fetch_tool_catalog(&self) -> Result<Vec<ToolDescriptor>, RuntimeExecutionError> {
        match self {
            Self::Mock(runtime) => runtime.fetch_tool_catalog().await,
            Self::External(runtime) => runtime.fetch_tool_catalog().await,
        }
    }

    async fn execute_case(
        &self,
        blueprint: &WorkflowBlueprint,
        case: &Case,
    ) -> Result<RuntimeOutput, RuntimeExecutionError> {
        match self {
            Self::Mock(runtime) => runtime.execute_case(blueprint, case).await,
            Self::External(runtime) => runtime.execute_case(blueprint, case).await,
        }
    }

    async fn materialize(
        &self,
        blueprint: &WorkflowBlueprint,
        destination: &Path,
    ) -> Result<ArtifactHandle, RuntimeExecutionError> {
        match self {
            Self::Mock(runtime) => runtime.materialize(blueprint, destination).await,
            Self::External(runtime) => runtime.materialize(blueprint, destination).await,
        }
    }
}
