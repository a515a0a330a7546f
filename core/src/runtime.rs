//! Capability interface of the external execution runtime.
//!
//! The optimizer never runs workflows itself. Every call that reaches outside
//! the process goes through [`WorkflowRuntime`], and every failure is a typed
//! [`RuntimeExecutionError`] rather than a panic.

use crate::blueprint::WorkflowBlueprint;
use crate::dataset::Case;
use crate::error::RuntimeExecutionError;
use crate::execution::RuntimeOutput;
use crate::schema::{SchemaSnapshot, ToolDescriptor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where and how a blueprint was materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHandle {
    /// Blueprint that was rendered
    pub blueprint_id: String,
    /// File written
    pub path: PathBuf,
    /// Document format (e.g. `json`)
    pub format: String,
    /// Bytes written
    pub bytes: usize,
}

/// The runtime collaborator consumed by synthesis, evaluation, and finalization.
#[async_trait]
pub trait WorkflowRuntime: Send + Sync {
    /// Snapshot of queryable entity and relation types.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeExecutionError`] if the runtime cannot be reached or
    /// answers with an unreadable schema.
    async fn fetch_schema_snapshot(&self) -> Result<SchemaSnapshot, RuntimeExecutionError>;

    /// Inventory of invocable tools.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeExecutionError`] if the catalog cannot be fetched.
    async fn fetch_tool_catalog(&self) -> Result<Vec<ToolDescriptor>, RuntimeExecutionError>;

    /// Run `blueprint` against one case.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeExecutionError::Timeout`], [`RuntimeExecutionError::Invocation`],
    /// or [`RuntimeExecutionError::MalformedOutput`] depending on how the call failed.
    async fn execute_case(
        &self,
        blueprint: &WorkflowBlueprint,
        case: &Case,
    ) -> Result<RuntimeOutput, RuntimeExecutionError>;

    /// Render `blueprint` into the runtime's native format under `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeExecutionError::Invocation`] if the artifact cannot be written.
    async fn materialize(
        &self,
        blueprint: &WorkflowBlueprint,
        destination: &Path,
    ) -> Result<ArtifactHandle, RuntimeExecutionError>;
}

#[async_trait]
impl<R: WorkflowRuntime + ?Sized> WorkflowRuntime for Arc<R> {
    async fn fetch_schema_snapshot(&self) -> Result<SchemaSnapshot, RuntimeExecutionError> {
        (**self).fetch_schema_snapshot().await
    }

    async fn fetch_tool_catalog(&self) -> Result<Vec<ToolDescriptor>, RuntimeExecutionError> {
        (**self).fetch_tool_catalog().await
    }

    async fn execute_case(
        &self,
        blueprint: &WorkflowBlueprint,
        case: &Case,
    ) -> Result<RuntimeOutput, RuntimeExecutionError> {
        (**self).execute_case(blueprint, case).await
    }

    async fn materialize(
        &self,
        blueprint: &WorkflowBlueprint,
        destination: &Path,
    ) -> Result<ArtifactHandle, RuntimeExecutionError> {
        (**self).materialize(blueprint, destination).await
    }
}
