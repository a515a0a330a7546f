//! Blueprint rendering into the runtime's JSON workflow document.
//!
//! The same document is used as the body of external execution requests and
//! as the artifact written by `materialize`.

use flowforge_core::blueprint::WorkflowBlueprint;
use flowforge_core::error::RuntimeExecutionError;
use flowforge_core::runtime::ArtifactHandle;
use serde_json::{Value, json};
use std::path::Path;

/// Version stamped on rendered documents.
pub const DOCUMENT_VERSION: &str = "0.1.0";

/// File name used for materialized workflows.
pub const ARTIFACT_FILE: &str = "workflow.json";

/// Render a blueprint into the runtime workflow document.
#[must_use]
pub fn render_blueprint(blueprint: &WorkflowBlueprint) -> Value {
    let tools: Vec<Value> = blueprint
        .tools()
        .iter()
        .map(|tool| {
            json!({
                "name": tool.id,
                "desc": tool.description,
                "tags": tool.capability_tags,
            })
        })
        .collect();

    let operators: Vec<Value> = blueprint
        .operators()
        .iter()
        .map(|op| {
            json!({
                "name": op.name,
                "role": op.role,
                "instruction": op.prompt,
                "output_schema": op.output_schema,
                "tools": op.tools,
            })
        })
        .collect();

    let edges: Vec<Value> = blueprint
        .edges()
        .iter()
        .map(|edge| json!([edge.from, edge.to]))
        .collect();

    let lineage: Vec<String> = blueprint.lineage().iter().map(ToString::to_string).collect();

    json!({
        "app": {
            "name": blueprint.app_name(),
            "desc": blueprint.task_description(),
            "version": DOCUMENT_VERSION,
        },
        "blueprint": {
            "id": blueprint.id(),
            "parent": blueprint.parent_id(),
            "lineage": lineage,
        },
        "tools": tools,
        "operators": operators,
        "topology": {
            "mode": blueprint.topology(),
            "edges": edges,
        },
    })
}

/// Write the rendered blueprint to `destination/workflow.json`.
///
/// # Errors
///
/// Returns [`RuntimeExecutionError::Invocation`] if the directory or file
/// cannot be written.
pub async fn write_artifact(
    blueprint: &WorkflowBlueprint,
    destination: &Path,
) -> Result<ArtifactHandle, RuntimeExecutionError> {
    let document = serde_json::to_vec_pretty(&render_blueprint(blueprint))
        .map_err(|e| RuntimeExecutionError::Invocation(format!("render failed: {e}")))?;

    tokio::fs::create_dir_all(destination)
        .await
        .map_err(|e| RuntimeExecutionError::Invocation(format!("{}: {e}", destination.display())))?;

    let path = destination.join(ARTIFACT_FILE);
    tokio::fs::write(&path, &document)
        .await
        .map_err(|e| RuntimeExecutionError::Invocation(format!("{}: {e}", path.display())))?;

    tracing::info!(blueprint = blueprint.id(), path = %path.display(), "Materialized workflow");

    Ok(ArtifactHandle {
        blueprint_id: blueprint.id().to_string(),
        path,
        format: "json".to_string(),
        bytes: document.len(),
    })
}
