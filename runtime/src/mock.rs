//! Deterministic in-process runtime for dry runs and tests.
//!
//! The mock answers from the blueprint's structure alone, so identical inputs
//! always produce identical outputs:
//!
//! - a case whose intent is served by a tool bound to some operator gets an
//!   answer naming the schema terms from the question
//! - an unserved case gets a "missing tool" answer
//! - a hard negative gets an abstention when the blueprint has a verifying
//!   operator or a prompt that mentions "unknown", and a fabricated answer
//!   otherwise
//!
//! Latency and token cost grow with operator and tool counts.

use crate::render;
use async_trait::async_trait;
use flowforge_core::blueprint::WorkflowBlueprint;
use flowforge_core::dataset::{Case, TaskIntent};
use flowforge_core::error::RuntimeExecutionError;
use flowforge_core::execution::RuntimeOutput;
use flowforge_core::runtime::{ArtifactHandle, WorkflowRuntime};
use flowforge_core::schema::{SchemaSnapshot, ToolDescriptor};
use std::path::Path;

/// Fixed schema served by the mock.
#[must_use]
pub fn mock_schema() -> SchemaSnapshot {
    SchemaSnapshot::new(
        ["Person", "Account", "Loan", "Transaction"],
        ["OWNS", "TRANSFERS", "BORROWS", "DEPOSITS_TO"],
    )
}

/// Fixed tool catalog served by the mock.
#[must_use]
pub fn mock_catalog() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new("SchemaGetter", ["schema", "query"], "Read graph schema"),
        ToolDescriptor::new("CypherExecutor", ["query", "cypher"], "Execute Cypher query"),
        ToolDescriptor::new(
            "PageRankExecutor",
            ["analysis", "algorithm", "rank"],
            "Run PageRank analytics",
        ),
        ToolDescriptor::new(
            "KnowledgeBaseRetriever",
            ["qa", "retrieval"],
            "Retrieve external knowledge",
        ),
        ToolDescriptor::new("ImportPlanner", ["import", "etl"], "Plan bulk data import"),
        ToolDescriptor::new("SchemaDesigner", ["modeling", "schema"], "Design graph schema"),
    ]
}

/// Deterministic runtime over a fixed schema and catalog.
#[derive(Debug, Clone)]
pub struct MockRuntime {
    schema: SchemaSnapshot,
    catalog: Vec<ToolDescriptor>,
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new(mock_schema(), mock_catalog())
    }
}

impl MockRuntime {
    /// Mock over a custom schema and catalog.
    #[must_use]
    pub const fn new(schema: SchemaSnapshot, catalog: Vec<ToolDescriptor>) -> Self {
        Self { schema, catalog }
    }

    /// The answer the mock gives for `case` under `blueprint`.
    #[must_use]
    pub fn answer(&self, blueprint: &WorkflowBlueprint, case: &Case) -> String {
        let terms = self.question_terms(&case.question);

        if case.is_hard_negative() {
            if abstains(blueprint) {
                return "UNKNOWN: the schema has no such edge, so the answer cannot be inferred"
                    .to_string();
            }
            return format!(
                "{}: {} has 3 matching records",
                case.intent,
                terms.join(" ")
            );
        }

        match serving_tool(blueprint, case.intent) {
            Some(tool) => format!(
                "{}: {} (evidence from {tool})",
                case.intent,
                terms.join(" ")
            ),
            None => format!(
                "missing tool for {}; best guess about {}",
                case.intent,
                terms.first().copied().unwrap_or("the graph")
            ),
        }
    }

    fn question_terms<'a>(&'a self, question: &str) -> Vec<&'a str> {
        let words: Vec<&str> = question
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .collect();
        self.schema
            .entities
            .iter()
            .chain(self.schema.relations.iter())
            .filter(|term| words.contains(&term.as_str()))
            .map(String::as_str)
            .collect()
    }
}

/// Whether the blueprint refuses to answer unanswerable questions.
fn abstains(blueprint: &WorkflowBlueprint) -> bool {
    blueprint.has_verifier()
        || blueprint
            .operators()
            .iter()
            .any(|op| op.prompt.to_lowercase().contains("unknown"))
}

/// First bound tool whose tags serve `intent`.
fn serving_tool(blueprint: &WorkflowBlueprint, intent: TaskIntent) -> Option<&str> {
    let wanted = intent.capability_tags();
    blueprint
        .operators()
        .iter()
        .flat_map(|op| op.tools.iter())
        .filter_map(|id| blueprint.tools().iter().find(|tool| &tool.id == id))
        .find(|tool| {
            tool.capability_tags
                .iter()
                .any(|tag| wanted.contains(&tag.as_str()))
        })
        .map(|tool| tool.id.as_str())
}

#[allow(clippy::cast_precision_loss)]
fn cost_model(blueprint: &WorkflowBlueprint, output: &str) -> (f64, f64) {
    let operators = blueprint.operators().len() as f64;
    let tools = blueprint.tools().len() as f64;
    let words = output.split_whitespace().count() as f64;
    let latency_ms = 40.0 + 15.0 * operators + 5.0 * tools;
    let token_cost = 0.001 * (words + 20.0 * operators);
    (latency_ms, token_cost)
}

#[async_trait]
impl WorkflowRuntime for MockRuntime {
    async fn fetch_schema_snapshot(&self) -> Result<SchemaSnapshot, RuntimeExecutionError> {
        Ok(self.schema.clone())
    }

    async fn fetch_tool_catalog(&self) -> Result<Vec<ToolDescriptor>, RuntimeExecutionError> {
        Ok(self.catalog.clone())
    }

    async fn execute_case(
        &self,
        blueprint: &WorkflowBlueprint,
        case: &Case,
    ) -> Result<RuntimeOutput, RuntimeExecutionError> {
        let raw_output = self.answer(blueprint, case);
        let (latency_ms, token_cost) = cost_model(blueprint, &raw_output);
        Ok(RuntimeOutput {
            raw_output,
            latency_ms,
            token_cost,
        })
    }

    async fn materialize(
        &self,
        blueprint: &WorkflowBlueprint,
        destination: &Path,
    ) -> Result<ArtifactHandle, RuntimeExecutionError> {
        render::write_artifact(blueprint, destination).await
    }
}
