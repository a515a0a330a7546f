//! Workflow blueprints: the candidate solutions explored by the search.
//!
//! A blueprint is an ordered set of operators (each with a prompt and a role),
//! a tool set drawn from the catalog, and a topology mode that determines how
//! operators are wired together.
//!
//! Blueprints are immutable. [`WorkflowBlueprint::new`] validates the
//! referential invariant (every operator tool exists in the tool set, every
//! topology edge endpoint exists in the operator set), and mutations produce
//! new blueprints through [`WorkflowBlueprint::to_parts`].

use crate::error::BlueprintError;
use crate::schema::ToolDescriptor;
use crate::trace::Mutation;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// How operators are wired together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyMode {
    /// Operators run in sequence
    Linear,
    /// Planner, then worker, then reviewer
    PlannerWorkerReviewer,
    /// Router fans out to parallel branches, a synthesizer merges them
    RouterParallel,
}

impl TopologyMode {
    /// All topology modes in switch order.
    pub const ALL: [Self; 3] = [
        Self::Linear,
        Self::PlannerWorkerReviewer,
        Self::RouterParallel,
    ];

    /// Stable snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::PlannerWorkerReviewer => "planner_worker_reviewer",
            Self::RouterParallel => "router_parallel",
        }
    }

    /// Structural weight contributed to blueprint complexity.
    #[must_use]
    pub const fn weight(self) -> f64 {
        match self {
            Self::Linear => 0.0,
            Self::PlannerWorkerReviewer => 1.0,
            Self::RouterParallel => 2.0,
        }
    }

    /// The next mode in switch order, wrapping around.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Linear => Self::PlannerWorkerReviewer,
            Self::PlannerWorkerReviewer => Self::RouterParallel,
            Self::RouterParallel => Self::Linear,
        }
    }
}

impl fmt::Display for TopologyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The part an operator plays in its topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorRole {
    /// Single-step solver
    Solver,
    /// Decomposes the task
    Planner,
    /// Executes the plan
    Worker,
    /// Audits and patches the draft answer
    Reviewer,
    /// Classifies and dispatches the request
    Router,
    /// Handles one routed branch
    Branch,
    /// Merges branch outputs
    Synthesizer,
}

impl OperatorRole {
    /// Whether this role checks answers before they leave the workflow.
    #[must_use]
    pub const fn is_verifier(self) -> bool {
        matches!(self, Self::Reviewer | Self::Synthesizer)
    }

    /// Whether this role does the tool-driven work.
    #[must_use]
    pub const fn is_executor(self) -> bool {
        matches!(self, Self::Solver | Self::Worker | Self::Branch)
    }
}

/// One named step of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    /// Unique operator name
    pub name: String,
    /// Role within the topology
    pub role: OperatorRole,
    /// Prompt text (mutable across blueprints, fixed within one)
    pub prompt: String,
    /// Expected output shape
    pub output_schema: String,
    /// Tools this operator's action may call
    pub tools: Vec<String>,
}

impl Operator {
    fn new(
        name: &str,
        role: OperatorRole,
        prompt: &str,
        output_schema: &str,
        tools: &[String],
    ) -> Self {
        Self {
            name: name.to_string(),
            role,
            prompt: prompt.to_string(),
            output_schema: output_schema.to_string(),
            tools: tools.to_vec(),
        }
    }
}

/// A directed wire between two operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Upstream operator name
    pub from: String,
    /// Downstream operator name
    pub to: String,
}

/// Unvalidated blueprint contents, used to construct and derive blueprints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintParts {
    /// Blueprint id
    pub id: String,
    /// Application name
    pub app_name: String,
    /// Task this workflow solves
    pub task_description: String,
    /// Topology mode
    pub topology: TopologyMode,
    /// Ordered operators
    pub operators: Vec<Operator>,
    /// Topology wiring
    pub edges: Vec<Edge>,
    /// Tool set
    pub tools: Vec<ToolDescriptor>,
    /// Parent blueprint id (None for the root)
    pub parent_id: Option<String>,
    /// Mutations applied from the root to reach this blueprint
    pub lineage: Vec<Mutation>,
}

/// An immutable, validated workflow candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BlueprintParts", into = "BlueprintParts")]
pub struct WorkflowBlueprint {
    parts: BlueprintParts,
}

impl WorkflowBlueprint {
    /// Build a blueprint, enforcing the referential invariant.
    ///
    /// # Errors
    ///
    /// Returns [`BlueprintError`] if operators or tools are duplicated, an
    /// operator references a tool outside the tool set, or an edge references
    /// an operator outside the operator set.
    pub fn new(parts: BlueprintParts) -> Result<Self, BlueprintError> {
        validate(&parts)?;
        Ok(Self { parts })
    }

    /// Blueprint id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.parts.id
    }

    /// Application name.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.parts.app_name
    }

    /// Task description.
    #[must_use]
    pub fn task_description(&self) -> &str {
        &self.parts.task_description
    }

    /// Topology mode.
    #[must_use]
    pub const fn topology(&self) -> TopologyMode {
        self.parts.topology
    }

    /// Ordered operators.
    #[must_use]
    pub fn operators(&self) -> &[Operator] {
        &self.parts.operators
    }

    /// Operator by name.
    #[must_use]
    pub fn operator(&self, name: &str) -> Option<&Operator> {
        self.parts.operators.iter().find(|op| op.name == name)
    }

    /// Topology wiring.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.parts.edges
    }

    /// Tool set.
    #[must_use]
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.parts.tools
    }

    /// Whether the tool set contains `tool_id`.
    #[must_use]
    pub fn has_tool(&self, tool_id: &str) -> bool {
        self.parts.tools.iter().any(|tool| tool.id == tool_id)
    }

    /// Parent blueprint id.
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        self.parts.parent_id.as_deref()
    }

    /// Mutations applied from the root.
    #[must_use]
    pub fn lineage(&self) -> &[Mutation] {
        &self.parts.lineage
    }

    /// Whether any operator verifies answers before they are returned.
    #[must_use]
    pub fn has_verifier(&self) -> bool {
        self.parts.operators.iter().any(|op| op.role.is_verifier())
    }

    /// Structural complexity: operators, tools, and topology weight, scaled by 1/10.
    #[must_use]
    pub fn complexity(&self) -> f64 {
        let operators = self.parts.operators.len() as f64;
        let tools = self.parts.tools.len() as f64;
        (operators + tools + self.parts.topology.weight()) / 10.0
    }

    /// Clone the contents for deriving a child blueprint.
    #[must_use]
    pub fn to_parts(&self) -> BlueprintParts {
        self.parts.clone()
    }

    /// Re-check the referential invariant.
    ///
    /// Always passes for a constructed blueprint; property tests use it to
    /// audit every blueprint a mutation produces.
    ///
    /// # Errors
    ///
    /// Returns the first [`BlueprintError`] found.
    pub fn validate(&self) -> Result<(), BlueprintError> {
        validate(&self.parts)
    }
}

impl TryFrom<BlueprintParts> for WorkflowBlueprint {
    type Error = BlueprintError;

    fn try_from(parts: BlueprintParts) -> Result<Self, Self::Error> {
        Self::new(parts)
    }
}

impl From<WorkflowBlueprint> for BlueprintParts {
    fn from(blueprint: WorkflowBlueprint) -> Self {
        blueprint.parts
    }
}

fn validate(parts: &BlueprintParts) -> Result<(), BlueprintError> {
    if parts.operators.is_empty() {
        return Err(BlueprintError::NoOperators);
    }

    let mut tool_ids = HashSet::new();
    for tool in &parts.tools {
        if !tool_ids.insert(tool.id.as_str()) {
            return Err(BlueprintError::DuplicateTool(tool.id.clone()));
        }
    }

    let mut operator_names = HashSet::new();
    for operator in &parts.operators {
        if !operator_names.insert(operator.name.as_str()) {
            return Err(BlueprintError::DuplicateOperator(operator.name.clone()));
        }
        if let Some(tool) = operator.tools.iter().find(|t| !tool_ids.contains(t.as_str())) {
            return Err(BlueprintError::DanglingTool {
                operator: operator.name.clone(),
                tool: tool.clone(),
            });
        }
    }

    for edge in &parts.edges {
        for endpoint in [&edge.from, &edge.to] {
            if !operator_names.contains(endpoint.as_str()) {
                return Err(BlueprintError::DanglingOperator {
                    operator: endpoint.clone(),
                });
            }
        }
    }

    Ok(())
}

/// Wire operators according to a topology mode.
///
/// Linear and planner-worker-reviewer chain operators in order. Router-parallel
/// fans the first operator out to every middle operator and fans those into
/// the last one; with fewer than three operators it degrades to a chain.
#[must_use]
pub fn wire(topology: TopologyMode, operators: &[Operator]) -> Vec<Edge> {
    let edge = |from: &Operator, to: &Operator| Edge {
        from: from.name.clone(),
        to: to.name.clone(),
    };

    match (topology, operators) {
        (TopologyMode::RouterParallel, [router, branches @ .., synthesizer])
            if !branches.is_empty() =>
        {
            branches
                .iter()
                .flat_map(|branch| [edge(router, branch), edge(branch, synthesizer)])
                .collect()
        }
        _ => operators
            .windows(2)
            .map(|pair| edge(&pair[0], &pair[1]))
            .collect(),
    }
}

/// Default operators for a topology, each bound to `seed_tools`.
#[must_use]
pub fn build_topology_operators(topology: TopologyMode, seed_tools: &[String]) -> Vec<Operator> {
    match topology {
        TopologyMode::Linear => vec![Operator::new(
            "solver",
            OperatorRole::Solver,
            "Solve the graph task in as few steps as possible and cite the evidence you used.",
            "answer: concise factual answer",
            seed_tools,
        )],
        TopologyMode::PlannerWorkerReviewer => vec![
            Operator::new(
                "planner",
                OperatorRole::Planner,
                "Plan the graph operations and tools needed before anything is executed.",
                "plan: ordered graph actions",
                seed_tools,
            ),
            Operator::new(
                "worker",
                OperatorRole::Worker,
                "Execute the plan step by step and collect graph evidence.",
                "draft_answer: evidence-backed result",
                seed_tools,
            ),
            Operator::new(
                "reviewer",
                OperatorRole::Reviewer,
                "Audit the draft answer and remove claims the evidence does not support.",
                "final_answer: corrected result",
                seed_tools,
            ),
        ],
        TopologyMode::RouterParallel => vec![
            Operator::new(
                "router",
                OperatorRole::Router,
                "Route the request by intent and required capability.",
                "route: chosen branch",
                seed_tools,
            ),
            Operator::new(
                "query_branch",
                OperatorRole::Branch,
                "Handle lookup requests with strict schema grounding.",
                "query_result: branch output",
                seed_tools,
            ),
            Operator::new(
                "analysis_branch",
                OperatorRole::Branch,
                "Handle analytics requests and state which algorithm produced each figure.",
                "analysis_result: branch output",
                seed_tools,
            ),
            Operator::new(
                "synthesizer",
                OperatorRole::Synthesizer,
                "Merge branch outputs and return a verified final answer.",
                "final_answer: merged result",
                seed_tools,
            ),
        ],
    }
}

/// Number of ranked tools bound to the root operators.
const SEED_TOOL_COUNT: usize = 2;

/// Build the root blueprint from the task and an initial tool ranking.
///
/// Every ranked tool joins the tool set; the top two are bound to the
/// operators of the chosen topology.
///
/// # Errors
///
/// Returns [`BlueprintError::DuplicateTool`] if `ranked_tools` repeats an id.
pub fn build_initial_blueprint(
    id: impl Into<String>,
    app_name: impl Into<String>,
    task_description: impl Into<String>,
    ranked_tools: Vec<ToolDescriptor>,
    topology: TopologyMode,
) -> Result<WorkflowBlueprint, BlueprintError> {
    let seed_tools: Vec<String> = ranked_tools
        .iter()
        .take(SEED_TOOL_COUNT)
        .map(|tool| tool.id.clone())
        .collect();
    let operators = build_topology_operators(topology, &seed_tools);
    let edges = wire(topology, &operators);

    WorkflowBlueprint::new(BlueprintParts {
        id: id.into(),
        app_name: app_name.into(),
        task_description: task_description.into(),
        topology,
        operators,
        edges,
        tools: ranked_tools,
        parent_id: None,
        lineage: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new("SchemaGetter", ["schema"], "Read schema"),
            ToolDescriptor::new("CypherExecutor", ["query"], "Run Cypher"),
            ToolDescriptor::new("PageRankExecutor", ["analysis"], "Run PageRank"),
        ]
    }

    #[test]
    fn test_initial_blueprint_binds_top_two_tools() {
        let bp = build_initial_blueprint("bp-1", "demo", "task", tools(), TopologyMode::Linear)
            .unwrap();
        assert_eq!(bp.tools().len(), 3);
        assert_eq!(bp.operators().len(), 1);
        assert_eq!(
            bp.operators()[0].tools,
            vec!["SchemaGetter".to_string(), "CypherExecutor".to_string()]
        );
        assert!(bp.edges().is_empty());
        assert!(bp.parent_id().is_none());
    }

    #[test]
    fn test_router_parallel_fans_out_and_in() {
        let ops = build_topology_operators(TopologyMode::RouterParallel, &[]);
        let edges = wire(TopologyMode::RouterParallel, &ops);
        assert_eq!(edges.len(), 4);
        assert_eq!(edges[0].from, "router");
        assert_eq!(edges[1].to, "synthesizer");
    }

    #[test]
    fn test_dangling_tool_rejected() {
        let bp = build_initial_blueprint("bp-1", "demo", "task", tools(), TopologyMode::Linear)
            .unwrap();
        let mut parts = bp.to_parts();
        parts.tools.retain(|tool| tool.id != "SchemaGetter");
        assert_eq!(
            WorkflowBlueprint::new(parts),
            Err(BlueprintError::DanglingTool {
                operator: "solver".into(),
                tool: "SchemaGetter".into(),
            })
        );
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let bp = build_initial_blueprint(
            "bp-1",
            "demo",
            "task",
            tools(),
            TopologyMode::PlannerWorkerReviewer,
        )
        .unwrap();
        let mut parts = bp.to_parts();
        parts.operators.retain(|op| op.name != "reviewer");
        assert!(matches!(
            WorkflowBlueprint::new(parts),
            Err(BlueprintError::DanglingOperator { .. })
        ));
    }

    #[test]
    fn test_duplicate_tool_rejected() {
        let mut dup = tools();
        dup.push(ToolDescriptor::new("CypherExecutor", ["query"], "again"));
        let err = build_initial_blueprint("bp-1", "demo", "task", dup, TopologyMode::Linear);
        assert_eq!(err, Err(BlueprintError::DuplicateTool("CypherExecutor".into())));
    }

    #[test]
    fn test_complexity_grows_with_structure() {
        let linear = build_initial_blueprint("a", "demo", "t", tools(), TopologyMode::Linear)
            .unwrap();
        let router =
            build_initial_blueprint("b", "demo", "t", tools(), TopologyMode::RouterParallel)
                .unwrap();
        assert!(router.complexity() > linear.complexity());
        assert!((linear.complexity() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_serde_roundtrip_revalidates() {
        let bp = build_initial_blueprint("a", "demo", "t", tools(), TopologyMode::Linear)
            .unwrap();
        let mut value = serde_json::to_value(&bp).unwrap();
        value["tools"] = serde_json::json!([]);
        assert!(serde_json::from_value::<WorkflowBlueprint>(value).is_err());
    }

    #[test]
    fn test_topology_next_cycles() {
        let mut mode = TopologyMode::Linear;
        for _ in 0..3 {
            mode = mode.next();
        }
        assert_eq!(mode, TopologyMode::Linear);
    }
}
