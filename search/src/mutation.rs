//! Mutation operators.
//!
//! Every operator derives a new blueprint from a parent: the parent's parts
//! are cloned, changed, given a fresh id, linked to the parent, and extended
//! by one lineage entry. The referential invariant is re-checked when the
//! child is built, and tool removal repairs every operator's tool list first.

use crate::context::SearchContext;
use crate::prompt::{PromptOptimizer, learned_sections};
use crate::tools::ToolSelector;
use flowforge_core::blueprint::{
    BlueprintParts, OperatorRole, WorkflowBlueprint, build_topology_operators, wire,
};
use flowforge_core::config::SearchConfig;
use flowforge_core::dataset::TaskIntent;
use flowforge_core::error::BlueprintError;
use flowforge_core::schema::ToolDescriptor;
use flowforge_core::summary::EvaluationSummary;
use flowforge_core::trace::{Mutation, MutationFamily};
use flowforge_evaluation::reflection::reflect;

/// Applies one mutation family to a parent blueprint.
#[derive(Debug, Clone)]
pub struct Mutator<'a> {
    config: &'a SearchConfig,
    task_description: &'a str,
    intents: &'a [TaskIntent],
    catalog: &'a [ToolDescriptor],
    optimizer: PromptOptimizer,
}

impl<'a> Mutator<'a> {
    /// Mutator for one run.
    #[must_use]
    pub fn new(
        config: &'a SearchConfig,
        task_description: &'a str,
        intents: &'a [TaskIntent],
        catalog: &'a [ToolDescriptor],
    ) -> Self {
        Self {
            config,
            task_description,
            intents,
            catalog,
            optimizer: PromptOptimizer::new(config.max_prompt_candidates),
        }
    }

    /// Derive `child_id` from `parent` with a mutation of `family`.
    ///
    /// `parent_train` is the parent's train summary; its low-scoring cases
    /// drive prompt reflection.
    ///
    /// # Errors
    ///
    /// Returns [`BlueprintError`] if the child breaks the referential invariant.
    pub fn apply(
        &self,
        family: MutationFamily,
        parent: &WorkflowBlueprint,
        parent_train: &EvaluationSummary,
        child_id: String,
        context: &mut SearchContext,
    ) -> Result<(WorkflowBlueprint, Mutation), BlueprintError> {
        match family {
            MutationFamily::Prompt => {
                self.mutate_prompt(parent, parent_train, child_id, context)
            }
            MutationFamily::Tool => self.mutate_tools(parent, child_id, context),
            MutationFamily::Topology => mutate_topology(parent, child_id),
        }
    }

    /// Rewrite one operator's prompt.
    ///
    /// Operators are targeted in turn: the n-th prompt rewrite in a lineage
    /// hits operator `n % operators`.
    fn mutate_prompt(
        &self,
        parent: &WorkflowBlueprint,
        parent_train: &EvaluationSummary,
        child_id: String,
        context: &mut SearchContext,
    ) -> Result<(WorkflowBlueprint, Mutation), BlueprintError> {
        let mut parts = parent.to_parts();
        if parts.operators.is_empty() {
            return Err(BlueprintError::NoOperators);
        }
        let rewrites = parent
            .lineage()
            .iter()
            .filter(|m| matches!(m, Mutation::PromptRewrite { .. }))
            .count();
        let index = rewrites % parts.operators.len();

        let low: Vec<_> = parent_train
            .low_score_cases(self.config.low_score_threshold)
            .collect();
        let feedback = reflect(&low);

        let operator = &mut parts.operators[index];
        let variant = self.optimizer.optimize(
            &mut context.prompts,
            &child_id,
            &operator.name,
            &operator.prompt,
            &feedback,
            self.task_description,
        );
        operator.prompt = variant.prompt;

        let mutation = Mutation::PromptRewrite {
            operator: operator.name.clone(),
            variant_id: variant.variant_id,
        };
        derive(parent, parts, child_id, mutation)
    }

    /// Add, remove, or keep tools.
    ///
    /// In order of preference:
    ///
    /// 1. remove the tool with the lowest historical gain at or below the
    ///    removal threshold, among tools observed at least
    ///    `tool_removal_min_observations` times (gain tracking on, more than
    ///    one tool)
    /// 2. add the best-ranked catalog tool not yet in the set, bound to the
    ///    first executor operator
    /// 3. remove the worst-ranked tool (more than one tool)
    /// 4. change nothing
    fn mutate_tools(
        &self,
        parent: &WorkflowBlueprint,
        child_id: String,
        context: &SearchContext,
    ) -> Result<(WorkflowBlueprint, Mutation), BlueprintError> {
        let mut parts = parent.to_parts();
        let gains = self
            .config
            .enable_tool_historical_gain
            .then_some(&context.tool_gains);

        if let Some(gains) = gains {
            if parts.tools.len() > 1 {
                let weakest = parts
                    .tools
                    .iter()
                    .filter(|tool| {
                        gains.observations(&tool.id) >= self.config.tool_removal_min_observations
                    })
                    .map(|tool| (gains.get(&tool.id), tool.id.as_str()))
                    .filter(|(gain, _)| *gain <= self.config.tool_removal_threshold)
                    .min_by(|(a_gain, a_id), (b_gain, b_id)| {
                        a_gain.total_cmp(b_gain).then_with(|| a_id.cmp(b_id))
                    })
                    .map(|(_, id)| id.to_string());
                if let Some(tool) = weakest {
                    remove_tool(&mut parts, &tool);
                    return derive(parent, parts, child_id, Mutation::ToolRemove { tool });
                }
            }
        }

        let ranked = ToolSelector::rank(self.task_description, self.intents, self.catalog, gains);

        if let Some(tool) = ranked.iter().find(|tool| !parent.has_tool(&tool.id)) {
            let Some(operator) = parts
                .operators
                .iter()
                .position(|op| op.role.is_executor())
                .or_else(|| (!parts.operators.is_empty()).then_some(0))
            else {
                return Err(BlueprintError::NoOperators);
            };
            parts.operators[operator].tools.push(tool.id.clone());
            parts.tools.push(tool.clone());
            let mutation = Mutation::ToolAdd {
                tool: tool.id.clone(),
                operator: parts.operators[operator].name.clone(),
            };
            return derive(parent, parts, child_id, mutation);
        }

        if parts.tools.len() > 1 {
            let worst = ranked
                .iter()
                .rev()
                .find(|tool| parent.has_tool(&tool.id))
                .map(|tool| tool.id.clone());
            if let Some(tool) = worst {
                remove_tool(&mut parts, &tool);
                return derive(parent, parts, child_id, Mutation::ToolRemove { tool });
            }
        }

        derive(parent, parts, child_id, Mutation::ToolNoop)
    }
}

/// Switch to the next topology mode and remap operators.
///
/// The new operators share the tools the old ones used. Guidance sections
/// learned by prompt rewrites carry over to operators of the same kind
/// (executor, verifier, or coordinator).
fn mutate_topology(
    parent: &WorkflowBlueprint,
    child_id: String,
) -> Result<(WorkflowBlueprint, Mutation), BlueprintError> {
    let mut parts = parent.to_parts();
    let from = parts.topology;
    let to = from.next();

    let bound: Vec<String> = parts
        .tools
        .iter()
        .filter(|tool| parts.operators.iter().any(|op| op.tools.contains(&tool.id)))
        .map(|tool| tool.id.clone())
        .collect();

    let mut operators = build_topology_operators(to, &bound);
    for operator in &mut operators {
        let learned = parts
            .operators
            .iter()
            .filter(|old| role_kind(old.role) == role_kind(operator.role))
            .map(|old| learned_sections(&old.prompt))
            .find(|sections| !sections.is_empty());
        if let Some(sections) = learned {
            operator.prompt.push_str(sections);
        }
    }

    parts.edges = wire(to, &operators);
    parts.operators = operators;
    parts.topology = to;
    derive(parent, parts, child_id, Mutation::TopologySwitch { from, to })
}

#[derive(PartialEq, Eq)]
enum RoleKind {
    Executor,
    Verifier,
    Coordinator,
}

const fn role_kind(role: OperatorRole) -> RoleKind {
    if role.is_executor() {
        RoleKind::Executor
    } else if role.is_verifier() {
        RoleKind::Verifier
    } else {
        RoleKind::Coordinator
    }
}

fn remove_tool(parts: &mut BlueprintParts, tool: &str) {
    parts.tools.retain(|t| t.id != tool);
    for operator in &mut parts.operators {
        operator.tools.retain(|t| t != tool);
    }
}

fn derive(
    parent: &WorkflowBlueprint,
    mut parts: BlueprintParts,
    child_id: String,
    mutation: Mutation,
) -> Result<(WorkflowBlueprint, Mutation), BlueprintError> {
    parts.id = child_id;
    parts.parent_id = Some(parent.id().to_string());
    parts.lineage.push(mutation.clone());
    let child = WorkflowBlueprint::new(parts)?;
    Ok((child, mutation))
}
