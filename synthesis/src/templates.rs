//! Question templates and the lightweight paraphraser.

use flowforge_core::dataset::TaskIntent;

/// A question template with `{label}` and/or `{relation}` slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    /// Stable id recorded in case lineage
    pub id: &'static str,
    /// Question text with slots
    pub text: &'static str,
}

impl Template {
    const fn new(id: &'static str, text: &'static str) -> Self {
        Self { id, text }
    }

    /// Whether the template binds an entity label.
    #[must_use]
    pub fn needs_label(&self) -> bool {
        self.text.contains("{label}")
    }

    /// Whether the template binds a relation.
    #[must_use]
    pub fn needs_relation(&self) -> bool {
        self.text.contains("{relation}")
    }

    /// Whether the template can be rendered against the given schema shape.
    #[must_use]
    pub fn renderable(&self, has_labels: bool, has_relations: bool) -> bool {
        (has_labels || !self.needs_label()) && (has_relations || !self.needs_relation())
    }

    /// Fill the slots.
    #[must_use]
    pub fn render(&self, label: Option<&str>, relation: Option<&str>) -> String {
        let mut text = self.text.to_string();
        if let Some(label) = label {
            text = text.replace("{label}", label);
        }
        if let Some(relation) = relation {
            text = text.replace("{relation}", relation);
        }
        text
    }
}

const QUERY_TEMPLATES: &[Template] = &[
    Template::new(
        "query-path",
        "Find each {label} connected through {relation} and list its key properties.",
    ),
    Template::new(
        "query-filter",
        "Which {label} records match a path over {relation}?",
    ),
    Template::new("query-scan", "List every {label} stored in the graph."),
];

const ANALYTICS_TEMPLATES: &[Template] = &[
    Template::new(
        "analytics-rank",
        "Rank {label} nodes by influence along {relation} edges.",
    ),
    Template::new(
        "analytics-cluster",
        "Detect unusual clusters of {label} joined by {relation}.",
    ),
    Template::new(
        "analytics-degree",
        "Summarize degree statistics for {relation} edges.",
    ),
];

const MODELING_TEMPLATES: &[Template] = &[
    Template::new(
        "modeling-constraints",
        "Propose constraints for {label} and its {relation} relationship.",
    ),
    Template::new(
        "modeling-evolve",
        "Design a schema change for {label} that keeps {relation} consistent.",
    ),
    Template::new(
        "modeling-properties",
        "Describe the properties every {label} should carry.",
    ),
];

const IMPORT_TEMPLATES: &[Template] = &[
    Template::new(
        "import-plan",
        "Plan a bulk load of {label} rows with {relation} edges.",
    ),
    Template::new(
        "import-validate",
        "Define checks to run before importing {label} linked by {relation}.",
    ),
    Template::new(
        "import-map",
        "Map source columns onto {relation} edges.",
    ),
];

const QA_TEMPLATES: &[Template] = &[
    Template::new(
        "qa-meaning",
        "Explain what {relation} means for a {label}.",
    ),
    Template::new(
        "qa-summary",
        "Give a short domain summary of {label} and {relation}.",
    ),
    Template::new("qa-role", "Explain the role of {label} in this graph."),
];

/// Templates for one intent. The last one binds a single slot and serves as
/// the fallback for schemas missing labels or relations.
#[must_use]
pub const fn templates_for(intent: TaskIntent) -> &'static [Template] {
    match intent {
        TaskIntent::Query => QUERY_TEMPLATES,
        TaskIntent::Analytics => ANALYTICS_TEMPLATES,
        TaskIntent::Modeling => MODELING_TEMPLATES,
        TaskIntent::Import => IMPORT_TEMPLATES,
        TaskIntent::Qa => QA_TEMPLATES,
    }
}

/// Template id recorded on hard negatives.
pub const HARD_NEGATIVE_TEMPLATE: &str = "hard-negative";

/// Edge types used to build unanswerable questions; any that the schema
/// actually contains are skipped.
pub const FABRICATED_RELATIONS: [&str; 4] = ["MENTORS", "ORBITS", "INHERITS_FROM", "COMPOSED_OF"];

/// Render a question no answer can be grounded for: it asks about an edge
/// type absent from the schema.
#[must_use]
pub fn hard_negative(subject: &str, fabricated_relation: &str, object: &str) -> String {
    format!("Which {subject} {fabricated_relation} a {object}, and through how many hops?")
}

const REWRITES: [(&str, &str); 10] = [
    ("Find", "Locate"),
    ("Which", "What"),
    ("List", "Enumerate"),
    ("Rank", "Order"),
    ("Detect", "Spot"),
    ("Summarize", "Outline"),
    ("Propose", "Suggest"),
    ("Plan", "Draft"),
    ("Explain", "Clarify"),
    ("Give", "Provide"),
];

/// Rewrite the leading verb of a question, keeping its intent.
///
/// Returns `None` when no rewrite applies.
#[must_use]
pub fn paraphrase(question: &str) -> Option<String> {
    REWRITES.iter().find_map(|(from, to)| {
        question
            .strip_prefix(from)
            .filter(|rest| rest.starts_with(' '))
            .map(|rest| format!("{to}{rest}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_intent_has_a_single_slot_fallback() {
        for intent in TaskIntent::ALL {
            let fallback = templates_for(intent).last().copied().unwrap();
            assert!(fallback.needs_label() != fallback.needs_relation(), "{intent}");
        }
    }

    #[test]
    fn test_render_fills_slots() {
        let template = templates_for(TaskIntent::Query)[0];
        assert_eq!(
            template.render(Some("Person"), Some("OWNS")),
            "Find each Person connected through OWNS and list its key properties."
        );
    }

    #[test]
    fn test_renderable_requires_bound_slots() {
        let template = templates_for(TaskIntent::Analytics)[2];
        assert!(template.renderable(false, true));
        assert!(!template.renderable(true, false));
    }

    #[test]
    fn test_paraphrase_rewrites_leading_verb_only() {
        assert_eq!(
            paraphrase("Find each Person").as_deref(),
            Some("Locate each Person")
        );
        assert_eq!(paraphrase("Findings about Person"), None);
        assert_eq!(paraphrase("Map source columns"), None);
    }
}
