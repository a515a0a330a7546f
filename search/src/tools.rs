//! Tool ranking and per-run historical tool gain.

use flowforge_core::dataset::TaskIntent;
use flowforge_core::schema::ToolDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keyword score for a keyword found in the tool's own text.
const TOOL_MATCH: f64 = 2.0;
/// Keyword score for a keyword found in the task description.
const TASK_MATCH: f64 = 1.0;
/// Multiplier that puts historical gain on the keyword-score scale.
const GAIN_SCALE: f64 = 10.0;

/// Keywords that make a tool relevant to an intent.
#[must_use]
pub const fn intent_keywords(intent: TaskIntent) -> &'static [&'static str] {
    match intent {
        TaskIntent::Query => &["query", "cypher", "schema", "search"],
        TaskIntent::Analytics => &["algorithm", "analysis", "rank", "community"],
        TaskIntent::Modeling => &["schema", "model", "label", "vertex", "edge"],
        TaskIntent::Import => &["import", "ingest", "extract", "etl"],
        TaskIntent::Qa => &["retrieval", "knowledge", "browser", "search"],
    }
}

/// Ranks catalog tools for a task.
///
/// Each intent keyword adds 2 when it appears in the tool's id, description,
/// or tags and 1 when it appears in the task. Historical gain, when given,
/// is added scaled by 10. Ties go to the lexicographically smaller id.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolSelector;

impl ToolSelector {
    /// Relevance score of one tool.
    #[must_use]
    pub fn score(
        task_description: &str,
        intents: &[TaskIntent],
        tool: &ToolDescriptor,
        gains: Option<&ToolGains>,
    ) -> f64 {
        let task = task_description.to_lowercase();
        let text = tool.search_text();
        let keyword_score: f64 = intents
            .iter()
            .flat_map(|intent| intent_keywords(*intent).iter())
            .map(|keyword| {
                let mut score = 0.0;
                if text.contains(keyword) {
                    score += TOOL_MATCH;
                }
                if task.contains(keyword) {
                    score += TASK_MATCH;
                }
                score
            })
            .sum();
        let gain = gains.map_or(0.0, |gains| gains.get(&tool.id));
        keyword_score + GAIN_SCALE * gain
    }

    /// The whole catalog, best first.
    #[must_use]
    pub fn rank(
        task_description: &str,
        intents: &[TaskIntent],
        catalog: &[ToolDescriptor],
        gains: Option<&ToolGains>,
    ) -> Vec<ToolDescriptor> {
        let mut scored: Vec<(f64, &ToolDescriptor)> = catalog
            .iter()
            .map(|tool| (Self::score(task_description, intents, tool, gains), tool))
            .collect();
        scored.sort_by(|(a_score, a), (b_score, b)| {
            b_score.total_cmp(a_score).then_with(|| a.id.cmp(&b.id))
        });
        scored.into_iter().map(|(_, tool)| tool.clone()).collect()
    }
}

/// Exponentially weighted contribution of each tool to train-objective improvement.
///
/// Scoped to one search run. Each tool also carries the number of
/// improvements folded into its average.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolGains {
    gains: BTreeMap<String, f64>,
    observations: BTreeMap<String, usize>,
}

impl ToolGains {
    /// Gain of `tool`, 0 if never observed.
    #[must_use]
    pub fn get(&self, tool: &str) -> f64 {
        self.gains.get(tool).copied().unwrap_or(0.0)
    }

    /// Improvements observed for `tool`.
    #[must_use]
    pub fn observations(&self, tool: &str) -> usize {
        self.observations.get(tool).copied().unwrap_or(0)
    }

    /// Fold one observed improvement into `tool`'s average.
    ///
    /// `gain = decay * gain + (1 - decay) * improvement`
    pub fn update(&mut self, tool: &str, improvement: f64, decay: f64) {
        let old = self.get(tool);
        self.gains
            .insert(tool.to_string(), decay * old + (1.0 - decay) * improvement);
        *self.observations.entry(tool.to_string()).or_insert(0) += 1;
    }

    /// All observed gains by tool id.
    #[must_use]
    pub const fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.gains
    }

    /// Whether no tool has been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gains.is_empty()
    }
}
