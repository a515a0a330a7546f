//! Synthesized evaluation cases and their train / validation / test split.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Dataset partition a case belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    /// Drives tree backpropagation
    Train,
    /// Drives model selection
    Validation,
    /// Reporting only, evaluated once after search
    Test,
}

impl Split {
    /// All splits in assignment order.
    pub const ALL: [Self; 3] = [Self::Train, Self::Validation, Self::Test];

    /// Stable name used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Validation => "validation",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed task intent vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskIntent {
    /// Entity and relationship lookup
    Query,
    /// Graph algorithms and aggregates
    Analytics,
    /// Schema design
    Modeling,
    /// Data ingestion planning
    Import,
    /// Grounded question answering
    Qa,
}

impl TaskIntent {
    /// Vocabulary in canonical order.
    pub const ALL: [Self; 5] = [
        Self::Query,
        Self::Analytics,
        Self::Modeling,
        Self::Import,
        Self::Qa,
    ];

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Analytics => "analytics",
            Self::Modeling => "modeling",
            Self::Import => "import",
            Self::Qa => "qa",
        }
    }

    /// Capability tags a tool needs to serve this intent.
    #[must_use]
    pub const fn capability_tags(self) -> &'static [&'static str] {
        match self {
            Self::Query => &["query", "cypher"],
            Self::Analytics => &["analysis", "algorithm", "rank"],
            Self::Modeling => &["modeling", "schema"],
            Self::Import => &["import", "etl"],
            Self::Qa => &["qa", "retrieval"],
        }
    }

    /// Keywords that signal this intent in a task description.
    #[must_use]
    pub const fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Query => &["query", "find", "lookup", "match", "cypher", "search"],
            Self::Analytics => &["analytics", "rank", "pagerank", "centrality", "community", "risk"],
            Self::Modeling => &["model", "modeling", "schema", "design", "ontology"],
            Self::Import => &["import", "ingest", "load", "csv", "etl"],
            Self::Qa => &["qa", "question", "answer", "explain", "knowledge"],
        }
    }
}

impl fmt::Display for TaskIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case difficulty, cycled over synthesized cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    /// Single hop
    L1,
    /// Filtered lookup
    L2,
    /// Multi hop
    L3,
    /// Reasoning over aggregates
    L4,
}

impl Difficulty {
    /// Difficulty for the `index`-th case.
    #[must_use]
    pub const fn cycle(index: usize) -> Self {
        match index % 4 {
            0 => Self::L1,
            1 => Self::L2,
            2 => Self::L3,
            _ => Self::L4,
        }
    }
}

/// Provenance of a synthesized case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseLineage {
    /// Template the question was rendered from
    pub template_id: String,
    /// Whether the question is a paraphrase
    pub paraphrased: bool,
    /// Whether the case is unanswerable by construction
    pub hard_negative: bool,
    /// Difficulty level
    pub difficulty: Difficulty,
}

/// One evaluation case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    /// Stable case id
    pub id: String,
    /// Natural-language question
    pub question: String,
    /// Expected intent / answer sketch
    pub expected: String,
    /// Intent the case exercises
    pub intent: TaskIntent,
    /// Split label
    pub split: Split,
    /// Provenance
    pub lineage: CaseLineage,
}

impl Case {
    /// Whether the case is a hard negative.
    #[must_use]
    pub const fn is_hard_negative(&self) -> bool {
        self.lineage.hard_negative
    }
}

/// Metrics describing one synthesis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisReport {
    /// Requested size
    pub requested_size: usize,
    /// Final size after dedup and clipping
    pub final_size: usize,
    /// Inferred intents
    pub intents: Vec<TaskIntent>,
    /// Entity labels sampled into templates
    pub sampled_labels: Vec<String>,
    /// Relations sampled into templates
    pub sampled_relations: Vec<String>,
    /// Hard-negative cases in the final dataset
    pub hard_negative_count: usize,
    /// Hard-negative share of the final dataset
    pub hard_negative_ratio: f64,
    /// Paraphrased cases in the final dataset
    pub paraphrase_count: usize,
    /// Share of rendered cases dropped as duplicates
    pub dedup_rate: f64,
    /// Final case count per intent
    pub intent_coverage: BTreeMap<TaskIntent, usize>,
    /// Final case count per split
    pub split_sizes: BTreeMap<Split, usize>,
}

/// An immutable, split dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticDataset {
    cases: Vec<Case>,
    report: SynthesisReport,
}

impl SyntheticDataset {
    /// Wrap synthesized cases and their report.
    #[must_use]
    pub const fn new(cases: Vec<Case>, report: SynthesisReport) -> Self {
        Self { cases, report }
    }

    /// All cases in assignment order.
    #[must_use]
    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    /// Cases of one split, in assignment order.
    pub fn split(&self, split: Split) -> impl Iterator<Item = &Case> {
        self.cases.iter().filter(move |case| case.split == split)
    }

    /// Number of cases in one split.
    #[must_use]
    pub fn split_len(&self, split: Split) -> usize {
        self.split(split).count()
    }

    /// Total number of cases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Whether the dataset has no cases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// The synthesis report.
    #[must_use]
    pub const fn report(&self) -> &SynthesisReport {
        &self.report
    }

    /// Copy of this dataset with each split capped to its budget.
    ///
    /// Cases keep their assignment order; splits without a budget are left whole.
    #[must_use]
    pub fn sliced(&self, budgets: &BTreeMap<Split, usize>) -> Self {
        let mut taken: BTreeMap<Split, usize> = BTreeMap::new();
        let cases = self
            .cases
            .iter()
            .filter(|case| {
                let count = taken.entry(case.split).or_insert(0);
                *count += 1;
                budgets.get(&case.split).is_none_or(|budget| *count <= *budget)
            })
            .cloned()
            .collect();
        Self {
            cases,
            report: self.report.clone(),
        }
    }
}
