//! Error taxonomy.
//!
//! Run-level errors (`ConfigurationError`, `SynthesisError`) abort an
//! optimization before or during setup. Case-level errors
//! (`RuntimeExecutionError`, `JudgeUnavailable`) are absorbed by the
//! evaluator and surface only as summary flags.

use thiserror::Error;

/// Invalid input detected before any work begins.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// A numeric field is outside its allowed range
    #[error("{field} out of range: {detail}")]
    OutOfRange {
        /// Dotted path of the offending field
        field: &'static str,
        /// What the allowed range is
        detail: String,
    },

    /// Split ratios must be positive and sum to 1
    #[error("split ratios must be positive and sum to 1.0, got {train}+{val}+{test}")]
    InvalidSplitRatios {
        /// Train share
        train: f64,
        /// Validation share
        val: f64,
        /// Test share
        test: f64,
    },

    /// Cross-field constraint violated
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// Unknown environment or profile name
    #[error("unknown {kind}: {value}")]
    UnknownName {
        /// What kind of name was expected
        kind: &'static str,
        /// The rejected value
        value: String,
    },

    /// Configuration file could not be read
    #[error("failed to read configuration: {0}")]
    Io(String),

    /// Configuration file could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// The dataset cannot satisfy coverage, size, or split constraints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    /// An inferred intent produced no renderable case and has no fallback
    #[error("intent {intent} yields no renderable case")]
    InsufficientCoverage {
        /// Intent name
        intent: String,
    },

    /// Too few cases to honor the minimum per-split counts
    #[error("{size} cases cannot satisfy a minimum of {min_per_split} per split")]
    SplitUnsatisfiable {
        /// Number of cases available
        size: usize,
        /// Required cases per split
        min_per_split: usize,
    },

    /// The schema offers fewer unique cases than the requested dataset size
    #[error("schema yields {available} unique cases, {requested} requested")]
    InsufficientCases {
        /// Requested dataset size
        requested: usize,
        /// Unique cases the schema could produce
        available: usize,
    },

    /// Schema snapshot has no entities or no relations
    #[error("schema snapshot has no entities or relations to bind")]
    EmptySchema,
}

/// Failure of one external runtime call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeExecutionError {
    /// The call did not finish within its timeout
    #[error("runtime call timed out after {after_ms}ms")]
    Timeout {
        /// Timeout that elapsed
        after_ms: u64,
    },

    /// The runtime rejected or failed the invocation
    #[error("runtime invocation failed: {0}")]
    Invocation(String),

    /// The runtime answered but the payload could not be interpreted
    #[error("runtime returned malformed output: {0}")]
    MalformedOutput(String),

    /// The runtime circuit breaker is open
    #[error("runtime circuit open, retry after {retry_after_ms}ms")]
    CircuitOpen {
        /// Remaining open time
        retry_after_ms: u64,
    },
}

impl RuntimeExecutionError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::MalformedOutput(_))
    }

    /// Short label used in metrics and invalid-case records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Invocation(_) => "invocation",
            Self::MalformedOutput(_) => "malformed_output",
            Self::CircuitOpen { .. } => "circuit_open",
        }
    }
}

/// Every voter in the judge ensemble failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("all judges unavailable: {}", failures.join("; "))]
pub struct JudgeUnavailable {
    /// Failure message per voter
    pub failures: Vec<String>,
}

/// A blueprint violates its referential invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlueprintError {
    /// A blueprint needs at least one operator
    #[error("blueprint has no operators")]
    NoOperators,

    /// Operator names must be unique
    #[error("duplicate operator: {0}")]
    DuplicateOperator(String),

    /// Tool ids must be unique
    #[error("duplicate tool: {0}")]
    DuplicateTool(String),

    /// An operator references a tool outside the tool set
    #[error("operator {operator} references unknown tool {tool}")]
    DanglingTool {
        /// Operator name
        operator: String,
        /// Missing tool id
        tool: String,
    },

    /// The topology references an operator outside the operator set
    #[error("topology references unknown operator {operator}")]
    DanglingOperator {
        /// Missing operator name
        operator: String,
    },
}
