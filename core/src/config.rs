//! Configuration for optimization runs.
//!
//! Every section has sensible defaults and a `validate()` that runs before any
//! work begins, so an invalid value fails fast instead of partway through a
//! search.
//!
//! # Loading
//!
//! - [`OptimizeConfig::load`] builds the defaults for an [`Environment`]
//! - [`OptimizeConfig::from_toml_str`] / [`OptimizeConfig::from_file`] read a TOML document
//! - [`OptimizeConfig::apply_overrides`] applies `FLOWFORGE_*` variables
//! - [`OptimizeConfig::from_env`] does all of the above from the process environment
//!
//! # Example
//!
//! ```
//! use flowforge_core::config::{Environment, OptimizeConfig};
//!
//! let mut config = OptimizeConfig::load(Environment::Development)?;
//! config.apply_overrides(|key| (key == "FLOWFORGE_ROUNDS").then(|| "4".to_string()))?;
//! assert_eq!(config.search.rounds, 4);
//! # Ok::<(), flowforge_core::error::ConfigurationError>(())
//! ```

use crate::blueprint::TopologyMode;
use crate::error::ConfigurationError;
use crate::execution::JudgeKind;
use crate::objective::ObjectiveWeights;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const RATIO_TOLERANCE: f64 = 1e-6;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    Development,
    /// Shared pre-production
    Staging,
    /// Production
    Production,
}

impl Environment {
    /// Whether this is production.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Self::Development),
            "staging" | "stage" => Ok(Self::Staging),
            "prod" | "production" => Ok(Self::Production),
            _ => Err(ConfigurationError::UnknownName {
                kind: "environment",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        })
    }
}

/// Train / validation / test proportions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    /// Train share
    pub train: f64,
    /// Validation share
    pub val: f64,
    /// Test share
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.6,
            val: 0.2,
            test: 0.2,
        }
    }
}

impl SplitRatios {
    /// Validate ratios.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidSplitRatios`] unless all shares
    /// are positive and sum to 1.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let shares = [self.train, self.val, self.test];
        let positive = shares.iter().all(|s| s.is_finite() && *s > 0.0);
        if !positive || (shares.iter().sum::<f64>() - 1.0).abs() > RATIO_TOLERANCE {
            return Err(ConfigurationError::InvalidSplitRatios {
                train: self.train,
                val: self.val,
                test: self.test,
            });
        }
        Ok(())
    }
}

/// Dataset synthesis settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Requested number of cases
    pub target_size: usize,
    /// Lower size bound
    pub min_size: usize,
    /// Upper size bound
    pub max_size: usize,
    /// Split proportions
    pub split_ratios: SplitRatios,
    /// Minimum cases in every split
    pub min_per_split: usize,
    /// Upper bound on the hard-negative share
    pub hard_negative_ratio: f64,
    /// Paraphrase a subset of cases
    pub paraphrase: bool,
    /// Inject hard negatives
    pub hard_negatives: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            target_size: 12,
            min_size: 6,
            max_size: 30,
            split_ratios: SplitRatios::default(),
            min_per_split: 1,
            hard_negative_ratio: 0.2,
            paraphrase: true,
            hard_negatives: true,
        }
    }
}

impl DatasetConfig {
    /// Validate dataset settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if size bounds are inconsistent, split
    /// ratios are invalid, or the hard-negative ratio is outside [0, 0.5].
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.min_size == 0 || self.min_size > self.max_size {
            return Err(ConfigurationError::OutOfRange {
                field: "dataset.min_size",
                detail: format!(
                    "must be > 0 and <= max_size ({}), got {}",
                    self.max_size, self.min_size
                ),
            });
        }
        if !(self.min_size..=self.max_size).contains(&self.target_size) {
            return Err(ConfigurationError::OutOfRange {
                field: "dataset.target_size",
                detail: format!(
                    "must be within [{}, {}], got {}",
                    self.min_size, self.max_size, self.target_size
                ),
            });
        }
        if self.min_per_split == 0 {
            return Err(ConfigurationError::OutOfRange {
                field: "dataset.min_per_split",
                detail: "must be > 0".to_string(),
            });
        }
        self.split_ratios.validate()?;
        if !(0.0..=0.5).contains(&self.hard_negative_ratio) {
            return Err(ConfigurationError::OutOfRange {
                field: "dataset.hard_negative_ratio",
                detail: format!("must be within [0, 0.5], got {}", self.hard_negative_ratio),
            });
        }
        Ok(())
    }
}

/// Settings for the LLM-backed rubric judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RubricJudgeConfig {
    /// Messages API base URL
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Response token cap
    pub max_tokens: u32,
    /// API key (from `FLOWFORGE_JUDGE_API_KEY`, never serialized)
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for RubricJudgeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            max_tokens: 256,
            api_key: None,
        }
    }
}

/// Aggregation weight of each judge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeWeights {
    /// Rule judge
    pub rule: f64,
    /// Heuristic judge
    pub heuristic: f64,
    /// LLM rubric judge
    pub llm_rubric: f64,
}

impl Default for JudgeWeights {
    fn default() -> Self {
        Self {
            rule: 1.0,
            heuristic: 1.0,
            llm_rubric: 1.0,
        }
    }
}

impl JudgeWeights {
    /// Weight of one judge.
    #[must_use]
    pub const fn weight(&self, judge: JudgeKind) -> f64 {
        match judge {
            JudgeKind::Rule => self.rule,
            JudgeKind::Heuristic => self.heuristic,
            JudgeKind::LlmRubric => self.llm_rubric,
        }
    }
}

/// Case execution and judging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Concurrent case executions per evaluation call
    pub max_concurrency: usize,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// First retry delay
    pub initial_backoff_ms: u64,
    /// Retry delay cap
    pub max_backoff_ms: u64,
    /// Timeout for each runtime or judge call
    pub call_timeout_ms: u64,
    /// Invalid fraction above which a summary is degraded
    pub invalid_fraction_threshold: f64,
    /// Judges in the ensemble
    pub judges: Vec<JudgeKind>,
    /// Aggregation weight per judge
    pub judge_weights: JudgeWeights,
    /// LLM rubric judge settings
    pub rubric: RubricJudgeConfig,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            max_retries: 2,
            initial_backoff_ms: 50,
            max_backoff_ms: 1_000,
            call_timeout_ms: 30_000,
            invalid_fraction_threshold: 0.5,
            judges: vec![JudgeKind::Rule, JudgeKind::Heuristic],
            judge_weights: JudgeWeights::default(),
            rubric: RubricJudgeConfig::default(),
        }
    }
}

impl EvaluationConfig {
    /// Weight of one judge.
    #[must_use]
    pub const fn judge_weight(&self, judge: JudgeKind) -> f64 {
        self.judge_weights.weight(judge)
    }

    /// Per-call timeout.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Validate evaluation settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] for zero concurrency or timeout, an
    /// inverted backoff range, a threshold outside [0, 1], an empty judge set,
    /// or a non-positive judge weight.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_concurrency == 0 {
            return Err(ConfigurationError::OutOfRange {
                field: "evaluation.max_concurrency",
                detail: "must be > 0".to_string(),
            });
        }
        if self.call_timeout_ms == 0 {
            return Err(ConfigurationError::OutOfRange {
                field: "evaluation.call_timeout_ms",
                detail: "must be > 0".to_string(),
            });
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ConfigurationError::Invalid(format!(
                "evaluation.initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.invalid_fraction_threshold) {
            return Err(ConfigurationError::OutOfRange {
                field: "evaluation.invalid_fraction_threshold",
                detail: format!("must be within [0, 1], got {}", self.invalid_fraction_threshold),
            });
        }
        if self.judges.is_empty() {
            return Err(ConfigurationError::Invalid(
                "evaluation.judges must name at least one judge".to_string(),
            ));
        }
        for judge in &self.judges {
            let weight = self.judge_weight(*judge);
            if !weight.is_finite() || weight <= 0.0 {
                return Err(ConfigurationError::OutOfRange {
                    field: "evaluation.judge_weights",
                    detail: format!("weight of {judge} must be > 0, got {weight}"),
                });
            }
        }
        Ok(())
    }
}

/// Search engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum rounds
    pub rounds: usize,
    /// Children created per round
    pub expansions_per_round: usize,
    /// UCB exploration constant
    pub exploration_weight: f64,
    /// Weight of the structural novelty bonus
    pub novelty_weight: f64,
    /// Minimum selection-score gain that counts as improvement
    pub min_improvement: f64,
    /// Rounds without improvement before stopping
    pub patience: usize,
    /// Evaluate on validation and select by it
    pub use_holdout: bool,
    /// Weight mutation families by the dominant failure category
    pub failure_aware_scheduling: bool,
    /// Allow prompt mutations
    pub enable_prompt_mutation: bool,
    /// Allow tool mutations
    pub enable_tool_mutation: bool,
    /// Allow topology mutations
    pub enable_topology_mutation: bool,
    /// Track and use historical tool gain
    pub enable_tool_historical_gain: bool,
    /// EWMA decay for historical tool gain
    pub tool_gain_decay: f64,
    /// Tools whose gain is at or below this are removal candidates
    pub tool_removal_threshold: f64,
    /// Gain observations a tool needs before its gain can remove it
    pub tool_removal_min_observations: usize,
    /// Cases below this score feed reflection and failure scheduling
    pub low_score_threshold: f64,
    /// Prompt rewrites generated per prompt mutation
    pub max_prompt_candidates: usize,
    /// Ranked tools placed in the root tool set
    pub initial_tool_count: usize,
    /// Topology of the root blueprint
    pub initial_topology: TopologyMode,
    /// Children after which a node is no longer expanded
    pub max_children: usize,
    /// Train cases evaluated per candidate
    pub train_budget: usize,
    /// Validation cases evaluated per candidate
    pub validation_budget: usize,
    /// Test cases evaluated for the final blueprint
    pub test_budget: usize,
    /// Objective weights
    pub objective: ObjectiveWeights,
    /// Case execution and judging
    pub evaluation: EvaluationConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rounds: 10,
            expansions_per_round: 3,
            exploration_weight: 1.2,
            novelty_weight: 0.15,
            min_improvement: 0.005,
            patience: 3,
            use_holdout: true,
            failure_aware_scheduling: true,
            enable_prompt_mutation: true,
            enable_tool_mutation: true,
            enable_topology_mutation: true,
            enable_tool_historical_gain: true,
            tool_gain_decay: 0.7,
            tool_removal_threshold: -0.01,
            tool_removal_min_observations: 2,
            low_score_threshold: 0.6,
            max_prompt_candidates: 4,
            initial_tool_count: 3,
            initial_topology: TopologyMode::PlannerWorkerReviewer,
            max_children: 8,
            train_budget: 8,
            validation_budget: 8,
            test_budget: 8,
            objective: ObjectiveWeights::default(),
            evaluation: EvaluationConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Validate search settings, including nested sections.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if any budget is zero, a weight is out of
    /// range, no mutation family is enabled, or a nested section is invalid.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let positive = [
            ("search.rounds", self.rounds),
            ("search.expansions_per_round", self.expansions_per_round),
            ("search.patience", self.patience),
            ("search.initial_tool_count", self.initial_tool_count),
            ("search.max_children", self.max_children),
            (
                "search.tool_removal_min_observations",
                self.tool_removal_min_observations,
            ),
            ("search.train_budget", self.train_budget),
            ("search.validation_budget", self.validation_budget),
            ("search.test_budget", self.test_budget),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigurationError::OutOfRange {
                    field,
                    detail: "must be > 0".to_string(),
                });
            }
        }
        if !(2..=8).contains(&self.max_prompt_candidates) {
            return Err(ConfigurationError::OutOfRange {
                field: "search.max_prompt_candidates",
                detail: format!("must be within [2, 8], got {}", self.max_prompt_candidates),
            });
        }
        if !self.min_improvement.is_finite() || self.min_improvement <= 0.0 {
            return Err(ConfigurationError::OutOfRange {
                field: "search.min_improvement",
                detail: format!("must be > 0, got {}", self.min_improvement),
            });
        }
        for (field, value) in [
            ("search.exploration_weight", self.exploration_weight),
            ("search.novelty_weight", self.novelty_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::OutOfRange {
                    field,
                    detail: format!("must be >= 0, got {value}"),
                });
            }
        }
        if !(0.0..1.0).contains(&self.tool_gain_decay) {
            return Err(ConfigurationError::OutOfRange {
                field: "search.tool_gain_decay",
                detail: format!("must be within [0, 1), got {}", self.tool_gain_decay),
            });
        }
        if !(0.0..=1.0).contains(&self.low_score_threshold) {
            return Err(ConfigurationError::OutOfRange {
                field: "search.low_score_threshold",
                detail: format!("must be within [0, 1], got {}", self.low_score_threshold),
            });
        }
        if !self.enable_prompt_mutation
            && !self.enable_tool_mutation
            && !self.enable_topology_mutation
        {
            return Err(ConfigurationError::Invalid(
                "at least one mutation family must be enabled".to_string(),
            ));
        }
        self.objective.validate()?;
        self.evaluation.validate()
    }
}

/// Which runtime backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeKind {
    /// Deterministic in-process runtime
    Mock,
    /// HTTP runtime service
    External,
}

/// Runtime backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Backend kind
    pub backend: RuntimeKind,
    /// Base URL of the external runtime
    pub base_url: String,
    /// HTTP request timeout
    pub request_timeout_ms: u64,
    /// Consecutive failures before the circuit opens
    pub circuit_failure_threshold: u32,
    /// How long the circuit stays open
    pub circuit_reset_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            backend: RuntimeKind::Mock,
            base_url: "http://127.0.0.1:8080".to_string(),
            request_timeout_ms: 30_000,
            circuit_failure_threshold: 5,
            circuit_reset_ms: 30_000,
        }
    }
}

impl RuntimeConfig {
    /// Validate runtime settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] for an empty external URL or zero thresholds.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.backend == RuntimeKind::External && self.base_url.is_empty() {
            return Err(ConfigurationError::Invalid(
                "runtime.base_url is required for the external backend".to_string(),
            ));
        }
        if self.circuit_failure_threshold == 0 {
            return Err(ConfigurationError::OutOfRange {
                field: "runtime.circuit_failure_threshold",
                detail: "must be > 0".to_string(),
            });
        }
        if self.request_timeout_ms == 0 || self.circuit_reset_ms == 0 {
            return Err(ConfigurationError::OutOfRange {
                field: "runtime.request_timeout_ms",
                detail: "timeouts must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Logging and metrics settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Start the Prometheus exporter
    pub metrics_enabled: bool,
    /// Prometheus exporter port
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_port: 9090,
        }
    }
}

impl ObservabilityConfig {
    /// Validate observability settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownName`] for an unknown log level.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigurationError::UnknownName {
                kind: "log level",
                value: self.log_level.clone(),
            });
        }
        Ok(())
    }
}

/// Everything one optimization run needs besides the task and seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeConfig {
    /// Deployment environment
    pub environment: Environment,
    /// Application name recorded on blueprints
    pub app_name: String,
    /// Experiment profile applied on top of this config
    pub profile: Option<String>,
    /// Dataset synthesis
    pub dataset: DatasetConfig,
    /// Search engine
    pub search: SearchConfig,
    /// Runtime backend
    pub runtime: RuntimeConfig,
    /// Logging and metrics
    pub observability: ObservabilityConfig,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            app_name: "flowforge".to_string(),
            profile: None,
            dataset: DatasetConfig::default(),
            search: SearchConfig::default(),
            runtime: RuntimeConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl OptimizeConfig {
    /// Defaults adjusted for an environment, then validated.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if the resulting configuration is invalid.
    pub fn load(environment: Environment) -> Result<Self, ConfigurationError> {
        let mut config = Self {
            environment,
            ..Self::default()
        };

        match environment {
            Environment::Development => {
                config.observability.log_level = "debug".to_string();
            }
            Environment::Staging => {
                config.observability.metrics_enabled = true;
            }
            Environment::Production => {
                config.observability.log_level = "warn".to_string();
                config.observability.metrics_enabled = true;
                config.runtime.circuit_failure_threshold = 3;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Parse`] for malformed TOML, or a validation
    /// error for out-of-range values.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigurationError> {
        let config: Self =
            toml::from_str(document).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Io`] if the file cannot be read, otherwise
    /// as [`OptimizeConfig::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&document)
    }

    /// Load from the process environment.
    ///
    /// Reads `FLOWFORGE_CONFIG` (optional TOML file) and `FLOWFORGE_ENV`
    /// (defaults to development), then applies `FLOWFORGE_*` overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if any step fails.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let lookup = |key: &str| std::env::var(key).ok();
        let mut config = match lookup("FLOWFORGE_CONFIG") {
            Some(path) => Self::from_file(path)?,
            None => {
                let environment = lookup("FLOWFORGE_ENV")
                    .as_deref()
                    .unwrap_or("development")
                    .parse()?;
                Self::load(environment)?
            }
        };
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    /// Apply `FLOWFORGE_*` overrides from `lookup`, then revalidate.
    ///
    /// Recognized keys: `FLOWFORGE_ROUNDS`, `FLOWFORGE_DATASET_SIZE`,
    /// `FLOWFORGE_PROFILE`, `FLOWFORGE_LOG_LEVEL`, `FLOWFORGE_RUNTIME`,
    /// `FLOWFORGE_RUNTIME_URL`, `FLOWFORGE_METRICS_PORT`, `FLOWFORGE_JUDGE_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Parse`] for an unparsable value, or a
    /// validation error for the resulting configuration.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("FLOWFORGE_ROUNDS") {
            self.search.rounds = parse_number("FLOWFORGE_ROUNDS", &value)?;
        }
        if let Some(value) = lookup("FLOWFORGE_DATASET_SIZE") {
            self.dataset.target_size = parse_number("FLOWFORGE_DATASET_SIZE", &value)?;
        }
        if let Some(value) = lookup("FLOWFORGE_PROFILE") {
            self.profile = Some(value);
        }
        if let Some(value) = lookup("FLOWFORGE_LOG_LEVEL") {
            self.observability.log_level = value;
        }
        if let Some(value) = lookup("FLOWFORGE_RUNTIME") {
            self.runtime.backend = match value.to_lowercase().as_str() {
                "mock" => RuntimeKind::Mock,
                "external" => RuntimeKind::External,
                _ => {
                    return Err(ConfigurationError::UnknownName {
                        kind: "runtime backend",
                        value,
                    });
                }
            };
        }
        if let Some(value) = lookup("FLOWFORGE_RUNTIME_URL") {
            self.runtime.base_url = value;
        }
        if let Some(value) = lookup("FLOWFORGE_METRICS_PORT") {
            self.observability.metrics_port = parse_number("FLOWFORGE_METRICS_PORT", &value)?;
            self.observability.metrics_enabled = true;
        }
        if let Some(value) = lookup("FLOWFORGE_JUDGE_API_KEY") {
            self.search.evaluation.rubric.api_key = Some(value);
        }
        self.validate()
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigurationError`] found.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.app_name.trim().is_empty() {
            return Err(ConfigurationError::Invalid("app_name must not be empty".to_string()));
        }
        self.dataset.validate()?;
        self.search.validate()?;
        self.runtime.validate()?;
        self.observability.validate()
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigurationError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigurationError::Parse(format!("{key}={value} is not a valid number")))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    #[test]
    fn test_environment_from_str() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("stage".parse::<Environment>().unwrap(), Environment::Staging);
        assert!("qa".parse::<Environment>().is_err());
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(OptimizeConfig::default().validate().is_ok());
        let prod = OptimizeConfig::load(Environment::Production).unwrap();
        assert_eq!(prod.observability.log_level, "warn");
        assert_eq!(prod.runtime.circuit_failure_threshold, 3);
    }

    #[test]
    fn test_split_ratios_must_sum_to_one() {
        let mut config = DatasetConfig::default();
        config.split_ratios.test = 0.3;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidSplitRatios { .. })
        ));
        config.split_ratios = SplitRatios {
            train: 1.0,
            val: 0.0,
            test: 0.0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_target_size_bounds() {
        let config = DatasetConfig {
            target_size: 40,
            ..DatasetConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::OutOfRange { field: "dataset.target_size", .. })
        ));
    }

    #[test]
    fn test_search_budget_positivity() {
        let config = SearchConfig {
            rounds: 0,
            ..SearchConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SearchConfig {
            min_improvement: 0.0,
            ..SearchConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SearchConfig {
            tool_removal_min_observations: 0,
            ..SearchConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::OutOfRange {
                field: "search.tool_removal_min_observations",
                ..
            })
        ));
    }

    #[test]
    fn test_all_mutations_disabled_rejected() {
        let config = SearchConfig {
            enable_prompt_mutation: false,
            enable_tool_mutation: false,
            enable_topology_mutation: false,
            ..SearchConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigurationError::Invalid(_))));
    }

    #[test]
    fn test_evaluation_requires_a_judge() {
        let config = EvaluationConfig {
            judges: Vec::new(),
            ..EvaluationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_partial_document() {
        let config = OptimizeConfig::from_toml_str(
            r#"
            app_name = "fraud-graph"

            [dataset]
            target_size = 18

            [search]
            rounds = 4
            use_holdout = false

            [search.objective]
            generalization = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.app_name, "fraud-graph");
        assert_eq!(config.dataset.target_size, 18);
        assert_eq!(config.search.rounds, 4);
        assert!(!config.search.use_holdout);
        assert!((config.search.objective.generalization - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.search.patience, 3);
    }

    #[test]
    fn test_toml_parse_error() {
        assert!(matches!(
            OptimizeConfig::from_toml_str("search = 3"),
            Err(ConfigurationError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flowforge.toml");
        std::fs::write(&path, "[search]\npatience = 5\n").unwrap();
        let config = OptimizeConfig::from_file(&path).unwrap();
        assert_eq!(config.search.patience, 5);

        assert!(matches!(
            OptimizeConfig::from_file(dir.path().join("missing.toml")),
            Err(ConfigurationError::Io(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let mut config = OptimizeConfig::default();
        let vars = BTreeMap::from([
            ("FLOWFORGE_ROUNDS", "6"),
            ("FLOWFORGE_RUNTIME", "external"),
            ("FLOWFORGE_METRICS_PORT", "9100"),
            ("FLOWFORGE_JUDGE_API_KEY", "secret"),
        ]);
        config
            .apply_overrides(|key| vars.get(key).map(ToString::to_string))
            .unwrap();
        assert_eq!(config.search.rounds, 6);
        assert_eq!(config.runtime.backend, RuntimeKind::External);
        assert!(config.observability.metrics_enabled);
        assert_eq!(config.search.evaluation.rubric.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_override_parse_error() {
        let mut config = OptimizeConfig::default();
        let result =
            config.apply_overrides(|key| (key == "FLOWFORGE_ROUNDS").then(|| "many".to_string()));
        assert!(matches!(result, Err(ConfigurationError::Parse(_))));
    }

    #[test]
    fn test_api_key_never_serialized() {
        let mut config = OptimizeConfig::default();
        config.search.evaluation.rubric.api_key = Some("secret".into());
        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("secret"));
    }
}
