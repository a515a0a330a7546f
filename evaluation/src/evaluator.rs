//! Blueprint evaluation over dataset splits.

use crate::ensemble::JudgeEnsemble;
use crate::judge::JudgeRequest;
use crate::reflection::reflect;
use crate::taxonomy::{classify_low_scores, histogram};
use flowforge_core::blueprint::WorkflowBlueprint;
use flowforge_core::config::{EvaluationConfig, SearchConfig};
use flowforge_core::dataset::{Case, Split, SyntheticDataset};
use flowforge_core::error::{ConfigurationError, RuntimeExecutionError};
use flowforge_core::execution::{CaseExecution, CaseOutcome, RuntimeOutput};
use flowforge_core::objective::{ObjectiveInputs, ObjectiveWeights, uncertainty};
use flowforge_core::runtime::WorkflowRuntime;
use flowforge_core::summary::EvaluationSummary;
use flowforge_runtime::metrics::CaseMetrics;
use flowforge_runtime::retry::{RetryPolicy, retry_with_predicate};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::time::Duration;

/// Invalid reason recorded when every judge failed.
pub const JUDGE_UNAVAILABLE: &str = "judge_unavailable";

/// Runs a blueprint against cases and aggregates the results per split.
///
/// Cases of one call run concurrently up to `max_concurrency`; outcomes keep
/// case order. Runtime failures are retried with backoff and a case that
/// still fails is recorded as invalid instead of failing the evaluation.
#[derive(Debug, Clone)]
pub struct WorkflowEvaluator<R> {
    runtime: R,
    ensemble: JudgeEnsemble,
    config: EvaluationConfig,
    objective: ObjectiveWeights,
    retry: RetryPolicy,
    low_score_threshold: f64,
}

impl<R: WorkflowRuntime> WorkflowEvaluator<R> {
    /// Create an evaluator.
    #[must_use]
    pub fn new(
        runtime: R,
        ensemble: JudgeEnsemble,
        config: EvaluationConfig,
        objective: ObjectiveWeights,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            runtime,
            ensemble,
            config,
            objective,
            retry,
            low_score_threshold: 0.6,
        }
    }

    /// Create an evaluator from search settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if a configured judge cannot be built.
    pub fn from_config(runtime: R, config: &SearchConfig) -> Result<Self, ConfigurationError> {
        let ensemble = JudgeEnsemble::from_config(&config.evaluation)?;
        Ok(
            Self::new(runtime, ensemble, config.evaluation.clone(), config.objective.clone())
                .with_low_score_threshold(config.low_score_threshold),
        )
    }

    /// Score below which a case counts as failing for taxonomy and reflection.
    #[must_use]
    pub const fn with_low_score_threshold(mut self, threshold: f64) -> Self {
        self.low_score_threshold = threshold;
        self
    }

    /// The runtime cases execute against.
    #[must_use]
    pub const fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Evaluate `blueprint` on each requested split of `dataset`.
    pub async fn evaluate(
        &self,
        blueprint: &WorkflowBlueprint,
        dataset: &SyntheticDataset,
        splits: &[Split],
    ) -> BTreeMap<Split, EvaluationSummary> {
        let mut summaries = BTreeMap::new();
        for split in splits {
            let summary = self
                .evaluate_cases(blueprint, dataset.split(*split), *split)
                .await;
            summaries.insert(*split, summary);
        }
        summaries
    }

    /// Evaluate `blueprint` on `cases`, all belonging to `split`.
    pub async fn evaluate_cases<'c, I>(
        &self,
        blueprint: &WorkflowBlueprint,
        cases: I,
        split: Split,
    ) -> EvaluationSummary
    where
        I: IntoIterator<Item = &'c Case>,
    {
        let outcomes: Vec<CaseOutcome> = stream::iter(cases)
            .map(|case| self.evaluate_case(blueprint, case))
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let summary = summarize(
            blueprint,
            split,
            outcomes,
            &self.objective,
            self.config.invalid_fraction_threshold,
            self.low_score_threshold,
        );

        tracing::info!(
            blueprint = blueprint.id(),
            split = %split,
            cases = summary.case_count,
            invalid = summary.invalid_count,
            mean_score = summary.mean_score,
            objective = summary.objective,
            "Evaluated blueprint"
        );
        if summary.degraded {
            tracing::warn!(
                blueprint = blueprint.id(),
                split = %split,
                invalid_fraction = summary.invalid_fraction,
                "Evaluation degraded: too many invalid cases"
            );
        }
        summary
    }

    async fn evaluate_case(&self, blueprint: &WorkflowBlueprint, case: &Case) -> CaseOutcome {
        let retried = retry_with_predicate(
            &self.retry,
            || self.execute_with_timeout(blueprint, case),
            RuntimeExecutionError::is_retryable,
        )
        .await;
        let attempts = retried.attempts;

        let output = match retried.result {
            Ok(output) => output,
            Err(err) => {
                tracing::warn!(case = %case.id, attempts, error = %err, "Case execution failed");
                CaseMetrics::record_outcome(err.kind());
                return CaseOutcome::Invalid {
                    case_id: case.id.clone(),
                    split: case.split,
                    reason: err.kind().to_string(),
                    detail: err.to_string(),
                    attempts,
                };
            }
        };

        let request = JudgeRequest {
            question: &case.question,
            expected: &case.expected,
            produced: &output.raw_output,
            hard_negative: case.is_hard_negative(),
        };
        let verdict = match self.ensemble.judge(request).await {
            Ok(verdict) => verdict,
            Err(err) => {
                tracing::warn!(case = %case.id, error = %err, "No judge produced a vote");
                CaseMetrics::record_outcome(JUDGE_UNAVAILABLE);
                return CaseOutcome::Invalid {
                    case_id: case.id.clone(),
                    split: case.split,
                    reason: JUDGE_UNAVAILABLE.to_string(),
                    detail: err.to_string(),
                    attempts,
                };
            }
        };

        CaseMetrics::record_outcome("scored");
        CaseMetrics::record_latency(
            Duration::try_from_secs_f64(output.latency_ms / 1000.0).unwrap_or(Duration::ZERO),
        );

        CaseOutcome::Scored(CaseExecution {
            case_id: case.id.clone(),
            split: case.split,
            hard_negative: case.is_hard_negative(),
            question: case.question.clone(),
            output,
            votes: verdict.votes,
            score: verdict.aggregate.score,
            confidence: verdict.aggregate.confidence,
            agreement: verdict.aggregate.agreement,
            rationale: verdict.rationale,
            attempts,
        })
    }

    async fn execute_with_timeout(
        &self,
        blueprint: &WorkflowBlueprint,
        case: &Case,
    ) -> Result<RuntimeOutput, RuntimeExecutionError> {
        let output = tokio::time::timeout(
            self.config.call_timeout(),
            self.runtime.execute_case(blueprint, case),
        )
        .await
        .unwrap_or(Err(RuntimeExecutionError::Timeout {
            after_ms: self.config.call_timeout_ms,
        }))?;

        let valid = |value: f64| value.is_finite() && value >= 0.0;
        if !valid(output.latency_ms) || !valid(output.token_cost) {
            return Err(RuntimeExecutionError::MalformedOutput(format!(
                "latency {} / token cost {} must be finite and non-negative",
                output.latency_ms, output.token_cost
            )));
        }
        Ok(output)
    }
}

/// Aggregate case outcomes into a split summary.
///
/// Means and spreads cover scored cases only. The summary is degraded when
/// the invalid fraction exceeds `invalid_fraction_threshold`. With no scored
/// case every mean is zero, so uncertainty is at its maximum.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summarize(
    blueprint: &WorkflowBlueprint,
    split: Split,
    outcomes: Vec<CaseOutcome>,
    objective: &ObjectiveWeights,
    invalid_fraction_threshold: f64,
    low_score_threshold: f64,
) -> EvaluationSummary {
    let case_count = outcomes.len();
    let invalid_count = outcomes.iter().filter(|o| o.is_invalid()).count();
    let invalid_fraction = if case_count == 0 {
        0.0
    } else {
        invalid_count as f64 / case_count as f64
    };

    let executions: Vec<&CaseExecution> =
        outcomes.iter().filter_map(CaseOutcome::as_scored).collect();
    let mean_of = |f: fn(&CaseExecution) -> f64| mean(executions.iter().map(|e| f(e)));

    let mean_score = mean_of(|e| e.score);
    let score_std = population_std(executions.iter().map(|e| e.score), mean_score);
    let mean_confidence = mean_of(|e| e.confidence);
    let mean_agreement = mean_of(|e| e.agreement);
    let mean_latency_ms = mean_of(|e| e.output.latency_ms);
    let mean_token_cost = mean_of(|e| e.output.token_cost);

    let inputs = ObjectiveInputs {
        mean_score,
        score_std,
        mean_confidence,
        mean_agreement,
        mean_latency_ms,
        mean_token_cost,
        complexity: blueprint.complexity(),
    };

    let signals = classify_low_scores(executions.iter().copied(), low_score_threshold);
    let low: Vec<&CaseExecution> = executions
        .iter()
        .copied()
        .filter(|e| e.score < low_score_threshold)
        .collect();

    EvaluationSummary {
        blueprint_id: blueprint.id().to_string(),
        split,
        case_count,
        invalid_count,
        invalid_fraction,
        degraded: invalid_fraction > invalid_fraction_threshold,
        mean_score,
        score_std,
        mean_latency_ms,
        mean_token_cost,
        mean_confidence,
        mean_agreement,
        complexity: inputs.complexity,
        uncertainty: uncertainty(mean_agreement, score_std),
        objective: objective.objective(&inputs),
        failure_histogram: histogram(&signals),
        reflection: reflect(&low).text,
        outcomes,
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn population_std(values: impl Iterator<Item = f64>, mean_value: f64) -> f64 {
    mean(values.map(|v| (v - mean_value).powi(2))).sqrt()
}
