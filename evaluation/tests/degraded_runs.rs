//! Invalid-case accounting across a whole split.

use flowforge_core::config::EvaluationConfig;
use flowforge_core::dataset::Split;
use flowforge_core::objective::ObjectiveWeights;
use flowforge_evaluation::judge::{HeuristicJudge, Judge, RuleJudge};
use flowforge_evaluation::{JudgeEnsemble, WorkflowEvaluator};
use flowforge_testing::{ScriptedRuntime, dataset_fixture, sample_blueprint, sample_catalog};
use std::time::Duration;

fn config() -> EvaluationConfig {
    EvaluationConfig {
        max_retries: 1,
        initial_backoff_ms: 1,
        max_backoff_ms: 1,
        call_timeout_ms: 500,
        invalid_fraction_threshold: 0.5,
        ..EvaluationConfig::default()
    }
}

fn ensemble() -> JudgeEnsemble {
    JudgeEnsemble::new(
        vec![Judge::Rule(RuleJudge), Judge::Heuristic(HeuristicJudge)],
        Default::default(),
        Duration::from_secs(1),
    )
}

fn runtime_failing(count: usize) -> ScriptedRuntime {
    dataset_fixture(10)
        .cases()
        .iter()
        .take(count)
        .fold(ScriptedRuntime::default(), |runtime, case| {
            runtime.fail_always(&case.id)
        })
}

async fn evaluate(runtime: ScriptedRuntime) -> flowforge_core::summary::EvaluationSummary {
    let evaluator =
        WorkflowEvaluator::new(runtime, ensemble(), config(), ObjectiveWeights::default());
    let dataset = dataset_fixture(10);
    evaluator
        .evaluate_cases(&sample_blueprint(&sample_catalog()), dataset.cases(), Split::Train)
        .await
}

#[tokio::test]
async fn test_forty_percent_invalid_is_not_degraded() {
    let runtime = runtime_failing(4);
    let summary = evaluate(runtime.clone()).await;

    assert_eq!(summary.case_count, 10);
    assert_eq!(summary.invalid_count, 4);
    assert!((summary.invalid_fraction - 0.4).abs() < 1e-9);
    assert!(!summary.degraded);
    assert_eq!(summary.valid_count(), 6);
    // Each failing case was tried once and retried once.
    assert_eq!(runtime.calls("case-0000"), 2);
}

#[tokio::test]
async fn test_sixty_percent_invalid_is_degraded() {
    let summary = evaluate(runtime_failing(6)).await;

    assert_eq!(summary.invalid_count, 6);
    assert!(summary.degraded);
    assert!(summary.has_valid_cases());
}

#[tokio::test]
async fn test_invalid_cases_do_not_move_the_mean() {
    let clean = evaluate(ScriptedRuntime::default()).await;
    let partial = evaluate(runtime_failing(4)).await;

    let expected: f64 = clean.executions().skip(4).map(|e| e.score).sum::<f64>() / 6.0;
    assert!((partial.mean_score - expected).abs() < 1e-9);
}

#[tokio::test]
async fn test_all_invalid_is_degraded_with_zero_means() {
    let summary = evaluate(runtime_failing(10)).await;

    assert!(summary.degraded);
    assert!(!summary.has_valid_cases());
    assert!(summary.mean_score.abs() < f64::EPSILON);
    assert!(summary.failure_histogram.is_empty());
}
