//! Behavior of the scripted runtime.

use flowforge_core::dataset::Split;
use flowforge_core::error::RuntimeExecutionError;
use flowforge_core::runtime::WorkflowRuntime;
use flowforge_testing::{ScriptedRuntime, case_fixture, sample_blueprint, sample_catalog};

#[tokio::test]
async fn test_unscripted_cases_answer_like_the_mock() {
    let runtime = ScriptedRuntime::default();
    let blueprint = sample_blueprint(&sample_catalog());
    let case = case_fixture(0, Split::Train);

    let output = runtime.execute_case(&blueprint, &case).await.unwrap();
    assert!(output.raw_output.contains("Person"));
    assert_eq!(runtime.calls(&case.id), 1);
}

#[tokio::test]
async fn test_fail_times_then_recover() {
    let case = case_fixture(1, Split::Train);
    let runtime = ScriptedRuntime::default().fail_times(&case.id, 2);
    let blueprint = sample_blueprint(&sample_catalog());

    for _ in 0..2 {
        let err = runtime.execute_case(&blueprint, &case).await.unwrap_err();
        assert!(err.is_retryable());
    }
    assert!(runtime.execute_case(&blueprint, &case).await.is_ok());
    assert_eq!(runtime.calls(&case.id), 3);
}

#[tokio::test]
async fn test_malformed_is_not_retryable() {
    let case = case_fixture(2, Split::Train);
    let runtime = ScriptedRuntime::default().malformed(&case.id);
    let err = runtime
        .execute_case(&sample_blueprint(&sample_catalog()), &case)
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeExecutionError::MalformedOutput(_)));
}

#[tokio::test]
async fn test_clones_share_call_counts() {
    let case = case_fixture(3, Split::Validation);
    let runtime = ScriptedRuntime::default().answer(&case.id, "query: Loan OWNS");
    let observer = runtime.clone();

    let output = runtime
        .execute_case(&sample_blueprint(&sample_catalog()), &case)
        .await
        .unwrap();
    assert_eq!(output.raw_output, "query: Loan OWNS");
    assert_eq!(observer.total_calls(), 1);
}

#[tokio::test]
async fn test_schema_outage() {
    let runtime = ScriptedRuntime::default().schema_unavailable();
    assert!(runtime.fetch_schema_snapshot().await.is_err());
    assert_eq!(runtime.fetch_tool_catalog().await.unwrap().len(), 6);
}
