//! HTTP adapter for an external workflow runtime service.
//!
//! Endpoints (relative to `base_url`):
//!
//! - `GET  /schema`  returns `{"entities": [...], "relations": [...]}`
//! - `GET  /tools`   returns `[{"id", "capability_tags", "description"}]`
//! - `POST /execute` takes `{"workflow": <rendered blueprint>, "case": {...}}` and
//!   returns `{"output", "latency_ms", "token_cost"}`
//!
//! Every call goes through a shared [`CircuitBreaker`]; an open circuit and
//! transport failures map to retryable [`RuntimeExecutionError`] variants.
//! Unparsable bodies map to `MalformedOutput`, which is not retried.

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::render;
use async_trait::async_trait;
use flowforge_core::blueprint::WorkflowBlueprint;
use flowforge_core::config::RuntimeConfig;
use flowforge_core::dataset::Case;
use flowforge_core::error::RuntimeExecutionError;
use flowforge_core::execution::RuntimeOutput;
use flowforge_core::runtime::{ArtifactHandle, WorkflowRuntime};
use flowforge_core::schema::{SchemaSnapshot, ToolDescriptor};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    output: String,
    latency_ms: f64,
    token_cost: f64,
}

/// Runtime backed by an HTTP service.
#[derive(Debug, Clone)]
pub struct ExternalRuntime {
    client: Client,
    base_url: String,
    timeout: Duration,
    breaker: CircuitBreaker,
}

impl ExternalRuntime {
    /// Create an adapter from runtime configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeExecutionError::Invocation`] if the HTTP client cannot be built.
    pub fn new(config: &RuntimeConfig) -> Result<Self, RuntimeExecutionError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RuntimeExecutionError::Invocation(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
            breaker: CircuitBreaker::new(CircuitBreakerConfig::from_runtime_config(config)),
        })
    }

    /// The breaker guarding this runtime.
    #[must_use]
    pub const fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, RuntimeExecutionError> {
        let timeout = self.timeout;
        let result = self
            .breaker
            .call(|| async move {
                let response = request.send().await.map_err(|e| transport_error(&e, timeout))?;

                match response.status() {
                    StatusCode::OK => response
                        .json::<T>()
                        .await
                        .map_err(|e| RuntimeExecutionError::MalformedOutput(e.to_string())),
                    status => {
                        let body = response.text().await.unwrap_or_default();
                        Err(RuntimeExecutionError::Invocation(format!(
                            "runtime returned {}: {body}",
                            status.as_u16()
                        )))
                    }
                }
            })
            .await;
        result.map_err(RuntimeExecutionError::from)
    }
}

fn transport_error(err: &reqwest::Error, timeout: Duration) -> RuntimeExecutionError {
    if err.is_timeout() {
        RuntimeExecutionError::Timeout {
            after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    } else {
        RuntimeExecutionError::Invocation(err.to_string())
    }
}

#[async_trait]
impl WorkflowRuntime for ExternalRuntime {
    async fn fetch_schema_snapshot(&self) -> Result<SchemaSnapshot, RuntimeExecutionError> {
        self.send_json(self.client.get(self.url("schema"))).await
    }

    async fn fetch_tool_catalog(&self) -> Result<Vec<ToolDescriptor>, RuntimeExecutionError> {
        self.send_json(self.client.get(self.url("tools"))).await
    }

    async fn execute_case(
        &self,
        blueprint: &WorkflowBlueprint,
        case: &Case,
    ) -> Result<RuntimeOutput, RuntimeExecutionError> {
        let body = json!({
            "workflow": render::render_blueprint(blueprint),
            "case": {
                "id": case.id,
                "question": case.question,
                "intent": case.intent,
            },
        });
        let response: ExecuteResponse = self
            .send_json(self.client.post(self.url("execute")).json(&body))
            .await?;

        if !response.latency_ms.is_finite() || !response.token_cost.is_finite() {
            return Err(RuntimeExecutionError::MalformedOutput(
                "non-finite latency or token cost".to_string(),
            ));
        }

        Ok(RuntimeOutput {
            raw_output: response.output,
            latency_ms: response.latency_ms,
            token_cost: response.token_cost,
        })
    }

    async fn materialize(
        &self,
        blueprint: &WorkflowBlueprint,
        destination: &Path,
    ) -> Result<ArtifactHandle, RuntimeExecutionError> {
        render::write_artifact(blueprint, destination).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{mock_catalog, mock_schema};
    use flowforge_core::blueprint::{TopologyMode, build_initial_blueprint};
    use flowforge_core::config::RuntimeKind;
    use flowforge_core::dataset::{CaseLineage, Difficulty, Split, TaskIntent};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, threshold: u32) -> RuntimeConfig {
        RuntimeConfig {
            backend: RuntimeKind::External,
            base_url: server.uri(),
            request_timeout_ms: 2_000,
            circuit_failure_threshold: threshold,
            circuit_reset_ms: 60_000,
        }
    }

    fn case() -> Case {
        Case {
            id: "case-0001".into(),
            question: "Find each Person that OWNS an Account".into(),
            expected: "query: Person OWNS".into(),
            intent: TaskIntent::Query,
            split: Split::Train,
            lineage: CaseLineage {
                template_id: "query-0".into(),
                paraphrased: false,
                hard_negative: false,
                difficulty: Difficulty::L1,
            },
        }
    }

    fn blueprint() -> WorkflowBlueprint {
        build_initial_blueprint("bp-0000", "demo", "task", mock_catalog(), TopologyMode::Linear)
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_schema_and_tools() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/schema"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_schema()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tools"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_catalog()))
            .mount(&server)
            .await;

        let runtime = ExternalRuntime::new(&config(&server, 5)).unwrap();
        assert_eq!(runtime.fetch_schema_snapshot().await.unwrap(), mock_schema());
        assert_eq!(runtime.fetch_tool_catalog().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_execute_case() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/execute"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": "query: Person OWNS",
                "latency_ms": 120.5,
                "token_cost": 0.02,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let runtime = ExternalRuntime::new(&config(&server, 5)).unwrap();
        let output = runtime.execute_case(&blueprint(), &case()).await.unwrap();
        assert_eq!(output.raw_output, "query: Person OWNS");
        assert!((output.latency_ms - 120.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_malformed_body_is_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/execute"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let runtime = ExternalRuntime::new(&config(&server, 5)).unwrap();
        let err = runtime.execute_case(&blueprint(), &case()).await.unwrap_err();
        assert!(matches!(err, RuntimeExecutionError::MalformedOutput(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_server_errors_open_circuit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/execute"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(2)
            .mount(&server)
            .await;

        let runtime = ExternalRuntime::new(&config(&server, 2)).unwrap();
        for _ in 0..2 {
            let err = runtime.execute_case(&blueprint(), &case()).await.unwrap_err();
            assert!(matches!(err, RuntimeExecutionError::Invocation(_)));
        }

        let err = runtime.execute_case(&blueprint(), &case()).await.unwrap_err();
        assert!(matches!(err, RuntimeExecutionError::CircuitOpen { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_slow_runtime_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/schema"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(mock_schema())
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let mut cfg = config(&server, 5);
        cfg.request_timeout_ms = 50;
        let runtime = ExternalRuntime::new(&cfg).unwrap();
        let err = runtime.fetch_schema_snapshot().await.unwrap_err();
        assert_eq!(err, RuntimeExecutionError::Timeout { after_ms: 50 });
    }
}
