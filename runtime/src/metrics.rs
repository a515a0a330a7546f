//! Prometheus metrics for case execution, judging, and search progress.
//!
//! Recording goes through the `metrics` facade, so it is a no-op until a
//! recorder is installed. The binary installs one through [`MetricsServer`]
//! when metrics are enabled.
//!
//! # Example
//!
//! ```rust,no_run
//! use flowforge_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Exporter could not be configured
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Exporter could not be installed
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus scrape endpoint.
pub struct MetricsServer {
    addr: SocketAddr,
    started: bool,
}

impl MetricsServer {
    /// Create a server for `addr` (e.g. `0.0.0.0:9090`).
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            started: false,
        }
    }

    /// Register metric descriptions, install the recorder, and start serving.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or a recorder
    /// is already installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        if self.started {
            return Ok(());
        }

        PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("latency_seconds".to_string()),
                &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .install()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        register_metrics();
        self.started = true;
        tracing::info!(addr = %self.addr, "Metrics server started at http://{}/metrics", self.addr);
        Ok(())
    }

    /// Whether the exporter is running.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "flowforge_case_executions_total",
        "Case executions by outcome (scored, or the invalid reason)"
    );
    describe_counter!(
        "flowforge_case_retries_total",
        "Runtime call retries across all cases"
    );
    describe_histogram!(
        "flowforge_case_latency_seconds",
        "Runtime latency reported for scored cases"
    );
    describe_counter!(
        "flowforge_judge_votes_total",
        "Judge votes by judge and outcome"
    );
    describe_counter!(
        "flowforge_search_expansions_total",
        "Search expansions by mutation family"
    );
    describe_gauge!(
        "flowforge_search_best_objective",
        "Best model-selection score of the current run"
    );
    describe_gauge!(
        "flowforge_runtime_circuit_state",
        "External runtime circuit state (0=closed, 1=half-open, 2=open)"
    );
}

/// Case execution recorder.
pub struct CaseMetrics;

impl CaseMetrics {
    /// Record a case outcome (`scored` or an invalid reason).
    pub fn record_outcome(outcome: &'static str) {
        counter!("flowforge_case_executions_total", "outcome" => outcome).increment(1);
    }

    /// Record runtime latency of a scored case.
    pub fn record_latency(latency: Duration) {
        histogram!("flowforge_case_latency_seconds").record(latency.as_secs_f64());
    }
}

/// Judge vote recorder.
pub struct JudgeMetrics;

impl JudgeMetrics {
    /// Record one judge's vote or failure.
    pub fn record_vote(judge: &'static str, outcome: &'static str) {
        counter!("flowforge_judge_votes_total", "judge" => judge, "outcome" => outcome)
            .increment(1);
    }
}

/// Search progress recorder.
pub struct SearchMetrics;

impl SearchMetrics {
    /// Record one expansion.
    pub fn record_expansion(family: &'static str) {
        counter!("flowforge_search_expansions_total", "family" => family).increment(1);
    }

    /// Record the best model-selection score so far.
    pub fn record_best(score: f64) {
        gauge!("flowforge_search_best_objective").set(score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorders_render() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            register_metrics();
            CaseMetrics::record_outcome("scored");
            CaseMetrics::record_latency(Duration::from_millis(120));
            JudgeMetrics::record_vote("rule", "ok");
            SearchMetrics::record_expansion("tool");
            SearchMetrics::record_best(0.72);
        });

        let rendered = handle.render();
        assert!(rendered.contains("flowforge_case_executions_total{outcome=\"scored\"} 1"));
        assert!(rendered.contains("flowforge_judge_votes_total"));
        assert!(rendered.contains("flowforge_search_expansions_total{family=\"tool\"} 1"));
        assert!(rendered.contains("flowforge_search_best_objective 0.72"));
    }

    #[test]
    fn test_server_not_started_by_default() {
        let server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        assert!(!server.is_started());
    }
}
