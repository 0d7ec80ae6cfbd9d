use crate::{IgnoreReason, ProcessOutcome, Result, ScoreboardError};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_with_registry, Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Metrics collector for the scoreboard
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    pub events_received: Counter,
    pub events_ignored: CounterVec,
    pub counter_increments: Counter,
    pub scores_published: Counter,
    pub publish_failures: Counter,
    pub invocation_errors: Counter,
    pub process_duration: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let events_received = register_counter_with_registry!(
            Opts::new("scoreboard_events_received_total", "Total number of events received"),
            registry
        )?;

        let events_ignored = register_counter_vec_with_registry!(
            Opts::new("scoreboard_events_ignored_total", "Events that produced no score, by reason"),
            &["reason"],
            registry
        )?;

        let counter_increments = register_counter_with_registry!(
            Opts::new("scoreboard_counter_increments_total", "Total number of kill counter increments"),
            registry
        )?;

        let scores_published = register_counter_with_registry!(
            Opts::new("scoreboard_scores_published_total", "Total number of scores published"),
            registry
        )?;

        let publish_failures = register_counter_with_registry!(
            Opts::new("scoreboard_publish_failures_total", "Total number of failed score publishes"),
            registry
        )?;

        let invocation_errors = register_counter_with_registry!(
            Opts::new("scoreboard_invocation_errors_total", "Invocations that failed and were not acknowledged"),
            registry
        )?;

        let process_duration = register_histogram_with_registry!(
            HistogramOpts::new("scoreboard_process_duration_seconds", "Time spent processing one event")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            registry
        )?;

        Ok(Self {
            registry,
            events_received,
            events_ignored,
            counter_increments,
            scores_published,
            publish_failures,
            invocation_errors,
            process_duration,
        })
    }

    /// Export metrics in Prometheus format
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| ScoreboardError::InvalidArgument(format!("Metrics are not UTF-8: {}", e)))
    }

    pub fn record_ignored(&self, reason: &IgnoreReason) {
        self.events_ignored.with_label_values(&[reason.as_str()]).inc();
    }

    pub fn record_outcome(&self, outcome: &ProcessOutcome, duration: Duration) {
        self.process_duration.observe(duration.as_secs_f64());
        match outcome {
            ProcessOutcome::Ignored(reason) => self.record_ignored(reason),
            ProcessOutcome::Published(_) => {
                self.counter_increments.inc();
                self.scores_published.inc();
            }
            ProcessOutcome::PublishFailed { .. } => {
                self.counter_increments.inc();
                self.publish_failures.inc();
            }
        }
    }
}

/// Health check endpoint
async fn health() -> String {
    serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "scoreboard"
    })
    .to_string()
}

/// Metrics endpoint for Prometheus scraping
async fn metrics_endpoint(
    State(metrics): State<Arc<Metrics>>,
) -> std::result::Result<String, StatusCode> {
    metrics.export().map_err(|e| {
        tracing::error!("Failed to export metrics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

pub fn metrics_router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_endpoint))
        .route("/health", get(health))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(metrics)
}
