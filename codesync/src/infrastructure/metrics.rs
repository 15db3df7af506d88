// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics Service
//!
//! A single struct owning a `prometheus::Registry` plus one field per named
//! metric, all registered up front in `new`, with small `record_*`/`inc_*`
//! methods called from the application services and a `render` method for
//! the `/metrics` HTTP endpoint.

use std::sync::Arc;
use std::time::Duration;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

use codesync_domain::error::SyncError;

const NAMESPACE: &str = "codesync";

/// Prometheus metrics for the sync worker.
#[derive(Clone)]
pub struct SyncMetrics {
    registry: Arc<Registry>,

    sync_duration_seconds: Histogram,
    chunks_added_total: IntCounter,
    chunks_modified_total: IntCounter,
    chunks_deleted_total: IntCounter,
    embedding_batch_retries_total: IntCounter,
    circuit_breaker_transitions_total: IntCounterVec,
    queue_depth: IntGauge,
    health_monitor_restarts_total: IntCounter,
}

impl SyncMetrics {
    pub fn new() -> Result<Self, SyncError> {
        let registry = Registry::new();

        let sync_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("sync_duration_seconds", "Time spent running a single project sync")
                .namespace(NAMESPACE)
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
        )
        .map_err(registration_error("sync_duration_seconds"))?;

        let chunks_added_total = IntCounter::with_opts(
            Opts::new("chunks_added_total", "Total knowledge chunks inserted").namespace(NAMESPACE),
        )
        .map_err(registration_error("chunks_added_total"))?;

        let chunks_modified_total = IntCounter::with_opts(
            Opts::new("chunks_modified_total", "Total knowledge chunks replaced").namespace(NAMESPACE),
        )
        .map_err(registration_error("chunks_modified_total"))?;

        let chunks_deleted_total = IntCounter::with_opts(
            Opts::new("chunks_deleted_total", "Total knowledge chunks deleted").namespace(NAMESPACE),
        )
        .map_err(registration_error("chunks_deleted_total"))?;

        let embedding_batch_retries_total = IntCounter::with_opts(
            Opts::new(
                "embedding_batch_retries_total",
                "Total retry attempts issued by the batch embedder",
            )
            .namespace(NAMESPACE),
        )
        .map_err(registration_error("embedding_batch_retries_total"))?;

        let circuit_breaker_transitions_total = IntCounterVec::new(
            Opts::new(
                "circuit_breaker_transitions_total",
                "Total circuit breaker state transitions",
            )
            .namespace(NAMESPACE),
            &["to_state"],
        )
        .map_err(registration_error("circuit_breaker_transitions_total"))?;

        let queue_depth = IntGauge::with_opts(
            Opts::new("queue_depth", "Current number of queued sync jobs").namespace(NAMESPACE),
        )
        .map_err(registration_error("queue_depth"))?;

        let health_monitor_restarts_total = IntCounter::with_opts(
            Opts::new(
                "health_monitor_restarts_total",
                "Total worker restarts issued by the health monitor",
            )
            .namespace(NAMESPACE),
        )
        .map_err(registration_error("health_monitor_restarts_total"))?;

        registry
            .register(Box::new(sync_duration_seconds.clone()))
            .map_err(registration_error("sync_duration_seconds"))?;
        registry
            .register(Box::new(chunks_added_total.clone()))
            .map_err(registration_error("chunks_added_total"))?;
        registry
            .register(Box::new(chunks_modified_total.clone()))
            .map_err(registration_error("chunks_modified_total"))?;
        registry
            .register(Box::new(chunks_deleted_total.clone()))
            .map_err(registration_error("chunks_deleted_total"))?;
        registry
            .register(Box::new(embedding_batch_retries_total.clone()))
            .map_err(registration_error("embedding_batch_retries_total"))?;
        registry
            .register(Box::new(circuit_breaker_transitions_total.clone()))
            .map_err(registration_error("circuit_breaker_transitions_total"))?;
        registry
            .register(Box::new(queue_depth.clone()))
            .map_err(registration_error("queue_depth"))?;
        registry
            .register(Box::new(health_monitor_restarts_total.clone()))
            .map_err(registration_error("health_monitor_restarts_total"))?;

        Ok(Self {
            registry: Arc::new(registry),
            sync_duration_seconds,
            chunks_added_total,
            chunks_modified_total,
            chunks_deleted_total,
            embedding_batch_retries_total,
            circuit_breaker_transitions_total,
            queue_depth,
            health_monitor_restarts_total,
        })
    }

    pub fn record_sync_duration(&self, duration: Duration) {
        self.sync_duration_seconds.observe(duration.as_secs_f64());
    }

    pub fn record_chunks_added(&self, count: u64) {
        self.chunks_added_total.inc_by(count);
    }

    pub fn record_chunks_modified(&self, count: u64) {
        self.chunks_modified_total.inc_by(count);
    }

    pub fn record_chunks_deleted(&self, count: u64) {
        self.chunks_deleted_total.inc_by(count);
    }

    pub fn record_embedding_batch_retry(&self) {
        self.embedding_batch_retries_total.inc();
    }

    pub fn record_circuit_breaker_transition(&self, to_state: &str) {
        self.circuit_breaker_transitions_total.with_label_values(&[to_state]).inc();
    }

    pub fn set_queue_depth(&self, depth: i64) {
        self.queue_depth.set(depth);
    }

    pub fn record_health_monitor_restart(&self) {
        self.health_monitor_restarts_total.inc();
    }

    /// Renders the registry's current state in Prometheus text exposition
    /// format, for serving over the `/metrics` HTTP endpoint.
    pub fn render(&self) -> Result<String, SyncError> {
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .map_err(|e| SyncError::Unknown(format!("failed to encode metrics: {e}")))
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new().expect("metric registration with static options never fails")
    }
}

fn registration_error(metric_name: &'static str) -> impl Fn(prometheus::Error) -> SyncError {
    move |e| SyncError::Unknown(format!("failed to register {metric_name} metric: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_a_recorded_counter() {
        let metrics = SyncMetrics::new().unwrap();
        metrics.record_chunks_added(7);
        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("codesync_chunks_added_total 7"));
    }

    #[test]
    fn circuit_breaker_transitions_are_labeled_by_state() {
        let metrics = SyncMetrics::new().unwrap();
        metrics.record_circuit_breaker_transition("open");
        metrics.record_circuit_breaker_transition("open");
        metrics.record_circuit_breaker_transition("half_open");

        let rendered = metrics.render().unwrap();
        assert!(rendered.contains(r#"to_state="open"} 2"#));
        assert!(rendered.contains(r#"to_state="half_open"} 1"#));
    }

    #[test]
    fn queue_depth_gauge_reflects_latest_value() {
        let metrics = SyncMetrics::new().unwrap();
        metrics.set_queue_depth(4);
        metrics.set_queue_depth(2);
        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("codesync_queue_depth 2"));
    }

    #[test]
    fn sync_duration_is_observed_into_the_histogram() {
        let metrics = SyncMetrics::new().unwrap();
        metrics.record_sync_duration(Duration::from_millis(250));
        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("codesync_sync_duration_seconds_count 1"));
    }
}
