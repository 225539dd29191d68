//! Prometheus metrics for chatbridge: queue depth, active assignments, and
//! drain/reap tick timings, in the same `Registry`/`*Vec`/`TextEncoder`
//! shape as the teacher's collector, but pushed from the orchestrator and
//! tickers as events happen rather than pulled from the database at scrape
//! time (those gauges are cheap in-process counters here, not derived from
//! a query).

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

use crate::app::AppState;

#[derive(Clone)]
pub struct ChatbridgeMetrics {
    registry: Registry,
    queue_depth: GaugeVec,
    active_assignments: GaugeVec,
    connected_agents: GaugeVec,
    drain_tick_seconds: HistogramVec,
    reap_tick_seconds: HistogramVec,
    messages_total: CounterVec,
    errors_total: CounterVec,
}

impl ChatbridgeMetrics {
    pub fn new() -> Self {
        Self::try_new().expect("failed to construct metrics registry")
    }

    fn try_new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let queue_depth = GaugeVec::new(
            Opts::new("chatbridge_queue_depth", "Queued messages waiting for an agent, by job type"),
            &["job_type"],
        )?;
        let active_assignments = GaugeVec::new(
            Opts::new("chatbridge_active_assignments", "Jobs currently assigned to an agent"),
            &["job_type"],
        )?;
        let connected_agents = GaugeVec::new(
            Opts::new("chatbridge_connected_agents", "Live agent socket connections"),
            &["org_id"],
        )?;
        let drain_tick_seconds = HistogramVec::new(
            HistogramOpts::new("chatbridge_drain_tick_seconds", "drainQueue tick duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["job_type"],
        )?;
        let reap_tick_seconds = HistogramVec::new(
            HistogramOpts::new("chatbridge_reap_tick_seconds", "reapIdle tick duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &[],
        )?;
        let messages_total = CounterVec::new(
            Opts::new("chatbridge_messages_total", "Processed messages by terminal status"),
            &["status"],
        )?;
        let errors_total = CounterVec::new(Opts::new("chatbridge_errors_total", "Errors by source"), &["source"])?;

        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(active_assignments.clone()))?;
        registry.register(Box::new(connected_agents.clone()))?;
        registry.register(Box::new(drain_tick_seconds.clone()))?;
        registry.register(Box::new(reap_tick_seconds.clone()))?;
        registry.register(Box::new(messages_total.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;

        Ok(Self {
            registry,
            queue_depth,
            active_assignments,
            connected_agents,
            drain_tick_seconds,
            reap_tick_seconds,
            messages_total,
            errors_total,
        })
    }

    pub fn set_queue_depth(&self, job_type: &str, depth: usize) {
        self.queue_depth.with_label_values(&[job_type]).set(depth as f64);
    }

    pub fn set_active_assignments(&self, job_type: &str, count: usize) {
        self.active_assignments.with_label_values(&[job_type]).set(count as f64);
    }

    pub fn set_connected_agents(&self, org_id: &str, count: usize) {
        self.connected_agents.with_label_values(&[org_id]).set(count as f64);
    }

    pub fn observe_drain_tick(&self, job_type: &str, seconds: f64) {
        self.drain_tick_seconds.with_label_values(&[job_type]).observe(seconds);
    }

    pub fn observe_reap_tick(&self, seconds: f64) {
        self.reap_tick_seconds.with_label_values(&[]).observe(seconds);
    }

    pub fn record_message_outcome(&self, status: &str) {
        self.messages_total.with_label_values(&[status]).inc();
    }

    pub fn record_error(&self, source: &str) {
        self.errors_total.with_label_values(&[source]).inc();
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for ChatbridgeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_prometheus_text_format_with_recorded_samples() {
        let metrics = ChatbridgeMetrics::new();
        metrics.set_queue_depth("slack", 3);
        metrics.set_active_assignments("discord", 1);
        metrics.observe_drain_tick("slack", 0.02);
        metrics.record_error("orchestrator");

        let body = metrics.encode().unwrap();
        assert!(body.contains("chatbridge_queue_depth"));
        assert!(body.contains("chatbridge_active_assignments"));
        assert!(body.contains("chatbridge_drain_tick_seconds"));
        assert!(body.contains("chatbridge_errors_total"));
    }
}
