//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count requests, responses and processing time for `/debug/vars`
//! - Forward the same observations to the `metrics` facade
//! - Expose a Prometheus scrape endpoint when enabled
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, status
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `rate_limited_total` (counter): rejections by reason
//! - `limiter_clients_evicted_total` (counter): idle clients reaped
//! - `store_deadline_exceeded_total` (counter): timed-out store calls by operation
//!
//! # Design Decisions
//! - Low-overhead updates (atomic operations)
//! - The in-process counters are always on; Prometheus export is opt-in

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Serialize;

/// Request counters exposed at `/debug/vars`.
#[derive(Debug, Default)]
pub struct HttpMetrics {
    requests_received: AtomicU64,
    responses_sent: AtomicU64,
    processing_time_us: AtomicU64,
    responses_by_status: Mutex<BTreeMap<u16, u64>>,
}

/// Point-in-time copy of [`HttpMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests_received: u64,
    pub total_responses_sent: u64,
    pub total_processing_time_us: u64,
    pub total_responses_sent_by_status: BTreeMap<u16, u64>,
}

impl HttpMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn response_sent(&self, status: u16, elapsed_us: u64) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
        self.processing_time_us.fetch_add(elapsed_us, Ordering::Relaxed);
        *self
            .responses_by_status
            .lock()
            .expect("metrics mutex poisoned")
            .entry(status)
            .or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests_received: self.requests_received.load(Ordering::Relaxed),
            total_responses_sent: self.responses_sent.load(Ordering::Relaxed),
            total_processing_time_us: self.processing_time_us.load(Ordering::Relaxed),
            total_responses_sent_by_status: self
                .responses_by_status
                .lock()
                .expect("metrics mutex poisoned")
                .clone(),
        }
    }
}

/// Middleware counting every request and the response it produced.
pub async fn track_metrics(
    State(metrics): State<Arc<HttpMetrics>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    metrics.request_received();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let elapsed_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
    metrics.response_sent(status, elapsed_us);
    record_request(&method, status, start);

    response
}

/// Install the global Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(reason: &'static str) {
    metrics::counter!("rate_limited_total", "reason" => reason).increment(1);
}

pub fn record_clients_evicted(count: usize) {
    metrics::counter!("limiter_clients_evicted_total").increment(count as u64);
}

pub fn record_deadline_exceeded(operation: &'static str) {
    metrics::counter!("store_deadline_exceeded_total", "operation" => operation).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_accumulates() {
        let metrics = HttpMetrics::new();
        metrics.request_received();
        metrics.request_received();
        metrics.response_sent(200, 150);
        metrics.response_sent(429, 50);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests_received, 2);
        assert_eq!(snapshot.total_responses_sent, 2);
        assert_eq!(snapshot.total_processing_time_us, 200);
        assert_eq!(snapshot.total_responses_sent_by_status.get(&200), Some(&1));
        assert_eq!(snapshot.total_responses_sent_by_status.get(&429), Some(&1));
    }

    #[test]
    fn test_snapshot_serializes_status_keys_as_strings() {
        let metrics = HttpMetrics::new();
        metrics.response_sent(404, 1);
        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["total_responses_sent_by_status"]["404"], 1);
    }
}
