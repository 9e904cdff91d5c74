//! Application metrics for Prometheus monitoring.
//!
//! This module provides:
//! - Prometheus metrics recorder initialization
//! - Metric definitions (counters, gauges)
//! - Helper functions the registry, broadcaster and launcher call
//!
//! Recording before [`init_metrics`] is a no-op, so unit tests need no setup.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("Failed to set global metrics recorder (already set)");
        return false;
    }

    if PROMETHEUS_HANDLE.set(handle).is_err() {
        tracing::warn!("Failed to store Prometheus handle (already set)");
    }

    describe_metrics();

    tracing::info!("Prometheus metrics initialized");
    true
}

fn describe_metrics() {
    describe_counter!("builds_started_total", "Build jobs accepted and scheduled");
    describe_counter!(
        "builds_completed_total",
        "Build jobs that reached end-of-stream, by outcome"
    );
    describe_gauge!("builds_active", "Build jobs currently running");

    describe_counter!(
        "build_events_delivered_total",
        "Build events successfully queued to a subscriber"
    );
    describe_counter!(
        "subscribers_pruned_total",
        "Subscribers detached after a failed delivery"
    );
    describe_gauge!("subscribers_connected", "Live progress stream subscribers");
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

pub fn record_build_started() {
    counter!("builds_started_total").increment(1);
}

/// `outcome` is `finished`, `failed`, `aborted` or `panicked`.
pub fn record_build_completed(outcome: &'static str) {
    counter!("builds_completed_total", "outcome" => outcome).increment(1);
}

pub fn set_active_builds(count: usize) {
    gauge!("builds_active").set(count as f64);
}

pub fn record_events_delivered(count: usize) {
    if count > 0 {
        counter!("build_events_delivered_total").increment(count as u64);
    }
}

pub fn record_subscriber_pruned() {
    counter!("subscribers_pruned_total").increment(1);
}

pub fn subscriber_connected() {
    gauge!("subscribers_connected").increment(1.0);
}

pub fn subscriber_disconnected() {
    gauge!("subscribers_connected").decrement(1.0);
}
