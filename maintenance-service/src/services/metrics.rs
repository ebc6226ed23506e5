//! Metrics collection and Prometheus export.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Later calls are no-ops, so several
/// applications may be built in one process.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => tracing::warn!(error = %e, "Prometheus recorder not installed"),
    }
}

/// Current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

pub fn record_bills_generated(society_id: &str, count: usize) {
    counter!("maintenance_bills_generated_total", "society_id" => society_id.to_string())
        .increment(count as u64);
}

pub fn record_generation_failure(reason: &'static str) {
    counter!("maintenance_generation_failures_total", "reason" => reason).increment(1);
}

pub fn record_transition(to: &'static str) {
    counter!("maintenance_workflow_transitions_total", "to" => to).increment(1);
}

pub fn record_notification_failure(kind: &'static str) {
    counter!("maintenance_notification_failures_total", "kind" => kind).increment(1);
}

pub fn record_interest_updates(society_id: &str, count: usize) {
    counter!("maintenance_interest_updates_total", "society_id" => society_id.to_string())
        .increment(count as u64);
}
