//! Prometheus metrics for the advisor.

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry, Encoder,
    Histogram, IntCounterVec, Registry, TextEncoder,
};
use std::sync::Arc;

use crate::error::AdvisorResult;
use crate::k8s::{Evidence, EvidenceKind};

/// Advisor metrics, registered on a dedicated registry.
#[derive(Clone)]
pub struct AdvisorMetrics {
    /// Recommendation requests by outcome
    pub requests_total: IntCounterVec,
    /// End-to-end recommendation latency
    pub request_latency: Histogram,
    /// Completion service calls by outcome
    pub completion_calls_total: IntCounterVec,
    /// Kubernetes evidence queries by kind and outcome
    pub cluster_calls_total: IntCounterVec,

    registry: Arc<Registry>,
}

impl AdvisorMetrics {
    pub fn new() -> AdvisorResult<Self> {
        let registry = Registry::new();

        let requests_total = register_int_counter_vec_with_registry!(
            "advisor_requests_total",
            "Total recommendation requests by status",
            &["status"],
            registry
        )?;

        let request_latency = register_histogram_with_registry!(
            "advisor_request_latency_seconds",
            "Recommendation request latency in seconds",
            vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0],
            registry
        )?;

        let completion_calls_total = register_int_counter_vec_with_registry!(
            "advisor_completion_calls_total",
            "Total completion service calls by status",
            &["status"],
            registry
        )?;

        let cluster_calls_total = register_int_counter_vec_with_registry!(
            "advisor_cluster_calls_total",
            "Total Kubernetes API evidence queries by kind and status",
            &["kind", "status"],
            registry
        )?;

        Ok(Self {
            requests_total,
            request_latency,
            completion_calls_total,
            cluster_calls_total,
            registry: Arc::new(registry),
        })
    }

    /// Count a finished recommendation request.
    pub fn record_request(&self, success: bool, elapsed_secs: f64) {
        self.requests_total
            .with_label_values(&[status_label(success)])
            .inc();
        self.request_latency.observe(elapsed_secs);
    }

    /// Count a completion service call.
    pub fn record_completion(&self, success: bool) {
        self.completion_calls_total
            .with_label_values(&[status_label(success)])
            .inc();
    }

    /// Count an evidence query.
    pub fn record_evidence<T>(&self, kind: EvidenceKind, evidence: &Evidence<T>) {
        self.cluster_calls_total
            .with_label_values(&[kind.as_str(), evidence.outcome()])
            .inc();
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn gather(&self) -> AdvisorResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn status_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}
