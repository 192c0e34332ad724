//! Evidence aggregation for an alert's target resource.
//!
//! Issues the three Kubernetes queries concurrently and folds their outcomes
//! into one bounded [`EvidenceBundle`]. Any subset of the queries may fail;
//! the bundle is always complete.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::alert::AlertRecord;
use crate::config::ClusterConfig;
use crate::k8s::{
    summarize_resource, Evidence, EvidenceKind, EvidenceSource, EventRecord,
    MAX_EVENT_MESSAGE_CHARS, MAX_LOG_CHARS, RESOURCE_NOT_FETCHED,
};
use crate::metrics::AdvisorMetrics;
use crate::text::truncate_chars;

/// Live cluster state about the alerting resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceBundle {
    pub resource_summary: String,
    /// Newest first
    pub events: Vec<EventRecord>,
    pub log_tail: String,
}

impl EvidenceBundle {
    /// Bundle for an alert without a resource to inspect.
    #[must_use]
    pub fn unfetched() -> Self {
        Self {
            resource_summary: RESOURCE_NOT_FETCHED.to_string(),
            events: Vec::new(),
            log_tail: String::new(),
        }
    }
}

impl Default for EvidenceBundle {
    fn default() -> Self {
        Self::unfetched()
    }
}

/// Limits applied to gathered evidence.
#[derive(Debug, Clone, Copy)]
pub struct EvidenceLimits {
    pub max_events: usize,
    pub tail_lines: u32,
}

impl From<&ClusterConfig> for EvidenceLimits {
    fn from(config: &ClusterConfig) -> Self {
        Self {
            max_events: config.max_events,
            tail_lines: config.tail_lines,
        }
    }
}

impl Default for EvidenceLimits {
    fn default() -> Self {
        Self::from(&ClusterConfig::default())
    }
}

/// Gathers evidence for alerts from an [`EvidenceSource`].
#[derive(Clone)]
pub struct EvidenceAggregator {
    source: Arc<dyn EvidenceSource>,
    metrics: AdvisorMetrics,
    limits: EvidenceLimits,
}

impl EvidenceAggregator {
    pub fn new(
        source: Arc<dyn EvidenceSource>,
        metrics: AdvisorMetrics,
        limits: EvidenceLimits,
    ) -> Self {
        Self {
            source,
            metrics,
            limits,
        }
    }

    /// Gather evidence for the resource named by `alert`.
    ///
    /// No queries are issued when the alert has no resource name.
    pub async fn gather(&self, alert: &AlertRecord) -> EvidenceBundle {
        if !alert.has_resource() {
            debug!(alertname = %alert.alertname, "Alert names no resource, skipping evidence");
            return EvidenceBundle::unfetched();
        }

        let namespace = alert.namespace.as_str();
        let name = alert.resource_name.as_str();

        let (resource, events, logs) = tokio::join!(
            self.source.resource_state(namespace, name),
            self.source.recent_events(namespace, name, self.limits.max_events),
            self.source.log_tail(namespace, name, self.limits.tail_lines),
        );

        self.observe(EvidenceKind::Resource, &resource, namespace, name);
        self.observe(EvidenceKind::Events, &events, namespace, name);
        self.observe(EvidenceKind::Logs, &logs, namespace, name);

        let resource = resource.available();
        let mut events = events.unwrap_or_default();
        events.truncate(self.limits.max_events);
        for event in &mut events {
            if event.message.chars().count() > MAX_EVENT_MESSAGE_CHARS {
                event.message = truncate_chars(&event.message, MAX_EVENT_MESSAGE_CHARS).to_string();
            }
        }
        let logs = logs.unwrap_or_default();

        EvidenceBundle {
            resource_summary: summarize_resource(resource.as_ref()),
            events,
            log_tail: truncate_chars(&logs, MAX_LOG_CHARS).to_string(),
        }
    }

    fn observe<T>(&self, kind: EvidenceKind, evidence: &Evidence<T>, namespace: &str, name: &str) {
        self.metrics.record_evidence(kind, evidence);
        if let Evidence::Unavailable(e) = evidence {
            warn!(
                kind = kind.as_str(),
                namespace,
                resource = name,
                error = %e,
                "Evidence unavailable"
            );
        }
    }
}
