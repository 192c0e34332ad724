//! Alert extraction from Alertmanager webhook payloads.
//!
//! Payloads are taken as untyped JSON so that anything a sender posts can be
//! normalized: missing or oddly shaped fields fall back to defaults instead of
//! rejecting the request.
//!
//! Reference: <https://prometheus.io/docs/alerting/latest/configuration/#webhook_config>

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::text::truncate_chars;

/// Maximum characters kept from the summary/description annotation.
pub const MAX_SUMMARY_CHARS: usize = 500;

/// Value used when an identifying label is missing.
pub const UNKNOWN: &str = "unknown";

/// A canonical field resolved from alert labels.
#[derive(Debug, Clone, Copy)]
pub struct LabelField {
    /// Candidate label keys, in priority order
    pub keys: &'static [&'static str],
    /// Value when none of the keys is present
    pub default: &'static str,
}

/// Label key fallback table.
pub mod label_keys {
    use super::{LabelField, UNKNOWN};

    pub const ALERTNAME: LabelField = LabelField {
        keys: &["alertname"],
        default: UNKNOWN,
    };
    pub const SEVERITY: LabelField = LabelField {
        keys: &["severity"],
        default: UNKNOWN,
    };
    pub const NAMESPACE: LabelField = LabelField {
        keys: &["namespace", "kubernetes_namespace"],
        default: UNKNOWN,
    };
    pub const RESOURCE: LabelField = LabelField {
        keys: &["pod", "pod_name"],
        default: "",
    };
    pub const DEPLOYMENT: LabelField = LabelField {
        keys: &["deployment", "kubernetes_deployment"],
        default: "",
    };
}

/// Annotation keys used for the summary, in priority order.
pub const SUMMARY_ANNOTATIONS: &[&str] = &["summary", "description"];

/// Canonical view of the alert that triggered a recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub alertname: String,
    pub severity: String,
    pub namespace: String,
    /// Workload instance the alert points at (empty when unlabelled)
    pub resource_name: String,
    pub deployment_name: String,
    pub summary: String,
}

impl Default for AlertRecord {
    fn default() -> Self {
        Self::from_alert(None)
    }
}

impl AlertRecord {
    /// Normalize a webhook payload, using its first alert.
    ///
    /// Never fails; absent fields resolve to their documented defaults.
    #[must_use]
    pub fn extract(payload: &Value) -> Self {
        let first = payload
            .get("alerts")
            .and_then(Value::as_array)
            .and_then(|alerts| alerts.first())
            .and_then(Value::as_object);
        Self::from_alert(first)
    }

    fn from_alert(alert: Option<&Map<String, Value>>) -> Self {
        let labels = alert.and_then(|a| a.get("labels")).and_then(Value::as_object);
        let annotations = alert
            .and_then(|a| a.get("annotations"))
            .and_then(Value::as_object);

        let summary = SUMMARY_ANNOTATIONS
            .iter()
            .filter_map(|key| annotations.and_then(|a| a.get(*key)).and_then(Value::as_str))
            .find(|value| !value.is_empty())
            .unwrap_or_default();

        Self {
            alertname: resolve(labels, label_keys::ALERTNAME),
            severity: resolve(labels, label_keys::SEVERITY),
            namespace: resolve(labels, label_keys::NAMESPACE),
            resource_name: resolve(labels, label_keys::RESOURCE),
            deployment_name: resolve(labels, label_keys::DEPLOYMENT),
            summary: truncate_chars(summary, MAX_SUMMARY_CHARS).to_string(),
        }
    }

    /// Whether the alert names a resource that evidence can be gathered for.
    #[must_use]
    pub fn has_resource(&self) -> bool {
        !self.resource_name.is_empty()
    }

    /// Query string used to rank runbook passages.
    #[must_use]
    pub fn retrieval_query(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.alertname, self.summary, self.namespace, self.severity, self.resource_name
        )
    }
}

/// First candidate key present as a string label, else the field default.
///
/// A label present with an empty value is kept; only absence falls through.
fn resolve(labels: Option<&Map<String, Value>>, field: LabelField) -> String {
    field
        .keys
        .iter()
        .find_map(|key| labels.and_then(|l| l.get(*key)).and_then(Value::as_str))
        .unwrap_or(field.default)
        .to_string()
}
