//! Kubernetes object projections used as evidence.
//!
//! These are partial: every field is optional and unknown fields
//! are ignored, so any pod or event the API returns can be decoded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MAX_EVENT_MESSAGE_CHARS;
use crate::text::truncate_chars;

/// Pod object as returned by `GET /api/v1/namespaces/{ns}/pods/{name}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceObject {
    pub status: Option<ResourceStatus>,
}

/// Pod `status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceStatus {
    pub phase: Option<String>,
    pub container_statuses: Option<Vec<ContainerStatus>>,
}

/// Entry of `status.containerStatuses[]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerStatus {
    pub name: Option<String>,
    pub restart_count: Option<i64>,
    pub state: Option<ContainerState>,
    pub last_state: Option<ContainerState>,
}

/// Container `state` / `lastState`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerState {
    pub waiting: Option<StateDetail>,
    pub terminated: Option<StateDetail>,
}

/// Details of a waiting or terminated state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateDetail {
    pub reason: Option<String>,
    pub message: Option<String>,
    pub exit_code: Option<i64>,
}

/// Event list as returned by `GET /api/v1/namespaces/{ns}/events`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventList {
    pub items: Option<Vec<RawEvent>>,
}

/// A core/v1 Event, reduced to the fields used for evidence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub count: Option<i64>,
    pub last_timestamp: Option<String>,
    pub event_time: Option<String>,
    pub first_timestamp: Option<String>,
}

impl RawEvent {
    /// Most relevant timestamp: `lastTimestamp`, then `eventTime`, then
    /// `firstTimestamp`.
    #[must_use]
    pub fn recency(&self) -> Option<&str> {
        [&self.last_timestamp, &self.event_time, &self.first_timestamp]
            .into_iter()
            .filter_map(Option::as_deref)
            .find(|ts| !ts.is_empty())
    }

    fn recency_key(&self) -> Option<DateTime<Utc>> {
        self.recency()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }
}

/// Snapshot of one lifecycle event, as placed in the evidence bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub event_type: String,
    pub reason: String,
    pub message: String,
    pub count: i64,
    pub last_timestamp: String,
}

impl From<&RawEvent> for EventRecord {
    fn from(event: &RawEvent) -> Self {
        Self {
            event_type: event.event_type.clone().unwrap_or_default(),
            reason: event.reason.clone().unwrap_or_default(),
            message: truncate_chars(
                event.message.as_deref().unwrap_or_default(),
                MAX_EVENT_MESSAGE_CHARS,
            )
            .to_string(),
            count: event.count.unwrap_or(1),
            last_timestamp: event.recency().unwrap_or_default().to_string(),
        }
    }
}

/// Sort events newest first and keep at most `max_items`.
///
/// Events with equal timestamps keep their input order; events without a
/// parseable timestamp sort after all dated ones.
pub fn normalize_events(mut items: Vec<RawEvent>, max_items: usize) -> Vec<EventRecord> {
    items.sort_by_cached_key(|event| std::cmp::Reverse(event.recency_key()));
    items.iter().take(max_items).map(EventRecord::from).collect()
}
