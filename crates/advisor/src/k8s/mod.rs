//! Read-only Kubernetes evidence gathering.
//!
//! Each query is independent: a failure in one never affects the others, and
//! every failure is reported as [`Evidence::Unavailable`] rather than an error.

pub mod client;
pub mod summary;
pub mod types;

use async_trait::async_trait;

use crate::error::EvidenceError;

pub use client::ClusterClient;
pub use summary::{summarize_resource, RESOURCE_NOT_FETCHED};
pub use types::{normalize_events, EventRecord, RawEvent, ResourceObject};

/// Maximum characters kept from a log tail.
pub const MAX_LOG_CHARS: usize = 4000;

/// Maximum characters kept from an event message.
pub const MAX_EVENT_MESSAGE_CHARS: usize = 300;

/// Outcome of a single evidence query.
#[derive(Debug)]
pub enum Evidence<T> {
    /// The query succeeded
    Available(T),
    /// The query failed; the reason is kept for logging only
    Unavailable(EvidenceError),
}

impl<T> Evidence<T> {
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Metric label for this outcome.
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Available(_) => "success",
            Self::Unavailable(_) => "error",
        }
    }

    /// The value, if the query succeeded.
    pub fn available(self) -> Option<T> {
        match self {
            Self::Available(value) => Some(value),
            Self::Unavailable(_) => None,
        }
    }

    /// The value, or the type's empty value when unavailable.
    pub fn unwrap_or_default(self) -> T
    where
        T: Default,
    {
        self.available().unwrap_or_default()
    }
}

impl<T> From<Result<T, EvidenceError>> for Evidence<T> {
    fn from(result: Result<T, EvidenceError>) -> Self {
        match result {
            Ok(value) => Self::Available(value),
            Err(e) => Self::Unavailable(e),
        }
    }
}

/// Kind of evidence query, used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceKind {
    Resource,
    Events,
    Logs,
}

impl EvidenceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Events => "events",
            Self::Logs => "logs",
        }
    }
}

/// Source of live evidence about a namespaced workload.
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    /// Current object (including status) of the named resource.
    async fn resource_state(&self, namespace: &str, name: &str) -> Evidence<ResourceObject>;

    /// Events involving the resource, newest first, at most `max_items`.
    async fn recent_events(
        &self,
        namespace: &str,
        name: &str,
        max_items: usize,
    ) -> Evidence<Vec<EventRecord>>;

    /// Last `tail_lines` lines of output, capped at [`MAX_LOG_CHARS`].
    async fn log_tail(&self, namespace: &str, name: &str, tail_lines: u32) -> Evidence<String>;
}
