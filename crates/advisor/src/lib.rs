//! Alert advisor library.
//!
//! Turns an Alertmanager webhook payload into a troubleshooting
//! recommendation:
//!
//! 1. [`alert`] extracts a normalized [`AlertRecord`] from the first alert.
//! 2. [`evidence`] queries the Kubernetes API for the target pod's state,
//!    recent events and log tail, concurrently and failure-tolerant.
//! 3. [`runbook`] and [`retrieval`] pick the runbook passage sharing the most
//!    terms with the alert.
//! 4. [`prompt`] assembles the prompt and [`completion`] generates the text.
//! 5. [`store`] keeps a history of every recommendation in SQLite.
//!
//! [`pipeline::Advisor`] ties the steps together; [`server`] exposes it over
//! HTTP.

pub mod alert;
pub mod completion;
pub mod config;
pub mod error;
pub mod evidence;
pub mod k8s;
pub mod metrics;
pub mod pipeline;
pub mod prompt;
pub mod retrieval;
pub mod runbook;
pub mod server;
pub mod store;
mod text;

pub use alert::AlertRecord;
pub use completion::{CompletionProvider, CompletionRequest, CompletionResponse, OpenAiProvider};
pub use config::{AdvisorConfig, ClusterConfig, CompletionConfig};
pub use error::{AdvisorError, AdvisorResult, CompletionError, EvidenceError};
pub use evidence::{EvidenceAggregator, EvidenceBundle, EvidenceLimits};
pub use k8s::{ClusterClient, Evidence, EvidenceSource, EventRecord};
pub use metrics::AdvisorMetrics;
pub use pipeline::{Advisor, Recommendation};
pub use runbook::{RunbookCorpus, RunbookStore};
pub use store::{RecommendationStore, StoredRecommendation};
