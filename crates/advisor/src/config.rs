//! Configuration for the advisor service.
//!
//! Defaults match an in-cluster deployment: the service-account token and CA
//! bundle are read from the standard mount, the Kubernetes API is reached via
//! its internal service name, and runbooks and the database live under `/data`.

use std::path::PathBuf;
use std::time::Duration;

/// Default Kubernetes API URL (internal Kubernetes DNS)
pub const DEFAULT_K8S_API: &str = "https://kubernetes.default.svc";

/// Service-account token mounted into every pod
pub const DEFAULT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Cluster CA bundle mounted alongside the token
pub const DEFAULT_CA_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Default OpenAI-compatible API base URL
pub const DEFAULT_COMPLETION_URL: &str = "https://api.openai.com/v1";

/// Default completion model
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Default SQLite database location
pub const DEFAULT_DB_PATH: &str = "/data/advisor.db";

/// Default runbook corpus location
pub const DEFAULT_RUNBOOKS_PATH: &str = "/data/runbooks.txt";

/// Default maximum length of the retrieved runbook passage
pub const DEFAULT_RETRIEVAL_MAX_CHARS: usize = 2000;

/// Top-level advisor configuration.
#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    /// SQLite database holding recommendation history
    pub db_path: PathBuf,
    /// Runbook corpus file
    pub runbooks_path: PathBuf,
    /// Maximum characters of runbook context placed in the prompt
    pub retrieval_max_chars: usize,
    /// Kubernetes API access
    pub cluster: ClusterConfig,
    /// Completion service access
    pub completion: CompletionConfig,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            runbooks_path: PathBuf::from(DEFAULT_RUNBOOKS_PATH),
            retrieval_max_chars: DEFAULT_RETRIEVAL_MAX_CHARS,
            cluster: ClusterConfig::default(),
            completion: CompletionConfig::default(),
        }
    }
}

/// Configuration for the Kubernetes evidence client.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Base URL for the Kubernetes API
    pub api_url: String,
    /// Bearer token file, read on every call
    pub token_path: PathBuf,
    /// CA bundle used as the TLS trust root when present
    pub ca_path: PathBuf,
    /// Timeout for the resource state read
    pub state_timeout: Duration,
    /// Timeout for the event list read
    pub events_timeout: Duration,
    /// Timeout for the log tail read
    pub logs_timeout: Duration,
    /// Maximum events kept per resource
    pub max_events: usize,
    /// Log lines requested from the API
    pub tail_lines: u32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_K8S_API.to_string(),
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            ca_path: PathBuf::from(DEFAULT_CA_PATH),
            state_timeout: Duration::from_secs(5),
            events_timeout: Duration::from_secs(5),
            logs_timeout: Duration::from_secs(6),
            max_events: 15,
            tail_lines: 80,
        }
    }
}

/// Configuration for the completion provider.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    /// API key; `None` leaves the provider unconfigured
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_COMPLETION_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}
