//! Error types for the alert advisor.

use thiserror::Error;

/// Failures that abort a recommendation request.
///
/// Evidence and completion failures never end up here: they are absorbed
/// into the response as empty evidence or an error-string recommendation.
#[derive(Debug, Error)]
pub enum AdvisorError {
    /// Recommendation storage failed
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Prompt template could not be registered
    #[error("template error: {0}")]
    Template(#[from] handlebars::TemplateError),

    /// Prompt template could not be rendered
    #[error("render error: {0}")]
    Render(#[from] handlebars::RenderError),

    /// Filesystem error (runbooks, database directory)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Blocking task panicked or was cancelled
    #[error("task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Metric registration failed
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Completion provider could not be constructed
    #[error("completion setup failed: {0}")]
    Completion(#[from] CompletionError),
}

/// Result alias for pipeline operations.
pub type AdvisorResult<T> = Result<T, AdvisorError>;

/// Reasons a cluster evidence query produced nothing.
#[derive(Debug, Error)]
pub enum EvidenceError {
    /// Service-account token is not mounted
    #[error("no service account token at {0}")]
    MissingCredentials(String),

    /// CA bundle exists but could not be loaded
    #[error("invalid CA bundle: {0}")]
    TrustRoot(String),

    /// Transport failure or timeout
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API answered with a non-success status
    #[error("API returned status {0}")]
    Status(reqwest::StatusCode),

    /// Body was not the expected shape
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors from the completion service.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider has no credentials
    #[error("completion provider not configured: {0}")]
    NotConfigured(String),

    /// API returned an error payload or status
    #[error("completion API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response carried no text output
    #[error("completion response contained no text")]
    EmptyResponse,

    /// Response body could not be parsed
    #[error("failed to parse completion response: {0}")]
    Parse(#[from] serde_json::Error),
}
