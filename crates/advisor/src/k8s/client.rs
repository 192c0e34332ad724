//! Kubernetes API client for evidence queries.
//!
//! Talks to the API server directly over HTTPS using the pod's mounted
//! service-account credentials. The token and CA bundle are re-read on every
//! call so rotated credentials are picked up without a restart.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::types::{normalize_events, EventList, ResourceObject};
use super::{Evidence, EvidenceSource, EventRecord, MAX_LOG_CHARS};
use crate::config::ClusterConfig;
use crate::error::EvidenceError;
use crate::text::truncate_chars;

/// Kind of object the evidence queries target.
const INVOLVED_OBJECT_KIND: &str = "Pod";

/// Kubernetes API client for a single cluster.
#[derive(Debug, Clone)]
pub struct ClusterClient {
    config: ClusterConfig,
}

impl ClusterClient {
    /// Create a new client with the given configuration.
    #[must_use]
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// Read the bearer token and build an HTTP client trusting the cluster CA.
    async fn authenticated_client(&self) -> Result<(reqwest::Client, String), EvidenceError> {
        let token_path = &self.config.token_path;
        let token = tokio::fs::read_to_string(token_path)
            .await
            .map(|t| t.trim().to_string())
            .map_err(|_| EvidenceError::MissingCredentials(token_path.display().to_string()))?;
        if token.is_empty() {
            return Err(EvidenceError::MissingCredentials(
                token_path.display().to_string(),
            ));
        }

        let mut builder = reqwest::Client::builder();
        match tokio::fs::read(&self.config.ca_path).await {
            Ok(pem) => {
                let cert = reqwest::Certificate::from_pem(&pem)
                    .map_err(|e| EvidenceError::TrustRoot(e.to_string()))?;
                builder = builder.add_root_certificate(cert);
            }
            Err(e) => {
                debug!(
                    path = %self.config.ca_path.display(),
                    error = %e,
                    "No cluster CA, using system roots"
                );
            }
        }

        Ok((builder.build()?, token))
    }

    /// Issue an authenticated GET and return the body of a 2xx response.
    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<Vec<u8>, EvidenceError> {
        let (client, token) = self.authenticated_client().await?;
        let url = format!("{}{path}", self.config.api_url.trim_end_matches('/'));

        debug!(url = %url, "Querying Kubernetes API");

        let response = client
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EvidenceError::Status(status));
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn fetch_resource(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ResourceObject, EvidenceError> {
        let body = self
            .get(&pod_path(namespace, name), &[], self.config.state_timeout)
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn fetch_events(
        &self,
        namespace: &str,
        name: &str,
        max_items: usize,
    ) -> Result<Vec<EventRecord>, EvidenceError> {
        let selector =
            format!("involvedObject.kind={INVOLVED_OBJECT_KIND},involvedObject.name={name}");
        let path = format!("/api/v1/namespaces/{}/events", urlencoding::encode(namespace));
        let body = self
            .get(&path, &[("fieldSelector", selector)], self.config.events_timeout)
            .await?;

        let list: EventList = serde_json::from_slice(&body)?;
        Ok(normalize_events(list.items.unwrap_or_default(), max_items))
    }

    async fn fetch_logs(
        &self,
        namespace: &str,
        name: &str,
        tail_lines: u32,
    ) -> Result<String, EvidenceError> {
        let path = format!("{}/log", pod_path(namespace, name));
        let body = self
            .get(&path, &[("tailLines", tail_lines.to_string())], self.config.logs_timeout)
            .await?;

        let text = String::from_utf8_lossy(&body);
        Ok(truncate_chars(&text, MAX_LOG_CHARS).to_string())
    }
}

#[async_trait]
impl EvidenceSource for ClusterClient {
    async fn resource_state(&self, namespace: &str, name: &str) -> Evidence<ResourceObject> {
        self.fetch_resource(namespace, name).await.into()
    }

    async fn recent_events(
        &self,
        namespace: &str,
        name: &str,
        max_items: usize,
    ) -> Evidence<Vec<EventRecord>> {
        self.fetch_events(namespace, name, max_items).await.into()
    }

    async fn log_tail(&self, namespace: &str, name: &str, tail_lines: u32) -> Evidence<String> {
        self.fetch_logs(namespace, name, tail_lines).await.into()
    }
}

fn pod_path(namespace: &str, name: &str) -> String {
    format!(
        "/api/v1/namespaces/{}/pods/{}",
        urlencoding::encode(namespace),
        urlencoding::encode(name)
    )
}
