//! The recommendation pipeline.
//!
//! One call to [`Advisor::recommend`] handles one alert end to end:
//! extraction, evidence and runbook lookup (concurrently), prompt assembly,
//! the completion call, and persistence.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::alert::AlertRecord;
use crate::completion::{CompletionProvider, OpenAiProvider};
use crate::config::AdvisorConfig;
use crate::error::AdvisorResult;
use crate::evidence::{EvidenceAggregator, EvidenceBundle, EvidenceLimits};
use crate::k8s::ClusterClient;
use crate::metrics::AdvisorMetrics;
use crate::prompt::{PromptAssembler, RecommendationPrompt};
use crate::runbook::RunbookStore;
use crate::store::RecommendationStore;

/// Response returned for a handled alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub alert: AlertRecord,
    pub evidence: EvidenceBundle,
    /// Generated guidance, or a description of why generation failed
    pub recommendation: String,
}

/// Alert advisor with all of its collaborators injected.
pub struct Advisor {
    evidence: EvidenceAggregator,
    runbooks: RunbookStore,
    completion: Arc<dyn CompletionProvider>,
    store: RecommendationStore,
    metrics: AdvisorMetrics,
    assembler: PromptAssembler,
    retrieval_max_chars: usize,
}

impl Advisor {
    pub fn new(
        evidence: EvidenceAggregator,
        runbooks: RunbookStore,
        completion: Arc<dyn CompletionProvider>,
        store: RecommendationStore,
        metrics: AdvisorMetrics,
        retrieval_max_chars: usize,
    ) -> AdvisorResult<Self> {
        Ok(Self {
            evidence,
            runbooks,
            completion,
            store,
            metrics,
            assembler: PromptAssembler::new()?,
            retrieval_max_chars,
        })
    }

    /// Wire up the in-cluster client, OpenAI provider and SQLite store.
    pub fn from_config(config: &AdvisorConfig) -> AdvisorResult<Self> {
        let metrics = AdvisorMetrics::new()?;
        let evidence = EvidenceAggregator::new(
            Arc::new(ClusterClient::new(config.cluster.clone())),
            metrics.clone(),
            EvidenceLimits::from(&config.cluster),
        );
        let completion = Arc::new(OpenAiProvider::new(config.completion.clone())?);

        Self::new(
            evidence,
            RunbookStore::new(config.runbooks_path.clone()),
            completion,
            RecommendationStore::new(config.db_path.clone()),
            metrics,
            config.retrieval_max_chars,
        )
    }

    #[must_use]
    pub fn metrics(&self) -> &AdvisorMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn store(&self) -> &RecommendationStore {
        &self.store
    }

    /// Produce, persist and return a recommendation for `payload`.
    ///
    /// Only storage, template or runbook I/O failures are returned as errors;
    /// the request counter and latency histogram are updated either way.
    pub async fn recommend(&self, payload: &Value) -> AdvisorResult<Recommendation> {
        let started = Instant::now();
        let result = self.run(payload).await;
        let elapsed = started.elapsed().as_secs_f64();

        self.metrics.record_request(result.is_ok(), elapsed);
        match &result {
            Ok(rec) => info!(
                alertname = %rec.alert.alertname,
                namespace = %rec.alert.namespace,
                resource = %rec.alert.resource_name,
                elapsed_secs = elapsed,
                "Recommendation produced"
            ),
            Err(e) => error!(error = %e, elapsed_secs = elapsed, "Recommendation failed"),
        }

        result
    }

    async fn run(&self, payload: &Value) -> AdvisorResult<Recommendation> {
        let alert = AlertRecord::extract(payload);
        info!(
            alertname = %alert.alertname,
            severity = %alert.severity,
            namespace = %alert.namespace,
            resource = %alert.resource_name,
            "Processing alert"
        );

        let (evidence, corpus) = tokio::join!(self.evidence.gather(&alert), self.runbooks.load());
        let snippet = corpus?.retrieve(&alert.retrieval_query(), self.retrieval_max_chars);

        let request = self.assembler.assemble(&RecommendationPrompt {
            alert: &alert,
            evidence: &evidence,
            runbook_snippet: &snippet,
        })?;

        let recommendation = match self.completion.complete(&request).await {
            Ok(response) => {
                self.metrics.record_completion(true);
                response.text
            }
            Err(e) => {
                self.metrics.record_completion(false);
                warn!(provider = self.completion.name(), error = %e, "Completion call failed");
                format!("Completion call failed: {e}")
            }
        };

        self.store
            .record(&alert, &evidence, &recommendation, payload)
            .await?;

        Ok(Recommendation {
            alert,
            evidence,
            recommendation,
        })
    }
}
