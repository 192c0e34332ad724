//! Integration tests for the recommendation pipeline.
//!
//! A mock Kubernetes API and a mock completion API run on random local ports;
//! the advisor is pointed at them with a temporary token, runbook file and
//! database.

use advisor::completion::{CompletionProvider, CompletionRequest, CompletionResponse};
use advisor::config::{ClusterConfig, CompletionConfig};
use advisor::{
    server, Advisor, AdvisorMetrics, ClusterClient, CompletionError, EvidenceAggregator,
    EvidenceLimits, EvidenceSource, OpenAiProvider, RecommendationStore, RunbookStore,
};
use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

const TOKEN: &str = "test-token";

const RUNBOOKS: &str = "CrashLoopBackOff runbook
Check kubectl logs --previous for the crashing container.

Disk pressure runbook
Clean up node disk space.
";

// =============================================================================
// Mock Kubernetes API
// =============================================================================

#[derive(Default)]
struct MockClusterState {
    requests: AtomicUsize,
    authorization: RwLock<Vec<String>>,
    field_selector: RwLock<Option<String>>,
    tail_lines: RwLock<Option<String>>,
}

impl MockClusterState {
    async fn record(&self, headers: &HeaderMap) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            self.authorization.write().await.push(value.to_string());
        }
    }
}

async fn mock_pod(
    State(state): State<Arc<MockClusterState>>,
    Path((namespace, name)): Path<(String, String)>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state.record(&headers).await;
    if namespace != "prod" || name != "web-1" {
        return (StatusCode::NOT_FOUND, Json(json!({"kind": "Status"})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "kind": "Pod",
            "apiVersion": "v1",
            "metadata": {"name": "web-1", "namespace": "prod"},
            "status": {
                "phase": "Running",
                "containerStatuses": [{
                    "name": "web",
                    "restartCount": 7,
                    "state": {"waiting": {
                        "reason": "CrashLoopBackOff",
                        "message": "back-off 5m0s restarting failed container"
                    }},
                    "lastState": {"terminated": {"reason": "Error", "exitCode": 1}}
                }]
            }
        })),
    )
}

async fn mock_events(
    State(state): State<Arc<MockClusterState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state.record(&headers).await;
    *state.field_selector.write().await = params.get("fieldSelector").cloned();
    Json(json!({
        "kind": "EventList",
        "items": [
            {
                "type": "Normal",
                "reason": "Pulled",
                "message": "Container image already present on machine",
                "count": 8,
                "lastTimestamp": "2024-05-01T09:00:00Z"
            },
            {
                "type": "Warning",
                "reason": "BackOff",
                "message": "Back-off restarting failed container",
                "count": 21,
                "lastTimestamp": "2024-05-01T10:00:00Z"
            }
        ]
    }))
}

async fn mock_logs(
    State(state): State<Arc<MockClusterState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state.record(&headers).await;
    *state.tail_lines.write().await = params.get("tailLines").cloned();
    "starting server\npanic: DATABASE_URL not set\n"
}

/// Start a mock Kubernetes API server on a random port.
async fn start_mock_cluster() -> (SocketAddr, Arc<MockClusterState>) {
    let state = Arc::new(MockClusterState::default());

    let app = Router::new()
        .route("/api/v1/namespaces/{namespace}/pods/{name}", get(mock_pod))
        .route("/api/v1/namespaces/{namespace}/pods/{name}/log", get(mock_logs))
        .route("/api/v1/namespaces/{namespace}/events", get(mock_events))
        .with_state(state.clone());

    let addr = serve(app).await;
    (addr, state)
}

// =============================================================================
// Mock completion API
// =============================================================================

#[derive(Default)]
struct MockCompletionState {
    authorization: RwLock<Option<String>>,
    body: RwLock<Option<Value>>,
}

async fn mock_responses(
    State(state): State<Arc<MockCompletionState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    *state.authorization.write().await = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *state.body.write().await = Some(body);

    Json(json!({
        "id": "resp_123",
        "object": "response",
        "output": [{
            "type": "message",
            "role": "assistant",
            "content": [{
                "type": "output_text",
                "text": "1) Probable cause: missing DATABASE_URL",
                "annotations": []
            }]
        }]
    }))
}

async fn mock_responses_unauthorized() -> impl IntoResponse {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })),
    )
}

// =============================================================================
// Helpers
// =============================================================================

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Wait for server to be ready
    tokio::time::sleep(Duration::from_millis(100)).await;

    addr
}

/// Completion provider that records its request and returns a canned result.
#[derive(Default)]
struct FakeProvider {
    fail: bool,
    last_request: Mutex<Option<CompletionRequest>>,
}

#[async_trait]
impl CompletionProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        if self.fail {
            return Err(CompletionError::NotConfigured("OPENAI_API_KEY not set".to_string()));
        }
        Ok(CompletionResponse {
            text: "Check the container logs and restore DATABASE_URL.".to_string(),
        })
    }
}

fn cluster_config(dir: &TempDir, api_url: String) -> ClusterConfig {
    let token_path = dir.path().join("token");
    std::fs::write(&token_path, format!("{TOKEN}\n")).unwrap();
    ClusterConfig {
        api_url,
        token_path,
        ca_path: dir.path().join("missing-ca.crt"),
        ..ClusterConfig::default()
    }
}

fn build_advisor(
    dir: &TempDir,
    cluster: ClusterConfig,
    provider: Arc<dyn CompletionProvider>,
) -> Advisor {
    let runbooks_path = dir.path().join("runbooks.txt");
    std::fs::write(&runbooks_path, RUNBOOKS).unwrap();

    let metrics = AdvisorMetrics::new().unwrap();
    let limits = EvidenceLimits::from(&cluster);
    let evidence = EvidenceAggregator::new(
        Arc::new(ClusterClient::new(cluster)),
        metrics.clone(),
        limits,
    );

    Advisor::new(
        evidence,
        RunbookStore::new(runbooks_path),
        provider,
        RecommendationStore::new(dir.path().join("db/advisor.db")),
        metrics,
        2000,
    )
    .unwrap()
}

fn crashloop_payload() -> Value {
    json!({
        "receiver": "advisor",
        "status": "firing",
        "alerts": [{
            "status": "firing",
            "labels": {
                "alertname": "KubePodCrashLooping",
                "severity": "critical",
                "namespace": "prod",
                "pod": "web-1",
                "deployment": "web"
            },
            "annotations": {"summary": "Pod web-1 is in CrashLoopBackOff"}
        }]
    })
}

// =============================================================================
// Tests
// =============================================================================

/// A crash-looping pod yields evidence from all three queries and a
/// recommendation built from it.
#[tokio::test]
async fn test_crashloop_recommendation_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, cluster) = start_mock_cluster().await;
    let provider = Arc::new(FakeProvider::default());
    let advisor = build_advisor(
        &dir,
        cluster_config(&dir, format!("http://{addr}")),
        provider.clone(),
    );

    let result = advisor.recommend(&crashloop_payload()).await.unwrap();

    assert_eq!(result.alert.alertname, "KubePodCrashLooping");
    assert_eq!(result.alert.resource_name, "web-1");
    assert_eq!(result.alert.deployment_name, "web");

    let summary = &result.evidence.resource_summary;
    assert!(summary.contains("phase=Running"));
    assert!(summary.contains("restartCount=7"));
    assert!(summary.contains("state.waiting.reason=CrashLoopBackOff"));
    assert!(summary.contains("last.terminated.exitCode=1"));

    let reasons: Vec<&str> = result.evidence.events.iter().map(|e| e.reason.as_str()).collect();
    assert_eq!(reasons, ["BackOff", "Pulled"]);
    assert!(result.evidence.log_tail.contains("panic: DATABASE_URL not set"));
    assert_eq!(
        result.recommendation,
        "Check the container logs and restore DATABASE_URL."
    );

    // Cluster queries carried the token and the expected parameters
    assert_eq!(cluster.requests.load(Ordering::SeqCst), 3);
    assert!(cluster
        .authorization
        .read()
        .await
        .iter()
        .all(|h| h == &format!("Bearer {TOKEN}")));
    assert_eq!(
        cluster.field_selector.read().await.as_deref(),
        Some("involvedObject.kind=Pod,involvedObject.name=web-1")
    );
    assert_eq!(cluster.tail_lines.read().await.as_deref(), Some("80"));

    // Prompt carried the evidence and the matching runbook passage only
    let request = provider.last_request.lock().unwrap().clone().unwrap();
    assert!(request.user_prompt.contains("state.waiting.reason=CrashLoopBackOff"));
    assert!(request.user_prompt.contains("Check kubectl logs --previous"));
    assert!(!request.user_prompt.contains("Disk pressure"));
    assert!(request.user_prompt.contains("panic: DATABASE_URL not set"));

    let stored = advisor.store().recent(10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].alert, result.alert);
    assert_eq!(stored[0].recommendation, result.recommendation);

    let metrics = advisor.metrics();
    assert_eq!(metrics.requests_total.with_label_values(&["success"]).get(), 1);
    assert_eq!(metrics.completion_calls_total.with_label_values(&["success"]).get(), 1);
    assert_eq!(
        metrics.cluster_calls_total.with_label_values(&["logs", "success"]).get(),
        1
    );
}

/// An unreachable API degrades to empty evidence without failing the request.
#[tokio::test]
async fn test_unreachable_cluster_still_recommends() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(FakeProvider::default());
    let mut cluster = cluster_config(&dir, "http://127.0.0.1:9".to_string());
    cluster.state_timeout = Duration::from_secs(1);
    cluster.events_timeout = Duration::from_secs(1);
    cluster.logs_timeout = Duration::from_secs(1);
    let advisor = build_advisor(&dir, cluster, provider.clone());

    let result = advisor.recommend(&crashloop_payload()).await.unwrap();

    assert_eq!(result.evidence.resource_summary, "(resource not fetched)");
    assert!(result.evidence.events.is_empty());
    assert!(result.evidence.log_tail.is_empty());
    assert_eq!(
        result.recommendation,
        "Check the container logs and restore DATABASE_URL."
    );

    let request = provider.last_request.lock().unwrap().clone().unwrap();
    assert!(request.user_prompt.contains("(no events or no resource label provided)"));
    assert!(request.user_prompt.contains("(no logs or no resource label provided)"));

    let metrics = advisor.metrics();
    for kind in ["resource", "events", "logs"] {
        assert_eq!(
            metrics.cluster_calls_total.with_label_values(&[kind, "error"]).get(),
            1
        );
    }
}

/// A failing completion call becomes the recommendation text.
#[tokio::test]
async fn test_completion_failure_is_reported_as_recommendation() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, _cluster) = start_mock_cluster().await;
    let provider = Arc::new(FakeProvider {
        fail: true,
        ..FakeProvider::default()
    });
    let advisor = build_advisor(&dir, cluster_config(&dir, format!("http://{addr}")), provider);

    let result = advisor.recommend(&crashloop_payload()).await.unwrap();

    assert!(result.recommendation.starts_with("Completion call failed: "));
    assert!(result.recommendation.contains("OPENAI_API_KEY not set"));
    assert!(result
        .evidence
        .resource_summary
        .contains("state.waiting.reason=CrashLoopBackOff"));

    let metrics = advisor.metrics();
    assert_eq!(metrics.requests_total.with_label_values(&["success"]).get(), 1);
    assert_eq!(metrics.completion_calls_total.with_label_values(&["error"]).get(), 1);
    assert_eq!(advisor.store().recent(5).await.unwrap().len(), 1);
}

/// An alert without a pod label never touches the cluster.
#[tokio::test]
async fn test_alert_without_resource_skips_cluster() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, cluster) = start_mock_cluster().await;
    let advisor = build_advisor(
        &dir,
        cluster_config(&dir, format!("http://{addr}")),
        Arc::new(FakeProvider::default()),
    );

    let payload = json!({
        "alerts": [{"labels": {"alertname": "NodeDiskPressure", "kubernetes_namespace": "infra"}}]
    });
    let result = advisor.recommend(&payload).await.unwrap();

    assert_eq!(cluster.requests.load(Ordering::SeqCst), 0);
    assert_eq!(result.alert.namespace, "infra");
    assert_eq!(result.evidence.resource_summary, "(resource not fetched)");
}

/// Storage failure aborts the request and is counted as an error.
#[tokio::test]
async fn test_storage_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let runbooks_path = dir.path().join("runbooks.txt");
    std::fs::write(&runbooks_path, RUNBOOKS).unwrap();
    let metrics = AdvisorMetrics::new().unwrap();
    let evidence = EvidenceAggregator::new(
        Arc::new(ClusterClient::new(cluster_config(&dir, "http://127.0.0.1:9".to_string()))),
        metrics.clone(),
        EvidenceLimits::default(),
    );
    // The database path is an existing directory
    let advisor = Advisor::new(
        evidence,
        RunbookStore::new(runbooks_path),
        Arc::new(FakeProvider::default()),
        RecommendationStore::new(dir.path()),
        metrics,
        2000,
    )
    .unwrap();

    let result = advisor.recommend(&json!({})).await;

    assert!(result.is_err());
    assert_eq!(advisor.metrics().requests_total.with_label_values(&["error"]).get(), 1);
}

/// The OpenAI provider speaks the Responses API.
#[tokio::test]
async fn test_openai_provider_against_mock_api() {
    let state = Arc::new(MockCompletionState::default());
    let app = Router::new()
        .route("/v1/responses", post(mock_responses))
        .with_state(state.clone());
    let addr = serve(app).await;

    let provider = OpenAiProvider::new(CompletionConfig {
        base_url: format!("http://{addr}/v1"),
        api_key: Some("sk-test".to_string()),
        model: "gpt-4.1-mini".to_string(),
        ..CompletionConfig::default()
    })
    .unwrap();

    let response = provider
        .complete(&CompletionRequest {
            system_instruction: "You are a Kubernetes SRE assistant.".to_string(),
            user_prompt: "Alert: KubePodCrashLooping".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(response.text, "1) Probable cause: missing DATABASE_URL");
    assert_eq!(state.authorization.read().await.as_deref(), Some("Bearer sk-test"));
    let body = state.body.read().await.clone().unwrap();
    assert_eq!(body["model"], "gpt-4.1-mini");
    assert_eq!(body["instructions"], "You are a Kubernetes SRE assistant.");
    assert_eq!(body["input"], "Alert: KubePodCrashLooping");
}

#[tokio::test]
async fn test_openai_provider_surfaces_api_errors() {
    let app = Router::new().route("/v1/responses", post(mock_responses_unauthorized));
    let addr = serve(app).await;

    let provider = OpenAiProvider::new(CompletionConfig {
        base_url: format!("http://{addr}/v1"),
        api_key: Some("sk-wrong".to_string()),
        ..CompletionConfig::default()
    })
    .unwrap();

    let err = provider
        .complete(&CompletionRequest {
            system_instruction: "s".to_string(),
            user_prompt: "u".to_string(),
        })
        .await
        .unwrap_err();

    match err {
        CompletionError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

/// HTTP surface: webhook, history, health and metrics.
#[tokio::test]
async fn test_http_routes() {
    let dir = tempfile::tempdir().unwrap();
    let advisor = build_advisor(
        &dir,
        cluster_config(&dir, "http://127.0.0.1:9".to_string()),
        Arc::new(FakeProvider::default()),
    );
    let addr = serve(server::build_router(Arc::new(advisor))).await;
    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    let health: Value = client
        .get(format!("{base}/healthz"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    // Unparseable bodies are handled as an empty payload
    let response = client
        .post(format!("{base}/recommend"))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["alert"]["alertname"], "unknown");
    assert_eq!(body["evidence"]["resourceSummary"], "(resource not fetched)");
    assert_eq!(
        body["recommendation"],
        "Check the container logs and restore DATABASE_URL."
    );

    let response = client
        .post(format!("{base}/recommend"))
        .json(&json!({"alerts": [{"labels": {"alertname": "HighLatency", "namespace": "edge"}}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let history: Vec<Value> = client
        .get(format!("{base}/recommendations?limit=1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["alert"]["alertname"], "HighLatency");

    let metrics = client
        .get(format!("{base}/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("advisor_requests_total{status=\"success\"} 2"));
    assert!(metrics.contains("advisor_request_latency_seconds"));
}

#[tokio::test]
async fn test_http_fatal_error_returns_500() {
    let dir = tempfile::tempdir().unwrap();
    let runbooks_path = dir.path().join("runbooks.txt");
    std::fs::write(&runbooks_path, RUNBOOKS).unwrap();
    let metrics = AdvisorMetrics::new().unwrap();
    let evidence = EvidenceAggregator::new(
        Arc::new(ClusterClient::new(ClusterConfig::default())),
        metrics.clone(),
        EvidenceLimits::default(),
    );
    let advisor = Advisor::new(
        evidence,
        RunbookStore::new(runbooks_path),
        Arc::new(FakeProvider::default()),
        RecommendationStore::new(dir.path()),
        metrics,
        2000,
    )
    .unwrap();
    let addr = serve(server::build_router(Arc::new(advisor))).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/recommend"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("storage error"));
}

/// Log tails are decoded lossily and capped at 4000 characters.
#[tokio::test]
async fn test_log_tail_is_bounded_and_lossy() {
    async fn oversized_log() -> Vec<u8> {
        let mut body = vec![0xff, 0xfe];
        body.extend("é".repeat(5000).into_bytes());
        body
    }

    let app = Router::new().route(
        "/api/v1/namespaces/{namespace}/pods/{name}/log",
        get(oversized_log),
    );
    let addr = serve(app).await;
    let dir = tempfile::tempdir().unwrap();
    let cluster = cluster_config(&dir, format!("http://{addr}"));

    let tail = ClusterClient::new(cluster.clone())
        .log_tail("prod", "web-1", 80)
        .await
        .available()
        .unwrap();
    assert_eq!(tail.chars().count(), 4000);
    assert!(tail.starts_with('\u{FFFD}'));
    assert!(tail.ends_with('é'));

    // Pod and event routes are absent; only the log evidence survives
    let evidence = EvidenceAggregator::new(
        Arc::new(ClusterClient::new(cluster)),
        AdvisorMetrics::new().unwrap(),
        EvidenceLimits::default(),
    );
    let alert = advisor::AlertRecord {
        namespace: "prod".to_string(),
        resource_name: "web-1".to_string(),
        ..advisor::AlertRecord::default()
    };
    let bundle = evidence.gather(&alert).await;
    assert_eq!(bundle.log_tail.chars().count(), 4000);
    assert_eq!(bundle.resource_summary, "(resource not fetched)");
    assert!(bundle.events.is_empty());
}
