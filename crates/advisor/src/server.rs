//! HTTP server for the advisor.
//!
//! Provides REST API endpoints for:
//! - Health checks
//! - Prometheus metrics
//! - Receiving Alertmanager webhook payloads
//! - Listing recent recommendations

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::AdvisorError;
use crate::pipeline::Advisor;

/// Default number of listed recommendations.
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Upper bound on listed recommendations.
pub const MAX_LIST_LIMIT: usize = 200;

/// Build the HTTP router.
pub fn build_router(advisor: Arc<Advisor>) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/recommend", post(recommend_handler))
        .route("/recommendations", get(list_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(advisor)
}

/// Start the HTTP server.
///
/// # Errors
///
/// Returns an error if the server fails to bind to the address.
pub async fn run_server(advisor: Arc<Advisor>, addr: &str) -> Result<()> {
    let app = build_router(advisor);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Alert advisor listening on {addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<usize>,
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn metrics_handler(State(advisor): State<Arc<Advisor>>) -> Response {
    match advisor.metrics().gather() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => internal_error(&e),
    }
}

/// Alertmanager webhook receiver.
///
/// Bodies that are not valid JSON are handled as an empty payload.
async fn recommend_handler(State(advisor): State<Arc<Advisor>>, body: Bytes) -> Response {
    let payload = serde_json::from_slice::<Value>(&body).unwrap_or_else(|e| {
        warn!(error = %e, bytes = body.len(), "Unparseable alert payload, treating as empty");
        Value::Null
    });

    match advisor.recommend(&payload).await {
        Ok(recommendation) => Json(recommendation).into_response(),
        Err(e) => internal_error(&e),
    }
}

async fn list_handler(
    State(advisor): State<Arc<Advisor>>,
    Query(params): Query<ListParams>,
) -> Response {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    match advisor.store().recent(limit).await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => internal_error(&e),
    }
}

fn internal_error(e: &AdvisorError) -> Response {
    error!(error = %e, "Request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}
