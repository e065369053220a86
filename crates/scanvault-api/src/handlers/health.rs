//! Service health and root endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use utoipa::ToSchema;

use crate::state::AppState;

/// Upper bound on each component probe so one hung backend cannot stall the
/// whole health check.
const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "healthy" when every component check passed, otherwise "degraded".
    pub status: String,
    pub components: ComponentHealth,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ComponentHealth {
    pub record_store: String,
    pub scan_queue: String,
    pub storage: String,
    pub scan_engine: String,
}

async fn run_check<E, F>(check: F) -> String
where
    E: std::fmt::Display,
    F: Future<Output = Result<(), E>>,
{
    match tokio::time::timeout(CHECK_TIMEOUT, check).await {
        Ok(Ok(())) => "ok".to_string(),
        Ok(Err(e)) => format!("error: {}", e),
        Err(_) => "error: check timed out".to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "All components healthy", body = HealthResponse),
        (status = 503, description = "One or more components unreachable", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let components = ComponentHealth {
        record_store: run_check(state.records.ping()).await,
        scan_queue: run_check(state.queue.ping()).await,
        storage: run_check(state.storage.probe()).await,
        scan_engine: run_check(state.scanner.probe()).await,
    };

    let healthy = [
        &components.record_store,
        &components.scan_queue,
        &components.storage,
        &components.scan_engine,
    ]
    .iter()
    .all(|c| *c == "ok");

    let (status_code, status) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        tracing::warn!(?components, "Health check found degraded components");
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            components,
        }),
    )
}

#[utoipa::path(
    get,
    path = "/",
    tag = "system",
    responses((status = 200, description = "Service description"))
)]
pub async fn root() -> Json<Value> {
    Json(json!({
        "service": "scanvault",
        "version": env!("CARGO_PKG_VERSION"),
        "openapi_url": "/openapi.json",
    }))
}
