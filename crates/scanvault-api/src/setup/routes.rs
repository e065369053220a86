//! Route table and HTTP middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api_doc::ApiDoc;
use crate::handlers::{download, files, health, upload};
use crate::state::AppState;
use utoipa::OpenApi;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| o.parse::<HeaderValue>().ok())
            .collect();
        layer.allow_origin(parsed)
    }
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn build_router(state: AppState) -> Router {
    let body_limit =
        (state.config.max_file_size_bytes + upload::MULTIPART_OVERHEAD_BYTES) as usize;
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/openapi.json", get(openapi_spec))
        .route("/upload", post(upload::upload_file))
        .route("/files", get(files::list_files))
        .route("/files/{id}/status", get(files::file_status))
        .route("/files/{id}/download-link", get(files::create_download_link))
        .route("/files/{id}", delete(files::delete_file))
        .route("/download/{token}", get(download::download_file))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
