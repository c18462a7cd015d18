//! Route configuration and setup.

use crate::handlers::{files, health, ops, presigned};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use filegate_core::Config;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(state: Arc<AppState>) -> Router<()> {
    let cors = setup_cors(&state.config);
    let body_limit = state.config.max_request_size_bytes();

    file_routes()
        .merge(ops_routes())
        .route("/healthz", get(health::healthz))
        .route("/v1/version", get(health::version))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn file_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/files", axum::routing::post(files::upload_files))
        .route(
            "/v1/files/{id}",
            get(files::get_file)
                .head(files::get_file_metadata)
                .put(files::replace_file)
                .delete(files::delete_file),
        )
        .route(
            "/v1/files/{id}/presignedurl",
            get(presigned::create_presigned_url),
        )
        .route(
            "/v1/files/{id}/presignedurl/contents",
            get(presigned::get_file_with_presigned_url),
        )
}

fn ops_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/v1/ops/broken-metadata",
            get(ops::list_broken_metadata).delete(ops::delete_broken_metadata),
        )
        .route(
            "/v1/ops/orphans",
            get(ops::list_orphans).delete(ops::delete_orphans),
        )
        .route("/v1/ops/not-uploaded", get(ops::list_not_uploaded))
        .route("/v1/ops/report", get(ops::inventory_report))
}

fn setup_cors(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::HEAD,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let exposed = [
        header::ETAG,
        header::LAST_MODIFIED,
        header::CACHE_CONTROL,
        header::CONTENT_RANGE,
        header::CONTENT_DISPOSITION,
    ];

    if config.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
            .expose_headers(exposed);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(origin) => Some(origin),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(Any)
        .expose_headers(exposed)
}
