//! Inventory maintenance. Every route needs the admin secret header.

use crate::error::HttpAppError;
use crate::params::forwarded_headers;
use crate::state::AppState;
use axum::{
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use filegate_core::constants::ADMIN_SECRET_HEADER;
use filegate_core::FileSummary;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct FilesResponse {
    pub files: Vec<FileSummary>,
}

#[derive(Debug, Serialize)]
pub struct KeysResponse {
    pub files: Vec<String>,
}

fn admin_secret(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(ADMIN_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
}

/// `GET /v1/ops/broken-metadata`
pub async fn list_broken_metadata(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpAppError> {
    let files = state
        .files
        .list_broken_metadata(admin_secret(&headers), &forwarded_headers(&headers))
        .await?;
    Ok(Json(FilesResponse { files }))
}

/// `DELETE /v1/ops/broken-metadata`
pub async fn delete_broken_metadata(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpAppError> {
    let files = state
        .files
        .delete_broken_metadata(admin_secret(&headers), &forwarded_headers(&headers))
        .await?;
    Ok(Json(FilesResponse { files }))
}

/// `GET /v1/ops/orphans`
pub async fn list_orphans(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpAppError> {
    let files = state
        .files
        .list_orphans(admin_secret(&headers), &forwarded_headers(&headers))
        .await?;
    Ok(Json(KeysResponse { files }))
}

/// `DELETE /v1/ops/orphans`
pub async fn delete_orphans(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpAppError> {
    let files = state
        .files
        .delete_orphans(admin_secret(&headers), &forwarded_headers(&headers))
        .await?;
    Ok(Json(KeysResponse { files }))
}

/// `GET /v1/ops/not-uploaded`
pub async fn list_not_uploaded(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpAppError> {
    let files = state
        .files
        .list_not_uploaded(admin_secret(&headers), &forwarded_headers(&headers))
        .await?;
    Ok(Json(FilesResponse { files }))
}

/// `GET /v1/ops/report`: all three inventories at once.
pub async fn inventory_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpAppError> {
    let report = state
        .files
        .inventory_report(admin_secret(&headers), &forwarded_headers(&headers))
        .await?;
    Ok(Json(report))
}
