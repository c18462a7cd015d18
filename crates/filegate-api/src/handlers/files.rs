use crate::error::{HttpAppError, HttpBatchFailure};
use crate::handlers::response::file_response;
use crate::params::{accept_list, forwarded_headers, range_header, FileMetadataParams, GetFileParams};
use crate::state::AppState;
use crate::utils::upload::{extract_batch_form, extract_replace_form};
use axum::{
    extract::{Multipart, Path, RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use filegate_core::FileRecord;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub processed_files: Vec<FileRecord>,
}

/// `POST /v1/files`
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpBatchFailure> {
    let forwarded = forwarded_headers(&headers);
    let form = extract_batch_form(multipart).await?;

    let processed = state
        .files
        .upload_files(&form.bucket_id, form.files, &forwarded)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            processed_files: processed,
        }),
    ))
}

/// `GET /v1/files/{id}`
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, HttpAppError> {
    let params = GetFileParams::from_request(&headers, query.as_deref())?;
    let range = range_header(&headers)?;

    let rendered = state
        .files
        .get_file(
            &id,
            &params,
            range.as_deref(),
            &accept_list(&headers),
            &forwarded_headers(&headers),
        )
        .await?;

    file_response(rendered)
}

/// `HEAD /v1/files/{id}`
pub async fn get_file_metadata(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, HttpAppError> {
    let params = FileMetadataParams::from_request(&headers, query.as_deref())?;

    let rendered = state
        .files
        .get_file_metadata(
            &id,
            &params,
            &accept_list(&headers),
            &forwarded_headers(&headers),
        )
        .await?;

    file_response(rendered)
}

/// `PUT /v1/files/{id}`
pub async fn replace_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let upload = extract_replace_form(multipart).await?;

    let record = state
        .files
        .replace_file(&id, upload, &forwarded_headers(&headers))
        .await?;

    Ok(Json(record))
}

/// `DELETE /v1/files/{id}`
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpAppError> {
    state
        .files
        .delete_file(&id, &forwarded_headers(&headers))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
