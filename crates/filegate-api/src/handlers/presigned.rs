use crate::error::HttpAppError;
use crate::handlers::response::file_response;
use crate::params::{accept_list, forwarded_headers, range_header, PresignedFileParams};
use crate::state::AppState;
use axum::{
    extract::{Path, RawQuery, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

/// `GET /v1/files/{id}/presignedurl`
pub async fn create_presigned_url(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpAppError> {
    let presigned = state
        .files
        .create_presigned_url(&id, &forwarded_headers(&headers))
        .await?;

    Ok(Json(presigned))
}

/// `GET /v1/files/{id}/presignedurl/contents`. The signature authorizes
/// the request; no session headers are needed.
pub async fn get_file_with_presigned_url(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, HttpAppError> {
    let params = PresignedFileParams::from_request(&headers, query.as_deref())?;
    let range = range_header(&headers)?;

    let rendered = state
        .files
        .get_file_with_presigned_url(
            &id,
            &params.raw_query,
            &params,
            range.as_deref(),
            &accept_list(&headers),
            &forwarded_headers(&headers),
        )
        .await?;

    file_response(rendered)
}
