use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::Deserialize;

use murmur_application::ChunkOutcome;
use murmur_domain::UploadInfo;

use crate::error::{error_mapper, HttpError};
use crate::handlers::header_str;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MediaForm {
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
}

pub async fn open_upload(
    State(state): State<AppState>,
    Json(media): Json<MediaForm>,
) -> Result<Json<String>, HttpError> {
    let record = state
        .uploads
        .open(UploadInfo {
            filename: media.filename,
            content_type: media.content_type,
            size_bytes: media.size_bytes,
        })
        .await
        .map_err(error_mapper)?;
    Ok(Json(record.transcription_id))
}

pub async fn upload_chunk(
    State(state): State<AppState>,
    Path(transcription_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, HttpError> {
    let content_range =
        header_str(&headers, &header::CONTENT_RANGE).ok_or_else(|| HttpError::NotAcceptable {
            message: "missing content-range header".to_string(),
        })?;
    let content_type = header_str(&headers, &header::CONTENT_TYPE).unwrap_or_default();
    let content_length = header_str(&headers, &header::CONTENT_LENGTH)
        .and_then(|value| value.parse().ok())
        .unwrap_or(body.len() as u64);

    let outcome = state
        .uploads
        .put_chunk(
            &transcription_id,
            content_range,
            content_type,
            content_length,
            body,
        )
        .await
        .map_err(error_mapper)?;

    Ok(match outcome {
        ChunkOutcome::Complete => StatusCode::OK.into_response(),
        ChunkOutcome::Continue { start, end } => (
            StatusCode::PERMANENT_REDIRECT,
            [(header::CONTENT_RANGE, format!("bytes={start}-{end}"))],
        )
            .into_response(),
        ChunkOutcome::Resume { current_size } => (
            StatusCode::PERMANENT_REDIRECT,
            [(header::RANGE, format!("bytes=0-{}", current_size as i64 - 1))],
        )
            .into_response(),
    })
}
