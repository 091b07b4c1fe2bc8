use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use murmur_application::{format_transcription, ExportFormat};

use crate::error::{domain_error_mapper, HttpError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "srt".to_string()
}

pub async fn export(
    State(state): State<AppState>,
    Path(transcription_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, HttpError> {
    let format: ExportFormat = query.format.parse().map_err(domain_error_mapper)?;
    let record = state
        .metadata
        .load(&transcription_id)
        .await
        .map_err(domain_error_mapper)?;
    let body = format_transcription(&record, format).map_err(domain_error_mapper)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response())
}
