use axum::extract::{Path, State};
use axum::Json;

use murmur_domain::{Track, TrackPatch, Transcription};

use crate::error::{domain_error_mapper, HttpError};
use crate::AppState;

pub async fn transcription(
    State(state): State<AppState>,
    Path(transcription_id): Path<String>,
) -> Result<Json<Transcription>, HttpError> {
    state
        .metadata
        .load(&transcription_id)
        .await
        .map(Json)
        .map_err(domain_error_mapper)
}

/// Merge user-edited tags into the track created by the transcode stage.
pub async fn patch_track(
    State(state): State<AppState>,
    Path(transcription_id): Path<String>,
    Json(patch): Json<TrackPatch>,
) -> Result<Json<Track>, HttpError> {
    let mut record = state
        .metadata
        .load(&transcription_id)
        .await
        .map_err(domain_error_mapper)?;
    let track = record.track.as_mut().ok_or_else(|| HttpError::NotFound {
        message: format!("no track for {transcription_id}"),
    })?;
    track.merge(patch);
    let track = track.clone();
    state
        .metadata
        .save(&record)
        .await
        .map_err(domain_error_mapper)?;
    Ok(Json(track))
}
