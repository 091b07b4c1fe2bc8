use std::convert::Infallible;

use async_stream::stream;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::error::{domain_error_mapper, HttpError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TranscribeQuery {
    pub language: Option<String>,
}

/// Run the pipeline and stream its events. Each SSE event is named after
/// the update's type and carries the JSON payload; the stream closes
/// after the terminal state event.
pub async fn transcribe(
    State(state): State<AppState>,
    Path(transcription_id): Path<String>,
    Query(query): Query<TranscribeQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, HttpError> {
    // unknown ids fail before any event is sent
    state
        .metadata
        .load(&transcription_id)
        .await
        .map_err(domain_error_mapper)?;

    tracing::info!(
        id = %transcription_id,
        language = query.language.as_deref().unwrap_or("auto"),
        "starting pipeline stream"
    );

    let mut events = state.pipeline.clone().run(transcription_id, query.language);
    let stream = stream! {
        while let Some(event) = events.next().await {
            let terminal = event.is_terminal();
            match Event::default().event(event.name()).json_data(&event) {
                Ok(sse_event) => yield Ok::<Event, Infallible>(sse_event),
                Err(error) => tracing::error!(error = %error, "failed to encode pipeline event"),
            }
            if terminal {
                break;
            }
        }
    };
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
