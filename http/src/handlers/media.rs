use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::{domain_error_mapper, HttpError};
use crate::handlers::header_str;
use crate::AppState;

/// Serve a byte range of the uploaded blob as partial content.
pub async fn media(
    State(state): State<AppState>,
    Path(transcription_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let record = state
        .metadata
        .load(&transcription_id)
        .await
        .map_err(domain_error_mapper)?;
    let total = state
        .media
        .blob_size(&transcription_id)
        .await
        .map_err(domain_error_mapper)?;

    let range = header_str(&headers, &header::RANGE).unwrap_or_default();
    let (start, end) =
        parse_byte_range(range, total).ok_or_else(|| HttpError::RangeNotSatisfiable {
            message: format!("invalid content-range: {range}"),
        })?;

    let stream = state
        .media
        .read_range(&transcription_id, start, end)
        .await
        .map_err(domain_error_mapper)?;

    let content_range = format!("bytes {start}-{end}/{total}");
    tracing::debug!(id = %transcription_id, range = %content_range, "streaming media range");
    Ok((
        StatusCode::PARTIAL_CONTENT,
        [
            (header::ACCEPT_RANGES, "bytes".to_string()),
            (header::CONTENT_TYPE, record.upload.content_type),
            (header::CONTENT_LENGTH, (end - start + 1).to_string()),
            (header::CONTENT_RANGE, content_range),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Parse `bytes=<start>-<end>` with either bound optional. Bounds are
/// checked against the blob size; an empty blob satisfies no range.
fn parse_byte_range(header: &str, total: u64) -> Option<(u64, u64)> {
    if total == 0 {
        return None;
    }
    let rest = header.strip_prefix("bytes=")?;
    let (start, end) = rest.split_once('-')?;
    let start: u64 = if start.is_empty() {
        0
    } else {
        start.parse().ok()?
    };
    let end: u64 = if end.is_empty() {
        total - 1
    } else {
        end.parse().ok()?
    };
    (start <= end && end < total).then_some((start, end))
}

#[cfg(test)]
mod tests {
    use super::parse_byte_range;

    #[test]
    fn explicit_ranges_are_inclusive() {
        assert_eq!(parse_byte_range("bytes=0-99", 1000), Some((0, 99)));
        assert_eq!(parse_byte_range("bytes=500-999", 1000), Some((500, 999)));
    }

    #[test]
    fn open_bounds_default_to_the_blob_edges() {
        assert_eq!(parse_byte_range("bytes=-", 1000), Some((0, 999)));
        assert_eq!(parse_byte_range("bytes=500-", 1000), Some((500, 999)));
    }

    #[test]
    fn out_of_bounds_and_garbage_are_rejected() {
        assert_eq!(parse_byte_range("bytes=0-1000", 1000), None);
        assert_eq!(parse_byte_range("bytes=9-5", 1000), None);
        assert_eq!(parse_byte_range("", 1000), None);
        assert_eq!(parse_byte_range("bytes=a-b", 1000), None);
        assert_eq!(parse_byte_range("bytes=0-0", 0), None);
    }
}
