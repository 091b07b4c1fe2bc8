use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

use murmur_domain::{MediaStore, MetadataStore, Transcription, UploadInfo};

use crate::ApplicationError;

/// Upload protocol violations, one variant per validation step so the
/// transport layer can distinguish unusable headers from rejected
/// chunks. Any violation leaves the session untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    #[error("invalid range header format: {0}")]
    MalformedRange(String),
    #[error("inconsistent content length in range: {0}")]
    LengthMismatch(String),
    #[error("inconsistent size bytes in range: {0}")]
    TotalMismatch(String),
    #[error("invalid resume total: {0}")]
    ResumeTotalMismatch(String),
    #[error("invalid content type: {0}")]
    ContentTypeMismatch(String),
    #[error("want chunk size {want} but got {got}")]
    BodySizeMismatch { want: u64, got: u64 },
    #[error("content range is not contiguous: {0}")]
    NotContiguous(String),
}

/// Parsed `Content-Range` value. The query form (`bytes */<total>`)
/// probes the current offset; the data form carries one chunk. Both the
/// `bytes=` and the `bytes ` spellings are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRange {
    Query { total: u64 },
    Data { start: u64, end: u64, total: u64 },
}

impl ContentRange {
    pub fn parse(header: &str) -> Result<Self, ChunkError> {
        let malformed = || ChunkError::MalformedRange(header.to_string());
        let rest = header
            .strip_prefix("bytes")
            .map(|rest| rest.trim_start_matches(['=', ' ']))
            .ok_or_else(malformed)?;

        if let Some(total) = rest.strip_prefix("*/") {
            return Ok(Self::Query {
                total: parse_offset(total, header)?,
            });
        }

        let (range, total) = rest.split_once('/').ok_or_else(malformed)?;
        let (start, end) = range.split_once('-').ok_or_else(malformed)?;
        Ok(Self::Data {
            start: parse_offset(start, header)?,
            end: parse_offset(end, header)?,
            total: parse_offset(total, header)?,
        })
    }
}

fn parse_offset(field: &str, header: &str) -> Result<u64, ChunkError> {
    field
        .parse()
        .map_err(|_| ChunkError::MalformedRange(header.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Chunk accepted, more expected; echoes the accepted range.
    Continue { start: u64, end: u64 },
    /// Offset probe: the client should resume after `current_size` bytes.
    Resume { current_size: u64 },
    /// Final chunk accepted, the blob is whole.
    Complete,
}

/// Resumable chunked-upload sessions. The metadata store doubles as the
/// session registry: a session exists iff its record does.
pub struct UploadUseCase {
    metadata: Arc<dyn MetadataStore>,
    media: Arc<dyn MediaStore>,
}

impl UploadUseCase {
    pub fn new(metadata: Arc<dyn MetadataStore>, media: Arc<dyn MediaStore>) -> Self {
        Self { metadata, media }
    }

    /// Open a session: mint the id, persist the record.
    pub async fn open(&self, upload: UploadInfo) -> Result<Transcription, ApplicationError> {
        let transcription_id = Uuid::new_v4().to_string();
        let path = self
            .media
            .media_path(&transcription_id)
            .to_string_lossy()
            .into_owned();
        let record = Transcription::new(transcription_id, upload, path);
        self.metadata.create(&record).await?;
        tracing::info!(
            id = %record.transcription_id,
            filename = %record.upload.filename,
            size_bytes = record.upload.size_bytes,
            "opened upload session"
        );
        Ok(record)
    }

    /// Accept one chunk, or answer an offset probe. Checks run in a fixed
    /// order: range syntax, range/length consistency, declared total,
    /// declared content type, body size, contiguity.
    pub async fn put_chunk(
        &self,
        transcription_id: &str,
        content_range: &str,
        content_type: &str,
        content_length: u64,
        body: Bytes,
    ) -> Result<ChunkOutcome, ApplicationError> {
        let record = self.metadata.load(transcription_id).await?;
        let range = ContentRange::parse(content_range)?;
        let current_size = self.media.blob_size(transcription_id).await?;

        let (start, end, total) = match range {
            ContentRange::Query { total } if content_length == 0 => {
                if total != record.upload.size_bytes {
                    return Err(ChunkError::ResumeTotalMismatch(content_range.to_string()).into());
                }
                return Ok(ChunkOutcome::Resume { current_size });
            }
            ContentRange::Query { .. } => {
                return Err(ChunkError::MalformedRange(content_range.to_string()).into());
            }
            ContentRange::Data { start, end, total } => (start, end, total),
        };

        if end < start || end - start + 1 != content_length {
            return Err(ChunkError::LengthMismatch(content_range.to_string()).into());
        }
        if total != record.upload.size_bytes {
            return Err(ChunkError::TotalMismatch(content_range.to_string()).into());
        }
        if content_type != record.upload.content_type {
            return Err(ChunkError::ContentTypeMismatch(content_type.to_string()).into());
        }
        if body.len() as u64 != content_length {
            return Err(ChunkError::BodySizeMismatch {
                want: content_length,
                got: body.len() as u64,
            }
            .into());
        }
        if current_size != start {
            return Err(ChunkError::NotContiguous(content_range.to_string()).into());
        }

        self.media
            .write_chunk(transcription_id, start, &body)
            .await?;
        tracing::debug!(id = %transcription_id, start, end, total, "accepted chunk");

        if end + 1 == total {
            Ok(ChunkOutcome::Complete)
        } else {
            Ok(ChunkOutcome::Continue { start, end })
        }
    }
}
