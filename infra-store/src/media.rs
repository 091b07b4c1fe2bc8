use std::io::SeekFrom;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use murmur_domain::{ByteStream, DomainError, MediaStore};

/// Blobs on the local filesystem: the upload at `<root>/<id>`, the
/// derived waveform at `<root>/<id>.wav`.
pub struct FsMediaStore {
    root: PathBuf,
    stream_chunk_bytes: usize,
}

impl FsMediaStore {
    pub fn new(root: impl Into<PathBuf>, stream_chunk_bytes: usize) -> Self {
        Self {
            root: root.into(),
            stream_chunk_bytes,
        }
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    fn media_path(&self, transcription_id: &str) -> PathBuf {
        self.root.join(transcription_id)
    }

    fn transcoded_path(&self, transcription_id: &str) -> PathBuf {
        self.root.join(format!("{transcription_id}.wav"))
    }

    async fn blob_size(&self, transcription_id: &str) -> Result<u64, DomainError> {
        match tokio::fs::metadata(self.media_path(transcription_id)).await {
            Ok(meta) => Ok(meta.len()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(error) => Err(DomainError::storage(error)),
        }
    }

    async fn write_chunk(
        &self,
        transcription_id: &str,
        offset: u64,
        chunk: &[u8],
    ) -> Result<(), DomainError> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.media_path(transcription_id))
            .await
            .map_err(DomainError::storage)?;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(DomainError::storage)?;
        file.write_all(chunk).await.map_err(DomainError::storage)?;
        file.flush().await.map_err(DomainError::storage)
    }

    async fn read_range(
        &self,
        transcription_id: &str,
        start: u64,
        end: u64,
    ) -> Result<ByteStream, DomainError> {
        let mut file = match File::open(self.media_path(transcription_id)).await {
            Ok(file) => file,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(DomainError::not_found(transcription_id));
            }
            Err(error) => return Err(DomainError::storage(error)),
        };
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(DomainError::storage)?;
        let reader = file.take(end - start + 1);
        Ok(Box::pin(ReaderStream::with_capacity(
            reader,
            self.stream_chunk_bytes,
        )))
    }
}
