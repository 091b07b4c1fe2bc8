use std::path::PathBuf;

use async_trait::async_trait;

use murmur_domain::{DomainError, MetadataStore, Transcription};

/// One JSON document per transcription id, stored next to the media
/// blobs. Writes go through a temp file and a rename so readers never
/// observe a torn document.
pub struct FsMetadataStore {
    root: PathBuf,
}

impl FsMetadataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn document_path(&self, transcription_id: &str) -> PathBuf {
        self.root.join(format!("{transcription_id}.json"))
    }

    async fn write(&self, record: &Transcription) -> Result<(), DomainError> {
        let path = self.document_path(&record.transcription_id);
        let json = serde_json::to_vec_pretty(record).map_err(DomainError::storage)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(DomainError::storage)?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(DomainError::storage)
    }
}

#[async_trait]
impl MetadataStore for FsMetadataStore {
    async fn create(&self, record: &Transcription) -> Result<(), DomainError> {
        self.write(record).await
    }

    async fn save(&self, record: &Transcription) -> Result<(), DomainError> {
        self.write(record).await
    }

    async fn load(&self, transcription_id: &str) -> Result<Transcription, DomainError> {
        let path = self.document_path(transcription_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(DomainError::not_found(transcription_id));
            }
            Err(error) => return Err(DomainError::storage(error)),
        };
        serde_json::from_slice(&bytes).map_err(DomainError::storage)
    }
}
