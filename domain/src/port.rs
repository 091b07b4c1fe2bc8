use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::{DomainError, StageError, Track, Transcript, Transcription};

/// One element of a stage's progress stream. A successful run is any
/// number of `Percent` updates followed by exactly one `Output`; a failed
/// run ends with exactly one `Failure` and nothing after it.
#[derive(Debug, Clone, PartialEq)]
pub enum StageUpdate<T> {
    Percent(u8),
    Output(T),
    Failure(StageError),
}

pub type StageStream<T> = Pin<Box<dyn Stream<Item = StageUpdate<T>> + Send>>;

pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub sample_rate_hz: u32,
    pub force_reprocessing: bool,
}

#[derive(Debug, Clone)]
pub struct TranscodeOutput {
    pub track: Track,
}

#[derive(Debug, Clone)]
pub struct TranscribeJob {
    pub audio: PathBuf,
    pub language: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AnnotateJob {
    pub audio: PathBuf,
}

/// A diarizer turn before the naming policy has been applied. Labels
/// follow the diarizer's own `SPEAKER_<n>` enumeration.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTurn {
    pub label: String,
    pub start: f64,
    pub end: f64,
}

impl RawTurn {
    pub fn new(label: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            label: label.into(),
            start,
            end,
        }
    }
}

pub trait TranscodePort: Send + Sync {
    fn run(&self, job: TranscodeJob) -> StageStream<TranscodeOutput>;
}

pub trait TranscribePort: Send + Sync {
    fn run(&self, job: TranscribeJob) -> StageStream<Transcript>;
}

pub trait AnnotatePort: Send + Sync {
    fn run(&self, job: AnnotateJob) -> StageStream<Vec<RawTurn>>;
}

/// Key/value persistence of transcription records, one document per id.
/// The single-writer-per-id discipline is enforced by the caller.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn create(&self, record: &Transcription) -> Result<(), DomainError>;
    async fn save(&self, record: &Transcription) -> Result<(), DomainError>;
    async fn load(&self, transcription_id: &str) -> Result<Transcription, DomainError>;
}

/// Byte-addressable blob storage: the uploaded media plus the derived
/// transcoded waveform sharing the id as path stem.
#[async_trait]
pub trait MediaStore: Send + Sync {
    fn media_path(&self, transcription_id: &str) -> PathBuf;
    fn transcoded_path(&self, transcription_id: &str) -> PathBuf;

    /// Size of the uploaded blob so far; zero when nothing was written.
    async fn blob_size(&self, transcription_id: &str) -> Result<u64, DomainError>;

    async fn write_chunk(
        &self,
        transcription_id: &str,
        offset: u64,
        chunk: &[u8],
    ) -> Result<(), DomainError>;

    /// Stream the inclusive byte range `[start, end]` of the uploaded blob.
    async fn read_range(
        &self,
        transcription_id: &str,
        start: u64,
        end: u64,
    ) -> Result<ByteStream, DomainError>;
}
