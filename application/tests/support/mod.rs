#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;

use murmur_domain::{
    AnnotateJob, AnnotatePort, ByteStream, DomainError, MediaStore, MetadataStore, RawTurn,
    StageStream, StageUpdate, TranscodeJob, TranscodeOutput, TranscodePort, TranscribeJob,
    TranscribePort, Transcript, TranscriptSegment, Transcription, UploadInfo,
};

#[derive(Default)]
pub struct MemoryMetadataStore {
    records: Mutex<HashMap<String, Transcription>>,
}

impl MemoryMetadataStore {
    pub fn get(&self, id: &str) -> Option<Transcription> {
        self.records.lock().expect("store lock").get(id).cloned()
    }

    pub fn seed(&self, record: Transcription) {
        self.records
            .lock()
            .expect("store lock")
            .insert(record.transcription_id.clone(), record);
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn create(&self, record: &Transcription) -> Result<(), DomainError> {
        self.seed(record.clone());
        Ok(())
    }

    async fn save(&self, record: &Transcription) -> Result<(), DomainError> {
        self.seed(record.clone());
        Ok(())
    }

    async fn load(&self, transcription_id: &str) -> Result<Transcription, DomainError> {
        self.get(transcription_id)
            .ok_or_else(|| DomainError::not_found(transcription_id))
    }
}

#[derive(Default)]
pub struct MemoryMediaStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryMediaStore {
    pub fn blob(&self, id: &str) -> Vec<u8> {
        self.blobs
            .lock()
            .expect("blob lock")
            .get(id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    fn media_path(&self, transcription_id: &str) -> PathBuf {
        PathBuf::from(format!("/media/{transcription_id}"))
    }

    fn transcoded_path(&self, transcription_id: &str) -> PathBuf {
        PathBuf::from(format!("/media/{transcription_id}.wav"))
    }

    async fn blob_size(&self, transcription_id: &str) -> Result<u64, DomainError> {
        Ok(self.blob(transcription_id).len() as u64)
    }

    async fn write_chunk(
        &self,
        transcription_id: &str,
        offset: u64,
        chunk: &[u8],
    ) -> Result<(), DomainError> {
        let mut blobs = self.blobs.lock().expect("blob lock");
        let blob = blobs.entry(transcription_id.to_string()).or_default();
        let offset = offset as usize;
        if blob.len() < offset + chunk.len() {
            blob.resize(offset + chunk.len(), 0);
        }
        blob[offset..offset + chunk.len()].copy_from_slice(chunk);
        Ok(())
    }

    async fn read_range(
        &self,
        transcription_id: &str,
        start: u64,
        end: u64,
    ) -> Result<ByteStream, DomainError> {
        let blob = self.blob(transcription_id);
        let slice = blob[start as usize..=end as usize].to_vec();
        Ok(Box::pin(stream::iter(vec![Ok(Bytes::from(slice))])))
    }
}

/// A stage port that replays pre-scripted update sequences and counts
/// its invocations.
pub struct ScriptedStage<T> {
    scripts: Mutex<VecDeque<Vec<StageUpdate<T>>>>,
    pub runs: Arc<AtomicUsize>,
}

impl<T> Default for ScriptedStage<T> {
    fn default() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl<T: Send + 'static> ScriptedStage<T> {
    pub fn scripted(updates: Vec<StageUpdate<T>>) -> Self {
        let stage = Self::default();
        stage.push_script(updates);
        stage
    }

    pub fn push_script(&self, updates: Vec<StageUpdate<T>>) {
        self.scripts.lock().expect("script lock").push_back(updates);
    }

    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    fn next_stream(&self) -> StageStream<T> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let updates = self
            .scripts
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_default();
        Box::pin(stream::iter(updates))
    }
}

impl TranscodePort for ScriptedStage<TranscodeOutput> {
    fn run(&self, _job: TranscodeJob) -> StageStream<TranscodeOutput> {
        self.next_stream()
    }
}

impl TranscribePort for ScriptedStage<Transcript> {
    fn run(&self, _job: TranscribeJob) -> StageStream<Transcript> {
        self.next_stream()
    }
}

impl AnnotatePort for ScriptedStage<Vec<RawTurn>> {
    fn run(&self, _job: AnnotateJob) -> StageStream<Vec<RawTurn>> {
        self.next_stream()
    }
}

/// A stage port whose stream never yields, for timeout tests.
pub struct StalledStage;

impl TranscodePort for StalledStage {
    fn run(&self, _job: TranscodeJob) -> StageStream<TranscodeOutput> {
        Box::pin(stream::pending())
    }
}

pub fn upload_info() -> UploadInfo {
    UploadInfo {
        filename: "episode.mp3".to_string(),
        content_type: "audio/mp3".to_string(),
        size_bytes: 11,
    }
}

pub fn sample_transcript() -> Transcript {
    Transcript {
        language: Some("en".to_string()),
        text: "One.".to_string(),
        segments: vec![TranscriptSegment {
            text: "One.".to_string(),
            start: 0.0,
            end: 1.4,
        }],
    }
}
