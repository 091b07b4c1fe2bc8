use std::collections::HashMap;
use std::path::{Path, PathBuf};

use pyannote_rs::{EmbeddingExtractor, EmbeddingManager};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use murmur_domain::{AnnotateJob, AnnotatePort, RawTurn, StageError, StageStream, StageUpdate};

#[derive(Debug, Clone)]
pub struct PyannoteAnnotatorConfig {
    pub segmentation_model_path: PathBuf,
    pub embedding_model_path: PathBuf,
    pub max_speakers: usize,
    pub search_threshold: f32,
}

/// Annotate (diarization) stage backed by pyannote-rs: speech
/// segmentation plus speaker-embedding clustering. Turns carry raw
/// `SPEAKER_<n>` labels enumerated in order of first appearance; naming
/// policy is applied downstream.
pub struct PyannoteAnnotator {
    config: PyannoteAnnotatorConfig,
}

impl PyannoteAnnotator {
    pub fn new(config: PyannoteAnnotatorConfig) -> Self {
        Self { config }
    }
}

impl AnnotatePort for PyannoteAnnotator {
    fn run(&self, job: AnnotateJob) -> StageStream<Vec<RawTurn>> {
        let (tx, rx) = mpsc::channel(32);
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let update = match diarize(&config, &job.audio, &tx) {
                Ok(turns) => StageUpdate::Output(turns),
                Err(error) => {
                    tracing::error!(audio = %job.audio.display(), error = %error, "annotation failed");
                    StageUpdate::Failure(error)
                }
            };
            let _ = tx.blocking_send(update);
        });
        Box::pin(ReceiverStream::new(rx))
    }
}

fn diarize(
    config: &PyannoteAnnotatorConfig,
    audio: &Path,
    tx: &mpsc::Sender<StageUpdate<Vec<RawTurn>>>,
) -> Result<Vec<RawTurn>, StageError> {
    let (samples, sample_rate, total_seconds) = read_waveform(audio)?;

    let segments = pyannote_rs::get_segments(&samples, sample_rate, &config.segmentation_model_path)
        .map_err(|error| StageError::Annotation(format!("segmentation failed: {error}")))?;

    let mut extractor = EmbeddingExtractor::new(&config.embedding_model_path)
        .map_err(|error| StageError::Annotation(format!("embedding model failed: {error}")))?;
    let mut manager = EmbeddingManager::new(config.max_speakers);

    let mut seen = HashMap::new();
    let mut turns = Vec::new();
    for segment in segments {
        let segment = segment
            .map_err(|error| StageError::Annotation(format!("segmentation failed: {error}")))?;
        let embedding: Vec<f32> = extractor
            .compute(&segment.samples)
            .map_err(|error| StageError::Annotation(format!("embedding failed: {error}")))?
            .collect();

        let speaker_key = if manager.get_all_speakers().len() == config.max_speakers {
            manager
                .get_best_speaker_match(embedding)
                .map_err(|error| StageError::Annotation(format!("speaker match failed: {error}")))?
        } else {
            manager
                .search_speaker(embedding, config.search_threshold)
                .ok_or_else(|| {
                    StageError::Annotation("speaker clustering produced no match".to_string())
                })?
        };

        let index = enumerate_speaker(&mut seen, speaker_key);
        turns.push(RawTurn::new(
            format!("SPEAKER_{index}"),
            segment.start,
            segment.end,
        ));
        let _ = tx.blocking_send(StageUpdate::Percent(percent_of(segment.end, total_seconds)));
    }

    tracing::info!(
        audio = %audio.display(),
        turns = turns.len(),
        speakers = seen.len(),
        "diarization finished"
    );
    Ok(turns)
}

/// Map the clusterer's speaker keys onto a dense zero-based enumeration
/// in order of first appearance.
fn enumerate_speaker(seen: &mut HashMap<usize, usize>, key: usize) -> usize {
    let next = seen.len();
    *seen.entry(key).or_insert(next)
}

fn percent_of(position: f64, total: f64) -> u8 {
    if total <= 0.0 {
        return 0;
    }
    ((100.0 * position / total) as i64).clamp(0, 100) as u8
}

fn read_waveform(path: &Path) -> Result<(Vec<i16>, u32, f64), StageError> {
    let mut reader = hound::WavReader::open(path).map_err(|error| {
        StageError::Annotation(format!("failed to open {}: {error}", path.display()))
    })?;
    let spec = reader.spec();
    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<Result<_, _>>()
        .map_err(|error| StageError::Annotation(format!("unreadable waveform: {error}")))?;
    let total_seconds = samples.len() as f64 / f64::from(spec.sample_rate);
    Ok((samples, spec.sample_rate, total_seconds))
}
