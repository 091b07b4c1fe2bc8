use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use murmur_domain::{
    StageError, StageStream, StageUpdate, TranscribeJob, TranscribePort, Transcript,
    TranscriptSegment,
};

#[derive(Debug, Clone)]
pub struct WhisperRecognizerConfig {
    pub model_path: PathBuf,
    pub default_language: String,
    pub threads: usize,
}

/// Transcribe stage backed by whisper-rs. The model context is loaded on
/// the first run and reused; inference runs on a blocking worker so the
/// runtime stays responsive, with whisper's own progress callback feeding
/// the stage channel.
pub struct WhisperRecognizer {
    config: WhisperRecognizerConfig,
    context: Arc<Mutex<Option<Arc<WhisperContext>>>>,
}

impl WhisperRecognizer {
    pub fn new(config: WhisperRecognizerConfig) -> Self {
        Self {
            config,
            context: Arc::new(Mutex::new(None)),
        }
    }
}

impl TranscribePort for WhisperRecognizer {
    fn run(&self, job: TranscribeJob) -> StageStream<Transcript> {
        let (tx, rx) = mpsc::channel(32);
        let config = self.config.clone();
        let context_slot = Arc::clone(&self.context);
        tokio::task::spawn_blocking(move || {
            let update = match recognize(&config, &context_slot, &job, &tx) {
                Ok(transcript) => StageUpdate::Output(transcript),
                Err(error) => {
                    tracing::error!(audio = %job.audio.display(), error = %error, "transcription failed");
                    StageUpdate::Failure(error)
                }
            };
            let _ = tx.blocking_send(update);
        });
        Box::pin(ReceiverStream::new(rx))
    }
}

fn recognize(
    config: &WhisperRecognizerConfig,
    context_slot: &Mutex<Option<Arc<WhisperContext>>>,
    job: &TranscribeJob,
    tx: &mpsc::Sender<StageUpdate<Transcript>>,
) -> Result<Transcript, StageError> {
    let samples = read_waveform(&job.audio)?;
    let context = load_context(config, context_slot)?;
    let mut state = context.create_state().map_err(to_error)?;

    let language = job
        .language
        .clone()
        .unwrap_or_else(|| config.default_language.clone());

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    params.set_language(Some(&language));
    params.set_n_threads(config.threads as i32);
    params.set_print_special(false);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);
    let progress_tx = tx.clone();
    params.set_progress_callback_safe(move |progress: i32| {
        let _ = progress_tx.blocking_send(StageUpdate::Percent(progress.clamp(0, 100) as u8));
    });

    tracing::info!(audio = %job.audio.display(), language = %language, "running whisper inference");
    state.full(params, &samples).map_err(to_error)?;

    let mut segments = Vec::new();
    for idx in 0..state.full_n_segments() {
        let Some(segment) = state.get_segment(idx) else {
            continue;
        };
        let text = segment
            .to_str_lossy()
            .map(|cow| cow.to_string())
            .unwrap_or_default();
        segments.push(TranscriptSegment {
            text,
            start: segment.start_timestamp() as f64 / 100.0,
            end: segment.end_timestamp() as f64 / 100.0,
        });
    }

    let text = segments
        .iter()
        .map(|segment| segment.text.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(Transcript {
        language: Some(language),
        text,
        segments,
    })
}

fn load_context(
    config: &WhisperRecognizerConfig,
    slot: &Mutex<Option<Arc<WhisperContext>>>,
) -> Result<Arc<WhisperContext>, StageError> {
    let mut slot = slot
        .lock()
        .map_err(|_| StageError::Transcription("whisper context lock poisoned".to_string()))?;
    if let Some(context) = slot.as_ref() {
        return Ok(Arc::clone(context));
    }
    if !config.model_path.exists() {
        return Err(StageError::Transcription(format!(
            "model not found: {}",
            config.model_path.display()
        )));
    }
    let context = WhisperContext::new_with_params(
        &config.model_path.to_string_lossy(),
        WhisperContextParameters::default(),
    )
    .map_err(to_error)?;
    let context = Arc::new(context);
    *slot = Some(Arc::clone(&context));
    Ok(context)
}

/// Read the transcoded mono waveform into normalized f32 samples.
fn read_waveform(path: &Path) -> Result<Vec<f32>, StageError> {
    let mut reader = hound::WavReader::open(path).map_err(|error| {
        StageError::Transcription(format!("failed to open {}: {error}", path.display()))
    })?;
    let spec = reader.spec();
    if spec.channels != 1 {
        return Err(StageError::Transcription(format!(
            "expected a mono waveform, got {} channels",
            spec.channels
        )));
    }
    match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .map(|sample| sample.map(|value| value as f32 / 32768.0))
            .collect::<Result<Vec<_>, _>>(),
        hound::SampleFormat::Float => reader.samples::<f32>().collect(),
    }
    .map_err(|error| StageError::Transcription(format!("unreadable waveform: {error}")))
}

fn to_error(error: whisper_rs::WhisperError) -> StageError {
    StageError::Transcription(error.to_string())
}
