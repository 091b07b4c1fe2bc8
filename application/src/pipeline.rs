use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tokio_stream::wrappers::ReceiverStream;

use murmur_domain::{
    name_speakers, piecewise_linear, AnnotateJob, AnnotatePort, DomainError, MediaStore,
    MetadataStore, StageError, StageStream, StageUpdate, TranscodeJob, TranscodePort,
    TranscribeJob, TranscribePort,
};

use crate::event::{
    AnnotationProgress, PipelineEvent, PipelineState, TranscodingProgress, TranscriptionProgress,
};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub sample_rate_hz: u32,
    /// Wall-clock bound for one stage run, covering GPU cold starts and
    /// long media.
    pub stage_timeout: Duration,
    /// When false, a persisted diarization is reused instead of being
    /// recomputed on every invocation.
    pub rerun_diarization: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            sample_rate_hz: 16_000,
            stage_timeout: Duration::from_secs(1200),
            rerun_diarization: true,
        }
    }
}

/// Sequences the processing stages for one transcription id, persisting
/// after each stage and multiplexing stage updates into a single ordered
/// event stream.
pub struct PipelineUseCase {
    metadata: Arc<dyn MetadataStore>,
    media: Arc<dyn MediaStore>,
    transcoder: Arc<dyn TranscodePort>,
    transcriber: Arc<dyn TranscribePort>,
    annotator: Arc<dyn AnnotatePort>,
    settings: PipelineSettings,
}

impl PipelineUseCase {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        media: Arc<dyn MediaStore>,
        transcoder: Arc<dyn TranscodePort>,
        transcriber: Arc<dyn TranscribePort>,
        annotator: Arc<dyn AnnotatePort>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            metadata,
            media,
            transcoder,
            transcriber,
            annotator,
            settings,
        }
    }

    /// Run the pipeline for one id. Events arrive strictly ordered and
    /// the stream always ends with a completed or error state event.
    /// Callers must not run two pipelines for the same id concurrently.
    pub fn run(
        self: Arc<Self>,
        transcription_id: String,
        language: Option<String>,
    ) -> ReceiverStream<PipelineEvent> {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            if let Err(error) = self.drive(&transcription_id, language, &tx).await {
                tracing::error!(id = %transcription_id, error = %error, "pipeline run aborted");
                emit(&tx, PipelineEvent::errored()).await;
            }
        });
        ReceiverStream::new(rx)
    }

    async fn drive(
        &self,
        id: &str,
        language: Option<String>,
        tx: &mpsc::Sender<PipelineEvent>,
    ) -> Result<(), DomainError> {
        let mut record = self.metadata.load(id).await?;
        let language_changed = match (&language, &record.language) {
            (Some(requested), current) => current.as_deref() != Some(requested.as_str()),
            (None, _) => false,
        };

        if !record.is_transcoded() {
            tracing::info!(id = %id, "transcoding");
            emit(tx, PipelineEvent::state(PipelineState::Transcoding)).await;
            let updates = self.transcoder.run(TranscodeJob {
                input: self.media.media_path(id),
                output: self.media.transcoded_path(id),
                sample_rate_hz: self.settings.sample_rate_hz,
                force_reprocessing: false,
            });
            let output = self
                .consume("transcode", updates, tx, |percent| {
                    PipelineEvent::Transcoding(TranscodingProgress {
                        percent_done: Some(percent),
                        track: None,
                    })
                })
                .await?;
            record.track = Some(output.track.clone());
            record.transcoded = true;
            self.metadata.save(&record).await?;
            emit(
                tx,
                PipelineEvent::Transcoding(TranscodingProgress {
                    percent_done: None,
                    track: Some(output.track),
                }),
            )
            .await;
        } else {
            tracing::info!(id = %id, "already transcoded, continuing");
        }

        if !record.is_transcribed() || language_changed {
            tracing::info!(id = %id, language = language.as_deref().unwrap_or("auto"), "transcribing");
            emit(tx, PipelineEvent::state(PipelineState::Transcribing)).await;
            let requested = language.clone().or_else(|| record.language.clone());
            let updates = self.transcriber.run(TranscribeJob {
                audio: self.media.transcoded_path(id),
                language: requested.clone(),
            });
            let transcript = self
                .consume("transcribe", updates, tx, |percent| {
                    PipelineEvent::Transcription(TranscriptionProgress {
                        percent_done: Some(percent),
                        transcript: None,
                    })
                })
                .await?;
            record.alignment = Some(piecewise_linear(&transcript));
            record.language = requested.or_else(|| transcript.language.clone());
            record.transcript = Some(transcript.clone());
            self.metadata.save(&record).await?;
            emit(
                tx,
                PipelineEvent::Transcription(TranscriptionProgress {
                    percent_done: None,
                    transcript: Some(transcript),
                }),
            )
            .await;
        } else {
            tracing::info!(id = %id, "already transcribed, continuing");
        }

        if self.settings.rerun_diarization || record.diarization.is_none() {
            tracing::info!(id = %id, "annotating");
            emit(tx, PipelineEvent::state(PipelineState::Annotating)).await;
            let updates = self.annotator.run(AnnotateJob {
                audio: self.media.transcoded_path(id),
            });
            let turns = self
                .consume("annotate", updates, tx, |percent| {
                    PipelineEvent::Annotation(AnnotationProgress {
                        percent_done: Some(percent),
                        annotations: None,
                    })
                })
                .await?;
            let diarization = name_speakers(turns)?;
            record.diarization = Some(diarization.clone());
            self.metadata.save(&record).await?;
            emit(
                tx,
                PipelineEvent::Annotation(AnnotationProgress {
                    percent_done: None,
                    annotations: Some(diarization),
                }),
            )
            .await;
        } else {
            tracing::info!(id = %id, "diarization already present, continuing");
        }

        emit(tx, PipelineEvent::completed(record)).await;
        Ok(())
    }

    /// Pull one stage to completion, forwarding progress. The deadline
    /// bounds the whole stage run; there is no mid-stage cancellation.
    async fn consume<T>(
        &self,
        stage: &'static str,
        mut updates: StageStream<T>,
        tx: &mpsc::Sender<PipelineEvent>,
        progress: impl Fn(u8) -> PipelineEvent,
    ) -> Result<T, DomainError> {
        let deadline = Instant::now() + self.settings.stage_timeout;
        loop {
            let update = timeout_at(deadline, updates.next())
                .await
                .map_err(|_| StageError::Timeout { stage })?;
            match update {
                Some(StageUpdate::Percent(percent)) => emit(tx, progress(percent)).await,
                Some(StageUpdate::Output(output)) => return Ok(output),
                Some(StageUpdate::Failure(error)) => return Err(error.into()),
                None => {
                    return Err(DomainError::consistency(format!(
                        "{stage} stream ended without a result"
                    )))
                }
            }
        }
    }
}

async fn emit(tx: &mpsc::Sender<PipelineEvent>, event: PipelineEvent) {
    if tx.send(event).await.is_err() {
        tracing::debug!("pipeline event receiver dropped");
    }
}
