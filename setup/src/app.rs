use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use murmur_application::{PipelineSettings, PipelineUseCase, UploadUseCase};
use murmur_configuration::AppConfig;
use murmur_domain::{AnnotatePort, MediaStore, MetadataStore, TranscodePort, TranscribePort};
use murmur_http::AppState;
use murmur_infra_annotate::{PyannoteAnnotator, PyannoteAnnotatorConfig};
use murmur_infra_asr::{WhisperRecognizer, WhisperRecognizerConfig};
use murmur_infra_store::{FsMediaStore, FsMetadataStore};
use murmur_infra_transcode::{FfmpegTranscoder, FfmpegTranscoderConfig};

pub async fn build_and_run(config: AppConfig) -> anyhow::Result<()> {
    let app = Application::new(config).await?;
    app.run().await
}

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

impl Application {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&config.media.root)
            .await
            .with_context(|| {
                format!(
                    "failed to create media root {}",
                    config.media.root.display()
                )
            })?;

        let metadata: Arc<dyn MetadataStore> = Arc::new(FsMetadataStore::new(&config.media.root));
        let media: Arc<dyn MediaStore> = Arc::new(FsMediaStore::new(
            &config.media.root,
            config.media.stream_chunk_bytes,
        ));

        let transcoder: Arc<dyn TranscodePort> =
            Arc::new(FfmpegTranscoder::new(FfmpegTranscoderConfig {
                ffmpeg_bin: config.transcode.ffmpeg_bin.clone(),
                ffprobe_bin: config.transcode.ffprobe_bin.clone(),
            }));
        let transcriber: Arc<dyn TranscribePort> =
            Arc::new(WhisperRecognizer::new(WhisperRecognizerConfig {
                model_path: config.asr.model_path.clone(),
                default_language: config.asr.default_language.clone(),
                threads: config.asr.threads,
            }));
        let annotator: Arc<dyn AnnotatePort> =
            Arc::new(PyannoteAnnotator::new(PyannoteAnnotatorConfig {
                segmentation_model_path: config.annotate.segmentation_model_path.clone(),
                embedding_model_path: config.annotate.embedding_model_path.clone(),
                max_speakers: config.annotate.max_speakers,
                search_threshold: config.annotate.search_threshold,
            }));

        let uploads = Arc::new(UploadUseCase::new(metadata.clone(), media.clone()));
        let pipeline = Arc::new(PipelineUseCase::new(
            metadata.clone(),
            media.clone(),
            transcoder,
            transcriber,
            annotator,
            PipelineSettings {
                sample_rate_hz: config.transcode.sample_rate_hz,
                stage_timeout: Duration::from_secs(config.pipeline.stage_timeout_secs),
                rerun_diarization: config.pipeline.rerun_diarization,
            },
        ));

        let state = AppState {
            uploads,
            pipeline,
            metadata,
            media,
        };
        Ok(Self { config, state })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        murmur_http::serve(self.state, &self.config.server).await
    }
}
