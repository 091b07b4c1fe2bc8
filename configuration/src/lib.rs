use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub transcode: TranscodeConfig,
    #[serde(default)]
    pub asr: AsrConfig,
    #[serde(default)]
    pub annotate: AnnotateConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_upload_body_limit")]
    pub upload_body_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_media_root")]
    pub root: PathBuf,
    #[serde(default = "default_stream_chunk_bytes")]
    pub stream_chunk_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeConfig {
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,
    #[serde(default = "default_ffprobe_bin")]
    pub ffprobe_bin: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrConfig {
    #[serde(default = "default_asr_model_path")]
    pub model_path: PathBuf,
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default = "default_threads")]
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotateConfig {
    #[serde(default = "default_segmentation_model_path")]
    pub segmentation_model_path: PathBuf,
    #[serde(default = "default_embedding_model_path")]
    pub embedding_model_path: PathBuf,
    #[serde(default = "default_max_speakers")]
    pub max_speakers: usize,
    #[serde(default = "default_search_threshold")]
    pub search_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub rerun_diarization: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            media: MediaConfig::default(),
            transcode: TranscodeConfig::default(),
            asr: AsrConfig::default(),
            annotate: AnnotateConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upload_body_limit_bytes: default_upload_body_limit(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: default_media_root(),
            stream_chunk_bytes: default_stream_chunk_bytes(),
        }
    }
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: default_ffmpeg_bin(),
            ffprobe_bin: default_ffprobe_bin(),
            sample_rate_hz: default_sample_rate(),
        }
    }
}

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            model_path: default_asr_model_path(),
            default_language: default_language(),
            threads: default_threads(),
        }
    }
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            segmentation_model_path: default_segmentation_model_path(),
            embedding_model_path: default_embedding_model_path(),
            max_speakers: default_max_speakers(),
            search_threshold: default_search_threshold(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout_secs(),
            rerun_diarization: default_true(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_upload_body_limit() -> usize {
    64 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_media_root() -> PathBuf {
    PathBuf::from("./media")
}

fn default_stream_chunk_bytes() -> usize {
    1024 * 1024
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_bin() -> String {
    "ffprobe".to_string()
}

fn default_sample_rate() -> u32 {
    16_000
}

fn default_asr_model_path() -> PathBuf {
    PathBuf::from("models/ggml-base.en.bin")
}

fn default_language() -> String {
    "en".to_string()
}

fn default_threads() -> usize {
    4
}

fn default_segmentation_model_path() -> PathBuf {
    PathBuf::from("models/segmentation-3.0.onnx")
}

fn default_embedding_model_path() -> PathBuf {
    PathBuf::from("models/wespeaker_en_voxceleb_CAM++.onnx")
}

fn default_max_speakers() -> usize {
    10
}

fn default_search_threshold() -> f32 {
    0.5
}

fn default_stage_timeout_secs() -> u64 {
    1200
}

fn default_true() -> bool {
    true
}

/// Load configuration from the file named by `MURMUR_CONFIG` (default
/// `murmur.toml`). A missing file falls back to defaults; invalid TOML
/// is an error.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = std::env::var("MURMUR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("murmur.toml"));
    AppConfig::load(&path)
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default().with_env_overrides());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("MURMUR_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(root) = std::env::var("MURMUR_MEDIA_ROOT") {
            if !root.is_empty() {
                self.media.root = PathBuf::from(root);
            }
        }
        if let Ok(model) = std::env::var("MURMUR_ASR_MODEL") {
            if !model.is_empty() {
                self.asr.model_path = PathBuf::from(model);
            }
        }
        self
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
pub fn setup_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
