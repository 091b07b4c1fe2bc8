pub mod error;
pub mod event;
pub mod export;
pub mod pipeline;
pub mod upload;

pub use error::ApplicationError;
pub use event::{
    AnnotationProgress, PipelineEvent, PipelineProgress, PipelineState, TranscodingProgress,
    TranscriptionProgress,
};
pub use export::{format_transcription, srt, ExportFormat};
pub use pipeline::{PipelineSettings, PipelineUseCase};
pub use upload::{ChunkError, ChunkOutcome, ContentRange, UploadUseCase};
