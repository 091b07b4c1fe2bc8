use thiserror::Error;

/// Failure of one external processing stage. Stage errors surface to the
/// client as a terminal `error` pipeline event and are never retried
/// automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("transcoding failed: {0}")]
    Transcode(String),
    #[error("transcription failed: {0}")]
    Transcription(String),
    #[error("annotation failed: {0}")]
    Annotation(String),
    #[error("{stage} stage timed out")]
    Timeout { stage: &'static str },
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Stage(#[from] StageError),
    /// A stage produced an update shape its contract does not allow,
    /// e.g. its stream ended without a result or a failure.
    #[error("stage contract violated: {0}")]
    Consistency(String),
    #[error("storage failed: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency(message.into())
    }

    pub fn storage(error: impl std::fmt::Display) -> Self {
        Self::Storage(error.to_string())
    }
}
