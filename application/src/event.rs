use serde::Serialize;

use murmur_domain::{Diarization, Track, Transcript, Transcription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Transcoding,
    Transcribing,
    Annotating,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineProgress {
    pub state: PipelineState,
    /// Final snapshot, present on the completed event only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<Transcription>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TranscodingProgress {
    pub percent_done: Option<u8>,
    pub track: Option<Track>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TranscriptionProgress {
    pub percent_done: Option<u8>,
    pub transcript: Option<Transcript>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnnotationProgress {
    pub percent_done: Option<u8>,
    pub annotations: Option<Diarization>,
}

/// Everything a pipeline run can emit, multiplexed into one ordered
/// stream. The event-stream name of each update is its payload type
/// name.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PipelineEvent {
    Pipeline(PipelineProgress),
    Transcoding(TranscodingProgress),
    Transcription(TranscriptionProgress),
    Annotation(AnnotationProgress),
}

impl PipelineEvent {
    pub fn state(state: PipelineState) -> Self {
        Self::Pipeline(PipelineProgress {
            state,
            transcription: None,
        })
    }

    pub fn completed(transcription: Transcription) -> Self {
        Self::Pipeline(PipelineProgress {
            state: PipelineState::Completed,
            transcription: Some(transcription),
        })
    }

    pub fn errored() -> Self {
        Self::state(PipelineState::Error)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pipeline(_) => "PipelineProgress",
            Self::Transcoding(_) => "TranscodingProgress",
            Self::Transcription(_) => "TranscriptionProgress",
            Self::Annotation(_) => "AnnotationProgress",
        }
    }

    /// Terminal events close the stream: completed or error.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Pipeline(PipelineProgress {
                state: PipelineState::Completed | PipelineState::Error,
                ..
            })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_events_serialize_like_the_wire_format() {
        let event = PipelineEvent::state(PipelineState::Transcoding);
        assert_eq!(
            serde_json::to_string(&event).expect("serializable"),
            r#"{"state":"transcoding"}"#
        );
    }

    #[test]
    fn progress_events_carry_explicit_nulls() {
        let event = PipelineEvent::Transcoding(TranscodingProgress {
            percent_done: Some(42),
            track: None,
        });
        assert_eq!(
            serde_json::to_string(&event).expect("serializable"),
            r#"{"percent_done":42,"track":null}"#
        );
        assert_eq!(event.name(), "TranscodingProgress");
    }

    #[test]
    fn only_completed_and_error_are_terminal() {
        assert!(PipelineEvent::errored().is_terminal());
        assert!(!PipelineEvent::state(PipelineState::Annotating).is_terminal());
        assert!(!PipelineEvent::Transcoding(TranscodingProgress::default()).is_terminal());
    }
}
