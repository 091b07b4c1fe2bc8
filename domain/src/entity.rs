use serde::{Deserialize, Serialize};

/// Immutable description of the uploaded file, captured when the upload
/// session is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadInfo {
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// Container metadata probed from the media file. `duration` is set by
/// the transcode stage and is always positive once transcoding succeeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub path: Option<String>,
}

/// Partial tag update for a track. Duration and the storage path are
/// owned by the pipeline and cannot be patched from outside.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl Track {
    pub fn merge(&mut self, patch: TrackPatch) {
        if let Some(title) = patch.title {
            self.title = Some(title);
        }
        if let Some(artist) = patch.artist {
            self.artist = Some(artist);
        }
        if let Some(album) = patch.album {
            self.album = Some(album);
        }
        if let Some(comment) = patch.comment {
            self.comment = Some(comment);
        }
        if let Some(date) = patch.date {
            self.date = Some(date);
        }
    }
}

/// One recognised span of speech. Segment times are seconds from the
/// start of the track; start/end are non-decreasing in segment order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub language: Option<String>,
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
}

/// A word interval derived from a transcript segment. The score is 1.0
/// everywhere, which marks the alignment as heuristic rather than
/// acoustic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedWord {
    pub label: String,
    pub start: f64,
    pub end: f64,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub words: Vec<AlignedWord>,
}

/// A contiguous interval attributed to one speaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diarization {
    pub turns: Vec<Turn>,
}

/// Aggregate record tracking one media item through the pipeline. The id
/// is assigned exactly once, when the upload session is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub transcription_id: String,
    pub upload: UploadInfo,
    #[serde(default)]
    pub track: Option<Track>,
    #[serde(default)]
    pub transcript: Option<Transcript>,
    #[serde(default)]
    pub diarization: Option<Diarization>,
    #[serde(default)]
    pub alignment: Option<Alignment>,
    #[serde(default)]
    pub transcoded: bool,
    #[serde(default)]
    pub language: Option<String>,
    pub path: String,
}

impl Transcription {
    pub fn new(
        transcription_id: impl Into<String>,
        upload: UploadInfo,
        path: impl Into<String>,
    ) -> Self {
        Self {
            transcription_id: transcription_id.into(),
            upload,
            track: None,
            transcript: None,
            diarization: None,
            alignment: None,
            transcoded: false,
            language: None,
            path: path.into(),
        }
    }

    /// The transcode stage's completion predicate.
    pub fn is_transcoded(&self) -> bool {
        self.transcoded && self.track.is_some()
    }

    pub fn is_transcribed(&self) -> bool {
        self.transcript.is_some()
    }
}
