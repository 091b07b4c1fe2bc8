mod export;
mod media;
mod transcribe;
mod transcription;
mod upload;

pub use export::export;
pub use media::media;
pub use transcribe::transcribe;
pub use transcription::{patch_track, transcription};
pub use upload::{open_upload, upload_chunk};

use axum::http::{HeaderMap, HeaderName};

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
