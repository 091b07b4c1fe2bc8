use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tokio::process::Command;

use murmur_domain::{StageError, Track};

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Probe container metadata with ffprobe and map the whitelisted tags
/// onto a track. A missing or non-positive duration is a transcode
/// failure, every tag is optional.
pub async fn probe(ffprobe_bin: &str, path: &Path) -> Result<Track, StageError> {
    let output = Command::new(ffprobe_bin)
        .arg("-v")
        .arg("error")
        .arg("-print_format")
        .arg("json")
        .arg("-show_format")
        .arg(path)
        .output()
        .await
        .map_err(|error| StageError::Transcode(format!("failed to run ffprobe: {error}")))?;

    if !output.status.success() {
        return Err(StageError::Transcode(format!(
            "ffprobe failed : {}",
            output.status.code().unwrap_or(-1)
        )));
    }
    parse_probe(&output.stdout)
}

fn parse_probe(stdout: &[u8]) -> Result<Track, StageError> {
    let probe: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|error| StageError::Transcode(format!("unreadable probe output: {error}")))?;

    let duration: f64 = probe
        .format
        .duration
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|_| StageError::Transcode("probe reported no duration".to_string()))?;
    if duration <= 0.0 {
        return Err(StageError::Transcode(format!(
            "probed duration must be positive, got {duration}"
        )));
    }

    let tags = probe.format.tags;
    Ok(Track {
        title: tags.get("title").cloned(),
        artist: tags.get("artist").cloned(),
        album: tags.get("album").cloned(),
        comment: tags.get("comment").cloned(),
        date: tags.get("date").cloned(),
        duration: Some(duration),
        path: None,
    })
}
