use std::fmt::Write as _;

use murmur_domain::{DomainError, Transcript, Transcription};

/// Column width subtitle text is wrapped to.
pub const SRT_COLUMNS: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Srt,
}

impl std::str::FromStr for ExportFormat {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "srt" => Ok(Self::Srt),
            other => Err(DomainError::validation(format!(
                "unknown export format: {other}"
            ))),
        }
    }
}

pub fn format_transcription(
    record: &Transcription,
    format: ExportFormat,
) -> Result<String, DomainError> {
    let transcript = record.transcript.as_ref().ok_or_else(|| {
        DomainError::not_found(format!("no transcript for {}", record.transcription_id))
    })?;
    Ok(match format {
        ExportFormat::Srt => srt(transcript, SRT_COLUMNS),
    })
}

/// Render a transcript as SubRip text. Example block:
///
/// ```text
/// 1
/// 00:00:00,498 --> 00:00:02,827
/// Here's what I love most about food and diet.
/// ```
pub fn srt(transcript: &Transcript, columns: usize) -> String {
    let mut out = String::new();
    for (i, segment) in transcript.segments.iter().enumerate() {
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            seconds_to_srt(segment.start),
            seconds_to_srt(segment.end),
            fill(segment.text.trim(), columns)
        );
    }
    out
}

fn seconds_to_srt(seconds: f64) -> String {
    let milliseconds = (seconds.fract() * 1000.0) as u64;
    let whole = seconds as u64;
    format!(
        "{:02}:{:02}:{:02},{milliseconds:03}",
        whole / 3600,
        whole / 60 % 60,
        whole % 60
    )
}

fn fill(text: &str, columns: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if line.is_empty() {
            line.push_str(word);
        } else if line.len() + 1 + word.len() <= columns {
            line.push(' ');
            line.push_str(word);
        } else {
            lines.push(std::mem::take(&mut line));
            line.push_str(word);
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines.join("\n")
}
