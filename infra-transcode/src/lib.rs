pub mod probe;

pub use probe::probe;

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use murmur_domain::{
    StageError, StageStream, StageUpdate, Track, TranscodeJob, TranscodeOutput, TranscodePort,
};

/// How long to wait for the encoder to open its progress channel before
/// giving up on progress reporting for the run.
const PROGRESS_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct FfmpegTranscoderConfig {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
}

impl Default for FfmpegTranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
        }
    }
}

/// Transcode stage backed by the ffmpeg CLI. Metadata comes from an
/// ffprobe run; the re-encode is mono pcm_s16le wav at the requested
/// rate, with progress read off ffmpeg's `-progress` unix socket.
pub struct FfmpegTranscoder {
    config: FfmpegTranscoderConfig,
}

impl FfmpegTranscoder {
    pub fn new(config: FfmpegTranscoderConfig) -> Self {
        Self { config }
    }
}

impl TranscodePort for FfmpegTranscoder {
    fn run(&self, job: TranscodeJob) -> StageStream<TranscodeOutput> {
        let (tx, rx) = mpsc::channel(32);
        let config = self.config.clone();
        tokio::spawn(async move {
            match encode(&config, &job, &tx).await {
                Ok(track) => {
                    let _ = tx.send(StageUpdate::Output(TranscodeOutput { track })).await;
                }
                Err(error) => {
                    tracing::error!(input = %job.input.display(), error = %error, "transcode failed");
                    let _ = tx.send(StageUpdate::Failure(error)).await;
                }
            }
        });
        Box::pin(ReceiverStream::new(rx))
    }
}

async fn encode(
    config: &FfmpegTranscoderConfig,
    job: &TranscodeJob,
    tx: &mpsc::Sender<StageUpdate<TranscodeOutput>>,
) -> Result<Track, StageError> {
    let mut track = probe::probe(&config.ffprobe_bin, &job.input).await?;
    track.path = Some(job.output.to_string_lossy().into_owned());
    let total_duration = track.duration.unwrap_or_default();

    if !job.force_reprocessing && tokio::fs::try_exists(&job.output).await.unwrap_or(false) {
        // a previous output that still probes cleanly means the work is
        // done; one that does not gets reprocessed
        if probe::probe(&config.ffprobe_bin, &job.output).await.is_ok() {
            tracing::info!(output = %job.output.display(), "reusing existing transcoded output");
            let _ = tx.send(StageUpdate::Percent(100)).await;
            return Ok(track);
        }
        tracing::warn!(output = %job.output.display(), "existing output failed probe, reprocessing");
    }

    let socket_dir = tempfile::tempdir()
        .map_err(|error| StageError::Transcode(format!("failed to create socket dir: {error}")))?;
    let socket_path = socket_dir.path().join("progress.sock");
    let listener = UnixListener::bind(&socket_path)
        .map_err(|error| StageError::Transcode(format!("failed to bind progress socket: {error}")))?;

    let mut child = Command::new(&config.ffmpeg_bin)
        .arg("-nostdin")
        .arg("-y")
        .arg("-i")
        .arg(&job.input)
        .arg("-f")
        .arg("wav")
        .arg("-ac")
        .arg("1")
        .arg("-acodec")
        .arg("pcm_s16le")
        .arg("-ar")
        .arg(job.sample_rate_hz.to_string())
        .arg("-progress")
        .arg(format!("unix://{}", socket_path.display()))
        .arg(&job.output)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|error| StageError::Transcode(format!("failed to spawn ffmpeg: {error}")))?;

    match tokio::time::timeout(PROGRESS_CONNECT_TIMEOUT, listener.accept()).await {
        Ok(Ok((stream, _))) => forward_progress(stream, total_duration, tx).await,
        Ok(Err(error)) => tracing::warn!(error = %error, "progress socket accept failed"),
        Err(_) => tracing::warn!("encoder never connected to the progress socket"),
    }

    let status = child
        .wait()
        .await
        .map_err(|error| StageError::Transcode(format!("failed to wait for ffmpeg: {error}")))?;
    if !status.success() {
        return Err(StageError::Transcode(format!(
            "ffmpeg failed : {}",
            status.code().unwrap_or(-1)
        )));
    }

    let _ = tx.send(StageUpdate::Percent(100)).await;
    Ok(track)
}

/// Read `key=value` lines off the progress socket until the encoder
/// closes it, forwarding the wall-clock position as a percentage.
async fn forward_progress(
    stream: UnixStream,
    total_duration: f64,
    tx: &mpsc::Sender<StageUpdate<TranscodeOutput>>,
) {
    let mut lines = BufReader::new(stream).lines();
    let mut percent = 0;
    while let Ok(Some(line)) = lines.next_line().await {
        match parse_progress_line(&line, total_duration) {
            ProgressLine::Position(current) => {
                percent = current;
                let _ = tx.send(StageUpdate::Percent(percent)).await;
            }
            ProgressLine::End => {
                let _ = tx.send(StageUpdate::Percent(percent)).await;
            }
            ProgressLine::Other => {}
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ProgressLine {
    Position(u8),
    End,
    Other,
}

fn parse_progress_line(line: &str, total_duration: f64) -> ProgressLine {
    let Some((key, value)) = line.split_once('=') else {
        return ProgressLine::Other;
    };
    match key {
        "out_time_ms" => {
            let Ok(micros) = value.trim().parse::<f64>() else {
                return ProgressLine::Other;
            };
            let current = (micros / 1_000_000.0 * 100.0).round() / 100.0;
            let percent = if total_duration > 0.0 {
                (100.0 * current / total_duration) as i64
            } else {
                0
            };
            ProgressLine::Position(percent.clamp(0, 100) as u8)
        }
        "progress" if value.trim() == "end" => ProgressLine::End,
        _ => ProgressLine::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_time_scales_against_the_total_duration() {
        assert_eq!(
            parse_progress_line("out_time_ms=700000", 1.4),
            ProgressLine::Position(50)
        );
        assert_eq!(
            parse_progress_line("out_time_ms=1400000", 1.4),
            ProgressLine::Position(100)
        );
    }

    #[test]
    fn overshoot_is_clamped() {
        assert_eq!(
            parse_progress_line("out_time_ms=2000000", 1.4),
            ProgressLine::Position(100)
        );
    }

    #[test]
    fn end_marker_flushes_the_last_percent() {
        assert_eq!(parse_progress_line("progress=end", 1.4), ProgressLine::End);
        assert_eq!(
            parse_progress_line("progress=continue", 1.4),
            ProgressLine::Other
        );
    }

    #[test]
    fn unrelated_lines_are_ignored() {
        assert_eq!(parse_progress_line("bitrate=128kbit/s", 1.4), ProgressLine::Other);
        assert_eq!(parse_progress_line("garbage", 1.4), ProgressLine::Other);
        assert_eq!(parse_progress_line("out_time_ms=abc", 1.4), ProgressLine::Other);
    }

    #[test]
    fn zero_duration_reports_zero_percent() {
        assert_eq!(
            parse_progress_line("out_time_ms=700000", 0.0),
            ProgressLine::Position(0)
        );
    }
}
