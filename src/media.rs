use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::cancel::CancelSignal;
use crate::highlights::CutRange;
use crate::timestamp::{encode, TimestampStyle};

/// Media metadata the pipeline cares about.
#[derive(Debug, Clone, Copy)]
pub struct MediaInfo {
    /// Container duration in seconds
    pub duration: f64,
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{tool} not found in PATH, is it installed?")]
    BinaryMissing { tool: &'static str },
    #[error("{tool} exited with an error:\n{stderr}")]
    CommandFailed { tool: &'static str, stderr: String },
    #[error("{tool} timed out after {seconds}s")]
    TimedOut { tool: &'static str, seconds: u64 },
    #[error("run cancelled")]
    Cancelled,
    #[error("could not read media metadata: {0}")]
    Probe(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The external media tool behind the pipeline. Implemented by ffmpeg in
/// production and by mocks in tests.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Read container metadata (duration) from the source video.
    async fn probe(&self, video: &Path) -> Result<MediaInfo, MediaError>;

    /// Extract the audio track as 16 kHz mono PCM WAV for transcription.
    async fn extract_audio(&self, video: &Path, audio_out: &Path) -> Result<(), MediaError>;

    /// Stream-copy one time range of the source into a clip file. Lossless.
    async fn cut(&self, video: &Path, range: CutRange, clip_out: &Path)
        -> Result<(), MediaError>;

    /// Losslessly concatenate the clips named in a concat-demuxer manifest.
    async fn concat(&self, manifest: &Path, video_out: &Path) -> Result<(), MediaError>;
}

/// FFmpeg/ffprobe command-line implementation.
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    /// Per-invocation timeout
    timeout: Duration,
    /// Sample rate for extracted audio (16 kHz is the Whisper sweet spot)
    sample_rate: u32,
    cancel: CancelSignal,
}

impl FfmpegToolkit {
    pub fn new(timeout: Duration, sample_rate: u32, cancel: CancelSignal) -> Self {
        Self {
            timeout,
            sample_rate,
            cancel,
        }
    }

    /// Run a media tool, bounded by the configured timeout and interruptible
    /// by the cancel signal. Returns captured stdout on success and the
    /// tool's stderr verbatim on failure.
    async fn run(&self, tool: &'static str, cmd: &mut Command) -> Result<Vec<u8>, MediaError> {
        let child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MediaError::BinaryMissing { tool }
                } else {
                    MediaError::Io(e)
                }
            })?;

        let wait = tokio::time::timeout(self.timeout, child.wait_with_output());
        tokio::select! {
            result = wait => match result {
                Ok(Ok(output)) => {
                    if output.status.success() {
                        Ok(output.stdout)
                    } else {
                        Err(MediaError::CommandFailed {
                            tool,
                            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                        })
                    }
                }
                Ok(Err(e)) => Err(MediaError::Io(e)),
                Err(_) => Err(MediaError::TimedOut {
                    tool,
                    seconds: self.timeout.as_secs(),
                }),
            },
            _ = self.cancel.cancelled() => Err(MediaError::Cancelled),
        }
    }
}

/// ffmpeg seek argument, `HH:MM:SS.mmm`. Millisecond precision keeps a
/// range that ends inside the media's final fractional second from
/// collapsing to a zero-length cut; ffmpeg wants a dot separator where
/// SubRip uses a comma.
fn seek_arg(seconds: f64) -> String {
    encode(seconds, TimestampStyle::Subtitle).replace(',', ".")
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn probe(&self, video: &Path) -> Result<MediaInfo, MediaError> {
        let mut cmd = Command::new("ffprobe");
        cmd.arg("-v")
            .arg("quiet")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg(video);

        let stdout = self.run("ffprobe", &mut cmd).await?;
        let data: serde_json::Value = serde_json::from_slice(&stdout)
            .map_err(|e| MediaError::Probe(format!("unparseable ffprobe output: {}", e)))?;

        let duration: f64 = data["format"]["duration"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                MediaError::Probe(format!("no duration reported for {}", video.display()))
            })?;

        debug!("probed {}: {:.1}s", video.display(), duration);
        Ok(MediaInfo { duration })
    }

    async fn extract_audio(&self, video: &Path, audio_out: &Path) -> Result<(), MediaError> {
        info!("extracting audio from {}", video.display());

        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y")
            .arg("-i")
            .arg(video)
            .arg("-vn")
            .arg("-acodec")
            .arg("pcm_s16le")
            .arg("-ar")
            .arg(self.sample_rate.to_string())
            .arg("-ac")
            .arg("1")
            .arg(audio_out);

        self.run("ffmpeg", &mut cmd).await?;
        info!("audio extracted to {}", audio_out.display());
        Ok(())
    }

    async fn cut(
        &self,
        video: &Path,
        range: CutRange,
        clip_out: &Path,
    ) -> Result<(), MediaError> {
        let start = seek_arg(range.start);
        let end = seek_arg(range.end);
        debug!("cutting {} -> {} into {}", start, end, clip_out.display());

        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y")
            .arg("-i")
            .arg(video)
            .arg("-ss")
            .arg(&start)
            .arg("-to")
            .arg(&end)
            .arg("-c")
            .arg("copy")
            .arg(clip_out);

        self.run("ffmpeg", &mut cmd).await?;
        Ok(())
    }

    async fn concat(&self, manifest: &Path, video_out: &Path) -> Result<(), MediaError> {
        debug!("concatenating clips from {}", manifest.display());

        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y")
            .arg("-f")
            .arg("concat")
            .arg("-safe")
            .arg("0")
            .arg("-i")
            .arg(manifest)
            .arg("-c")
            .arg("copy")
            .arg(video_out);

        self.run("ffmpeg", &mut cmd).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_arg_millisecond_precision() {
        assert_eq!(seek_arg(100.0), "00:01:40.000");
        assert_eq!(seek_arg(100.4), "00:01:40.400");
        assert_eq!(seek_arg(3661.5), "01:01:01.500");
    }

    #[test]
    fn test_seek_args_distinct_for_subsecond_range() {
        // A cut ending in the final fractional second of the media must not
        // produce identical -ss and -to arguments.
        assert_ne!(seek_arg(100.0), seek_arg(100.4));
    }
}
