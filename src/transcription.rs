use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::config::TranscriptionConfig;
use crate::transcript::SpeechSegment;

/// The transcription service behind the pipeline. Implemented by local
/// Whisper CLIs in production and by mocks in tests.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio file into chronologically ordered speech segments.
    async fn transcribe(&self, audio: &Path) -> Result<Vec<SpeechSegment>>;
}

/// Whisper transcriber that shells out to whichever Whisper CLI is
/// installed: `whisper-cli`/`whisper-cpp` (whisper.cpp, fastest) or
/// `whisper` (Python OpenAI implementation). Both are asked for JSON
/// output, which is parsed into [`SpeechSegment`]s.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    config: TranscriptionConfig,
    cancel: CancelSignal,
}

impl WhisperTranscriber {
    pub fn new(config: TranscriptionConfig, cancel: CancelSignal) -> Self {
        Self { config, cancel }
    }

    async fn command_available(cmd: &str) -> bool {
        Command::new(cmd)
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok()
    }

    async fn run_command(&self, cmd: &mut Command) -> Result<()> {
        let child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .context("failed to start whisper")?;

        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let wait = tokio::time::timeout(timeout, child.wait_with_output());
        let output = tokio::select! {
            result = wait => result
                .map_err(|_| anyhow!("whisper timed out after {}s", timeout.as_secs()))?
                .context("whisper did not run to completion")?,
            _ = self.cancel.cancelled() => return Err(anyhow!("run cancelled")),
        };

        if !output.status.success() {
            return Err(anyhow!(
                "whisper exited with an error:\n{}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }
        Ok(())
    }

    async fn transcribe_with_cpp(&self, cli: &str, audio: &Path) -> Result<Vec<SpeechSegment>> {
        let work_dir = TempDir::new()?;
        let out_prefix = work_dir.path().join("transcription");

        let mut cmd = Command::new(cli);
        cmd.arg("-f")
            .arg(audio)
            .arg("-oj")
            .arg("-of")
            .arg(&out_prefix)
            .arg("-m")
            .arg(&self.config.model);
        self.run_command(&mut cmd).await?;

        let json = tokio::fs::read_to_string(out_prefix.with_extension("json"))
            .await
            .context("whisper.cpp produced no JSON output")?;
        parse_whisper_cpp_output(&json)
    }

    async fn transcribe_with_python(&self, audio: &Path) -> Result<Vec<SpeechSegment>> {
        let work_dir = TempDir::new()?;

        let mut cmd = Command::new("whisper");
        cmd.arg(audio)
            .arg("--model")
            .arg(&self.config.model)
            .arg("--output_format")
            .arg("json")
            .arg("--output_dir")
            .arg(work_dir.path());
        self.run_command(&mut cmd).await?;

        let stem = audio
            .file_stem()
            .ok_or_else(|| anyhow!("audio path has no file stem: {}", audio.display()))?;
        let json_path = work_dir.path().join(stem).with_extension("json");
        let json = tokio::fs::read_to_string(&json_path)
            .await
            .context("whisper produced no JSON output")?;
        parse_python_whisper_output(&json)
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<Vec<SpeechSegment>> {
        info!(
            "transcribing {} with model '{}'",
            audio.display(),
            self.config.model
        );

        // whisper.cpp backends first, Python fallback.
        for cli in ["whisper-cli", "whisper-cpp"] {
            if Self::command_available(cli).await {
                debug!("using {} backend", cli);
                return self.transcribe_with_cpp(cli, audio).await;
            }
        }
        if Self::command_available("whisper").await {
            debug!("using python whisper backend");
            return self.transcribe_with_python(audio).await;
        }

        warn!("no whisper backend found on PATH");
        Err(anyhow!(
            "no Whisper backend found; install whisper.cpp or openai-whisper"
        ))
    }
}

#[derive(Debug, Deserialize)]
struct PythonWhisperOutput {
    segments: Vec<PythonWhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct PythonWhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

/// Parse openai-whisper's JSON (`{"segments": [{"start", "end", "text"}]}`).
fn parse_python_whisper_output(json: &str) -> Result<Vec<SpeechSegment>> {
    let output: PythonWhisperOutput =
        serde_json::from_str(json).context("unparseable whisper JSON")?;
    Ok(output
        .segments
        .into_iter()
        .map(|s| SpeechSegment::new(s.start, s.end.max(s.start), s.text))
        .collect())
}

#[derive(Debug, Deserialize)]
struct CppWhisperOutput {
    transcription: Vec<CppWhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct CppWhisperSegment {
    offsets: CppWhisperOffsets,
    text: String,
}

#[derive(Debug, Deserialize)]
struct CppWhisperOffsets {
    from: u64,
    to: u64,
}

/// Parse whisper.cpp's JSON (`{"transcription": [{"offsets": {"from", "to"},
/// "text"}]}`, offsets in milliseconds).
fn parse_whisper_cpp_output(json: &str) -> Result<Vec<SpeechSegment>> {
    let output: CppWhisperOutput =
        serde_json::from_str(json).context("unparseable whisper.cpp JSON")?;
    Ok(output
        .transcription
        .into_iter()
        .map(|s| {
            let start = s.offsets.from as f64 / 1000.0;
            let end = (s.offsets.to as f64 / 1000.0).max(start);
            SpeechSegment::new(start, end, s.text)
        })
        .collect())
}
