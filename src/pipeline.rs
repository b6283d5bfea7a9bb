use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::assembler::ClipAssembler;
use crate::cancel::CancelSignal;
use crate::config::{Config, OutputConfig};
use crate::highlights::{parse_highlights, plan_cuts};
use crate::llm::{create_llm, highlight_prompt, ChatMessage, LLM};
use crate::media::{FfmpegToolkit, MediaToolkit};
use crate::transcript::{to_prompt_text, to_srt};
use crate::transcription::{Transcriber, WhisperTranscriber};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStage {
    Probe,
    AudioExtraction,
    Transcription,
    HighlightGeneration,
    Assembly,
    Completed,
}

impl PipelineStage {
    /// Overall completion fraction once this stage begins (Completed = done).
    pub fn fraction(&self) -> f32 {
        match self {
            PipelineStage::Probe => 0.05,
            PipelineStage::AudioExtraction => 0.15,
            PipelineStage::Transcription => 0.30,
            PipelineStage::HighlightGeneration => 0.60,
            PipelineStage::Assembly => 0.80,
            PipelineStage::Completed => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStatus {
    /// Highlight video produced
    Completed,
    /// Run finished but there was nothing to assemble (not an error)
    Skipped,
    Failed,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub video: PathBuf,
    pub status: PipelineStatus,
    pub transcript_path: Option<PathBuf>,
    pub srt_path: Option<PathBuf>,
    pub highlights_path: Option<PathBuf>,
    pub highlight_video_path: Option<PathBuf>,
    /// Informational "nothing to do" explanation when status is Skipped
    pub notice: Option<String>,
    pub error_message: Option<String>,
    pub processing_time: Duration,
}

impl PipelineReport {
    fn new(video: &Path) -> Self {
        Self {
            video: video.to_path_buf(),
            status: PipelineStatus::Failed,
            transcript_path: None,
            srt_path: None,
            highlights_path: None,
            highlight_video_path: None,
            notice: None,
            error_message: None,
            processing_time: Duration::from_secs(0),
        }
    }
}

enum RunOutcome {
    Assembled,
    NothingToAssemble(String),
}

/// Fixed artifact paths derived from the video stem. Cached artifacts are
/// read if present and written once when produced.
#[derive(Debug, Clone)]
struct ArtifactPaths {
    transcript: PathBuf,
    srt: PathBuf,
    highlights: PathBuf,
    temp_audio: PathBuf,
    highlight_video: PathBuf,
}

impl ArtifactPaths {
    fn for_video(video: &Path, output: &OutputConfig) -> Result<Self> {
        let stem = video
            .file_stem()
            .ok_or_else(|| anyhow!("video path has no file stem: {}", video.display()))?
            .to_string_lossy();

        let in_dir = |suffix: &str| output.dir.join(format!("{}{}", stem, suffix));
        Ok(Self {
            transcript: in_dir(&output.transcript_suffix),
            srt: in_dir(&output.srt_suffix),
            highlights: in_dir(&output.highlights_suffix),
            temp_audio: in_dir(&output.temp_audio_suffix),
            highlight_video: in_dir(&output.highlight_video_suffix),
        })
    }
}

type ProgressFn = Arc<dyn Fn(PipelineStage, f32) + Send + Sync>;

/// Drives one video through transcription, highlight generation, and
/// assembly. One full pipeline runs per video at a time; the host
/// interface schedules it off its interactive thread and may cancel it
/// via the paired [`CancelSignal`].
pub struct HighlightPipeline {
    config: Config,
    toolkit: Arc<dyn MediaToolkit>,
    transcriber: Arc<dyn Transcriber>,
    llm: Option<Arc<dyn LLM>>,
    progress: Option<ProgressFn>,
    cancel: CancelSignal,
}

impl HighlightPipeline {
    /// Build a pipeline with production collaborators (ffmpeg, whisper, and
    /// the configured LLM provider). Without an API key the highlight stage
    /// is skipped rather than failing the whole run.
    pub fn new(config: Config, cancel: CancelSignal) -> Result<Self> {
        config.validate()?;

        let toolkit: Arc<dyn MediaToolkit> = Arc::new(FfmpegToolkit::new(
            Duration::from_secs(config.media.timeout_seconds),
            config.audio.sample_rate,
            cancel.clone(),
        ));
        let transcriber: Arc<dyn Transcriber> = Arc::new(WhisperTranscriber::new(
            config.transcription.clone(),
            cancel.clone(),
        ));
        let llm: Option<Arc<dyn LLM>> = if config.llm.api_key.is_some() {
            Some(Arc::from(create_llm(&config.llm)?))
        } else {
            None
        };

        Ok(Self {
            config,
            toolkit,
            transcriber,
            llm,
            progress: None,
            cancel,
        })
    }

    pub fn with_toolkit(mut self, toolkit: Arc<dyn MediaToolkit>) -> Self {
        self.toolkit = toolkit;
        self
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = transcriber;
        self
    }

    pub fn with_llm(mut self, llm: Arc<dyn LLM>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Register a synchronous progress callback. Emitted from whatever task
    /// runs the pipeline; the host decides how to marshal it to a UI.
    pub fn on_progress(
        mut self,
        callback: impl Fn(PipelineStage, f32) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    fn emit(&self, stage: PipelineStage) {
        if let Some(ref callback) = self.progress {
            callback(stage, stage.fraction());
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(anyhow!("run cancelled"))
        } else {
            Ok(())
        }
    }

    /// Run the full pipeline for one video. Every failure is captured in
    /// the returned report rather than propagated.
    pub async fn run(&self, video: &Path) -> PipelineReport {
        let start_time = Instant::now();
        let mut report = PipelineReport::new(video);

        info!("processing {}", video.display());
        match self.run_stages(video, &mut report).await {
            Ok(RunOutcome::Assembled) => {
                self.emit(PipelineStage::Completed);
                report.status = PipelineStatus::Completed;
                info!("processing complete for {}", video.display());
            }
            Ok(RunOutcome::NothingToAssemble(notice)) => {
                report.status = PipelineStatus::Skipped;
                info!("no highlight video produced: {}", notice);
                report.notice = Some(notice);
            }
            Err(e) => {
                report.status = PipelineStatus::Failed;
                error!("pipeline failed for {}: {:#}", video.display(), e);
                report.error_message = Some(format!("{:#}", e));
            }
        }

        report.processing_time = start_time.elapsed();
        report
    }

    async fn run_stages(&self, video: &Path, report: &mut PipelineReport) -> Result<RunOutcome> {
        tokio::fs::create_dir_all(&self.config.output.dir)
            .await
            .context("could not create output directory")?;
        let paths = ArtifactPaths::for_video(video, &self.config.output)?;

        self.check_cancelled()?;
        self.emit(PipelineStage::Probe);
        let media = self
            .toolkit
            .probe(video)
            .await
            .context("probing the source video failed")?;

        self.check_cancelled()?;
        let transcript = self.obtain_transcript(video, &paths, report).await?;

        self.check_cancelled()?;
        let highlights_text = match self.obtain_highlights(&transcript, &paths, report).await? {
            Some(text) => text,
            None => {
                return Ok(RunOutcome::NothingToAssemble(
                    "no text-generation service configured; highlight generation skipped"
                        .to_string(),
                ))
            }
        };

        self.check_cancelled()?;
        self.emit(PipelineStage::Assembly);
        let candidates = match parse_highlights(&highlights_text) {
            Ok(candidates) => candidates,
            Err(e) => return Ok(RunOutcome::NothingToAssemble(e.to_string())),
        };
        let cuts = match plan_cuts(&candidates, media.duration) {
            Ok(cuts) => cuts,
            Err(e) => return Ok(RunOutcome::NothingToAssemble(e.to_string())),
        };

        let assembler = ClipAssembler::new(Arc::clone(&self.toolkit));
        let produced = assembler
            .assemble(video, &cuts, &paths.highlight_video)
            .await
            .map_err(anyhow::Error::from)
            .context("highlight assembly failed")?;
        report.highlight_video_path = Some(produced);

        Ok(RunOutcome::Assembled)
    }

    /// Return the prompt-ready transcript, reading the cached file when one
    /// exists and otherwise extracting audio and transcribing. The temp
    /// audio file is removed on every exit path.
    async fn obtain_transcript(
        &self,
        video: &Path,
        paths: &ArtifactPaths,
        report: &mut PipelineReport,
    ) -> Result<String> {
        if paths.transcript.is_file() {
            info!(
                "transcript found at {}, skipping transcription",
                paths.transcript.display()
            );
            report.transcript_path = Some(paths.transcript.clone());
            if paths.srt.is_file() {
                report.srt_path = Some(paths.srt.clone());
            }
            return tokio::fs::read_to_string(&paths.transcript)
                .await
                .context("could not read cached transcript");
        }

        let outcome = self.transcribe_fresh(video, paths, report).await;
        if paths.temp_audio.exists() {
            let _ = tokio::fs::remove_file(&paths.temp_audio).await;
        }
        outcome
    }

    async fn transcribe_fresh(
        &self,
        video: &Path,
        paths: &ArtifactPaths,
        report: &mut PipelineReport,
    ) -> Result<String> {
        self.emit(PipelineStage::AudioExtraction);
        self.toolkit
            .extract_audio(video, &paths.temp_audio)
            .await
            .map_err(anyhow::Error::from)
            .context("audio extraction failed")?;

        self.check_cancelled()?;
        self.emit(PipelineStage::Transcription);
        let segments = self
            .transcriber
            .transcribe(&paths.temp_audio)
            .await
            .context("transcription failed")?;
        if segments.is_empty() {
            return Err(anyhow!("transcription produced no segments"));
        }

        let prompt_text = to_prompt_text(&segments);
        tokio::fs::write(&paths.transcript, &prompt_text)
            .await
            .context("could not write transcript")?;
        report.transcript_path = Some(paths.transcript.clone());
        info!("transcript saved to {}", paths.transcript.display());

        if !paths.srt.is_file() {
            tokio::fs::write(&paths.srt, to_srt(&segments))
                .await
                .context("could not write SRT captions")?;
            info!("SRT captions saved to {}", paths.srt.display());
        }
        report.srt_path = Some(paths.srt.clone());

        Ok(prompt_text)
    }

    /// Return the raw highlights response, reading the cached file when one
    /// exists and otherwise asking the text-generation service. `None`
    /// means no service is configured.
    async fn obtain_highlights(
        &self,
        transcript: &str,
        paths: &ArtifactPaths,
        report: &mut PipelineReport,
    ) -> Result<Option<String>> {
        if paths.highlights.is_file() {
            info!(
                "highlights found at {}, skipping generation",
                paths.highlights.display()
            );
            report.highlights_path = Some(paths.highlights.clone());
            let text = tokio::fs::read_to_string(&paths.highlights)
                .await
                .context("could not read cached highlights")?;
            return Ok(Some(text));
        }

        let llm = match self.llm {
            Some(ref llm) => llm,
            None => {
                warn!("no LLM API key configured; skipping highlight generation");
                return Ok(None);
            }
        };

        self.emit(PipelineStage::HighlightGeneration);
        let text = self
            .request_highlights(llm.as_ref(), highlight_prompt(transcript))
            .await
            .context("highlight generation failed")?;

        tokio::fs::write(&paths.highlights, &text)
            .await
            .context("could not write highlights")?;
        report.highlights_path = Some(paths.highlights.clone());
        info!("highlights saved to {}", paths.highlights.display());

        Ok(Some(text))
    }

    /// One generation request with a finite retry budget and backoff,
    /// interruptible by cancellation.
    async fn request_highlights(&self, llm: &dyn LLM, prompt: String) -> Result<String> {
        let mut attempt: u32 = 0;
        loop {
            let chat = llm.chat(vec![ChatMessage::user(prompt.clone())]);
            let result = tokio::select! {
                result = chat => result,
                _ = self.cancel.cancelled() => return Err(anyhow!("run cancelled")),
            };

            match result {
                Ok(response) => return Ok(response.content),
                Err(e) if attempt < self.config.llm.max_retries => {
                    attempt += 1;
                    let backoff = Duration::from_secs(2u64.saturating_pow(attempt));
                    warn!(
                        "generation request failed (attempt {}), retrying in {:?}: {:#}",
                        attempt, backoff, e
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
