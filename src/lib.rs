//! AI Video Highlighter
//!
//! Extracts audio from a video, transcribes it with Whisper, asks an LLM to
//! pick the interesting moments, and stitches the chosen time ranges into a
//! highlight reel with lossless ffmpeg stream copies.

pub mod assembler;
pub mod cancel;
pub mod config;
pub mod highlights;
pub mod llm;
pub mod media;
pub mod pipeline;
pub mod timestamp;
pub mod transcript;
pub mod transcription;

// Re-export main types for easy access
pub use crate::assembler::{AssemblyError, ClipAssembler};
pub use crate::cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::highlights::{
    parse_highlights, plan_cuts, CutRange, HighlightCandidate, ParseError, PlanError,
};
pub use crate::llm::{create_llm, highlight_prompt, LLMConfig, LLMProvider, LLM};
pub use crate::media::{FfmpegToolkit, MediaError, MediaInfo, MediaToolkit};
pub use crate::pipeline::{HighlightPipeline, PipelineReport, PipelineStage, PipelineStatus};
pub use crate::timestamp::{decode, encode, TimestampStyle};
pub use crate::transcript::{to_prompt_text, to_srt, SpeechSegment};
pub use crate::transcription::{Transcriber, WhisperTranscriber};
