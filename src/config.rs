use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::llm::LLMConfig;

/// Configuration for the video highlighter.
///
/// Built once and passed explicitly into the pipeline; there is no
/// process-wide configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Audio extraction settings
    pub audio: AudioConfig,

    /// Transcription service settings
    pub transcription: TranscriptionConfig,

    /// Text-generation service settings
    pub llm: LLMConfig,

    /// Media toolkit settings
    pub media: MediaConfig,

    /// Output artifact settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Target sample rate for transcription audio (16 kHz suits Whisper)
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Whisper model name (or model file path for whisper.cpp)
    pub model: String,

    /// Timeout for a transcription run (seconds)
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Timeout per ffmpeg/ffprobe invocation (seconds)
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for all produced artifacts
    pub dir: PathBuf,

    /// Filename suffixes appended to the video stem
    pub transcript_suffix: String,
    pub srt_suffix: String,
    pub highlights_suffix: String,
    pub temp_audio_suffix: String,
    pub highlight_video_suffix: String,
}

impl Config {
    /// Load configuration from the first toml file found, falling back to
    /// environment overrides on defaults.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "video-highlighter.toml",
            "config/video-highlighter.toml",
            "~/.config/video-highlighter/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("loaded configuration from {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from a specific toml file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config file {}", path.display()))?;
        toml::from_str(&config_str)
            .with_context(|| format!("could not parse config file {}", path.display()))
    }

    /// Defaults with environment-variable overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(api_key) = std::env::var("OPENROUTER_API_KEY") {
            config.llm.api_key = Some(api_key);
        }
        if let Ok(model) = std::env::var("VIDEO_HIGHLIGHTER_LLM_MODEL") {
            config.llm.model = model;
        }
        if let Ok(model) = std::env::var("VIDEO_HIGHLIGHTER_WHISPER_MODEL") {
            config.transcription.model = model;
        }
        if let Ok(output_dir) = std::env::var("VIDEO_HIGHLIGHTER_OUTPUT_DIR") {
            config.output.dir = PathBuf::from(output_dir);
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(anyhow!("sample_rate must be greater than 0"));
        }
        if self.media.timeout_seconds == 0 || self.transcription.timeout_seconds == 0 {
            return Err(anyhow!("timeouts must be greater than 0"));
        }
        if self.output.highlight_video_suffix.is_empty() {
            return Err(anyhow!("highlight_video_suffix must not be empty"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio: AudioConfig { sample_rate: 16000 },
            transcription: TranscriptionConfig {
                model: "base.en".to_string(),
                timeout_seconds: 3600,
            },
            llm: LLMConfig::default(),
            media: MediaConfig {
                timeout_seconds: 600,
            },
            output: OutputConfig {
                dir: PathBuf::from("./output"),
                transcript_suffix: "_transcript.txt".to_string(),
                srt_suffix: "_transcript.srt".to_string(),
                highlights_suffix: "_highlights.txt".to_string(),
                temp_audio_suffix: "_temp_audio.wav".to_string(),
                highlight_video_suffix: "_highlight.mp4".to_string(),
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.dir = dir;
        self
    }

    pub fn with_whisper_model(mut self, model: impl Into<String>) -> Self {
        self.config.transcription.model = model.into();
        self
    }

    pub fn with_llm_model(mut self, model: impl Into<String>) -> Self {
        self.config.llm.model = model.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.llm.api_key = Some(api_key.into());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
