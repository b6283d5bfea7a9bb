use anyhow::Result;
use clap::{Arg, Command};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use video_highlighter::cancel::cancel_pair;
use video_highlighter::config::Config;
use video_highlighter::pipeline::{HighlightPipeline, PipelineStatus};

fn cli() -> Command {
    Command::new("video-highlighter")
        .version("0.1.0")
        .about("Transcribe a video and generate a highlight reel")
        .arg(
            Arg::new("video")
                .value_name("VIDEO")
                .help("Path to the video file")
                .required(true),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Directory for transcripts, captions, and the highlight video"),
        )
        .arg(
            Arg::new("whisper-model")
                .short('m')
                .long("whisper-model")
                .value_name("MODEL")
                .help("Whisper model name"),
        )
        .arg(
            Arg::new("llm-model")
                .long("llm-model")
                .value_name("MODEL")
                .help("Text-generation model identifier"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (toml)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    // Initialize logging
    let default_filter = if matches.get_flag("verbose") {
        "video_highlighter=debug,info"
    } else {
        "video_highlighter=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let video = PathBuf::from(matches.get_one::<String>("video").unwrap());
    if !video.is_file() {
        error!("video file not found: {}", video.display());
        return Err(anyhow::anyhow!("video file not found"));
    }

    // File/env configuration first, CLI flags on top.
    let config = match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(Path::new(path))?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };
    let config = apply_cli_overrides(config, &matches);

    if config.llm.api_key.is_none() {
        warn!("OPENROUTER_API_KEY not set; highlight generation will be skipped");
    }

    let (cancel_handle, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            cancel_handle.cancel();
        }
    });

    let pipeline = HighlightPipeline::new(config, cancel)?
        .on_progress(|stage, fraction| info!("{:?} ({:.0}%)", stage, fraction * 100.0));

    let report = pipeline.run(&video).await;

    match report.status {
        PipelineStatus::Completed => {
            if let Some(path) = report.highlight_video_path {
                info!("highlight video created: {}", path.display());
            }
            Ok(())
        }
        PipelineStatus::Skipped => {
            info!(
                "nothing to assemble: {}",
                report.notice.as_deref().unwrap_or("no usable highlights")
            );
            Ok(())
        }
        PipelineStatus::Failed => Err(anyhow::anyhow!(
            "{}",
            report
                .error_message
                .unwrap_or_else(|| "pipeline failed".to_string())
        )),
    }
}

fn apply_cli_overrides(mut config: Config, matches: &clap::ArgMatches) -> Config {
    if let Some(dir) = matches.get_one::<String>("output-dir") {
        config.output.dir = PathBuf::from(dir);
    }
    if let Some(model) = matches.get_one::<String>("whisper-model") {
        config.transcription.model = model.clone();
    }
    if let Some(model) = matches.get_one::<String>("llm-model") {
        config.llm.model = model.clone();
    }
    config
}
