use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use sonoform::config::load_config;
use sonoform::pipeline::{render_video, CancelFlag, OutputTarget, RenderOptions};

#[derive(Parser)]
#[command(name = "sonoform", about = "Render an audio-reactive video from an audio file")]
struct Cli {
    /// Input audio file (WAV, MP3, FLAC, AAC)
    input_audio: PathBuf,

    /// Output video file
    #[arg(short, long, default_value = "output.mp4")]
    output: PathBuf,

    /// JSON config file, created with defaults if missing
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Write PNG frames into this directory instead of encoding a video
    #[arg(long)]
    frames: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;

    let cancel = CancelFlag::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, finishing the frames rendered so far");
            on_signal.cancel();
        }
    });

    let last_percent = AtomicU32::new(0);
    let progress = move |p: f32| {
        let percent = (p * 100.0) as u32;
        if percent / 10 > last_percent.load(Ordering::Relaxed) / 10 {
            last_percent.store(percent, Ordering::Relaxed);
            eprintln!("{percent}%");
        }
    };

    let options = RenderOptions {
        cancel,
        progress: Some(Box::new(progress)),
        target: cli.frames.map_or(OutputTarget::Video, OutputTarget::ImageSequence),
    };

    let report = render_video(&cli.input_audio, &cli.output, &config, options)
        .await
        .with_context(|| format!("Failed to render {}", cli.input_audio.display()))?;

    if report.cancelled {
        eprintln!(
            "Stopped early: {} frames written to {}",
            report.frames_written,
            cli.output.display()
        );
    } else {
        eprintln!("Done: {}", cli.output.display());
    }
    Ok(())
}
