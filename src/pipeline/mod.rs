//! Full render pipeline: audio file in, video with audio out.

pub mod session;

pub use session::{CancelFlag, NullSink, ProgressCallback, Session, SessionReport, SessionState};

use crate::audio::{compute_spectrogram, load_audio, AudioError, StftError};
use crate::config::{ConfigError, VisualConfig};
use crate::features::{extract_features, AudioFeatures, ExtractorSettings, FeatureError};
use crate::gpu::{GpuError, SceneConfig, SceneRenderer};
use crate::render::RenderError;
use crate::video::{
    mux_audio, ImageSequenceSink, MuxError, SinkError, ThreadedSink, VideoConfig,
    VideoEncoder,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Errors that can occur during pipeline execution.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),
    #[error("Spectrogram error: {0}")]
    Stft(#[from] StftError),
    #[error("Feature error: {0}")]
    Features(#[from] FeatureError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    #[error("Render failed at frame {frame}: {source}")]
    Render {
        frame: usize,
        #[source]
        source: RenderError,
    },
    #[error("Writing frame {frame} failed: {source}")]
    Sink {
        frame: usize,
        #[source]
        source: SinkError,
    },
    #[error("Opening frame sink failed: {0}")]
    Open(#[source] SinkError),
    #[error("Closing frame sink failed: {0}")]
    Close(#[source] SinkError),
    #[error("Mux error: {0}")]
    Mux(#[from] MuxError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot {action} a session that is {state}")]
    InvalidState {
        state: SessionState,
        action: &'static str,
    },
}

impl PipelineError {
    /// Name of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Audio(_) => "audio",
            PipelineError::Stft(_) => "stft",
            PipelineError::Features(_) => "features",
            PipelineError::Config(_) => "config",
            PipelineError::Gpu(_) => "gpu",
            PipelineError::Render { .. } => "render",
            PipelineError::Sink { .. } | PipelineError::Open(_) | PipelineError::Close(_) => {
                "sink"
            }
            PipelineError::Mux(_) => "mux",
            PipelineError::Io(_) => "io",
            PipelineError::InvalidState { .. } => "session",
        }
    }

    /// Frame index the failure belongs to, if it happened inside the loop.
    pub fn frame(&self) -> Option<usize> {
        match self {
            PipelineError::Render { frame, .. } | PipelineError::Sink { frame, .. } => Some(*frame),
            _ => None,
        }
    }
}

/// Wall-clock time spent per stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timings {
    pub audio: Duration,
    pub features: Duration,
    pub setup: Duration,
    pub render: Duration,
    /// Handing frames to the sink, including the final close.
    pub write: Duration,
    pub mux: Duration,
    pub total: Duration,
}

impl Timings {
    pub fn log_summary(&self, frames: usize) {
        let per_frame = if frames > 0 {
            self.render.as_secs_f64() * 1000.0 / frames as f64
        } else {
            0.0
        };
        log::info!("Timing summary ({frames} frames):");
        log::info!("  audio decode + stft  {:>8.2}s", self.audio.as_secs_f64());
        log::info!("  feature extraction   {:>8.2}s", self.features.as_secs_f64());
        log::info!("  gpu + sink setup     {:>8.2}s", self.setup.as_secs_f64());
        log::info!(
            "  render               {:>8.2}s ({per_frame:.2} ms/frame)",
            self.render.as_secs_f64()
        );
        log::info!("  write                {:>8.2}s", self.write.as_secs_f64());
        log::info!("  mux                  {:>8.2}s", self.mux.as_secs_f64());
        log::info!("  total                {:>8.2}s", self.total.as_secs_f64());
    }
}

/// Where rendered frames go.
#[derive(Debug, Clone, Default)]
pub enum OutputTarget {
    /// Encode to `temp_file`, then mux with the source audio into the output path.
    #[default]
    Video,
    /// Write numbered PNGs into a directory. No audio is attached.
    ImageSequence(PathBuf),
}

#[derive(Default)]
pub struct RenderOptions {
    pub cancel: CancelFlag,
    pub progress: Option<ProgressCallback>,
    pub target: OutputTarget,
}

/// Decode, analyse and extract the per-frame features of an audio file.
///
/// `config` must already be scaled to its frame rate.
pub fn analyze_audio_file<P: AsRef<Path>>(
    audio_path: P,
    config: &VisualConfig,
) -> Result<Vec<AudioFeatures>, PipelineError> {
    let audio = load_audio(audio_path.as_ref())?;
    let spectrogram = compute_spectrogram(
        &audio.mono(),
        audio.sample_rate,
        config.fps,
        config.num_frequency_bands,
        config.max_frames(),
    )?;
    Ok(extract_features(&spectrogram, &ExtractorSettings::from(config))?)
}

/// Render visualization video from audio file.
///
/// `config` is given at its base values and rescaled to `config.fps` here.
/// On cancellation the frames rendered so far are still encoded and muxed.
pub async fn render_video<P: AsRef<Path>, Q: AsRef<Path>>(
    audio_path: P,
    output_path: Q,
    config: &VisualConfig,
    options: RenderOptions,
) -> Result<SessionReport, PipelineError> {
    let started = Instant::now();
    let audio_path = audio_path.as_ref();
    let output_path = output_path.as_ref();
    let config = config.scaled_to_fps()?;
    let mut timings = Timings::default();

    // Load audio
    let stage = Instant::now();
    let audio = load_audio(audio_path)?;
    let spectrogram = compute_spectrogram(
        &audio.mono(),
        audio.sample_rate,
        config.fps,
        config.num_frequency_bands,
        config.max_frames(),
    )?;
    timings.audio = stage.elapsed();

    // Features
    let stage = Instant::now();
    let features = extract_features(&spectrogram, &ExtractorSettings::from(&config))?;
    timings.features = stage.elapsed();

    // Renderer and sink
    let stage = Instant::now();
    let renderer = SceneRenderer::new(SceneConfig::from(&config)).await?;
    let info = renderer.adapter_info();
    log::info!("Rendering on {} ({:?})", info.name, info.backend);

    let temp_path = PathBuf::from(&config.temp_file);
    let sink = match &options.target {
        OutputTarget::Video => {
            if let Some(parent) = temp_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let video_config = VideoConfig::from(&config);
            let path = temp_path.clone();
            ThreadedSink::spawn(config.encode_queue, move || {
                Ok(VideoEncoder::new(path, video_config)?)
            })
        }
        OutputTarget::ImageSequence(dir) => {
            let (dir, width, height) = (dir.clone(), config.width, config.height);
            ThreadedSink::spawn(config.encode_queue, move || {
                ImageSequenceSink::new(dir, width, height)
            })
        }
    }
    .map_err(PipelineError::Open)?;
    timings.setup = stage.elapsed();

    let mut session = Session::new(&config, renderer, sink)?
        .with_cancel(options.cancel)
        .with_progress(options.progress);
    let report = session.run(&features)?;
    timings.render = report.timings.render;
    timings.write = report.timings.write;

    if matches!(options.target, OutputTarget::Video) {
        let stage = Instant::now();
        if report.frames_written > 0 {
            log::info!("Muxing audio into {}", output_path.display());
            mux_audio(&temp_path, audio_path, output_path)?;
        } else {
            log::warn!("No frames were rendered, skipping mux");
        }
        if let Err(e) = std::fs::remove_file(&temp_path) {
            log::warn!("Could not remove {}: {e}", temp_path.display());
        }
        timings.mux = stage.elapsed();
    }

    timings.total = started.elapsed();
    timings.log_summary(report.frames_written);

    Ok(SessionReport { timings, ..report })
}
