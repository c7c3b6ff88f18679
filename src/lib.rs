//! Sonoform Core
//!
//! Audio-reactive generative video: the spectrum of a recorded track drives a
//! lobed shape and an expanding field of colored waves, rendered on the GPU
//! and encoded back together with the audio.
//!
//! # Features
//!
//! - Audio loading (WAV, MP3, FLAC, AAC) via Symphonia
//! - STFT via RustFFT and per-frame feature extraction
//! - Frame-rate independent animation state (smoothing, waves, geometry)
//! - GPU rendering via wgpu (Metal on macOS, Vulkan on Linux)
//! - Video encoding via FFmpeg (H.264, VP9) on a worker thread

pub mod audio;
pub mod config;
pub mod engine;
pub mod features;
pub mod gpu;
pub mod pipeline;
pub mod render;
pub mod video;

// Re-export commonly used types
pub use audio::{compute_spectrogram, load_audio, AudioClip, Spectrogram};
pub use config::{load_config, save_config, ConfigError, ProtrusionPolicy, VisualConfig};
pub use engine::{AnimationState, FrameParams};
pub use features::{extract_features, AudioFeatures, ExtractorSettings, FeatureError};
pub use gpu::{GpuContext, SceneConfig, SceneRenderer};
pub use pipeline::{
    analyze_audio_file, render_video, CancelFlag, PipelineError, RenderOptions, Session,
    SessionReport, SessionState,
};
pub use render::{FrameRenderer, RenderError};
pub use video::{FrameSink, SinkError, ThreadedSink, VideoCodec, VideoConfig, VideoEncoder};
