//! The frame loop.
//!
//! A [`Session`] owns a renderer and a sink and walks the feature sequence
//! once: `Idle -> Running -> Draining -> Closed`. The sink is closed on every
//! way out of [`Session::run`], including cancellation and failures.

use super::{PipelineError, Timings};
use crate::config::VisualConfig;
use crate::engine::AnimationState;
use crate::features::{AudioFeatures, FeatureError};
use crate::render::FrameRenderer;
use crate::video::{FrameSink, SinkError};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Receives the fraction of frames done, in `(0, 1]`.
pub type ProgressCallback = Box<dyn Fn(f32) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Draining,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Draining => "draining",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Shared stop request, checked before every frame.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a session that closed its sink cleanly.
#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    pub frames_written: usize,
    /// The run stopped early on request. The frames written so far are kept.
    pub cancelled: bool,
    pub timings: Timings,
}

pub struct Session<R: FrameRenderer, S: FrameSink> {
    config: VisualConfig,
    renderer: R,
    sink: S,
    state: SessionState,
    cancel: CancelFlag,
    progress: Option<ProgressCallback>,
}

impl<R: FrameRenderer, S: FrameSink> Session<R, S> {
    /// `config` must already be scaled to its frame rate.
    pub fn new(config: &VisualConfig, renderer: R, sink: S) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            renderer,
            sink,
            state: SessionState::Idle,
            cancel: CancelFlag::new(),
            progress: None,
        })
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_parts(self) -> (R, S) {
        (self.renderer, self.sink)
    }

    /// Render every frame of `features` (up to the configured duration) into
    /// the sink, then close it.
    pub fn run(&mut self, features: &[AudioFeatures]) -> Result<SessionReport, PipelineError> {
        if self.state != SessionState::Idle {
            return Err(PipelineError::InvalidState {
                state: self.state,
                action: "run",
            });
        }
        if features.is_empty() {
            return Err(FeatureError::NoFrames.into());
        }

        let total = features.len().min(self.config.max_frames());
        let log_every = self.config.fps as usize;
        let mut animation = AnimationState::new(&self.config);
        let mut report = SessionReport::default();

        self.state = SessionState::Running;
        log::info!(
            "Rendering {} frames at {}x{} / {} fps",
            total,
            self.config.width,
            self.config.height,
            self.config.fps
        );

        for (t, frame_features) in features.iter().take(total).enumerate() {
            if self.cancel.is_cancelled() {
                log::info!("Cancelled after {t} of {total} frames");
                report.cancelled = true;
                break;
            }

            let params = animation.step(frame_features);

            let start = Instant::now();
            let pixels = match self.renderer.render_frame(&params) {
                Ok(pixels) => pixels,
                Err(source) => {
                    self.abort();
                    return Err(PipelineError::Render { frame: t, source });
                }
            };
            report.timings.render += start.elapsed();

            let start = Instant::now();
            if let Err(source) = self.sink.write_owned(pixels) {
                self.abort();
                return Err(PipelineError::Sink { frame: t, source });
            }
            report.timings.write += start.elapsed();
            report.frames_written += 1;

            if log_every > 0 && t % log_every == 0 {
                log::debug!(
                    "Frame {t}: loudness {:.3}, avg freq {:.3}, {} waves, rotation {:.3}",
                    frame_features.loudness,
                    frame_features.avg_frequency,
                    params.waves.count,
                    params.rotation
                );
            }
            if let Some(progress) = &self.progress {
                progress((t + 1) as f32 / total as f32);
            }
        }

        self.state = SessionState::Draining;
        let start = Instant::now();
        let closed = self.sink.close();
        report.timings.write += start.elapsed();
        self.state = SessionState::Closed;
        closed.map_err(PipelineError::Close)?;

        log::info!("Session closed, {} frames written", report.frames_written);
        Ok(report)
    }

    /// Close the sink after a failure. The original error wins over a close
    /// error, which is only logged.
    fn abort(&mut self) {
        self.state = SessionState::Draining;
        if let Err(e) = self.sink.close() {
            log::warn!("Closing sink after failure also failed: {e}");
        }
        self.state = SessionState::Closed;
    }
}

/// Discards frames. Used to time the render side on its own.
#[derive(Debug, Default)]
pub struct NullSink {
    frames: usize,
    closed: bool,
}

impl NullSink {
    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl FrameSink for NullSink {
    fn write_frame(&mut self, _rgb: &[u8]) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        self.frames += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.closed = true;
        Ok(())
    }
}
