//! Frame sinks.
//!
//! Every destination for rendered frames implements [`FrameSink`]:
//! - [`VideoEncoder`]: H.264 / VP9 via FFmpeg (rsmpeg)
//! - [`ImageSequenceSink`]: numbered PNG files
//! - [`ThreadedSink`]: moves any sink onto a worker thread behind a bounded queue
//!
//! [`mux_audio`] attaches the source audio to an encoded file afterwards.

pub mod encoder;
pub mod frames;
pub mod mux;
pub mod threaded;

pub use encoder::{VideoCodec, VideoConfig, VideoEncoder, VideoError};
pub use frames::ImageSequenceSink;
pub use mux::{mux_audio, MuxError};
pub use threaded::ThreadedSink;

/// Errors raised by a frame sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Video error: {0}")]
    Video(#[from] VideoError),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Frame has {actual} bytes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },
    #[error("Sink is already closed")]
    Closed,
    #[error("Encode worker failed: {0}")]
    Worker(String),
}

/// Consumer of packed RGB frames (`width * height * 3` bytes, top row first).
pub trait FrameSink {
    fn write_frame(&mut self, rgb: &[u8]) -> Result<(), SinkError>;

    /// Write a frame the caller no longer needs. Sinks that keep the buffer
    /// override this to avoid a copy.
    fn write_owned(&mut self, rgb: Vec<u8>) -> Result<(), SinkError> {
        self.write_frame(&rgb)
    }

    /// Flush and release the destination. Calling it again is a no-op.
    fn close(&mut self) -> Result<(), SinkError>;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn write_frame(&mut self, rgb: &[u8]) -> Result<(), SinkError> {
        (**self).write_frame(rgb)
    }

    fn write_owned(&mut self, rgb: Vec<u8>) -> Result<(), SinkError> {
        (**self).write_owned(rgb)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        (**self).close()
    }
}

pub(crate) fn check_frame_size(rgb: &[u8], width: u32, height: u32) -> Result<(), SinkError> {
    let expected = width as usize * height as usize * 3;
    if rgb.len() != expected {
        return Err(SinkError::FrameSize {
            expected,
            actual: rgb.len(),
        });
    }
    Ok(())
}
