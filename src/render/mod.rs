//! Renderer boundary.
//!
//! The animation engine only computes [`FrameParams`]; turning them into
//! pixels is the job of a [`FrameRenderer`]. The GPU implementation lives in
//! [`crate::gpu::SceneRenderer`].

use crate::engine::FrameParams;
use crate::gpu::GpuError;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    #[error("Failed to read back frame: {0}")]
    Readback(String),
    #[error("Shape has {vertices} vertices, renderer holds at most {capacity}")]
    ShapeTooLarge { vertices: usize, capacity: usize },
}

/// Produces one packed RGB frame (`width * height * 3` bytes, top row first)
/// per call.
pub trait FrameRenderer {
    fn dimensions(&self) -> (u32, u32);

    fn render_frame(&mut self, params: &FrameParams) -> Result<Vec<u8>, RenderError>;
}

impl<R: FrameRenderer + ?Sized> FrameRenderer for Box<R> {
    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }

    fn render_frame(&mut self, params: &FrameParams) -> Result<Vec<u8>, RenderError> {
        (**self).render_frame(params)
    }
}
