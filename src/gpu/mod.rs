//! Headless GPU rendering with wgpu.
//!
//! [`SceneRenderer`] draws the wave background with a fullscreen shader,
//! puts the shape on top and reads the frame back as packed RGB.

pub mod context;
pub mod scene_renderer;
pub mod textures;

pub use context::{GpuContext, GpuError};
pub use scene_renderer::{SceneConfig, SceneRenderer};
