//! Offscreen render target and CPU readback.

use super::context::GpuError;
use wgpu::{Device, Texture, TextureFormat, TextureView};

/// Color format of the offscreen target. The readback assumes 4 bytes per
/// pixel in RGBA order.
pub const TARGET_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

/// Texture plus the view that renders into it.
pub struct RenderTarget {
    texture: Texture,
    view: TextureView,
    width: u32,
    height: u32,
}

impl RenderTarget {
    /// Target that can be rendered to and copied out.
    pub fn new(device: &Device, label: &str, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    pub fn view(&self) -> &TextureView {
        &self.view
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

/// Row layout of a texture copy, padded to the copy alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLayout {
    pub width: u32,
    pub height: u32,
    pub unpadded_bytes: u32,
    pub padded_bytes: u32,
}

impl RowLayout {
    pub fn rgba(width: u32, height: u32) -> Self {
        let unpadded_bytes = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        Self {
            width,
            height,
            unpadded_bytes,
            padded_bytes: unpadded_bytes.div_ceil(align) * align,
        }
    }

    pub fn buffer_size(&self) -> u64 {
        self.padded_bytes as u64 * self.height as u64
    }

    /// Drop row padding and the alpha channel.
    pub fn strip_to_rgb(&self, padded: &[u8]) -> Vec<u8> {
        let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for row in padded
            .chunks(self.padded_bytes as usize)
            .take(self.height as usize)
        {
            for px in row[..self.unpadded_bytes as usize].chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
            }
        }
        rgb
    }
}

/// Mappable buffer that receives a copy of a [`RenderTarget`].
pub struct ReadbackBuffer {
    buffer: wgpu::Buffer,
    layout: RowLayout,
}

impl ReadbackBuffer {
    pub fn new(device: &Device, width: u32, height: u32) -> Self {
        let layout = RowLayout::rgba(width, height);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_buffer"),
            size: layout.buffer_size(),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self { buffer, layout }
    }

    pub fn layout(&self) -> RowLayout {
        self.layout
    }

    /// Record the texture-to-buffer copy.
    pub fn copy_from(&self, encoder: &mut wgpu::CommandEncoder, target: &RenderTarget) {
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: target.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.layout.padded_bytes),
                    rows_per_image: Some(self.layout.height),
                },
            },
            target.extent(),
        );
    }

    /// Wait for the copy and return packed RGB bytes.
    pub fn read_rgb(&self, device: &Device) -> Result<Vec<u8>, GpuError> {
        let slice = self.buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device.poll(wgpu::PollType::wait_indefinitely())?;
        receiver.recv().map_err(|_| GpuError::MapCallbackDropped)??;

        let rgb = {
            let data = slice.get_mapped_range();
            self.layout.strip_to_rgb(&data)
        };
        self.buffer.unmap();
        Ok(rgb)
    }
}
