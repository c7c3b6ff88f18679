//! Wave background plus solid shape, rendered offscreen.

use super::context::{GpuContext, GpuError};
use super::textures::{ReadbackBuffer, RenderTarget, TARGET_FORMAT};
use crate::engine::{fan_to_triangles, waves::WaveLayer, FrameParams, MAX_WAVES};
use crate::render::{FrameRenderer, RenderError};
use wgpu::{BindGroup, Buffer, RenderPipeline};

/// Uniform data for the wave shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct WaveUniforms {
    colors: [[f32; 4]; MAX_WAVES], // rgb + padding
    radii: [[f32; 4]; MAX_WAVES / 4],
    num_waves: u32,
    thickness: f32,
    brightness: f32,
    aspect: f32,
}

impl WaveUniforms {
    fn new(layer: &WaveLayer, aspect: f32) -> Self {
        let mut uniforms = Self {
            colors: [[0.0; 4]; MAX_WAVES],
            radii: [[0.0; 4]; MAX_WAVES / 4],
            num_waves: layer.count as u32,
            thickness: layer.thickness,
            brightness: layer.brightness,
            aspect,
        };
        for i in 0..MAX_WAVES {
            let [r, g, b] = layer.colors[i];
            uniforms.colors[i] = [r, g, b, 0.0];
            uniforms.radii[i / 4][i % 4] = layer.radii[i];
        }
        uniforms
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ShapeUniforms {
    color: [f32; 4],
}

/// Sizes of the offscreen target and shape buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneConfig {
    pub width: u32,
    pub height: u32,
    /// Perimeter segments of the largest shape that will be drawn.
    pub max_segments: u32,
}

impl From<&crate::config::VisualConfig> for SceneConfig {
    fn from(config: &crate::config::VisualConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            max_segments: config.shape_vertices,
        }
    }
}

pub struct SceneRenderer {
    ctx: GpuContext,
    config: SceneConfig,
    wave_pipeline: RenderPipeline,
    wave_uniforms: Buffer,
    wave_bind_group: BindGroup,
    shape_pipeline: RenderPipeline,
    shape_uniforms: Buffer,
    shape_bind_group: BindGroup,
    shape_vertices: Buffer,
    vertex_capacity: usize,
    target: RenderTarget,
    readback: ReadbackBuffer,
}

fn uniform_layout(device: &wgpu::Device, label: &str, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

fn color_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader: &wgpu::ShaderModule,
    bind_group_layout: &wgpu::BindGroupLayout,
    buffers: &[wgpu::VertexBufferLayout],
) -> RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bind_group_layout],
        immediate_size: 0,
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: TARGET_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

impl SceneRenderer {
    pub async fn new(config: SceneConfig) -> Result<Self, GpuError> {
        let ctx = GpuContext::new().await?;
        Self::with_context(ctx, config)
    }

    /// Build on an existing context.
    pub fn with_context(ctx: GpuContext, config: SceneConfig) -> Result<Self, GpuError> {
        let max_dim = ctx.max_texture_dimension();
        if config.width == 0 || config.height == 0 || config.width > max_dim || config.height > max_dim {
            return Err(GpuError::InvalidSize {
                width: config.width,
                height: config.height,
            });
        }
        let device = &ctx.device;

        // Waves
        let wave_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("wave_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/waves.wgsl").into()),
        });
        let wave_layout = uniform_layout(device, "wave_bind_group_layout", wgpu::ShaderStages::FRAGMENT);
        let wave_pipeline = color_pipeline(device, "wave_pipeline", &wave_shader, &wave_layout, &[]);
        let wave_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("wave_uniforms"),
            size: std::mem::size_of::<WaveUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let wave_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("wave_bind_group"),
            layout: &wave_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wave_uniforms.as_entire_binding(),
            }],
        });

        // Shape
        let shape_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shape_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/shape.wgsl").into()),
        });
        let shape_layout = uniform_layout(device, "shape_bind_group_layout", wgpu::ShaderStages::FRAGMENT);
        let shape_pipeline = color_pipeline(
            device,
            "shape_pipeline",
            &shape_shader,
            &shape_layout,
            &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                }],
            }],
        );
        let shape_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("shape_uniforms"),
            size: std::mem::size_of::<ShapeUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let shape_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shape_bind_group"),
            layout: &shape_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: shape_uniforms.as_entire_binding(),
            }],
        });

        // One triangle per perimeter segment
        let vertex_capacity = config.max_segments.max(3) as usize * 3;
        let shape_vertices = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("shape_vertices"),
            size: (std::mem::size_of::<[f32; 2]>() * vertex_capacity) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let target = RenderTarget::new(device, "scene_target", config.width, config.height);
        let readback = ReadbackBuffer::new(device, config.width, config.height);

        Ok(Self {
            ctx,
            config,
            wave_pipeline,
            wave_uniforms,
            wave_bind_group,
            shape_pipeline,
            shape_uniforms,
            shape_bind_group,
            shape_vertices,
            vertex_capacity,
            target,
            readback,
        })
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.ctx.adapter_info()
    }
}

impl FrameRenderer for SceneRenderer {
    fn dimensions(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn render_frame(&mut self, params: &FrameParams) -> Result<Vec<u8>, RenderError> {
        let triangles = fan_to_triangles(&params.shape);
        if triangles.len() > self.vertex_capacity {
            return Err(RenderError::ShapeTooLarge {
                vertices: triangles.len(),
                capacity: self.vertex_capacity,
            });
        }

        let aspect = self.config.width as f32 / self.config.height as f32;
        let wave_uniforms = WaveUniforms::new(&params.waves, aspect);
        let [r, g, b] = params.shape_color;
        let shape_uniforms = ShapeUniforms {
            color: [r, g, b, 1.0],
        };

        let queue = &self.ctx.queue;
        queue.write_buffer(&self.wave_uniforms, 0, bytemuck::bytes_of(&wave_uniforms));
        queue.write_buffer(&self.shape_uniforms, 0, bytemuck::bytes_of(&shape_uniforms));
        if !triangles.is_empty() {
            queue.write_buffer(&self.shape_vertices, 0, bytemuck::cast_slice(&triangles));
        }

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("scene_encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.target.view(),
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            pass.set_pipeline(&self.wave_pipeline);
            pass.set_bind_group(0, &self.wave_bind_group, &[]);
            pass.draw(0..3, 0..1);

            if !triangles.is_empty() {
                pass.set_pipeline(&self.shape_pipeline);
                pass.set_bind_group(0, &self.shape_bind_group, &[]);
                pass.set_vertex_buffer(0, self.shape_vertices.slice(..));
                pass.draw(0..triangles.len() as u32, 0..1);
            }
        }

        self.readback.copy_from(&mut encoder, &self.target);
        queue.submit(std::iter::once(encoder.finish()));

        Ok(self.readback.read_rgb(&self.ctx.device)?)
    }
}
