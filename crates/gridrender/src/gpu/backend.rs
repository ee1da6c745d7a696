use std::borrow::Cow;

use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::backend::ShaderBackend;
use crate::compile::{build_stages, reflect_uniforms, UniformLayout};
use crate::error::{ShaderError, Stage};
use crate::uniforms::UniformLocations;

use super::context::GpuContext;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.05,
    g: 0.06,
    b: 0.08,
    a: 1.0,
};

/// A linked render pipeline plus the uniform storage it reads from.
pub struct GpuProgram {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    layout: Option<UniformLayout>,
}

impl std::fmt::Debug for GpuProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuProgram")
            .field("uniform_bytes", &self.uniform_buffer.size())
            .field("layout", &self.layout)
            .finish()
    }
}

pub struct WgpuBackend {
    context: GpuContext,
    uniform_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

impl WgpuBackend {
    pub fn new<T>(target: &T, size: PhysicalSize<u32>, vsync: bool) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, size, vsync)?;
        let uniform_layout =
            context
                .device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("grid uniform layout"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                });
        let pipeline_layout =
            context
                .device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("grid pipeline layout"),
                    bind_group_layouts: &[&uniform_layout],
                    push_constant_ranges: &[],
                });

        Ok(Self {
            context,
            uniform_layout,
            pipeline_layout,
        })
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    /// Hands a validated module to wgpu, reporting device-side rejection as a
    /// compile failure of `stage`.
    fn create_module(
        &self,
        stage: Stage,
        module: wgpu::naga::Module,
    ) -> Result<wgpu::ShaderModule, ShaderError> {
        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(match stage {
                Stage::Vertex => "grid vertex",
                Stage::Fragment => "grid fragment",
            }),
            source: wgpu::ShaderSource::Naga(Cow::Owned(module)),
        });
        match pollster::block_on(device.pop_error_scope()) {
            Some(err) => Err(ShaderError::Compile {
                stage,
                log: err.to_string(),
            }),
            None => Ok(shader),
        }
    }

    fn create_pipeline(
        &self,
        vertex: &wgpu::ShaderModule,
        fragment: &wgpu::ShaderModule,
    ) -> Result<wgpu::RenderPipeline, ShaderError> {
        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("grid pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: vertex,
                entry_point: Some("main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
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
            fragment: Some(wgpu::FragmentState {
                module: fragment,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.context.surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });
        match pollster::block_on(device.pop_error_scope()) {
            Some(err) => Err(ShaderError::Link {
                log: err.to_string(),
            }),
            None => Ok(pipeline),
        }
    }
}

impl ShaderBackend for WgpuBackend {
    type Program = GpuProgram;
    type DrawError = wgpu::SurfaceError;

    fn build(&mut self, vertex: &str, fragment: &str) -> Result<GpuProgram, ShaderError> {
        let stages = build_stages(vertex, fragment)?;
        let layout = reflect_uniforms(&stages.fragment.module);

        let vertex_module = self.create_module(Stage::Vertex, stages.vertex.module)?;
        let fragment_module = self.create_module(Stage::Fragment, stages.fragment.module)?;
        let pipeline = self.create_pipeline(&vertex_module, &fragment_module)?;

        let block_bytes = layout
            .as_ref()
            .map(|layout| UniformLocations::from_layout(0, layout).block_size())
            .unwrap_or(16);
        let uniform_buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grid uniforms"),
            size: u64::from(block_bytes),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self
            .context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("grid uniform bind group"),
                layout: &self.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

        Ok(GpuProgram {
            pipeline,
            uniform_buffer,
            bind_group,
            layout,
        })
    }

    fn resolve_uniforms(&self, program: &GpuProgram, generation: u64) -> UniformLocations {
        match &program.layout {
            Some(layout) => UniformLocations::from_layout(generation, layout),
            None => UniformLocations::new(generation, 0, Default::default()),
        }
    }

    fn draw(&mut self, program: &GpuProgram, uniforms: &[u8]) -> Result<(), wgpu::SurfaceError> {
        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let upload = uniforms.len().min(program.uniform_buffer.size() as usize) & !3;
        if upload > 0 {
            self.context
                .queue
                .write_buffer(&program.uniform_buffer, 0, &uniforms[..upload]);
        }

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("grid encoder"),
                });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("grid pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&program.pipeline);
            render_pass.set_bind_group(0, &program.bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.context.resize(PhysicalSize::new(width, height));
    }
}
