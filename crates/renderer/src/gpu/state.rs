use anyhow::Result;
use image::RgbaImage;
use tracing::debug;

use crate::runtime::TimeSample;
use crate::types::{GpuPowerPreference, ShaderSources};

use super::context::GpuContext;
use super::pipeline::Scene;
use super::target::RenderTarget;
use super::uniforms::SceneUniforms;

/// Everything needed to turn a time sample into pixels.
pub(crate) struct GpuState {
    context: GpuContext,
    scene: Scene,
    target: RenderTarget,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniforms: SceneUniforms,
}

impl GpuState {
    pub(crate) fn new(
        initial_size: (u32, u32),
        shaders: &ShaderSources,
        gpu_power: GpuPowerPreference,
        allow_software: bool,
    ) -> Result<Self> {
        let context = GpuContext::new(gpu_power, allow_software)?;
        let (width, height) = initial_size;
        context.check_dimensions(width, height)?;

        let scene = Scene::new(&context.device, shaders)?;

        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene uniform buffer"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("scene uniform bind group"),
                layout: &scene.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

        let target = RenderTarget::new(&context.device, width, height);
        let uniforms = SceneUniforms::new(width, height);

        Ok(Self {
            context,
            scene,
            target,
            uniform_buffer,
            uniform_bind_group,
            uniforms,
        })
    }

    pub(crate) fn size(&self) -> (u32, u32) {
        self.target.size()
    }

    pub(crate) fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if self.size() == (width, height) {
            return Ok(());
        }
        self.context.check_dimensions(width, height)?;
        self.target = RenderTarget::new(&self.context.device, width, height);
        self.uniforms.set_resolution(width, height);
        debug!(width, height, "resized render target");
        Ok(())
    }

    pub(crate) fn draw(&mut self, sample: TimeSample) {
        let (width, height) = self.target.size();
        self.uniforms.set_resolution(width, height);
        self.uniforms.set_time(sample);
        self.context.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&self.uniforms),
        );

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("render encoder"),
                });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            render_pass.set_pipeline(&self.scene.pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.scene.vertex_buffer.slice(..));
            render_pass.draw(0..3, 0..1);
        }
        self.context.queue.submit(std::iter::once(encoder.finish()));
    }

    pub(crate) fn capture(&mut self) -> Result<RgbaImage> {
        self.target
            .read_pixels(&self.context.device, &self.context.queue)
    }
}
