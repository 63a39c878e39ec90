//! Renderer crate for shadercast.
//!
//! Compiles a WebGL2-style vertex/fragment shader pair into a `wgpu`
//! pipeline and draws a single oversized triangle into an offscreen canvas:
//!
//! ```text
//!   ShaderSources ──▶ compile (wrap GLSL) ──▶ Scene (pipeline + triangle)
//!                                                  │
//!   TimeSample ──▶ Renderer::draw ──▶ uniforms ──▶ render pass ──▶ canvas
//!                                                                    │
//!                                           Renderer::capture ◀──────┘
//! ```
//!
//! The canvas is shared by live playback and frame capture, which is why the
//! renderer is exposed through the [`FrameTarget`] trait: callers hold it
//! mutably and only one activity can draw at a time.

mod compile;
mod gpu;
pub mod runtime;
pub mod types;

use std::path::Path;

use anyhow::{Context, Result};
use image::RgbaImage;

pub use runtime::{ManualTimeSource, SystemTimeSource, TimeSample, TimeSource};
pub use types::{
    FrameTarget, GpuPowerPreference, RendererConfig, ShaderSources, DEFAULT_FRAGMENT_SHADER,
    DEFAULT_VERTEX_SHADER,
};

use crate::gpu::GpuState;

/// Headless scene renderer.
///
/// Construction compiles and links the program; any failure there is fatal
/// and reported with the offending stage.
pub struct Renderer {
    gpu: GpuState,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Result<Self> {
        let gpu = GpuState::new(
            config.surface_size,
            &config.shaders,
            config.gpu_power,
            config.allow_software,
        )?;
        let (width, height) = gpu.size();
        tracing::info!(width, height, "renderer initialised");
        Ok(Self { gpu })
    }

    /// Captures the current canvas and writes it as a PNG still.
    pub fn snapshot(&mut self, path: &Path) -> Result<()> {
        let image = self.gpu.capture()?;
        image
            .save(path)
            .with_context(|| format!("failed to write snapshot to {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote snapshot");
        Ok(())
    }
}

impl FrameTarget for Renderer {
    fn size(&self) -> (u32, u32) {
        self.gpu.size()
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.gpu.resize(width, height)
    }

    fn draw(&mut self, sample: TimeSample) {
        self.gpu.draw(sample);
    }

    fn capture(&mut self) -> Result<RgbaImage> {
        self.gpu.capture()
    }
}
