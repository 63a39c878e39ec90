use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use image::RgbaImage;

use crate::runtime::TimeSample;

/// Bundled WebGL2-style vertex shader used when no override is supplied.
pub const DEFAULT_VERTEX_SHADER: &str = include_str!("../shaders/vert.glsl");
/// Bundled fragment shader used when no override is supplied.
pub const DEFAULT_FRAGMENT_SHADER: &str = include_str!("../shaders/frag.glsl");

/// Vertex and fragment sources that make up the scene program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSources {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// Reads both sources from disk; a missing file aborts start-up.
    pub fn load(vertex: &Path, fragment: &Path) -> Result<Self> {
        let vertex_source = fs::read_to_string(vertex)
            .with_context(|| format!("failed to read vertex shader at {}", vertex.display()))?;
        let fragment_source = fs::read_to_string(fragment).with_context(|| {
            format!("failed to read fragment shader at {}", fragment.display())
        })?;
        Ok(Self::new(vertex_source, fragment_source))
    }
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self::new(DEFAULT_VERTEX_SHADER, DEFAULT_FRAGMENT_SHADER)
    }
}

/// Adapter power preference forwarded to `wgpu`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    Low,
    #[default]
    High,
}

/// Immutable configuration passed to the renderer at start-up.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Initial render target size in physical pixels.
    pub surface_size: (u32, u32),
    /// Program sources compiled once during initialisation.
    pub shaders: ShaderSources,
    pub gpu_power: GpuPowerPreference,
    /// Allow `wgpu` to hand out a software adapter when no GPU is present.
    pub allow_software: bool,
}

impl Default for RendererConfig {
    /// Matches the demo canvas: 420x236 with the bundled shaders.
    fn default() -> Self {
        Self {
            surface_size: (420, 236),
            shaders: ShaderSources::default(),
            gpu_power: GpuPowerPreference::default(),
            allow_software: true,
        }
    }
}

/// A drawable surface that can render the scene at a given time and hand
/// back what it drew.
///
/// Implementations must be deterministic: two `draw` calls with the same
/// sample and unchanged size produce identical pixels.
pub trait FrameTarget {
    /// Current target size in pixels.
    fn size(&self) -> (u32, u32);
    /// Reallocates the target; callers only do this between sessions.
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;
    /// Draws one frame of the scene.
    fn draw(&mut self, sample: TimeSample);
    /// Reads back the pixels produced by the most recent `draw`.
    ///
    /// Blocks until the copy has completed.
    fn capture(&mut self) -> Result<RgbaImage>;
}

impl<T: FrameTarget + ?Sized> FrameTarget for &mut T {
    fn size(&self) -> (u32, u32) {
        (**self).size()
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        (**self).resize(width, height)
    }

    fn draw(&mut self, sample: TimeSample) {
        (**self).draw(sample)
    }

    fn capture(&mut self) -> Result<RgbaImage> {
        (**self).capture()
    }
}

impl<T: FrameTarget + ?Sized> FrameTarget for Box<T> {
    fn size(&self) -> (u32, u32) {
        (**self).size()
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        (**self).resize(width, height)
    }

    fn draw(&mut self, sample: TimeSample) {
        (**self).draw(sample)
    }

    fn capture(&mut self) -> Result<RgbaImage> {
        (**self).capture()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sources_are_bundled() {
        let sources = ShaderSources::default();
        assert!(sources.vertex.contains("pos"));
        assert!(sources.fragment.contains("iTime"));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = ShaderSources::load(
            Path::new("/nonexistent/vert.glsl"),
            Path::new("/nonexistent/frag.glsl"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("vertex shader"));
    }
}
