use anyhow::{Context as AnyhowContext, Result};

use crate::types::GpuPowerPreference;

/// Pixel format of the offscreen canvas; readback hands these bytes out as-is.
pub(crate) const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Owns the `wgpu` instance, adapter-derived limits, device and queue.
///
/// There is no presentation surface: frames land in an offscreen texture so
/// the same device serves live playback and frame capture.
pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub max_dimension: u32,
}

impl GpuContext {
    pub(crate) fn new(gpu_power: GpuPowerPreference, allow_software: bool) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let power_preference = match gpu_power {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        };
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let adapter_info = adapter.get_info();
        let is_software = adapter_info.device_type == wgpu::DeviceType::Cpu;
        tracing::debug!(
            name = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            is_software,
            "selected GPU adapter"
        );
        if is_software && !allow_software {
            anyhow::bail!(
                "only a software adapter ({}) is available and software rendering is disabled",
                adapter_info.name
            );
        }

        let limits = adapter.limits();
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("shadercast device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(limits.clone()),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .context("failed to create GPU device")?;

        Ok(Self {
            _instance: instance,
            device,
            queue,
            max_dimension: limits.max_texture_dimension_2d,
        })
    }

    /// Rejects sizes the device cannot allocate.
    pub(crate) fn check_dimensions(&self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            anyhow::bail!("render target must be at least 1x1, requested {width}x{height}");
        }
        if width > self.max_dimension || height > self.max_dimension {
            anyhow::bail!(
                "GPU max texture dimension is {max_dimension}, requested target is {width}x{height}",
                max_dimension = self.max_dimension,
            );
        }
        Ok(())
    }
}
