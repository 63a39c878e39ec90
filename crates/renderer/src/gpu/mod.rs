//! Headless GPU rendering.
//!
//! - `context` owns the wgpu instance/device/queue; there is no swapchain.
//! - `pipeline` compiles the wrapped GLSL pair into the scene program and
//!   uploads the fixed triangle.
//! - `uniforms` mirrors the injected uniform block.
//! - `target` is the offscreen canvas and its readback path.
//! - `state` glues everything together behind `GpuState`.

mod context;
mod pipeline;
mod state;
mod target;
mod uniforms;

pub(crate) use state::GpuState;
