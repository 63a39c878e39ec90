use bytemuck::{Pod, Zeroable};

use crate::runtime::TimeSample;

/// CPU mirror of the `SceneParams` uniform block injected by `compile`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct SceneUniforms {
    pub i_resolution: [f32; 3],
    pub i_time: f32,
    pub i_frame: i32,
    pub _padding: [i32; 3],
}

impl SceneUniforms {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            i_resolution: [width as f32, height as f32, 1.0],
            i_time: 0.0,
            i_frame: 0,
            _padding: [0; 3],
        }
    }

    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.i_resolution = [width as f32, height as f32, 1.0];
    }

    /// Applies a sample; nothing from previous frames is carried over.
    pub fn set_time(&mut self, sample: TimeSample) {
        self.i_time = sample.seconds;
        self.i_frame = sample.shader_frame();
    }
}
