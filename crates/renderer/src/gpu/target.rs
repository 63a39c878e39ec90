use anyhow::{anyhow, Context, Result};
use image::RgbaImage;

use super::context::TARGET_FORMAT;

const BYTES_PER_PIXEL: u32 = 4;

/// Offscreen canvas: a colour texture plus the mapped buffer used to read it
/// back.
pub(crate) struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    readback: wgpu::Buffer,
    layout: ReadbackLayout,
}

/// Row layout of a texture copy; rows are padded to
/// `COPY_BYTES_PER_ROW_ALIGNMENT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ReadbackLayout {
    pub width: u32,
    pub height: u32,
    pub unpadded_bytes_per_row: u32,
    pub padded_bytes_per_row: u32,
}

impl ReadbackLayout {
    pub fn new(width: u32, height: u32) -> Self {
        let unpadded_bytes_per_row = width * BYTES_PER_PIXEL;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;
        Self {
            width,
            height,
            unpadded_bytes_per_row,
            padded_bytes_per_row,
        }
    }

    pub fn buffer_size(&self) -> u64 {
        self.padded_bytes_per_row as u64 * self.height as u64
    }

    /// Strips row padding and forces every pixel opaque, the way a canvas
    /// created without an alpha channel is snapshotted.
    pub fn unpad(&self, padded: &[u8]) -> Vec<u8> {
        let mut pixels =
            Vec::with_capacity((self.unpadded_bytes_per_row * self.height) as usize);
        for row in padded
            .chunks(self.padded_bytes_per_row as usize)
            .take(self.height as usize)
        {
            pixels.extend_from_slice(&row[..self.unpadded_bytes_per_row as usize]);
        }
        for pixel in pixels.chunks_exact_mut(BYTES_PER_PIXEL as usize) {
            pixel[3] = u8::MAX;
        }
        pixels
    }
}

impl RenderTarget {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen canvas"),
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
        let layout = ReadbackLayout::new(width, height);
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("canvas readback"),
            size: layout.buffer_size(),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self {
            texture,
            view,
            readback,
            layout,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.layout.width, self.layout.height)
    }

    /// Copies the texture into the readback buffer and waits for the map.
    ///
    /// The copy is queued after every draw already submitted, so the returned
    /// image always reflects the latest `draw`.
    pub fn read_pixels(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<RgbaImage> {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("capture encoder"),
        });
        encoder.copy_texture_to_buffer(
            self.texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &self.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.layout.padded_bytes_per_row),
                    rows_per_image: Some(self.layout.height),
                },
            },
            wgpu::Extent3d {
                width: self.layout.width,
                height: self.layout.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = self.readback.slice(..);
        let (sender, receiver) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device
            .poll(wgpu::PollType::Wait)
            .context("failed to wait for canvas readback")?;
        receiver
            .recv()
            .map_err(|_| anyhow!("canvas readback callback was dropped"))?
            .context("failed to map canvas readback buffer")?;

        let pixels = {
            let mapped = slice.get_mapped_range();
            self.layout.unpad(&mapped)
        };
        self.readback.unmap();

        RgbaImage::from_raw(self.layout.width, self.layout.height, pixels)
            .ok_or_else(|| anyhow!("captured pixel buffer does not match target size"))
    }
}
