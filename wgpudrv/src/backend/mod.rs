//! GPU backends
//!
//! [`RenderBackend`] is the seam between the batching context and a graphics
//! API. The context decides *when* state changes and draws happen; a backend
//! only applies them. Every setter is called at most once per actual change,
//! always after pending geometry has been drawn.

pub mod gpu;

#[cfg(test)]
pub(crate) mod recording;

use glam::Mat4;
use wgpudrv_common::TexturePass;
use wgpudrv_common::convert::{ConvertedMip, TextureUpload};

use crate::batch::DrawBatch;
use crate::error::Result;
use crate::render_state::{BlendMode, Flash, FogParams, ProjectionMode, Viewport};

pub use gpu::{BackendOptions, WgpuBackend};

/// How the batch buffers are acquired for writing after a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    /// Previous contents are abandoned and writing restarts at slot 0.
    Discard,
    /// Writing continues after the last drawn slot.
    NoOverwrite,
}

pub trait RenderBackend {
    /// Backend texture handle, owned by the texture cache.
    type Texture;

    fn create_texture(&mut self, upload: &TextureUpload<'_>) -> Result<Self::Texture>;

    /// Overwrites one mip of an existing texture.
    fn update_texture(
        &mut self,
        texture: &Self::Texture,
        level: u32,
        mip: &ConvertedMip<'_>,
    ) -> Result<()>;

    fn destroy_texture(&mut self, texture: Self::Texture);

    /// Binds a texture to a pass, or disables the pass with `None`.
    fn bind_texture(&mut self, pass: TexturePass, texture: Option<&Self::Texture>);

    fn set_blend_mode(&mut self, mode: BlendMode);
    fn set_depth_write(&mut self, enabled: bool);
    fn set_projection_mode(&mut self, mode: ProjectionMode);
    fn set_projection(&mut self, matrix: Mat4, z_near: f32);
    fn set_viewport(&mut self, viewport: Viewport);
    fn set_fog(&mut self, fog: FogParams);
    fn set_flash(&mut self, flash: Flash);
    fn set_brightness(&mut self, brightness: f32);
    /// Seconds since start, for animated shader effects.
    fn set_time(&mut self, time: f32);

    fn map(&mut self, mode: MapMode) -> Result<()>;

    /// Draws the batch with the current state.
    fn draw(&mut self, batch: &DrawBatch<'_>) -> Result<()>;

    fn clear_depth(&mut self);
    fn clear_color(&mut self, color: [f32; 4]);

    fn present(&mut self) -> Result<()>;

    /// Recreates the render targets. Bindings and state are not preserved.
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    fn size(&self) -> (u32, u32);

    /// Tightly packed RGBA8 rows of the last rendered frame.
    fn read_pixels(&mut self) -> Result<Vec<u8>>;

    /// Vertex and index slots available per batch.
    fn batch_capacity(&self) -> (usize, usize);
}
