//! Batched vertex layout and texture passes

use bytemuck::{Pod, Zeroable};

/// Texture roles sampled together for one primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TexturePass {
    Diffuse = 0,
    Light = 1,
    Detail = 2,
    Fog = 3,
    Macro = 4,
}

impl TexturePass {
    pub const COUNT: usize = 5;

    pub const ALL: [TexturePass; Self::COUNT] = [
        TexturePass::Diffuse,
        TexturePass::Light,
        TexturePass::Detail,
        TexturePass::Fog,
        TexturePass::Macro,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Bit for this pass in the shader's enabled-pass mask.
    pub fn mask_bit(self) -> u32 {
        1 << self as u32
    }
}

/// One vertex as stored in the batching ring.
///
/// Texture coordinates are indexed by [`TexturePass`]. `flags` carries the
/// raw poly flags of the originating primitive for per-vertex shading
/// decisions (masking, alpha blending).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub fog: [f32; 4],
    pub normal: [f32; 3],
    pub tex_coords: [[f32; 2]; TexturePass::COUNT],
    pub flags: u32,
}

impl Vertex {
    pub const SIZE: usize = std::mem::size_of::<Vertex>();

    pub fn set_tex_coord(&mut self, pass: TexturePass, uv: [f32; 2]) {
        self.tex_coords[pass.index()] = uv;
    }
}
