//! Host texture descriptors and cached texture metadata

use crate::polyflags::PolyFlags;

/// One mip level as stored by the host.
#[derive(Debug, Clone, Copy)]
pub struct MipData<'a> {
    /// Row length in texels, including any garbage beyond the clamp.
    pub u_size: u32,
    pub v_size: u32,
    pub data: &'a [u8],
}

/// A texture as described by the host engine.
///
/// Pixel data and palette are borrowed; the host owns them for the duration
/// of the call.
#[derive(Debug, Clone)]
pub struct TextureInfo<'a> {
    /// Opaque identifier stable across frames.
    pub cache_id: u64,
    /// Raw format byte, see [`crate::SourceFormat`].
    pub format: u8,
    pub u_size: u32,
    pub v_size: u32,
    /// Valid region; data outside it is undefined.
    pub u_clamp: u32,
    pub v_clamp: u32,
    pub u_scale: f32,
    pub v_scale: f32,
    pub pan: [f32; 2],
    pub mips: Vec<MipData<'a>>,
    /// RGBA palette entries for paletted formats.
    pub palette: Option<&'a [[u8; 4]]>,
    /// Set by the host when the pixels changed since the last upload.
    pub realtime_changed: bool,
    pub realtime: bool,
    pub parametric: bool,
    /// Texture-wide alpha used by alpha blended primitives.
    pub alpha: f32,
}

impl<'a> TextureInfo<'a> {
    /// Dynamic textures are updated in place instead of recreated.
    pub fn is_dynamic(&self) -> bool {
        self.realtime_changed || self.realtime || self.parametric
    }
}

/// Per-texture data kept next to the GPU resource.
///
/// The multipliers normalize engine texel coordinates so vertex emission
/// needs a multiply instead of a divide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureMetadata {
    pub mult_u: f32,
    pub mult_v: f32,
    pub masked: bool,
    /// Updated in place when changed; static textures are recreated instead.
    pub dynamic: bool,
}

impl TextureMetadata {
    pub fn for_texture(info: &TextureInfo<'_>, flags: PolyFlags) -> Self {
        Self {
            mult_u: uv_multiplier(info.u_scale, info.u_clamp),
            mult_v: uv_multiplier(info.v_scale, info.v_clamp),
            masked: flags.contains(PolyFlags::MASKED),
            dynamic: info.is_dynamic(),
        }
    }
}

/// A zero extent counts as one texel and a zero scale as unscaled.
fn uv_multiplier(scale: f32, clamp: u32) -> f32 {
    let scale = if scale == 0.0 || !scale.is_finite() { 1.0 } else { scale };
    1.0 / (scale * clamp.max(1) as f32)
}
