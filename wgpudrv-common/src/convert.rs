//! Texture conversion
//!
//! Produces GPU-ready pixel data for one mip level of a host texture, either
//! by borrowing the source bytes unchanged or by running the format's
//! conversion into a new buffer. Borrowed data keeps the host's row stride so
//! texels beyond the clamp region are skipped by the upload.

use std::borrow::Cow;

use thiserror::Error;

use crate::format::{Conversion, FormatInfo, GpuFormat, SourceFormat};
use crate::polyflags::PolyFlags;
use crate::texture::{MipData, TextureInfo};

/// Conversion failures. All of them mean the texture is skipped, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("unknown texture format {0}")]
    UnknownFormat(u8),
    #[error("unsupported texture format {0:?}")]
    Unsupported(SourceFormat),
    #[error("texture has no mip level {0}")]
    MissingMip(usize),
    #[error("paletted texture has no palette")]
    MissingPalette,
    #[error("mip {level} clamp region is wider than its rows")]
    ClampExceedsRow { level: usize },
    #[error("mip {level} holds {actual} bytes, {expected} required")]
    TruncatedMip {
        level: usize,
        expected: usize,
        actual: usize,
    },
}

/// Pixel data for one mip, ready for upload.
#[derive(Debug, Clone)]
pub struct ConvertedMip<'a> {
    pub data: Cow<'a, [u8]>,
    /// Copy extent in texels, rounded up to whole blocks.
    pub width: u32,
    pub height: u32,
    /// Source stride between block rows.
    pub bytes_per_row: u32,
    /// Number of block rows.
    pub rows: u32,
}

impl ConvertedMip<'_> {
    /// Whether the data aliases the host's buffer.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.data, Cow::Borrowed(_))
    }
}

/// All mips of a texture, ready for resource creation.
#[derive(Debug, Clone)]
pub struct TextureUpload<'a> {
    pub cache_id: u64,
    pub width: u32,
    pub height: u32,
    pub format: GpuFormat,
    pub mips: Vec<ConvertedMip<'a>>,
}

/// Looks up the registry entry for a raw format byte.
pub fn resolve_format(raw: u8) -> Result<(SourceFormat, &'static FormatInfo), ConvertError> {
    let format = SourceFormat::from_u8(raw).ok_or(ConvertError::UnknownFormat(raw))?;
    let info = format.info();
    if !info.supported {
        return Err(ConvertError::Unsupported(format));
    }
    Ok((format, info))
}

/// GPU extent of a mip: the clamp region shifted down, rounded up to whole blocks.
pub fn mip_extent(info: &TextureInfo<'_>, format: GpuFormat, level: usize) -> (u32, u32) {
    let block = format.block_dim();
    let width = (info.u_clamp.max(1) >> level).max(1);
    let height = (info.v_clamp.max(1) >> level).max(1);
    (width.next_multiple_of(block), height.next_multiple_of(block))
}

/// Number of mips to upload, bounded by what the base extent allows.
pub fn mip_count(width: u32, height: u32, available: usize) -> u32 {
    let max_levels = 32 - width.max(height).max(1).leading_zeros();
    max_levels.min(available as u32).max(1)
}

/// Converts or aliases one mip level.
pub fn convert_mip<'a>(
    info: &TextureInfo<'a>,
    level: usize,
    flags: PolyFlags,
) -> Result<ConvertedMip<'a>, ConvertError> {
    let (format, format_info) = resolve_format(info.format)?;
    let mip = info.mips.get(level).ok_or(ConvertError::MissingMip(level))?;
    let gpu = format_info.gpu_format;
    let (width, height) = mip_extent(info, gpu, level);
    let rows = gpu.block_rows(height);
    let row_bytes = gpu.row_bytes(width);

    if format_info.direct_assign {
        let bytes_per_row = gpu.row_bytes(mip.u_size);
        if bytes_per_row < row_bytes {
            return Err(ConvertError::ClampExceedsRow { level });
        }
        let expected = (bytes_per_row * (rows - 1) + row_bytes) as usize;
        check_len(level, mip.data.len(), expected)?;
        return Ok(ConvertedMip {
            data: Cow::Borrowed(mip.data),
            width,
            height,
            bytes_per_row,
            rows,
        });
    }

    let conversion = format_info
        .conversion
        .ok_or(ConvertError::Unsupported(format))?;
    if mip.u_size < width {
        return Err(ConvertError::ClampExceedsRow { level });
    }
    let data = conversion.run(info, mip, level, rows, flags)?;
    Ok(ConvertedMip {
        data: Cow::Owned(data),
        width,
        height,
        bytes_per_row: mip.u_size * 4,
        rows,
    })
}

/// Converts every mip of a texture and sizes the GPU resource.
pub fn prepare_upload<'a>(
    info: &TextureInfo<'a>,
    flags: PolyFlags,
) -> Result<TextureUpload<'a>, ConvertError> {
    let (_, format_info) = resolve_format(info.format)?;
    let gpu = format_info.gpu_format;
    let (width, height) = mip_extent(info, gpu, 0);
    let count = mip_count(width, height, info.mips.len());
    let mips = (0..count as usize)
        .map(|level| convert_mip(info, level, flags))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TextureUpload {
        cache_id: info.cache_id,
        width,
        height,
        format: gpu,
        mips,
    })
}

impl Conversion {
    /// Writes `u_size * rows` converted texels for one mip.
    pub fn run(
        self,
        info: &TextureInfo<'_>,
        mip: &MipData<'_>,
        level: usize,
        rows: u32,
        flags: PolyFlags,
    ) -> Result<Vec<u8>, ConvertError> {
        match self {
            Conversion::FromPaletted => {
                let palette = info.palette.ok_or(ConvertError::MissingPalette)?;
                from_paletted(
                    palette,
                    mip,
                    level,
                    rows,
                    flags.contains(PolyFlags::MASKED),
                )
            }
        }
    }
}

/// Expands palette indices to RGBA8.
///
/// With `masked`, index 0 becomes transparent black. The host palette is not
/// modified.
fn from_paletted(
    palette: &[[u8; 4]],
    mip: &MipData<'_>,
    level: usize,
    rows: u32,
    masked: bool,
) -> Result<Vec<u8>, ConvertError> {
    let texels = mip.u_size as usize * rows as usize;
    check_len(level, mip.data.len(), texels)?;

    let mut lut = [[0u8; 4]; 256];
    for (slot, color) in lut.iter_mut().zip(palette) {
        *slot = *color;
    }
    if masked {
        lut[0] = [0, 0, 0, 0];
    }

    let mut out = Vec::with_capacity(texels * 4);
    for &index in &mip.data[..texels] {
        out.extend_from_slice(&lut[index as usize]);
    }
    Ok(out)
}

fn check_len(level: usize, actual: usize, expected: usize) -> Result<(), ConvertError> {
    if actual < expected {
        return Err(ConvertError::TruncatedMip {
            level,
            expected,
            actual,
        });
    }
    Ok(())
}
