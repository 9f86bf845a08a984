//! Source texture formats and the format registry
//!
//! The registry is a static table indexed by the host's format byte. Each
//! entry says whether the format can be uploaded at all, whether its bytes
//! can be handed to the GPU as-is, and which conversion to run otherwise.

/// Pixel formats the host engine can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SourceFormat {
    /// 8-bit palette indices
    P8 = 0,
    /// 7-bit BGRA used for light and fog maps
    Rgba7 = 1,
    /// 16-bit RGB
    Rgb16 = 2,
    /// DXT1 / BC1 block compressed
    Dxt1 = 3,
    /// 24-bit RGB
    Rgb8 = 4,
    /// 32-bit color
    Rgba8 = 5,
}

impl SourceFormat {
    /// Every known format, in registry order.
    pub const ALL: [SourceFormat; 6] = [
        SourceFormat::P8,
        SourceFormat::Rgba7,
        SourceFormat::Rgb16,
        SourceFormat::Dxt1,
        SourceFormat::Rgb8,
        SourceFormat::Rgba8,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Registry entry for this format.
    pub fn info(self) -> &'static FormatInfo {
        &FORMATS[self as usize]
    }
}

/// GPU-side storage format, independent of the graphics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuFormat {
    Rgba8Unorm,
    Bc1RgbaUnorm,
    /// No GPU representation; only used by unsupported entries.
    Unknown,
}

impl GpuFormat {
    /// Edge length of a compression block in texels (1 for uncompressed).
    pub fn block_dim(self) -> u32 {
        match self {
            GpuFormat::Bc1RgbaUnorm => 4,
            GpuFormat::Rgba8Unorm | GpuFormat::Unknown => 1,
        }
    }

    /// Bytes per block (per texel for uncompressed formats).
    pub fn bytes_per_block(self) -> u32 {
        match self {
            GpuFormat::Rgba8Unorm => 4,
            GpuFormat::Bc1RgbaUnorm => 8,
            GpuFormat::Unknown => 0,
        }
    }

    pub fn is_compressed(self) -> bool {
        self.block_dim() > 1
    }

    /// Bytes covering `width` texels of one block row.
    pub fn row_bytes(self, width: u32) -> u32 {
        width.div_ceil(self.block_dim()) * self.bytes_per_block()
    }

    /// Number of block rows covering `height` texel rows.
    pub fn block_rows(self, height: u32) -> u32 {
        height.div_ceil(self.block_dim())
    }
}

/// Conversion strategies for formats that cannot be aliased.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Expand 8-bit indices through the texture palette to RGBA8.
    FromPaletted,
}

/// Registry entry for one source format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    pub supported: bool,
    /// Compression block size in texels, 0 for uncompressed formats.
    pub block_size: u32,
    /// Source bytes can be uploaded without conversion.
    pub direct_assign: bool,
    pub gpu_format: GpuFormat,
    pub conversion: Option<Conversion>,
}

/// Format registry, indexed by [`SourceFormat`] discriminant.
pub static FORMATS: [FormatInfo; 6] = [
    // P8
    FormatInfo {
        supported: true,
        block_size: 0,
        direct_assign: false,
        gpu_format: GpuFormat::Rgba8Unorm,
        conversion: Some(Conversion::FromPaletted),
    },
    // RGBA7, swizzled and scaled in the shader
    FormatInfo {
        supported: true,
        block_size: 0,
        direct_assign: true,
        gpu_format: GpuFormat::Rgba8Unorm,
        conversion: None,
    },
    // RGB16
    FormatInfo {
        supported: false,
        block_size: 0,
        direct_assign: true,
        gpu_format: GpuFormat::Rgba8Unorm,
        conversion: None,
    },
    // DXT1
    FormatInfo {
        supported: true,
        block_size: 4,
        direct_assign: true,
        gpu_format: GpuFormat::Bc1RgbaUnorm,
        conversion: None,
    },
    // RGB8
    FormatInfo {
        supported: false,
        block_size: 0,
        direct_assign: true,
        gpu_format: GpuFormat::Unknown,
        conversion: None,
    },
    // RGBA8
    FormatInfo {
        supported: true,
        block_size: 0,
        direct_assign: true,
        gpu_format: GpuFormat::Rgba8Unorm,
        conversion: None,
    },
];
