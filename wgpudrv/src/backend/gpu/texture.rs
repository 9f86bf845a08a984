//! GPU texture residency

use wgpudrv_common::GpuFormat;
use wgpudrv_common::convert::{ConvertedMip, TextureUpload};

use crate::error::{DriverError, Result};

/// A texture owned by the texture cache.
#[derive(Debug)]
pub struct GpuTexture {
    /// Unique per created texture, used to key bind groups.
    pub serial: u64,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

pub fn wgpu_format(format: GpuFormat, bc_supported: bool) -> Result<wgpu::TextureFormat> {
    match format {
        GpuFormat::Rgba8Unorm => Ok(wgpu::TextureFormat::Rgba8Unorm),
        GpuFormat::Bc1RgbaUnorm if bc_supported => Ok(wgpu::TextureFormat::Bc1RgbaUnorm),
        GpuFormat::Bc1RgbaUnorm => Err(DriverError::FormatUnavailable("BC1")),
        GpuFormat::Unknown => Err(DriverError::FormatUnavailable("unknown")),
    }
}

pub fn create(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    upload: &TextureUpload<'_>,
    serial: u64,
    bc_supported: bool,
) -> Result<GpuTexture> {
    let format = wgpu_format(upload.format, bc_supported)?;
    let label = format!("Texture {:#x}", upload.cache_id);
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(&label),
        size: wgpu::Extent3d {
            width: upload.width,
            height: upload.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: upload.mips.len().max(1) as u32,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    for (level, mip) in upload.mips.iter().enumerate() {
        write_mip(queue, &texture, level as u32, mip);
    }
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(GpuTexture {
        serial,
        texture,
        view,
    })
}

/// Copies one mip, skipping row padding beyond the copy extent.
pub fn write_mip(queue: &wgpu::Queue, texture: &wgpu::Texture, level: u32, mip: &ConvertedMip<'_>) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: level,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &mip.data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(mip.bytes_per_row),
            rows_per_image: Some(mip.rows),
        },
        wgpu::Extent3d {
            width: mip.width,
            height: mip.height,
            depth_or_array_layers: 1,
        },
    );
}

/// 1x1 white texture sampled by disabled passes.
pub fn create_white(device: &wgpu::Device, queue: &wgpu::Queue) -> GpuTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Fallback White"),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    write_mip(
        queue,
        &texture,
        0,
        &ConvertedMip {
            data: std::borrow::Cow::Borrowed(&[255u8; 4]),
            width: 1,
            height: 1,
            bytes_per_row: 4,
            rows: 1,
        },
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        serial: 0,
        texture,
        view,
    }
}
