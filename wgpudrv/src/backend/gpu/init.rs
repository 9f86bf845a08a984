//! Device initialization and render targets
//!
//! Creates the wgpu instance, adapter, device and optional surface,
//! negotiates the MSAA sample count and builds the offscreen targets every
//! frame renders into before it is blitted to the surface.

use anyhow::{Context, Result};

/// Offscreen color format. Readback and blit both depend on it.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Core wgpu objects.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: Option<(wgpu::Surface<'static>, wgpu::SurfaceConfiguration)>,
    pub samples: u32,
    pub bc_supported: bool,
    pub adapter_name: String,
}

impl GpuContext {
    pub async fn new(
        target: Option<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        requested_samples: u32,
        vsync: bool,
    ) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = match target {
            Some(target) => Some(
                instance
                    .create_surface(target)
                    .context("Failed to create surface")?,
            ),
            None => None,
        };

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: surface.as_ref(),
                force_fallback_adapter: false,
            })
            .await
            .context("Failed to find suitable GPU adapter")?;

        let adapter_name = adapter.get_info().name;
        tracing::info!("Using GPU adapter: {}", adapter_name);

        let available = adapter.features();
        let required_features = available
            & (wgpu::Features::TEXTURE_COMPRESSION_BC
                | wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES);
        let bc_supported = required_features.contains(wgpu::Features::TEXTURE_COMPRESSION_BC);
        if !bc_supported {
            tracing::warn!("Adapter lacks BC texture compression, DXT1 textures are skipped");
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("wgpudrv Device"),
                required_features,
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                experimental_features: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to create GPU device")?;

        let adapter_specific = required_features
            .contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES);
        let color_flags = adapter.get_texture_format_features(COLOR_FORMAT).flags;
        let depth_flags = adapter.get_texture_format_features(DEPTH_FORMAT).flags;
        let samples = negotiate_samples(requested_samples, |count| {
            if !adapter_specific {
                // Without adapter-specific format features only 1 and 4 are valid
                return count == 4;
            }
            color_flags.sample_count_supported(count) && depth_flags.sample_count_supported(count)
        });
        if samples != requested_samples {
            tracing::info!(
                "Antialiasing lowered from {}x to {}x",
                requested_samples,
                samples
            );
        }

        let surface = match surface {
            Some(surface) => {
                let caps = surface.get_capabilities(&adapter);
                let format = caps
                    .formats
                    .iter()
                    .find(|f| !f.is_srgb())
                    .or(caps.formats.first())
                    .copied()
                    .context("Surface reports no formats")?;
                let config = wgpu::SurfaceConfiguration {
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    format,
                    width: width.max(1),
                    height: height.max(1),
                    present_mode: if vsync {
                        wgpu::PresentMode::AutoVsync
                    } else {
                        wgpu::PresentMode::AutoNoVsync
                    },
                    alpha_mode: caps
                        .alpha_modes
                        .first()
                        .copied()
                        .unwrap_or(wgpu::CompositeAlphaMode::Auto),
                    view_formats: vec![],
                    desired_maximum_frame_latency: 2,
                };
                surface.configure(&device, &config);
                Some((surface, config))
            }
            None => None,
        };

        Ok(Self {
            device,
            queue,
            surface,
            samples,
            bc_supported,
            adapter_name,
        })
    }
}

/// Highest supported sample count not above `requested`, searching down to 1.
pub fn negotiate_samples(requested: u32, supported: impl Fn(u32) -> bool) -> u32 {
    (2..=requested.max(1))
        .rev()
        .find(|&count| supported(count))
        .unwrap_or(1)
}

/// Offscreen color and depth targets.
///
/// With MSAA the frame renders into `msaa_view` and resolves into
/// `color_view`; otherwise it renders into `color_view` directly.
pub struct RenderTarget {
    pub color_texture: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub msaa_view: Option<wgpu::TextureView>,
    pub depth_view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl RenderTarget {
    pub fn new(device: &wgpu::Device, width: u32, height: u32, samples: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let color_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Render Target Color"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let color_view = color_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let msaa_view = (samples > 1).then(|| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some("Render Target MSAA Color"),
                    size,
                    mip_level_count: 1,
                    sample_count: samples,
                    dimension: wgpu::TextureDimension::D2,
                    format: COLOR_FORMAT,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        });

        let depth_view = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Render Target Depth"),
                size,
                mip_level_count: 1,
                sample_count: samples,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            color_texture,
            color_view,
            msaa_view,
            depth_view,
            width,
            height,
        }
    }

    /// View to render into and the view it resolves to, if any.
    pub fn attachment(&self) -> (&wgpu::TextureView, Option<&wgpu::TextureView>) {
        match &self.msaa_view {
            Some(msaa) => (msaa, Some(&self.color_view)),
            None => (&self.color_view, None),
        }
    }
}
