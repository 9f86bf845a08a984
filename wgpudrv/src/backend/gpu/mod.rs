//! wgpu backend
//!
//! Renders into an offscreen target (multisampled when supported) and blits
//! it to the window surface on present. Batched geometry is written straight
//! into fixed vertex and index buffers at the slots the batch assigned, and
//! draws are recorded until [`WgpuBackend::submit`] replays them. Submission
//! happens whenever recorded work could observe a later write: before the
//! buffers restart at slot 0, before a texture update, and at present.

mod blit;
mod command_buffer;
mod frame;
mod init;
mod pipeline;
mod readback;
mod texture;
mod uniforms;

use glam::Mat4;
use hashbrown::HashMap;
use wgpudrv_common::convert::{ConvertedMip, TextureUpload};
use wgpudrv_common::{DriverOptions, TexturePass, Vertex};

use super::{MapMode, RenderBackend};
use crate::batch::{DEFAULT_INDEX_CAPACITY, DEFAULT_VERTEX_CAPACITY, DrawBatch};
use crate::error::{DriverError, Result};
use crate::render_state::{BlendMode, Flash, FogParams, ProjectionMode, Viewport};

use blit::Blit;
use command_buffer::CommandList;
use init::{GpuContext, RenderTarget};
use pipeline::{Layouts, PipelineCache, PipelineKey};
use uniforms::{ShaderGlobals, UniformRing};

pub use init::negotiate_samples;
pub use texture::GpuTexture;

/// Backend settings resolved from [`DriverOptions`].
#[derive(Debug, Clone, PartialEq)]
pub struct BackendOptions {
    pub samples: u32,
    pub vsync: bool,
    pub anisotropy: u32,
    pub lod_bias: i32,
    pub brightness: f32,
    pub parallax_occlusion: bool,
    pub alpha_to_coverage: bool,
    pub vertex_capacity: usize,
    pub index_capacity: usize,
}

impl From<&DriverOptions> for BackendOptions {
    fn from(options: &DriverOptions) -> Self {
        Self {
            samples: options.samples,
            vsync: options.vsync,
            anisotropy: options.anisotropy,
            lod_bias: options.lod_bias,
            brightness: options.brightness,
            parallax_occlusion: options.parallax_occlusion,
            alpha_to_coverage: options.alpha_to_coverage,
            vertex_capacity: DEFAULT_VERTEX_CAPACITY,
            index_capacity: DEFAULT_INDEX_CAPACITY,
        }
    }
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self::from(&DriverOptions::default())
    }
}

/// Texture serials bound to each pass, 0 for the white fallback.
type TextureKey = [u64; TexturePass::COUNT];

pub struct WgpuBackend {
    // Field order is drop order: dependents before the device.
    commands: CommandList,
    texture_bind_groups: HashMap<TextureKey, wgpu::BindGroup>,
    bound: [Option<(u64, wgpu::TextureView)>; TexturePass::COUNT],
    white: GpuTexture,
    globals_bind_group: wgpu::BindGroup,
    uniforms: UniformRing,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    pipelines: PipelineCache,
    layouts: Layouts,
    blit: Option<Blit>,
    target: RenderTarget,
    gpu: GpuContext,

    globals: ShaderGlobals,
    pipeline_key: PipelineKey,
    viewport: Viewport,
    next_serial: u64,
    vertex_capacity: usize,
    index_capacity: usize,
}

impl WgpuBackend {
    /// Creates a backend presenting to a window surface.
    pub fn with_surface(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        options: &BackendOptions,
    ) -> Result<Self> {
        pollster::block_on(Self::new(Some(target.into()), width, height, options))
    }

    /// Creates a backend without a surface, for offscreen rendering.
    pub fn headless(width: u32, height: u32, options: &BackendOptions) -> Result<Self> {
        pollster::block_on(Self::new(None, width, height, options))
    }

    async fn new(
        surface_target: Option<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        options: &BackendOptions,
    ) -> Result<Self> {
        let gpu = GpuContext::new(surface_target, width, height, options.samples, options.vsync)
            .await
            .map_err(DriverError::Init)?;
        let device = &gpu.device;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let target = RenderTarget::new(device, width, height, gpu.samples);
        let layouts = Layouts::new(device);
        let pipelines =
            PipelineCache::new(device, &layouts, gpu.samples, options.alpha_to_coverage);
        let sampler = pipeline::create_sampler(device, options.anisotropy);
        let uniforms = UniformRing::new(device);
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Globals Bind Group"),
            layout: &layouts.globals,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: uniforms.buffer(),
                        offset: 0,
                        size: wgpu::BufferSize::new(std::mem::size_of::<ShaderGlobals>() as u64),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Batch Vertex Buffer"),
            size: (options.vertex_capacity * Vertex::SIZE) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Batch Index Buffer"),
            size: (options.index_capacity * std::mem::size_of::<u32>()) as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let white = texture::create_white(device, &gpu.queue);
        let blit = gpu
            .surface
            .as_ref()
            .map(|(_, config)| Blit::new(device, config.format, &target));

        if let Some(error) = device.pop_error_scope().await {
            return Err(DriverError::Init(anyhow::anyhow!(
                "GPU resource creation failed: {error}"
            )));
        }

        let mut globals = ShaderGlobals::new(
            options.brightness,
            options.lod_bias as f32,
            options.parallax_occlusion,
        );
        let viewport = Viewport::new(0, 0, target.width, target.height);
        globals.set_viewport(viewport);

        tracing::info!(
            "Render device ready: {}x{}, {}x MSAA, {} vertex / {} index slots",
            target.width,
            target.height,
            gpu.samples,
            options.vertex_capacity,
            options.index_capacity
        );

        Ok(Self {
            commands: CommandList::new(),
            texture_bind_groups: HashMap::new(),
            bound: Default::default(),
            white,
            globals_bind_group,
            uniforms,
            vertex_buffer,
            index_buffer,
            pipelines,
            layouts,
            blit,
            target,
            gpu,
            globals,
            pipeline_key: PipelineKey {
                blend: BlendMode::Opaque,
                depth_write: true,
            },
            viewport,
            next_serial: 1,
            vertex_capacity: options.vertex_capacity,
            index_capacity: options.index_capacity,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.gpu.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.gpu.queue
    }

    pub fn samples(&self) -> u32 {
        self.gpu.samples
    }

    pub fn adapter_name(&self) -> &str {
        &self.gpu.adapter_name
    }

    /// Replays recorded commands and submits them to the queue.
    pub fn submit(&mut self) {
        if self.commands.is_empty() {
            self.uniforms.reset();
            return;
        }
        self.uniforms.upload(&self.gpu.queue);

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Batch Encoder"),
            });
        frame::execute(
            &mut encoder,
            self.commands.commands(),
            &frame::FrameResources {
                target: &self.target,
                pipelines: &self.pipelines,
                globals: &self.globals_bind_group,
                vertex_buffer: &self.vertex_buffer,
                index_buffer: &self.index_buffer,
            },
        );
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        tracing::trace!("Submitted {} draws", self.commands.draw_count());

        self.commands.reset();
        self.uniforms.reset();
    }

    fn texture_bind_group(&mut self) -> wgpu::BindGroup {
        let key: TextureKey = std::array::from_fn(|i| self.bound[i].as_ref().map_or(0, |b| b.0));
        if let Some(bind_group) = self.texture_bind_groups.get(&key) {
            return bind_group.clone();
        }

        let views: Vec<&wgpu::TextureView> = self
            .bound
            .iter()
            .map(|b| b.as_ref().map_or(&self.white.view, |(_, view)| view))
            .collect();
        let entries: Vec<wgpu::BindGroupEntry> = views
            .iter()
            .enumerate()
            .map(|(binding, view)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        let bind_group = self
            .gpu
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Texture Pass Bind Group"),
                layout: &self.layouts.textures,
                entries: &entries,
            });
        self.texture_bind_groups.insert(key, bind_group.clone());
        bind_group
    }

    fn acquire_surface_texture(&self) -> Option<wgpu::SurfaceTexture> {
        let (surface, config) = self.gpu.surface.as_ref()?;
        match surface.get_current_texture() {
            Ok(frame) => Some(frame),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                surface.configure(&self.gpu.device, config);
                match surface.get_current_texture() {
                    Ok(frame) => Some(frame),
                    Err(e) => {
                        tracing::warn!("Skipping present, surface unavailable: {}", e);
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Skipping present: {}", e);
                None
            }
        }
    }
}

impl RenderBackend for WgpuBackend {
    type Texture = GpuTexture;

    fn create_texture(&mut self, upload: &TextureUpload<'_>) -> Result<GpuTexture> {
        let serial = self.next_serial;
        self.next_serial += 1;
        texture::create(
            &self.gpu.device,
            &self.gpu.queue,
            upload,
            serial,
            self.gpu.bc_supported,
        )
    }

    fn update_texture(
        &mut self,
        texture: &GpuTexture,
        level: u32,
        mip: &ConvertedMip<'_>,
    ) -> Result<()> {
        // Recorded draws must sample the old contents
        self.submit();
        texture::write_mip(&self.gpu.queue, &texture.texture, level, mip);
        Ok(())
    }

    fn destroy_texture(&mut self, texture: GpuTexture) {
        self.texture_bind_groups
            .retain(|key, _| !key.contains(&texture.serial));
    }

    fn bind_texture(&mut self, pass: TexturePass, texture: Option<&GpuTexture>) {
        self.bound[pass.index()] = texture.map(|t| (t.serial, t.view.clone()));
        let bit = pass.mask_bit();
        if texture.is_some() {
            self.globals.pass_mask |= bit;
        } else {
            self.globals.pass_mask &= !bit;
        }
        self.uniforms.mark_dirty();
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.pipeline_key.blend = mode;
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.pipeline_key.depth_write = enabled;
    }

    fn set_projection_mode(&mut self, mode: ProjectionMode) {
        self.globals.projection_mode = mode as u32;
        self.uniforms.mark_dirty();
    }

    fn set_projection(&mut self, matrix: Mat4, z_near: f32) {
        self.globals.set_projection(matrix, z_near);
        self.uniforms.mark_dirty();
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.globals.set_viewport(viewport);
        self.uniforms.mark_dirty();
    }

    fn set_fog(&mut self, fog: FogParams) {
        self.globals.set_fog(fog);
        self.uniforms.mark_dirty();
    }

    fn set_flash(&mut self, flash: Flash) {
        self.globals.set_flash(flash);
        self.uniforms.mark_dirty();
    }

    fn set_brightness(&mut self, brightness: f32) {
        self.globals.brightness = brightness;
        self.uniforms.mark_dirty();
    }

    fn set_time(&mut self, time: f32) {
        self.globals.time = time;
        self.uniforms.mark_dirty();
    }

    fn map(&mut self, mode: MapMode) -> Result<()> {
        if mode == MapMode::Discard {
            self.submit();
        }
        Ok(())
    }

    fn draw(&mut self, batch: &DrawBatch<'_>) -> Result<()> {
        let vertex_end = batch.first_vertex as usize + batch.vertices.len();
        let index_end = batch.first_index as usize + batch.indices.len();
        if vertex_end > self.vertex_capacity || index_end > self.index_capacity {
            return Err(DriverError::BatchTooLarge {
                required: index_end,
                capacity: self.index_capacity,
            });
        }
        if self.uniforms.is_full() {
            self.submit();
        }

        let queue = &self.gpu.queue;
        if !batch.vertices.is_empty() {
            queue.write_buffer(
                &self.vertex_buffer,
                batch.first_vertex as u64 * Vertex::SIZE as u64,
                bytemuck::cast_slice(batch.vertices),
            );
        }
        queue.write_buffer(
            &self.index_buffer,
            batch.first_index as u64 * std::mem::size_of::<u32>() as u64,
            bytemuck::cast_slice(batch.indices),
        );

        let uniform_offset = self.uniforms.slot_offset(&self.globals);
        let textures = self.texture_bind_group();
        self.commands.record_draw(
            self.pipeline_key,
            textures,
            uniform_offset,
            self.viewport,
            batch.first_index..index_end as u32,
        );
        Ok(())
    }

    fn clear_depth(&mut self) {
        self.commands.record_clear_depth();
    }

    fn clear_color(&mut self, color: [f32; 4]) {
        self.commands.record_clear_color(color);
    }

    fn present(&mut self) -> Result<()> {
        self.submit();
        let Some(blit) = &self.blit else {
            return Ok(());
        };
        let Some(frame) = self.acquire_surface_texture() else {
            return Ok(());
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Blit Encoder"),
            });
        blit.draw(&mut encoder, &view);
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.submit();
        let device = &self.gpu.device;
        self.target = RenderTarget::new(device, width, height, self.gpu.samples);
        if let Some((surface, config)) = &mut self.gpu.surface {
            config.width = self.target.width;
            config.height = self.target.height;
            surface.configure(device, config);
        }
        if let Some(blit) = &mut self.blit {
            blit.retarget(device, &self.target);
        }

        self.bound = Default::default();
        self.globals.pass_mask = 0;
        self.viewport = Viewport::new(0, 0, self.target.width, self.target.height);
        self.globals.set_viewport(self.viewport);
        self.uniforms.mark_dirty();
        Ok(())
    }

    fn size(&self) -> (u32, u32) {
        (self.target.width, self.target.height)
    }

    fn read_pixels(&mut self) -> Result<Vec<u8>> {
        self.submit();
        readback::read_texture(
            &self.gpu.device,
            &self.gpu.queue,
            &self.target.color_texture,
            self.target.width,
            self.target.height,
        )
    }

    fn batch_capacity(&self) -> (usize, usize) {
        (self.vertex_capacity, self.index_capacity)
    }
}
