//! Batching render context
//!
//! [`RenderContext`] is the single owner of all mutable render state: the
//! backend, the staged batch, the texture cache and the last values sent to
//! the backend. Every entry point that can change how staged geometry would
//! be drawn goes through [`RenderContext::prepare_state_change`], which draws
//! that geometry first.
//!
//! Buffer discipline: a flush caused by a state change draws the undrawn
//! range and keeps appending after it. Only an overflow or a new frame
//! discards the buffers and restarts at slot 0.

use wgpudrv_common::convert::{ConvertedMip, prepare_upload};
use wgpudrv_common::{PolyFlags, TextureInfo, TextureMetadata, TexturePass, Vertex};

use crate::backend::{MapMode, RenderBackend};
use crate::batch::{Batch, QUAD_INDEX_COUNT, fan_index_count};
use crate::error::{DriverError, Result};
use crate::render_state::{BlendPolicy, Flash, FogParams, Projection, ProjectionMode, Viewport};
use crate::texture_cache::TextureCache;

/// Counters for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub frames: u64,
    pub draws: u64,
    pub overflow_flushes: u64,
    pub textures_created: u64,
    pub textures_updated: u64,
    pub textures_destroyed: u64,
}

/// Last values applied to the backend. `None` means unknown, so the next
/// setter always applies.
#[derive(Debug, Default)]
struct StateCache {
    flags: Option<PolyFlags>,
    projection_mode: Option<ProjectionMode>,
    viewport: Option<Viewport>,
    projection: Option<Projection>,
    fog: Option<FogParams>,
    flash: Option<Flash>,
    brightness: Option<f32>,
}

pub struct RenderContext<B: RenderBackend> {
    backend: B,
    batch: Batch,
    cache: TextureCache<B::Texture>,
    state: StateCache,
    policy: BlendPolicy,
    z_near: f32,
    time: f32,
    stats: RenderStats,
}

impl<B: RenderBackend> RenderContext<B> {
    pub fn new(mut backend: B, policy: BlendPolicy, z_near: f32) -> Result<Self> {
        let (vertex_capacity, index_capacity) = backend.batch_capacity();
        backend.map(MapMode::Discard)?;
        Ok(Self {
            backend,
            batch: Batch::new(vertex_capacity, index_capacity),
            cache: TextureCache::new(),
            state: StateCache::default(),
            policy,
            z_near,
            time: 0.0,
            stats: RenderStats::default(),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn cache(&self) -> &TextureCache<B::Texture> {
        &self.cache
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub fn policy(&self) -> &BlendPolicy {
        &self.policy
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn z_near(&self) -> f32 {
        self.z_near
    }

    // =================================================================
    // FLUSHING
    // =================================================================

    /// Whether staged geometry would be affected by a state change.
    pub fn flush_required(&self) -> bool {
        self.batch.undrawn_indices() > 0
    }

    /// Draws staged geometry if a state change is about to happen.
    pub fn prepare_state_change(&mut self) {
        if self.flush_required() {
            self.flush();
        }
    }

    /// Draws the undrawn range and keeps appending after it.
    pub fn flush(&mut self) {
        if !self.flush_required() {
            return;
        }
        self.draw_pending();
        if let Err(e) = self.backend.map(MapMode::NoOverwrite) {
            tracing::warn!("Failed to map batch buffers: {}", e);
        }
    }

    /// Draws the undrawn range, then restarts the buffers at slot 0.
    fn restart(&mut self) {
        self.draw_pending();
        self.batch.reset();
        if let Err(e) = self.backend.map(MapMode::Discard) {
            tracing::warn!("Failed to map batch buffers: {}", e);
        }
    }

    fn draw_pending(&mut self) {
        if let Some(pending) = self.batch.pending() {
            match self.backend.draw(&pending) {
                Ok(()) => self.stats.draws += 1,
                Err(e) => tracing::warn!(
                    "Draw of {} indices failed, skipping: {}",
                    pending.indices.len(),
                    e
                ),
            }
        }
        self.batch.mark_drawn();
    }

    // =================================================================
    // GEOMETRY
    // =================================================================

    fn reserve(&mut self, vertices: usize, indices: usize) -> Result<()> {
        if !self.batch.fits_empty(vertices, indices) {
            return Err(DriverError::BatchTooLarge {
                required: indices,
                capacity: self.batch.index_capacity(),
            });
        }
        if !self.batch.fits(vertices, indices) {
            self.stats.overflow_flushes += 1;
            tracing::debug!(
                "Batch full at {} indices, restarting",
                self.batch.num_indices()
            );
            self.restart();
        }
        Ok(())
    }

    /// Reserves indices for a fan of `n` vertices. The caller then emits
    /// exactly `n` vertices with [`Self::next_vertex`].
    pub fn reserve_fan(&mut self, n: usize) -> Result<()> {
        if n < 3 {
            return Err(DriverError::DegenerateFan(n));
        }
        self.reserve(n, fan_index_count(n))?;
        self.batch.push_fan(n);
        Ok(())
    }

    /// Reserves indices for a quad. The caller then emits 4 vertices.
    pub fn reserve_quad(&mut self) -> Result<()> {
        self.reserve(4, QUAD_INDEX_COUNT)?;
        self.batch.push_quad();
        Ok(())
    }

    pub fn next_vertex(&mut self) -> &mut Vertex {
        self.batch.next_vertex()
    }

    // =================================================================
    // STATE
    // =================================================================

    /// Applies the blend and depth state implied by `flags`.
    ///
    /// Only flags that affect blending or depth writes are compared, so
    /// polygons differing in other bits batch together.
    pub fn set_blend_and_depth(&mut self, flags: PolyFlags) {
        let relevant = flags.with_implied_occlude() & self.policy.relevant_mask();
        let changed = match self.state.flags {
            Some(previous) => previous ^ relevant,
            None => self.policy.relevant_mask(),
        };
        if changed.is_empty() {
            return;
        }

        self.prepare_state_change();
        if changed.intersects(self.policy.blend_mask()) {
            self.backend.set_blend_mode(self.policy.classify(relevant));
        }
        if changed.contains(PolyFlags::OCCLUDE) {
            self.backend.set_depth_write(relevant.writes_depth());
        }
        self.state.flags = Some(relevant);
    }

    pub fn set_projection_mode(&mut self, mode: ProjectionMode) {
        if self.state.projection_mode == Some(mode) {
            return;
        }
        self.prepare_state_change();
        self.backend.set_projection_mode(mode);
        self.state.projection_mode = Some(mode);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if self.state.viewport == Some(viewport) {
            return;
        }
        self.prepare_state_change();
        self.backend.set_viewport(viewport);
        self.state.viewport = Some(viewport);
    }

    pub fn set_projection(&mut self, projection: Projection) {
        if self.state.projection == Some(projection) {
            return;
        }
        self.prepare_state_change();
        self.backend
            .set_projection(projection.matrix(self.z_near), self.z_near);
        self.state.projection = Some(projection);
    }

    pub fn set_fog(&mut self, fog: FogParams) {
        if self.state.fog == Some(fog) {
            return;
        }
        self.prepare_state_change();
        self.backend.set_fog(fog);
        self.state.fog = Some(fog);
    }

    pub fn set_flash(&mut self, flash: Flash) {
        if self.state.flash == Some(flash) {
            return;
        }
        self.prepare_state_change();
        self.backend.set_flash(flash);
        self.state.flash = Some(flash);
    }

    pub fn set_brightness(&mut self, brightness: f32) {
        if self.state.brightness == Some(brightness) {
            return;
        }
        self.prepare_state_change();
        self.backend.set_brightness(brightness);
        self.state.brightness = Some(brightness);
    }

    /// Forgets every applied value so the next setters re-apply state.
    pub fn invalidate_state(&mut self) {
        self.state = StateCache::default();
    }

    // =================================================================
    // TEXTURES
    // =================================================================

    /// Binds a cached texture to a pass, or disables the pass with `None`.
    ///
    /// Rebinding the bound key does nothing. A key that is not cached fails
    /// with [`DriverError::TextureNotFound`] and leaves the pass unchanged.
    pub fn bind_texture(
        &mut self,
        pass: TexturePass,
        key: Option<u64>,
    ) -> Result<Option<TextureMetadata>> {
        if self.cache.bound(pass) == key {
            return match key {
                Some(key) => self.cache.metadata(key).map(Some),
                None => Ok(None),
            };
        }

        let Some(key) = key else {
            self.prepare_state_change();
            self.backend.bind_texture(pass, None);
            self.cache.set_bound(pass, None);
            return Ok(None);
        };

        if !self.cache.is_cached(key) {
            return Err(DriverError::TextureNotFound(key));
        }
        self.prepare_state_change();
        let entry = self
            .cache
            .get(key)
            .ok_or(DriverError::TextureNotFound(key))?;
        self.backend.bind_texture(pass, Some(&entry.texture));
        let metadata = entry.metadata;
        self.cache.set_bound(pass, Some(key));
        Ok(Some(metadata))
    }

    /// Makes sure a host texture is cached and current.
    ///
    /// Uncached textures are converted and inserted. When the host marks a
    /// cached texture changed, a dynamic one is updated in place and a static
    /// one is recreated. A texture cached unmasked but now drawn masked is
    /// recreated too. Otherwise nothing happens.
    pub fn precache_texture(
        &mut self,
        info: &mut TextureInfo<'_>,
        flags: PolyFlags,
    ) -> Result<TextureMetadata> {
        let key = info.cache_id;
        let Some(metadata) = self.cache.get(key).map(|entry| entry.metadata) else {
            return self.cache_texture(info, flags);
        };

        if info.realtime_changed {
            if metadata.dynamic {
                self.update_texture(info, flags)?;
                return Ok(metadata);
            }
            tracing::debug!("Recreating changed static texture {:#x}", key);
            self.remove_texture(key);
            let metadata = self.cache_texture(info, flags)?;
            info.realtime_changed = false;
            return Ok(metadata);
        }
        if flags.contains(PolyFlags::MASKED) && !metadata.masked {
            tracing::debug!("Recreating texture {:#x} as masked", key);
            self.remove_texture(key);
            return self.cache_texture(info, flags);
        }
        Ok(metadata)
    }

    /// Converts and uploads a texture, replacing any cached entry for its id.
    pub fn cache_texture(
        &mut self,
        info: &TextureInfo<'_>,
        flags: PolyFlags,
    ) -> Result<TextureMetadata> {
        let key = info.cache_id;
        let upload = prepare_upload(info, flags)?;
        let metadata = TextureMetadata::for_texture(info, flags);
        let texture = self.backend.create_texture(&upload)?;
        self.stats.textures_created += 1;
        tracing::debug!(
            "Cached texture {:#x}: {}x{} {:?}, {} mips",
            key,
            upload.width,
            upload.height,
            upload.format,
            upload.mips.len()
        );

        if self.cache.is_bound(key) {
            self.prepare_state_change();
        }
        if let Some(old) = self.cache.insert(key, metadata, texture) {
            self.backend.destroy_texture(old);
            self.stats.textures_destroyed += 1;
            if let Some(entry) = self.cache.get(key) {
                for pass in TexturePass::ALL {
                    if self.cache.bound(pass) == Some(key) {
                        self.backend.bind_texture(pass, Some(&entry.texture));
                    }
                }
            }
        }
        Ok(metadata)
    }

    /// Re-uploads every mip of a changed dynamic texture in place.
    pub fn update_texture(&mut self, info: &mut TextureInfo<'_>, flags: PolyFlags) -> Result<()> {
        info.realtime_changed = false;
        let upload = prepare_upload(info, flags)?;
        for (level, mip) in upload.mips.iter().enumerate() {
            self.update_mip(info.cache_id, level as u32, mip)?;
        }
        Ok(())
    }

    /// Copies new pixels into one mip of a cached texture.
    ///
    /// Staged geometry is drawn first if the texture is bound, so it still
    /// sees the old contents.
    pub fn update_mip(&mut self, key: u64, level: u32, mip: &ConvertedMip<'_>) -> Result<()> {
        if !self.cache.is_cached(key) {
            return Err(DriverError::TextureNotFound(key));
        }
        if self.cache.is_bound(key) {
            self.prepare_state_change();
        }
        let entry = self
            .cache
            .get(key)
            .ok_or(DriverError::TextureNotFound(key))?;
        self.backend.update_texture(&entry.texture, level, mip)?;
        self.stats.textures_updated += 1;
        Ok(())
    }

    /// Releases a cached texture. Returns false if it was not cached.
    pub fn remove_texture(&mut self, key: u64) -> bool {
        if !self.cache.is_cached(key) {
            return false;
        }
        if self.cache.is_bound(key) {
            self.prepare_state_change();
            for pass in TexturePass::ALL {
                if self.cache.bound(pass) == Some(key) {
                    self.backend.bind_texture(pass, None);
                }
            }
        }
        if let Some(texture) = self.cache.remove(key) {
            self.backend.destroy_texture(texture);
            self.stats.textures_destroyed += 1;
        }
        true
    }

    /// Unbinds every pass and releases every cached texture.
    pub fn flush_all(&mut self) {
        self.flush();
        for pass in TexturePass::ALL {
            if self.cache.bound(pass).is_some() {
                self.backend.bind_texture(pass, None);
            }
        }
        let mut released = 0;
        for texture in self.cache.drain() {
            self.backend.destroy_texture(texture);
            released += 1;
        }
        self.stats.textures_destroyed += released;
        tracing::debug!("Released {} cached textures", released);
    }

    // =================================================================
    // FRAMES
    // =================================================================

    pub fn clear_depth(&mut self) {
        self.flush();
        self.backend.clear_depth();
    }

    pub fn clear_color(&mut self, color: [f32; 4]) {
        self.flush();
        self.backend.clear_color(color);
    }

    /// Starts a frame: restarts the buffers, clears depth and optionally
    /// color, and applies the frame's flash.
    pub fn begin_frame(&mut self, flash: Flash, clear_color: Option<[f32; 4]>) {
        self.restart();
        self.stats.frames += 1;
        self.time += 1.0 / 60.0;
        self.backend.set_time(self.time);
        self.set_flash(flash);
        self.backend.clear_depth();
        if let Some(color) = clear_color {
            self.backend.clear_color(color);
        }
    }

    /// Draws what is left and presents if asked to.
    pub fn end_frame(&mut self, present: bool) -> Result<()> {
        self.flush();
        if present {
            self.backend.present()?;
        }
        Ok(())
    }

    /// Recreates the render targets. All state is re-applied by the next
    /// setters and textures must be rebound.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.flush();
        self.backend.resize(width, height)?;
        self.invalidate_state();
        self.cache.clear_bindings();
        tracing::info!("Render targets resized to {}x{}", width, height);
        Ok(())
    }

    /// RGBA8 pixels of the last rendered frame.
    pub fn read_pixels(&mut self) -> Result<Vec<u8>> {
        self.flush();
        self.backend.read_pixels()
    }

    /// Draws what is left and releases every texture. The backend is
    /// released when the context is dropped.
    pub fn shutdown(&mut self) {
        self.flush_all();
        tracing::info!(
            "Render context shut down after {} frames, {} draws",
            self.stats.frames,
            self.stats.draws
        );
    }
}

#[cfg(test)]
mod tests;
