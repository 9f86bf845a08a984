//! Host-facing render device
//!
//! [`RenderDevice`] maps the engine's per-frame calls onto a
//! [`RenderContext`]. Every draw entry point precaches and binds its
//! textures, applies blend and projection state, then emits geometry.
//! Failures skip the primitive; they are logged here and returned so the
//! host can tell.

use std::f32::consts::PI;

use wgpudrv_common::{
    DriverOptions, EngineVariant, OptionStore, PolyFlags, TextureInfo, TextureMetadata,
    TexturePass, Vertex, mode_list,
};

use crate::backend::{BackendOptions, RenderBackend, WgpuBackend};
use crate::context::{RenderContext, RenderStats};
use crate::error::{DriverError, ErrorKind, Result};
use crate::render_state::{BlendPolicy, Flash, FogParams, Projection, ProjectionMode, Viewport};
use crate::scene::{Facet, FogSurface, LockFlags, SceneNode, SurfaceInfo, Tile, TransTexture};

/// Gouraud polygons closer than this are first-person weapons on engines
/// that do not clear depth before drawing them.
pub const WEAPON_Z: f32 = 12.0;

/// Modes reported when the host has not provided its own list.
const DEFAULT_MODES: &[(u32, u32)] = &[
    (640, 480),
    (800, 600),
    (1024, 768),
    (1280, 720),
    (1280, 1024),
    (1366, 768),
    (1600, 900),
    (1920, 1080),
    (2560, 1440),
    (3840, 2160),
];

/// Passes a surface binds besides diffuse.
const SECONDARY_PASSES: [TexturePass; 4] = [
    TexturePass::Light,
    TexturePass::Detail,
    TexturePass::Fog,
    TexturePass::Macro,
];

/// Texture coordinate transform of one bound surface pass.
#[derive(Debug, Clone, Copy)]
struct PassMapping {
    pan: [f32; 2],
    mult: [f32; 2],
}

impl PassMapping {
    fn new(info: &TextureInfo<'_>, metadata: TextureMetadata, half_texel_pan: bool) -> Self {
        let mut pan = info.pan;
        if half_texel_pan {
            pan[0] -= 0.5 * info.u_scale;
            pan[1] -= 0.5 * info.v_scale;
        }
        Self {
            pan,
            mult: [metadata.mult_u, metadata.mult_v],
        }
    }

    fn apply(&self, u: f32, v: f32) -> [f32; 2] {
        [(u - self.pan[0]) * self.mult[0], (v - self.pan[1]) * self.mult[1]]
    }
}

pub struct RenderDevice<B: RenderBackend> {
    ctx: RenderContext<B>,
    options: DriverOptions,
    variant: EngineVariant,
    /// Weapon depth clear already happened this frame.
    drawing_weapon: bool,
    modes: Vec<(u32, u32)>,
}

impl RenderDevice<WgpuBackend> {
    /// Reads options from `store` and creates a device presenting to a window.
    pub fn init(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        store: &mut dyn OptionStore,
        variant: EngineVariant,
    ) -> Result<Self> {
        let options = DriverOptions::read_from(store, variant);
        let backend =
            WgpuBackend::with_surface(target, width, height, &BackendOptions::from(&options))?;
        tracing::info!("Initialized wgpu renderer on {}", backend.adapter_name());
        Self::new(backend, options, variant)
    }

    /// Reads options from `store` and creates an offscreen device.
    pub fn init_headless(
        width: u32,
        height: u32,
        store: &mut dyn OptionStore,
        variant: EngineVariant,
    ) -> Result<Self> {
        let options = DriverOptions::read_from(store, variant);
        let backend = WgpuBackend::headless(width, height, &BackendOptions::from(&options))?;
        tracing::info!("Initialized headless wgpu renderer on {}", backend.adapter_name());
        Self::new(backend, options, variant)
    }
}

impl<B: RenderBackend> RenderDevice<B> {
    pub fn new(backend: B, options: DriverOptions, variant: EngineVariant) -> Result<Self> {
        let ctx = RenderContext::new(backend, BlendPolicy::for_variant(variant), options.z_near)?;
        let mut device = Self {
            ctx,
            options,
            variant,
            drawing_weapon: false,
            modes: DEFAULT_MODES.to_vec(),
        };
        device.apply_defaults();
        tracing::debug!("Render device ready for {:?}: {:?}", variant, device.options);
        Ok(device)
    }

    fn apply_defaults(&mut self) {
        self.ctx.set_blend_and_depth(PolyFlags::empty());
        self.ctx.set_projection_mode(ProjectionMode::Normal);
        self.ctx.set_brightness(self.options.brightness);
    }

    pub fn context(&self) -> &RenderContext<B> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut RenderContext<B> {
        &mut self.ctx
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    pub fn variant(&self) -> EngineVariant {
        self.variant
    }

    pub fn stats(&self) -> RenderStats {
        self.ctx.stats()
    }

    fn report(&self, what: &str, result: Result<()>) -> Result<()> {
        if let Err(e) = &result {
            match e.kind() {
                ErrorKind::Fatal => tracing::error!("{} failed: {}", what, e),
                ErrorKind::Recoverable => tracing::warn!("Skipping {}: {}", what, e),
                ErrorKind::DataIntegrity => tracing::warn!("Skipping {}: {}", what, e),
            }
        }
        result
    }

    // =================================================================
    // FRAMES
    // =================================================================

    /// Starts a frame. Depth is always cleared; color only with
    /// [`LockFlags::CLEAR_SCREEN`].
    pub fn lock(
        &mut self,
        flash_scale: [f32; 3],
        flash_fog: [f32; 3],
        screen_clear: [f32; 4],
        flags: LockFlags,
    ) {
        let clear = flags.contains(LockFlags::CLEAR_SCREEN).then_some(screen_clear);
        self.ctx
            .begin_frame(Flash::from_host(flash_scale, flash_fog), clear);
        self.drawing_weapon = false;
    }

    /// Ends a frame, presenting it if `blit` is set.
    pub fn unlock(&mut self, blit: bool) -> Result<()> {
        let result = self.ctx.end_frame(blit);
        self.report("present", result)
    }

    /// Derives the viewport and projection from the scene.
    pub fn set_scene_node(&mut self, frame: &SceneNode) {
        let projection = Projection {
            aspect: frame.fy / frame.fx,
            x_over_z: (frame.fov_angle * PI / 360.0).tan(),
        };
        self.ctx
            .set_viewport(Viewport::new(frame.x, frame.y, frame.xb, frame.yb));
        self.ctx.set_projection(projection);
    }

    pub fn clear_z(&mut self) {
        self.ctx.clear_depth();
    }

    // =================================================================
    // TEXTURES
    // =================================================================

    /// Converts and caches a texture ahead of use. Does nothing for a cached
    /// texture unless it changed or must now be masked.
    pub fn precache_texture(&mut self, info: &mut TextureInfo<'_>, flags: PolyFlags) -> Result<()> {
        let result = self.ctx.precache_texture(info, flags).map(|_| ());
        self.report("texture precache", result)
    }

    /// Releases every cached texture. Returns whether the host should
    /// precache textures on the next level load.
    pub fn flush(&mut self, allow_precache: bool) -> bool {
        self.ctx.flush_all();
        allow_precache && self.options.precache
    }

    fn bind_pass(
        &mut self,
        pass: TexturePass,
        info: Option<&mut TextureInfo<'_>>,
        flags: PolyFlags,
    ) -> Result<Option<TextureMetadata>> {
        let Some(info) = info else {
            return self.ctx.bind_texture(pass, None);
        };
        self.ctx.precache_texture(info, flags)?;
        self.ctx.bind_texture(pass, Some(info.cache_id))
    }

    fn bind_diffuse_only(
        &mut self,
        info: &mut TextureInfo<'_>,
        flags: PolyFlags,
    ) -> Result<TextureMetadata> {
        let metadata = self
            .bind_pass(TexturePass::Diffuse, Some(info), flags)?
            .ok_or(DriverError::TextureNotFound(info.cache_id))?;
        for pass in SECONDARY_PASSES {
            self.ctx.bind_texture(pass, None)?;
        }
        Ok(metadata)
    }

    // =================================================================
    // PRIMITIVES
    // =================================================================

    /// Draws a world surface with up to five texture passes.
    pub fn draw_complex_surface(
        &mut self,
        surface: &mut SurfaceInfo<'_, '_>,
        facet: &Facet,
    ) -> Result<()> {
        let result = self.complex_surface(surface, facet);
        self.report("complex surface", result)
    }

    fn complex_surface(&mut self, surface: &mut SurfaceInfo<'_, '_>, facet: &Facet) -> Result<()> {
        let flags = surface.poly_flags;
        self.ctx.set_projection_mode(ProjectionMode::Normal);
        self.ctx.set_blend_and_depth(flags);

        let mut mappings = [None; TexturePass::COUNT];
        let diffuse = self
            .bind_pass(TexturePass::Diffuse, Some(&mut *surface.texture), flags)?
            .ok_or(DriverError::TextureNotFound(surface.texture.cache_id))?;
        mappings[TexturePass::Diffuse.index()] =
            Some(PassMapping::new(surface.texture, diffuse, false));

        let secondary = [
            (TexturePass::Light, surface.light_map.as_deref_mut(), true),
            (TexturePass::Detail, surface.detail_texture.as_deref_mut(), false),
            (TexturePass::Fog, surface.fog_map.as_deref_mut(), true),
            (TexturePass::Macro, surface.macro_texture.as_deref_mut(), false),
        ];
        for (pass, info, half_texel_pan) in secondary {
            match info {
                Some(info) => {
                    let metadata = self
                        .bind_pass(pass, Some(&mut *info), PolyFlags::empty())?
                        .ok_or(DriverError::TextureNotFound(info.cache_id))?;
                    mappings[pass.index()] = Some(PassMapping::new(info, metadata, half_texel_pan));
                }
                None => {
                    self.ctx.bind_texture(pass, None)?;
                }
            }
        }

        let coords = &facet.map_coords;
        let u_dot = coords.x_axis.dot(coords.origin);
        let v_dot = coords.y_axis.dot(coords.origin);

        for poly in &facet.polys {
            if poly.points.len() < 3 {
                continue;
            }
            self.ctx.reserve_fan(poly.points.len())?;
            for point in &poly.points {
                let u = coords.x_axis.dot(*point) - u_dot;
                let v = coords.y_axis.dot(*point) - v_dot;
                let vertex = self.ctx.next_vertex();
                *vertex = Vertex {
                    position: point.to_array(),
                    color: [1.0; 4],
                    flags: flags.bits(),
                    ..Default::default()
                };
                for pass in TexturePass::ALL {
                    if let Some(mapping) = &mappings[pass.index()] {
                        vertex.set_tex_coord(pass, mapping.apply(u, v));
                    }
                }
            }
        }
        Ok(())
    }

    /// Draws a lit model fan with a diffuse texture.
    pub fn draw_gouraud_polygon(
        &mut self,
        info: &mut TextureInfo<'_>,
        points: &[TransTexture],
        flags: PolyFlags,
    ) -> Result<()> {
        let result = self.gouraud_polygon(info, points, flags);
        self.report("gouraud polygon", result)
    }

    fn gouraud_polygon(
        &mut self,
        info: &mut TextureInfo<'_>,
        points: &[TransTexture],
        flags: PolyFlags,
    ) -> Result<()> {
        let Some(first) = points.first() else {
            return Ok(());
        };
        if points.len() < 3 {
            return Ok(());
        }

        if self.variant.weapon_depth_workaround()
            && !self.drawing_weapon
            && first.point.z < WEAPON_Z
        {
            tracing::trace!("Weapon detected at z={}, clearing depth", first.point.z);
            self.ctx.clear_depth();
            self.drawing_weapon = true;
        }
        self.ctx.set_projection_mode(if self.drawing_weapon {
            ProjectionMode::CompensateZNear
        } else {
            ProjectionMode::Normal
        });

        let diffuse = self.bind_diffuse_only(info, flags)?;
        self.ctx.set_blend_and_depth(flags);

        let texture_alpha = (self.variant.supports_alpha_blend()
            && flags.contains(PolyFlags::ALPHA_BLEND))
        .then_some(info.alpha);

        self.ctx.reserve_fan(points.len())?;
        for point in points {
            let mut color = point.light;
            if let Some(alpha) = texture_alpha {
                color[3] = alpha;
            }
            let vertex = self.ctx.next_vertex();
            *vertex = Vertex {
                position: point.point.to_array(),
                color,
                fog: point.fog,
                normal: point.normal.to_array(),
                flags: flags.bits(),
                ..Default::default()
            };
            vertex.set_tex_coord(
                TexturePass::Diffuse,
                [point.u * diffuse.mult_u, point.v * diffuse.mult_v],
            );
        }
        Ok(())
    }

    /// Draws a screen-space quad, for HUD elements and sprites.
    pub fn draw_tile(
        &mut self,
        frame: &SceneNode,
        info: &mut TextureInfo<'_>,
        tile: &Tile,
        flags: PolyFlags,
    ) -> Result<()> {
        let result = self.tile(frame, info, tile, flags);
        self.report("tile", result)
    }

    fn tile(
        &mut self,
        frame: &SceneNode,
        info: &mut TextureInfo<'_>,
        tile: &Tile,
        flags: PolyFlags,
    ) -> Result<()> {
        self.ctx.set_projection_mode(ProjectionMode::ZOnly);
        // Some hosts draw tiles without announcing the scene first
        self.set_scene_node(frame);
        let diffuse = self.bind_diffuse_only(info, flags)?;
        self.ctx.set_blend_and_depth(flags);
        self.ctx.reserve_quad()?;

        let (left, right) = (tile.x, tile.x + tile.xl);
        let (top, bottom) = (tile.y, tile.y + tile.yl);
        let (tex_left, tex_right) = (tile.u * diffuse.mult_u, (tile.u + tile.ul) * diffuse.mult_u);
        let (tex_top, tex_bottom) = (tile.v * diffuse.mult_v, (tile.v + tile.vl) * diffuse.mult_v);

        let mut color = tile.color;
        if self.variant.supports_alpha_blend() && flags.contains(PolyFlags::ALPHA_BLEND) {
            color[3] = info.alpha;
        }
        let corners = [
            ([left, top], [tex_left, tex_top]),
            ([right, top], [tex_right, tex_top]),
            ([right, bottom], [tex_right, tex_bottom]),
            ([left, bottom], [tex_left, tex_bottom]),
        ];
        for ([x, y], uv) in corners {
            let vertex = self.ctx.next_vertex();
            *vertex = Vertex {
                position: [x, y, tile.z],
                color,
                fog: tile.fog,
                flags: flags.bits(),
                ..Default::default()
            };
            vertex.set_tex_coord(TexturePass::Diffuse, uv);
        }
        Ok(())
    }

    /// Draws alpha-blended fog planes whose opacity grows with depth.
    /// Engines without alpha blending ignore them.
    pub fn draw_fog_surface(&mut self, surface: &FogSurface) -> Result<()> {
        if !self.variant.supports_alpha_blend() {
            tracing::trace!("Ignoring fog surface on {:?}", self.variant);
            return Ok(());
        }
        let result = self.fog_surface(surface);
        self.report("fog surface", result)
    }

    fn fog_surface(&mut self, surface: &FogSurface) -> Result<()> {
        if surface.fog_distance <= 0.0 {
            return Ok(());
        }
        let inv_distance = 1.0 / surface.fog_distance;
        self.ctx.set_projection_mode(ProjectionMode::Normal);
        self.ctx.set_blend_and_depth(PolyFlags::ALPHA_BLEND);
        for pass in TexturePass::ALL {
            self.ctx.bind_texture(pass, None)?;
        }

        for poly in &surface.polys {
            if poly.points.len() < 3 {
                continue;
            }
            self.ctx.reserve_fan(poly.points.len())?;
            for point in &poly.points {
                let mut color = surface.fog_color;
                color[3] = point.z * inv_distance;
                *self.ctx.next_vertex() = Vertex {
                    position: point.to_array(),
                    color,
                    flags: PolyFlags::ALPHA_BLEND.bits(),
                    ..Default::default()
                };
            }
        }
        Ok(())
    }

    /// Enables distance fog for the Gouraud polygons that follow.
    pub fn pre_draw_gouraud(&mut self, fog_distance: f32, fog_color: [f32; 4]) {
        if fog_distance > 0.0 {
            self.ctx.set_fog(FogParams {
                distance: fog_distance,
                color: fog_color,
            });
        }
    }

    pub fn post_draw_gouraud(&mut self, fog_distance: f32) {
        if fog_distance > 0.0 {
            self.ctx.set_fog(FogParams::default());
        }
    }

    // =================================================================
    // DEVICE
    // =================================================================

    /// Changes the render resolution. Full screen switching is up to the
    /// window owner.
    pub fn set_res(&mut self, width: u32, height: u32, fullscreen: bool) -> Result<()> {
        tracing::info!(
            "Setting resolution {}x{} ({})",
            width,
            height,
            if fullscreen { "fullscreen" } else { "windowed" }
        );
        let result = self.ctx.resize(width, height);
        self.report("resolution change", result)?;
        self.apply_defaults();
        Ok(())
    }

    pub fn set_brightness(&mut self, brightness: f32) {
        let brightness = brightness.clamp(0.0, 1.0);
        self.options.brightness = brightness;
        self.ctx.set_brightness(brightness);
    }

    pub fn set_display_modes(&mut self, modes: Vec<(u32, u32)>) {
        self.modes = modes;
    }

    /// Display modes as the engine's `GetRes` command expects them.
    pub fn mode_list(&self) -> String {
        mode_list(&self.modes, self.variant.mode_list_limit())
    }

    /// Handles a console command. `GetRes` returns the mode list. A
    /// `brightness <value>` command is applied but left for the host to
    /// handle as well, so it returns `None`.
    pub fn exec(&mut self, command: &str) -> Option<String> {
        let trimmed = command.trim();
        if trimmed
            .get(..6)
            .is_some_and(|word| word.eq_ignore_ascii_case("getres"))
        {
            return Some(self.mode_list());
        }

        let lower = trimmed.to_ascii_lowercase();
        if let Some(start) = lower.find("brightness") {
            let value = trimmed[start + "brightness".len()..]
                .split_whitespace()
                .next()
                .and_then(|v| v.parse::<f32>().ok());
            match value {
                Some(brightness) => {
                    tracing::debug!("Setting brightness {}", brightness);
                    self.set_brightness(brightness);
                }
                None => tracing::warn!("Ignoring malformed brightness command: {}", trimmed),
            }
        }
        None
    }

    /// RGBA8 pixels of the last rendered frame, row by row.
    pub fn read_pixels(&mut self) -> Result<Vec<u8>> {
        let result = self.ctx.read_pixels();
        if let Err(e) = &result {
            tracing::warn!("Screenshot failed: {}", e);
        }
        result
    }

    pub fn size(&self) -> (u32, u32) {
        self.ctx.backend().size()
    }

    /// Draws what is left and releases every texture.
    pub fn exit(&mut self) {
        tracing::info!("Render device exiting");
        self.ctx.shutdown();
    }
}

#[cfg(test)]
mod tests;
