//! Per-draw shader globals
//!
//! Every draw references one slot of a uniform ring through a dynamic
//! offset. A new slot is staged only when a global changed since the last
//! draw, and the staged slots are uploaded in one write at submission.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::render_state::{Flash, FogParams, ProjectionMode, Viewport};

/// Byte distance between slots, the minimum uniform offset alignment wgpu
/// guarantees.
pub const SLOT_STRIDE: u64 = 256;

/// Slots per submission.
pub const SLOT_COUNT: usize = 4096;

/// Mirrors `Globals` in `unreal.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShaderGlobals {
    pub projection: [[f32; 4]; 4],
    pub fog_color: [f32; 4],
    pub flash_color: [f32; 4],
    /// x, y, width, height in target pixels
    pub viewport: [f32; 4],
    pub fog_distance: f32,
    pub brightness: f32,
    pub time: f32,
    pub lod_bias: f32,
    pub projection_mode: u32,
    /// Bit per bound texture pass
    pub pass_mask: u32,
    pub flash_enabled: u32,
    pub parallax: u32,
    pub z_near: f32,
    pub _pad: [f32; 3],
}

impl ShaderGlobals {
    pub fn new(brightness: f32, lod_bias: f32, parallax: bool) -> Self {
        Self {
            projection: Mat4::IDENTITY.to_cols_array_2d(),
            fog_color: [0.0; 4],
            flash_color: [0.0; 4],
            viewport: [0.0; 4],
            fog_distance: 0.0,
            brightness,
            time: 0.0,
            lod_bias,
            projection_mode: ProjectionMode::Normal as u32,
            pass_mask: 0,
            flash_enabled: 0,
            parallax: parallax as u32,
            z_near: 1.0,
            _pad: [0.0; 3],
        }
    }

    pub fn set_projection(&mut self, matrix: Mat4, z_near: f32) {
        self.projection = matrix.to_cols_array_2d();
        self.z_near = z_near;
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = [
            viewport.x as f32,
            viewport.y as f32,
            viewport.width as f32,
            viewport.height as f32,
        ];
    }

    pub fn set_fog(&mut self, fog: FogParams) {
        self.fog_distance = fog.distance;
        self.fog_color = fog.color;
    }

    pub fn set_flash(&mut self, flash: Flash) {
        self.flash_enabled = flash.enabled as u32;
        self.flash_color = flash.color;
    }
}

/// Staged uniform slots for the current submission.
pub struct UniformRing {
    buffer: wgpu::Buffer,
    staged: Vec<ShaderGlobals>,
    /// Globals changed since the last staged slot.
    dirty: bool,
}

impl UniformRing {
    pub fn new(device: &wgpu::Device) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shader Globals Ring"),
            size: SLOT_STRIDE * SLOT_COUNT as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            staged: Vec::with_capacity(SLOT_COUNT),
            dirty: true,
        }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether the next draw needs a slot the ring cannot hold.
    pub fn is_full(&self) -> bool {
        (self.dirty || self.staged.is_empty()) && self.staged.len() == SLOT_COUNT
    }

    /// Dynamic offset of the slot holding `globals`, staging a new slot if
    /// they changed. The caller checks [`Self::is_full`] first.
    pub fn slot_offset(&mut self, globals: &ShaderGlobals) -> u32 {
        if self.dirty || self.staged.is_empty() {
            self.staged.push(*globals);
            self.dirty = false;
        }
        ((self.staged.len() - 1) as u64 * SLOT_STRIDE) as u32
    }

    /// Writes staged slots to the GPU buffer.
    pub fn upload(&self, queue: &wgpu::Queue) {
        if self.staged.is_empty() {
            return;
        }
        let mut bytes = vec![0u8; self.staged.len() * SLOT_STRIDE as usize];
        for (slot, globals) in bytes
            .chunks_exact_mut(SLOT_STRIDE as usize)
            .zip(&self.staged)
        {
            let data = bytemuck::bytes_of(globals);
            slot[..data.len()].copy_from_slice(data);
        }
        queue.write_buffer(&self.buffer, 0, &bytes);
    }

    /// Starts a new submission. The next draw stages a fresh slot.
    pub fn reset(&mut self) {
        self.staged.clear();
        self.dirty = true;
    }
}
