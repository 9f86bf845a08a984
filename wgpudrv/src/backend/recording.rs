//! Backend that records calls instead of rendering

use glam::Mat4;
use wgpudrv_common::convert::{ConvertedMip, TextureUpload};
use wgpudrv_common::{TexturePass, Vertex};

use super::{MapMode, RenderBackend};
use crate::batch::DrawBatch;
use crate::error::Result;
use crate::render_state::{BlendMode, Flash, FogParams, ProjectionMode, Viewport};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateTexture { id: u32, cache_id: u64, mips: usize },
    UpdateTexture { id: u32, level: u32 },
    DestroyTexture(u32),
    BindTexture(TexturePass, Option<u32>),
    BlendMode(BlendMode),
    DepthWrite(bool),
    ProjectionMode(ProjectionMode),
    Projection(Mat4),
    Viewport(Viewport),
    Fog(FogParams),
    Flash(Flash),
    Brightness(f32),
    Time(f32),
    Map(MapMode),
    Draw {
        first_vertex: u32,
        vertices: usize,
        first_index: u32,
        indices: Vec<u32>,
    },
    ClearDepth,
    ClearColor([f32; 4]),
    Present,
    Resize(u32, u32),
}

#[derive(Debug)]
pub struct RecordingBackend {
    pub calls: Vec<Call>,
    /// Every vertex passed to `draw`, in order.
    pub drawn_vertices: Vec<Vertex>,
    pub live_textures: Vec<u32>,
    next_id: u32,
    width: u32,
    height: u32,
    vertex_capacity: usize,
    index_capacity: usize,
}

impl RecordingBackend {
    pub fn new(vertex_capacity: usize, index_capacity: usize) -> Self {
        Self {
            calls: Vec::new(),
            drawn_vertices: Vec::new(),
            live_textures: Vec::new(),
            next_id: 1,
            width: 640,
            height: 480,
            vertex_capacity,
            index_capacity,
        }
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.drawn_vertices.clear();
    }

    pub fn draws(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Draw { .. }))
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new(
            crate::batch::DEFAULT_VERTEX_CAPACITY,
            crate::batch::DEFAULT_INDEX_CAPACITY,
        )
    }
}

impl RenderBackend for RecordingBackend {
    type Texture = u32;

    fn create_texture(&mut self, upload: &TextureUpload<'_>) -> Result<u32> {
        let id = self.next_id;
        self.next_id += 1;
        self.live_textures.push(id);
        self.calls.push(Call::CreateTexture {
            id,
            cache_id: upload.cache_id,
            mips: upload.mips.len(),
        });
        Ok(id)
    }

    fn update_texture(&mut self, texture: &u32, level: u32, _mip: &ConvertedMip<'_>) -> Result<()> {
        self.calls.push(Call::UpdateTexture {
            id: *texture,
            level,
        });
        Ok(())
    }

    fn destroy_texture(&mut self, texture: u32) {
        self.live_textures.retain(|&id| id != texture);
        self.calls.push(Call::DestroyTexture(texture));
    }

    fn bind_texture(&mut self, pass: TexturePass, texture: Option<&u32>) {
        self.calls.push(Call::BindTexture(pass, texture.copied()));
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.calls.push(Call::BlendMode(mode));
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.calls.push(Call::DepthWrite(enabled));
    }

    fn set_projection_mode(&mut self, mode: ProjectionMode) {
        self.calls.push(Call::ProjectionMode(mode));
    }

    fn set_projection(&mut self, matrix: Mat4, _z_near: f32) {
        self.calls.push(Call::Projection(matrix));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.calls.push(Call::Viewport(viewport));
    }

    fn set_fog(&mut self, fog: FogParams) {
        self.calls.push(Call::Fog(fog));
    }

    fn set_flash(&mut self, flash: Flash) {
        self.calls.push(Call::Flash(flash));
    }

    fn set_brightness(&mut self, brightness: f32) {
        self.calls.push(Call::Brightness(brightness));
    }

    fn set_time(&mut self, time: f32) {
        self.calls.push(Call::Time(time));
    }

    fn map(&mut self, mode: MapMode) -> Result<()> {
        self.calls.push(Call::Map(mode));
        Ok(())
    }

    fn draw(&mut self, batch: &DrawBatch<'_>) -> Result<()> {
        self.drawn_vertices.extend_from_slice(batch.vertices);
        self.calls.push(Call::Draw {
            first_vertex: batch.first_vertex,
            vertices: batch.vertices.len(),
            first_index: batch.first_index,
            indices: batch.indices.to_vec(),
        });
        Ok(())
    }

    fn clear_depth(&mut self) {
        self.calls.push(Call::ClearDepth);
    }

    fn clear_color(&mut self, color: [f32; 4]) {
        self.calls.push(Call::ClearColor(color));
    }

    fn present(&mut self) -> Result<()> {
        self.calls.push(Call::Present);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        self.calls.push(Call::Resize(width, height));
        Ok(())
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_pixels(&mut self) -> Result<Vec<u8>> {
        Ok(vec![0; (self.width * self.height * 4) as usize])
    }

    fn batch_capacity(&self) -> (usize, usize) {
        (self.vertex_capacity, self.index_capacity)
    }
}
