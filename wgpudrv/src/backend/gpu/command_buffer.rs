//! Recorded render commands
//!
//! Draws and clears are recorded in submission order and replayed into
//! render passes when the backend submits. Each draw captures everything it
//! needs, including a clone of its texture bind group, so textures released
//! by the cache stay alive until the work referencing them is submitted.

use std::ops::Range;

use super::pipeline::PipelineKey;
use crate::render_state::Viewport;

#[derive(Debug, Clone)]
pub enum RenderCommand {
    Draw {
        pipeline: PipelineKey,
        textures: wgpu::BindGroup,
        /// Dynamic offset into the globals ring
        uniform_offset: u32,
        viewport: Viewport,
        /// Absolute range in the index buffer
        indices: Range<u32>,
    },
    ClearColor([f32; 4]),
    ClearDepth,
}

/// Commands recorded since the last submission.
#[derive(Debug, Default)]
pub struct CommandList {
    commands: Vec<RenderCommand>,
    draws: usize,
}

impl CommandList {
    pub fn new() -> Self {
        Self {
            commands: Vec::with_capacity(1024),
            draws: 0,
        }
    }

    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn draw_count(&self) -> usize {
        self.draws
    }

    pub fn record_draw(
        &mut self,
        pipeline: PipelineKey,
        textures: wgpu::BindGroup,
        uniform_offset: u32,
        viewport: Viewport,
        indices: Range<u32>,
    ) {
        self.draws += 1;
        self.commands.push(RenderCommand::Draw {
            pipeline,
            textures,
            uniform_offset,
            viewport,
            indices,
        });
    }

    pub fn record_clear_color(&mut self, color: [f32; 4]) {
        self.commands.push(RenderCommand::ClearColor(color));
    }

    pub fn record_clear_depth(&mut self) {
        self.commands.push(RenderCommand::ClearDepth);
    }

    pub fn reset(&mut self) {
        self.commands.clear();
        self.draws = 0;
    }
}
