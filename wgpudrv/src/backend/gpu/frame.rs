//! Render pass execution
//!
//! Replays recorded commands into render passes. Consecutive draws share a
//! pass; a clear ends the current pass and the next one starts with the
//! matching load op, so clears stay ordered with the draws around them.

use super::command_buffer::RenderCommand;
use super::init::RenderTarget;
use super::pipeline::{PipelineCache, PipelineKey};
use crate::render_state::Viewport;

/// Resources every pass binds.
pub struct FrameResources<'a> {
    pub target: &'a RenderTarget,
    pub pipelines: &'a PipelineCache,
    pub globals: &'a wgpu::BindGroup,
    pub vertex_buffer: &'a wgpu::Buffer,
    pub index_buffer: &'a wgpu::Buffer,
}

/// State tracked within one pass to skip redundant calls.
#[derive(Default)]
struct PassState {
    pipeline: Option<PipelineKey>,
    uniform_offset: Option<u32>,
    viewport: Option<Viewport>,
    /// Clamped viewport is empty, draws are skipped.
    viewport_empty: bool,
}

pub fn execute(
    encoder: &mut wgpu::CommandEncoder,
    commands: &[RenderCommand],
    res: &FrameResources<'_>,
) {
    let mut cmd_idx = 0;
    let mut color_load = wgpu::LoadOp::Load;
    let mut depth_load = wgpu::LoadOp::Load;

    while cmd_idx < commands.len() {
        while let Some(cmd) = commands.get(cmd_idx) {
            match cmd {
                RenderCommand::ClearColor(c) => {
                    color_load = wgpu::LoadOp::Clear(wgpu::Color {
                        r: c[0] as f64,
                        g: c[1] as f64,
                        b: c[2] as f64,
                        a: c[3] as f64,
                    });
                }
                RenderCommand::ClearDepth => depth_load = wgpu::LoadOp::Clear(1.0),
                RenderCommand::Draw { .. } => break,
            }
            cmd_idx += 1;
        }

        let (view, resolve_target) = res.target.attachment();
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Batch Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &res.target.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        color_load = wgpu::LoadOp::Load;
        depth_load = wgpu::LoadOp::Load;

        render_pass.set_vertex_buffer(0, res.vertex_buffer.slice(..));
        render_pass.set_index_buffer(res.index_buffer.slice(..), wgpu::IndexFormat::Uint32);

        let mut state = PassState::default();
        while let Some(RenderCommand::Draw {
            pipeline,
            textures,
            uniform_offset,
            viewport,
            indices,
        }) = commands.get(cmd_idx)
        {
            cmd_idx += 1;

            if state.viewport != Some(*viewport) {
                state.viewport = Some(*viewport);
                match viewport.clamped_to(res.target.width, res.target.height) {
                    Some(vp) => {
                        render_pass.set_viewport(
                            vp.x as f32,
                            vp.y as f32,
                            vp.width as f32,
                            vp.height as f32,
                            0.0,
                            1.0,
                        );
                        state.viewport_empty = false;
                    }
                    None => state.viewport_empty = true,
                }
            }
            if state.viewport_empty {
                continue;
            }

            if state.pipeline != Some(*pipeline) {
                let Some(entry) = res.pipelines.get(*pipeline) else {
                    tracing::error!("Missing pipeline {:?}", pipeline);
                    continue;
                };
                render_pass.set_pipeline(entry);
                state.pipeline = Some(*pipeline);
            }

            if state.uniform_offset != Some(*uniform_offset) {
                render_pass.set_bind_group(0, res.globals, &[*uniform_offset]);
                state.uniform_offset = Some(*uniform_offset);
            }
            render_pass.set_bind_group(1, textures, &[]);

            render_pass.draw_indexed(indices.clone(), 0, 0..1);
        }
    }
}
