//! Render pipelines
//!
//! One pipeline per blend mode and depth-write combination, all built at
//! init so a state change never compiles anything mid-frame.

use hashbrown::HashMap;
use wgpudrv_common::{TexturePass, Vertex};

use super::init::{COLOR_FORMAT, DEPTH_FORMAT};
use super::uniforms::ShaderGlobals;
use crate::render_state::BlendMode;

/// Pipeline selection key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub blend: BlendMode,
    pub depth_write: bool,
}

impl PipelineKey {
    pub fn all() -> impl Iterator<Item = PipelineKey> {
        BlendMode::ALL.into_iter().flat_map(|blend| {
            [false, true]
                .into_iter()
                .map(move |depth_write| PipelineKey { blend, depth_write })
        })
    }
}

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 10] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x4,
    2 => Float32x4,
    3 => Float32x3,
    4 => Float32x2,
    5 => Float32x2,
    6 => Float32x2,
    7 => Float32x2,
    8 => Float32x2,
    9 => Uint32,
];

fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: Vertex::SIZE as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

/// Bind group layouts shared by every pipeline.
pub struct Layouts {
    /// @group(0): globals ring (dynamic offset) and sampler
    pub globals: wgpu::BindGroupLayout,
    /// @group(1): one texture per pass
    pub textures: wgpu::BindGroupLayout,
}

impl Layouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let globals = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Globals Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<ShaderGlobals>() as u64,
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let entries: Vec<wgpu::BindGroupLayoutEntry> = TexturePass::ALL
            .iter()
            .map(|pass| wgpu::BindGroupLayoutEntry {
                binding: pass.index() as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            })
            .collect();
        let textures = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Pass Bind Group Layout"),
            entries: &entries,
        });

        Self { globals, textures }
    }
}

/// Every pipeline, built up front.
pub struct PipelineCache {
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub fn new(
        device: &wgpu::Device,
        layouts: &Layouts,
        samples: u32,
        alpha_to_coverage: bool,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Unreal Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/unreal.wgsl").into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Unreal Pipeline Layout"),
            bind_group_layouts: &[&layouts.globals, &layouts.textures],
            push_constant_ranges: &[],
        });

        let pipelines = PipelineKey::all()
            .map(|key| {
                let coverage = alpha_to_coverage && samples > 1 && key.blend == BlendMode::Masked;
                let pipeline = create_pipeline(device, &shader, &layout, key, samples, coverage);
                (key, pipeline)
            })
            .collect();

        tracing::debug!(
            "Built {} pipelines ({}x MSAA, alpha to coverage: {})",
            BlendMode::ALL.len() * 2,
            samples,
            alpha_to_coverage && samples > 1
        );
        Self { pipelines }
    }

    pub fn get(&self, key: PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(&key)
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    key: PipelineKey,
    samples: u32,
    alpha_to_coverage: bool,
) -> wgpu::RenderPipeline {
    let label = format!("Pipeline {:?} depth_write={}", key.blend, key.depth_write);
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs"),
            buffers: &[vertex_layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs"),
            targets: &[Some(wgpu::ColorTargetState {
                format: COLOR_FORMAT,
                blend: key.blend.to_wgpu(),
                write_mask: key.blend.color_writes(),
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: key.depth_write,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: samples,
            mask: !0,
            alpha_to_coverage_enabled: alpha_to_coverage,
        },
        multiview: None,
        cache: None,
    })
}

/// Repeating anisotropic sampler shared by all passes.
pub fn create_sampler(device: &wgpu::Device, anisotropy: u32) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Pass Sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        anisotropy_clamp: anisotropy.clamp(1, 16) as u16,
        ..Default::default()
    })
}
