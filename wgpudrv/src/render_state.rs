//! Render state management
//!
//! Defines the blend modes selected from poly flags, the precedence policy
//! that picks exactly one of them, projection modes, and the small value
//! types the context compares before touching GPU state.

use glam::{Mat4, Vec4};
use wgpudrv_common::{EngineVariant, PolyFlags};

/// Far plane used for every projection.
pub const FAR_PLANE: f32 = 32760.0;

/// Blend state for one primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum BlendMode {
    /// No blending
    #[default]
    Opaque = 0,
    /// No blending, alpha tested in the shader
    Masked = 1,
    /// dst = src + dst * (1 - src)
    Translucent = 2,
    /// dst = src * dst * 2
    Modulated = 3,
    /// Standard alpha blending
    AlphaBlend = 4,
    /// Depth only, no color writes
    Invisible = 5,
}

impl BlendMode {
    pub const ALL: [BlendMode; 6] = [
        BlendMode::Opaque,
        BlendMode::Masked,
        BlendMode::Translucent,
        BlendMode::Modulated,
        BlendMode::AlphaBlend,
        BlendMode::Invisible,
    ];

    /// The flag that selects this mode, if any.
    pub fn trigger(self) -> Option<PolyFlags> {
        match self {
            BlendMode::Opaque => None,
            BlendMode::Masked => Some(PolyFlags::MASKED),
            BlendMode::Translucent => Some(PolyFlags::TRANSLUCENT),
            BlendMode::Modulated => Some(PolyFlags::MODULATED),
            BlendMode::AlphaBlend => Some(PolyFlags::ALPHA_BLEND),
            BlendMode::Invisible => Some(PolyFlags::INVISIBLE),
        }
    }

    pub fn to_wgpu(self) -> Option<wgpu::BlendState> {
        match self {
            BlendMode::Opaque | BlendMode::Masked | BlendMode::Invisible => None,
            BlendMode::Translucent => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::OneMinusSrc,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::OneMinusSrc,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
            BlendMode::Modulated => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::Dst,
                    dst_factor: wgpu::BlendFactor::Src,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::DstAlpha,
                    dst_factor: wgpu::BlendFactor::SrcAlpha,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
            BlendMode::AlphaBlend => Some(wgpu::BlendState::ALPHA_BLENDING),
        }
    }

    pub fn color_writes(self) -> wgpu::ColorWrites {
        match self {
            BlendMode::Invisible => wgpu::ColorWrites::empty(),
            _ => wgpu::ColorWrites::ALL,
        }
    }
}

/// Ordered blend precedence.
///
/// The first mode whose trigger flag is set wins; with none set the
/// primitive is opaque. Invisible always comes first and every mode appears
/// at most once, so the order is strict and total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlendPolicy {
    order: Vec<BlendMode>,
    blend_mask: PolyFlags,
}

impl BlendPolicy {
    /// Builds a policy from a precedence list. Duplicates and `Opaque` are
    /// dropped and `Invisible` is moved to the front.
    pub fn new(order: impl IntoIterator<Item = BlendMode>) -> Self {
        let mut modes = vec![BlendMode::Invisible];
        for mode in order {
            if mode != BlendMode::Opaque && !modes.contains(&mode) {
                modes.push(mode);
            }
        }
        let blend_mask = modes
            .iter()
            .filter_map(|m| m.trigger())
            .fold(PolyFlags::empty(), |acc, f| acc | f);
        Self {
            order: modes,
            blend_mask,
        }
    }

    pub fn for_variant(variant: EngineVariant) -> Self {
        let (first, second) = if variant.modulate_before_translucent() {
            (BlendMode::Modulated, BlendMode::Translucent)
        } else {
            (BlendMode::Translucent, BlendMode::Modulated)
        };
        let mut order = vec![first, second];
        if variant.supports_alpha_blend() {
            order.push(BlendMode::AlphaBlend);
        }
        order.push(BlendMode::Masked);
        Self::new(order)
    }

    pub fn order(&self) -> &[BlendMode] {
        &self.order
    }

    pub fn classify(&self, flags: PolyFlags) -> BlendMode {
        self.order
            .iter()
            .copied()
            .find(|mode| mode.trigger().is_some_and(|f| flags.contains(f)))
            .unwrap_or(BlendMode::Opaque)
    }

    /// Flags that can change the selected blend mode.
    pub fn blend_mask(&self) -> PolyFlags {
        self.blend_mask
    }

    /// Flags whose change requires a flush.
    pub fn relevant_mask(&self) -> PolyFlags {
        self.blend_mask | PolyFlags::OCCLUDE
    }
}

impl Default for BlendPolicy {
    fn default() -> Self {
        Self::for_variant(EngineVariant::default())
    }
}

/// How the vertex shader interprets positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum ProjectionMode {
    /// Camera space through the projection matrix
    #[default]
    Normal = 0,
    /// Screen-space x/y in viewport pixels, depth from projected z
    ZOnly = 1,
    /// Camera space pushed out by the near plane distance
    CompensateZNear = 2,
}

/// Viewport rectangle in render target pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersection with a `width` x `height` target, `None` when empty.
    pub fn clamped_to(self, width: u32, height: u32) -> Option<Viewport> {
        let x0 = self.x.max(0) as i64;
        let y0 = self.y.max(0) as i64;
        let x1 = (self.x as i64 + self.width as i64).min(width as i64);
        let y1 = (self.y as i64 + self.height as i64).min(height as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Viewport {
            x: x0 as i32,
            y: y0 as i32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }
}

/// Perspective parameters from the host's scene node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Height over width of the view.
    pub aspect: f32,
    /// Frustum half-width at z = 1.
    pub x_over_z: f32,
}

impl Projection {
    /// Left-handed off-center perspective with depth in 0..1.
    ///
    /// The frustum is scaled by `z_near` so a larger near plane does not zoom
    /// the view.
    pub fn matrix(self, z_near: f32) -> Mat4 {
        let xz = self.x_over_z * z_near;
        let (left, right) = (-xz, xz);
        let (bottom, top) = (-self.aspect * xz, self.aspect * xz);
        let (near, far) = (z_near, FAR_PLANE);
        Mat4::from_cols(
            Vec4::new(2.0 * near / (right - left), 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 * near / (top - bottom), 0.0, 0.0),
            Vec4::new(
                (left + right) / (left - right),
                (top + bottom) / (bottom - top),
                far / (far - near),
                1.0,
            ),
            Vec4::new(0.0, 0.0, near * far / (near - far), 0.0),
        )
    }
}

/// Distance fog. A distance of zero disables it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FogParams {
    pub distance: f32,
    pub color: [f32; 4],
}

/// Full-screen color flash (underwater tint, damage).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Flash {
    pub enabled: bool,
    pub color: [f32; 4],
}

impl Flash {
    pub const NONE: Flash = Flash {
        enabled: false,
        color: [0.0; 4],
    };

    /// Derives the flash from the host's scale/fog pair. A neutral scale of
    /// 0.5 with no fog means no flash.
    pub fn from_host(scale: [f32; 3], fog: [f32; 3]) -> Self {
        if scale == [0.5, 0.5, 0.5] && fog == [0.0, 0.0, 0.0] {
            return Flash::NONE;
        }
        Flash {
            enabled: true,
            color: [fog[0], fog[1], fog[2], (scale[0] * 2.0).min(1.0)],
        }
    }
}
