//! Host-side primitive descriptions
//!
//! These mirror what the engine passes to its render device each frame.
//! Positions are in camera space unless noted.

use glam::Vec3;
use wgpudrv_common::{PolyFlags, TextureInfo};

bitflags::bitflags! {
    /// Frame start options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LockFlags: u32 {
        const CLEAR_SCREEN = 0x1;
        const LIGHT_DIMINISH = 0x2;
    }
}

/// View parameters for the scene being rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneNode {
    /// Origin of the view in the render target, in pixels.
    pub x: i32,
    pub y: i32,
    /// View size in pixels.
    pub xb: u32,
    pub yb: u32,
    pub fx: f32,
    pub fy: f32,
    /// Horizontal field of view in degrees.
    pub fov_angle: f32,
}

impl SceneNode {
    pub fn new(x: i32, y: i32, width: u32, height: u32, fov_angle: f32) -> Self {
        Self {
            x,
            y,
            xb: width,
            yb: height,
            fx: width as f32,
            fy: height as f32,
            fov_angle,
        }
    }
}

/// Texture mapping plane of a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapCoords {
    pub origin: Vec3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
}

/// A triangle fan of a surface or fog plane.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedPoly {
    pub points: Vec<Vec3>,
}

impl SavedPoly {
    pub fn new(points: impl Into<Vec<Vec3>>) -> Self {
        Self {
            points: points.into(),
        }
    }
}

/// Geometry of a surface: its mapping plane and the fans covering it.
#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
    pub map_coords: MapCoords,
    pub polys: Vec<SavedPoly>,
}

/// Textures and flags of a world surface. Every pass but diffuse is optional.
pub struct SurfaceInfo<'s, 'a> {
    pub poly_flags: PolyFlags,
    pub texture: &'s mut TextureInfo<'a>,
    pub light_map: Option<&'s mut TextureInfo<'a>>,
    pub detail_texture: Option<&'s mut TextureInfo<'a>>,
    pub fog_map: Option<&'s mut TextureInfo<'a>>,
    pub macro_texture: Option<&'s mut TextureInfo<'a>>,
}

/// A lit and transformed model vertex.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransTexture {
    pub point: Vec3,
    pub normal: Vec3,
    pub u: f32,
    pub v: f32,
    pub light: [f32; 4],
    pub fog: [f32; 4],
}

/// A screen-space rectangle with a texture window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    /// Top left corner in viewport pixels.
    pub x: f32,
    pub y: f32,
    pub xl: f32,
    pub yl: f32,
    /// Texture window in texels.
    pub u: f32,
    pub v: f32,
    pub ul: f32,
    pub vl: f32,
    /// Camera-space depth.
    pub z: f32,
    pub color: [f32; 4],
    pub fog: [f32; 4],
}

/// An alpha-blended fog plane.
#[derive(Debug, Clone, PartialEq)]
pub struct FogSurface {
    pub poly_flags: PolyFlags,
    pub fog_color: [f32; 4],
    /// Depth at which the fog is opaque.
    pub fog_distance: f32,
    pub polys: Vec<SavedPoly>,
}
