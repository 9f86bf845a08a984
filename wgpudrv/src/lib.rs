//! wgpudrv - wgpu render device for legacy immediate-mode engines
//!
//! The host engine submits many small primitives per frame (world surfaces,
//! lit model fans, HUD tiles). This crate batches them into large indexed
//! draws while keeping every state change ordered with the geometry it
//! affects.
//!
//! - [`device`] - Host-facing entry points ([`RenderDevice`])
//! - [`context`] - Batching, state coalescing and texture residency
//! - [`batch`] - Vertex/index staging and fan/quad indexing
//! - [`texture_cache`] - Cached GPU textures and pass bindings
//! - [`render_state`] - Blend classification, projection and viewport state
//! - [`backend`] - The backend seam and its wgpu implementation
//! - [`scene`] - Host primitive descriptions
//! - [`error`] - Error taxonomy

pub mod backend;
pub mod batch;
pub mod context;
pub mod device;
pub mod error;
pub mod render_state;
pub mod scene;
pub mod texture_cache;

pub use backend::{BackendOptions, MapMode, RenderBackend, WgpuBackend};
pub use context::{RenderContext, RenderStats};
pub use device::RenderDevice;
pub use error::{DriverError, ErrorKind, Result};
pub use render_state::{
    BlendMode, BlendPolicy, Flash, FogParams, Projection, ProjectionMode, Viewport,
};
pub use scene::{
    Facet, FogSurface, LockFlags, MapCoords, SavedPoly, SceneNode, SurfaceInfo, Tile, TransTexture,
};

pub use wgpudrv_common as common;
