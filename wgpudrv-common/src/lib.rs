//! Shared data types for the wgpudrv render device
//!
//! Everything in this crate is GPU-agnostic so it can be tested without a device:
//!
//! - [`polyflags`] - Engine polygon flags and the occlusion rule
//! - [`format`] - Source texture formats and the format registry
//! - [`texture`] - Host texture descriptors and cached texture metadata
//! - [`convert`] - Per-mip pixel conversion (aliasing or palette expansion)
//! - [`vertex`] - The batched vertex layout and texture passes
//! - [`options`] - Driver options and the option store
//! - [`variant`] - Per-deployment engine variant switches
//! - [`modes`] - Display mode list formatting

pub mod convert;
pub mod format;
pub mod modes;
pub mod options;
pub mod polyflags;
pub mod texture;
pub mod variant;
pub mod vertex;

pub use convert::{ConvertError, ConvertedMip, convert_mip};
pub use format::{Conversion, FormatInfo, GpuFormat, SourceFormat};
pub use modes::mode_list;
pub use options::{DriverOptions, MemoryOptionStore, OptionStore, OptionValue, TomlOptionStore};
pub use polyflags::PolyFlags;
pub use texture::{MipData, TextureInfo, TextureMetadata};
pub use variant::EngineVariant;
pub use vertex::{TexturePass, Vertex};
