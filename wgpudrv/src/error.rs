//! Render device errors
//!
//! Errors fall into three classes. Fatal errors end initialization and leave
//! no device behind. Recoverable errors skip the current operation and
//! rendering continues with the next frame. Data-integrity errors skip the
//! single draw call that referenced bad texture data.

use thiserror::Error;
use wgpudrv_common::ConvertError;

/// How callers should react to a [`DriverError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fatal,
    Recoverable,
    DataIntegrity,
}

#[derive(Debug, Error)]
pub enum DriverError {
    /// Device, surface, shader or pipeline creation failed.
    #[error("render device initialization failed: {0:#}")]
    Init(#[source] anyhow::Error),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("screenshot readback failed: {0}")]
    Readback(String),

    #[error("batch of {required} indices exceeds buffer capacity {capacity}")]
    BatchTooLarge { required: usize, capacity: usize },

    #[error("fan needs at least 3 vertices, got {0}")]
    DegenerateFan(usize),

    #[error("texture {0:#x} is not cached")]
    TextureNotFound(u64),

    #[error("texture format not available on this adapter: {0}")]
    FormatUnavailable(&'static str),

    #[error(transparent)]
    Convert(#[from] ConvertError),
}

impl DriverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriverError::Init(_) => ErrorKind::Fatal,
            DriverError::Surface(_)
            | DriverError::Readback(_)
            | DriverError::BatchTooLarge { .. }
            | DriverError::DegenerateFan(_) => ErrorKind::Recoverable,
            DriverError::TextureNotFound(_)
            | DriverError::FormatUnavailable(_)
            | DriverError::Convert(_) => ErrorKind::DataIntegrity,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;
