//! Driver options
//!
//! Options are read once when the device initializes. Each option that is
//! missing from the store is written back with its default so users can
//! find and edit it afterwards.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::variant::EngineVariant;

/// Option names as they appear in the store.
pub mod keys {
    pub const ANTIALIASING: &str = "Antialiasing";
    pub const ANISOTROPY: &str = "Anisotropy";
    pub const VSYNC: &str = "VSync";
    pub const LOD_BIAS: &str = "LODBias";
    pub const Z_NEAR: &str = "ZNear";
    pub const BRIGHTNESS: &str = "Brightness";
    pub const PARALLAX_OCCLUSION: &str = "ParallaxOcclusionMapping";
    pub const ALPHA_TO_COVERAGE: &str = "AlphaToCoverage";
    pub const PRECACHE: &str = "Precache";
}

/// Resolved driver options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverOptions {
    /// Requested MSAA sample count (default: 4). Lowered to what the adapter supports.
    #[serde(default = "default_samples")]
    pub samples: u32,
    /// Wait for vertical blank on present (default: true)
    #[serde(default = "default_true")]
    pub vsync: bool,
    /// Anisotropic filtering level (default: 8, range: 0-16)
    #[serde(default = "default_anisotropy")]
    pub anisotropy: u32,
    /// Mip LOD bias (default: 0, range: -10-10)
    #[serde(default)]
    pub lod_bias: i32,
    /// Near plane distance (default: 7)
    #[serde(default = "default_z_near")]
    pub z_near: f32,
    /// Brightness (default: 0.5, range: 0-1)
    #[serde(default = "default_brightness")]
    pub brightness: f32,
    #[serde(default)]
    pub parallax_occlusion: bool,
    /// Alpha to coverage for masked primitives when multisampling
    #[serde(default)]
    pub alpha_to_coverage: bool,
    /// Ask the host to precache textures on level load
    #[serde(default)]
    pub precache: bool,
}

fn default_samples() -> u32 {
    4
}
fn default_true() -> bool {
    true
}
fn default_anisotropy() -> u32 {
    8
}
fn default_z_near() -> f32 {
    7.0
}
fn default_brightness() -> f32 {
    0.5
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            samples: default_samples(),
            vsync: default_true(),
            anisotropy: default_anisotropy(),
            lod_bias: 0,
            z_near: default_z_near(),
            brightness: default_brightness(),
            parallax_occlusion: false,
            alpha_to_coverage: false,
            precache: false,
        }
    }
}

impl DriverOptions {
    /// Defaults for a given engine variant.
    pub fn for_variant(variant: EngineVariant) -> Self {
        Self {
            alpha_to_coverage: variant.default_alpha_to_coverage(),
            ..Self::default()
        }
    }

    /// Reads every option from `store`, writing back defaults for missing keys.
    pub fn read_from(store: &mut dyn OptionStore, variant: EngineVariant) -> Self {
        let defaults = Self::for_variant(variant);
        let options = Self {
            samples: read_or_default(
                store,
                keys::ANTIALIASING,
                OptionValue::Int(defaults.samples as i64),
            )
            .as_u32(),
            vsync: read_or_default(store, keys::VSYNC, OptionValue::Bool(defaults.vsync))
                .as_bool(),
            anisotropy: read_or_default(
                store,
                keys::ANISOTROPY,
                OptionValue::Int(defaults.anisotropy as i64),
            )
            .as_u32(),
            lod_bias: read_or_default(
                store,
                keys::LOD_BIAS,
                OptionValue::Int(defaults.lod_bias as i64),
            )
            .as_i32(),
            z_near: read_or_default(
                store,
                keys::Z_NEAR,
                OptionValue::Float(defaults.z_near as f64),
            )
            .as_f64() as f32,
            brightness: read_or_default(
                store,
                keys::BRIGHTNESS,
                OptionValue::Float(defaults.brightness as f64),
            )
            .as_f64() as f32,
            parallax_occlusion: read_or_default(
                store,
                keys::PARALLAX_OCCLUSION,
                OptionValue::Bool(defaults.parallax_occlusion),
            )
            .as_bool(),
            alpha_to_coverage: read_or_default(
                store,
                keys::ALPHA_TO_COVERAGE,
                OptionValue::Bool(defaults.alpha_to_coverage),
            )
            .as_bool(),
            precache: read_or_default(store, keys::PRECACHE, OptionValue::Bool(defaults.precache))
                .as_bool(),
        };
        options.clamped()
    }

    /// Applies the init-time ranges, logging every adjusted value.
    pub fn clamped(mut self) -> Self {
        let samples = self.samples.clamp(1, 32);
        if samples != self.samples {
            tracing::warn!("Antialiasing {} out of range, using {}", self.samples, samples);
            self.samples = samples;
        }
        let anisotropy = self.anisotropy.min(16);
        if anisotropy != self.anisotropy {
            tracing::warn!("Anisotropy {} out of range, using {}", self.anisotropy, anisotropy);
            self.anisotropy = anisotropy;
        }
        let lod_bias = self.lod_bias.clamp(-10, 10);
        if lod_bias != self.lod_bias {
            tracing::warn!("LODBias {} out of range, using {}", self.lod_bias, lod_bias);
            self.lod_bias = lod_bias;
        }
        let brightness = if self.brightness.is_finite() {
            self.brightness.clamp(0.0, 1.0)
        } else {
            default_brightness()
        };
        if brightness != self.brightness {
            tracing::warn!("Brightness {} out of range, using {}", self.brightness, brightness);
            self.brightness = brightness;
        }
        let z_near = if self.z_near.is_finite() {
            self.z_near.max(1.0)
        } else {
            default_z_near()
        };
        if z_near != self.z_near {
            tracing::warn!("ZNear {} out of range, using {}", self.z_near, z_near);
            self.z_near = z_near;
        }
        self
    }
}

/// A stored option value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl OptionValue {
    pub fn as_i64(self) -> i64 {
        match self {
            OptionValue::Bool(b) => b as i64,
            OptionValue::Int(i) => i,
            OptionValue::Float(f) => f as i64,
        }
    }

    /// Saturates to `0..=u32::MAX` so out-of-range values reach the clamps intact.
    pub fn as_u32(self) -> u32 {
        u32::try_from(self.as_i64().max(0)).unwrap_or(u32::MAX)
    }

    /// Saturates to the `i32` range.
    pub fn as_i32(self) -> i32 {
        self.as_i64().clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }

    pub fn as_bool(self) -> bool {
        match self {
            OptionValue::Bool(b) => b,
            OptionValue::Int(i) => i != 0,
            OptionValue::Float(f) => f != 0.0,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            OptionValue::Bool(b) => b as i64 as f64,
            OptionValue::Int(i) => i as f64,
            OptionValue::Float(f) => f,
        }
    }
}

/// Host-side option persistence.
pub trait OptionStore {
    fn get(&self, key: &str) -> Option<OptionValue>;
    fn set(&mut self, key: &str, value: OptionValue);
}

/// Reads `key`, storing and returning `default` when it is missing.
pub fn read_or_default(
    store: &mut dyn OptionStore,
    key: &str,
    default: OptionValue,
) -> OptionValue {
    match store.get(key) {
        Some(value) => value,
        None => {
            store.set(key, default);
            default
        }
    }
}

/// In-memory store, mostly for tests and embedding hosts.
#[derive(Debug, Clone, Default)]
pub struct MemoryOptionStore {
    values: BTreeMap<String, OptionValue>,
}

impl MemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl OptionStore for MemoryOptionStore {
    fn get(&self, key: &str) -> Option<OptionValue> {
        self.values.get(key).copied()
    }

    fn set(&mut self, key: &str, value: OptionValue) {
        self.values.insert(key.to_string(), value);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct OptionsFile {
    #[serde(default)]
    options: BTreeMap<String, OptionValue>,
}

/// TOML file store with a flat `[options]` table.
#[derive(Debug, Clone)]
pub struct TomlOptionStore {
    path: PathBuf,
    file: OptionsFile,
    dirty: bool,
}

impl TomlOptionStore {
    /// `wgpudrv.toml` in the platform configuration directory.
    ///
    /// Returns `None` if the home directory cannot be determined.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "wgpudrv")
            .map(|dirs| dirs.config_dir().join("wgpudrv.toml"))
    }

    /// Opens the store at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed options file {}: {}", path.display(), e);
                OptionsFile::default()
            }),
            Err(_) => OptionsFile::default(),
        };
        Self {
            path,
            file,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether defaults were written since the last save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Writes the file, creating its directory if needed.
    pub fn save(&mut self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let content = toml::to_string_pretty(&self.file).context("Failed to serialize options")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        self.dirty = false;
        Ok(())
    }
}

impl OptionStore for TomlOptionStore {
    fn get(&self, key: &str) -> Option<OptionValue> {
        self.file.options.get(key).copied()
    }

    fn set(&mut self, key: &str, value: OptionValue) {
        self.file.options.insert(key.to_string(), value);
        self.dirty = true;
    }
}
