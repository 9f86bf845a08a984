//! Texture cache
//!
//! Maps the host's opaque 64-bit cache ids to backend textures and their
//! metadata, and remembers which id is bound to each texture pass. The cache
//! owns every texture; callers only ever hold the id.

use hashbrown::HashMap;
use wgpudrv_common::{TextureMetadata, TexturePass};

use crate::error::{DriverError, Result};

/// A cached backend texture and its metadata.
#[derive(Debug)]
pub struct CachedTexture<T> {
    pub metadata: TextureMetadata,
    pub texture: T,
}

/// Cache ids currently bound, indexed by [`TexturePass`].
pub type PassBindings = [Option<u64>; TexturePass::COUNT];

#[derive(Debug)]
pub struct TextureCache<T> {
    textures: HashMap<u64, CachedTexture<T>>,
    bound: PassBindings,
}

impl<T> TextureCache<T> {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
            bound: [None; TexturePass::COUNT],
        }
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn is_cached(&self, key: u64) -> bool {
        self.textures.contains_key(&key)
    }

    pub fn get(&self, key: u64) -> Option<&CachedTexture<T>> {
        self.textures.get(&key)
    }

    pub fn metadata(&self, key: u64) -> Result<TextureMetadata> {
        self.textures
            .get(&key)
            .map(|entry| entry.metadata)
            .ok_or(DriverError::TextureNotFound(key))
    }

    /// Stores a texture, returning the one it replaced. Bindings are left
    /// untouched.
    pub fn insert(&mut self, key: u64, metadata: TextureMetadata, texture: T) -> Option<T> {
        self.textures
            .insert(key, CachedTexture { metadata, texture })
            .map(|old| old.texture)
    }

    /// Evicts a texture and clears every pass it was bound to.
    pub fn remove(&mut self, key: u64) -> Option<T> {
        let entry = self.textures.remove(&key)?;
        for slot in &mut self.bound {
            if *slot == Some(key) {
                *slot = None;
            }
        }
        Some(entry.texture)
    }

    pub fn bound(&self, pass: TexturePass) -> Option<u64> {
        self.bound[pass.index()]
    }

    pub fn bindings(&self) -> &PassBindings {
        &self.bound
    }

    /// Whether `key` is bound to any pass.
    pub fn is_bound(&self, key: u64) -> bool {
        self.bound.contains(&Some(key))
    }

    pub fn set_bound(&mut self, pass: TexturePass, key: Option<u64>) {
        self.bound[pass.index()] = key;
    }

    pub fn clear_bindings(&mut self) {
        self.bound = [None; TexturePass::COUNT];
    }

    /// Unbinds every pass and hands back every texture.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.clear_bindings();
        self.textures.drain().map(|(_, entry)| entry.texture)
    }
}

impl<T> Default for TextureCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
