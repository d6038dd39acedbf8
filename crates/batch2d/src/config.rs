use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::{BatchError, BatchResult};
use crate::slots::MAX_TEXTURE_SLOTS;
use crate::vertex::VERTICES_PER_QUAD;

/// Default geometry capacity of one batch.
pub const DEFAULT_MAX_QUADS: usize = 10_000;

/// Largest accepted edge length of the white fallback texture.
pub const MAX_WHITE_TEXTURE_SIZE: u32 = 256;

/// Batch sizing, loaded from JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    /// Quads per draw call before a capacity flush.
    pub max_quads: usize,
    /// Texture units per draw call, the white fallback slot included.
    pub max_texture_slots: usize,
    /// Edge length in pixels of the white fallback texture.
    pub white_texture_size: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_quads: DEFAULT_MAX_QUADS,
            max_texture_slots: MAX_TEXTURE_SLOTS,
            white_texture_size: 1,
        }
    }
}

impl BatchConfig {
    /// Loads config from a specified path.
    /// Returns default config if file doesn't exist.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Saves config to a specified path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> BatchResult<()> {
        if self.max_quads == 0 {
            return Err(BatchError::InvalidConfig("max_quads must be at least 1".into()));
        }
        let max_vertex = self
            .max_quads
            .checked_mul(VERTICES_PER_QUAD)
            .filter(|&v| v <= u32::MAX as usize);
        if max_vertex.is_none() {
            return Err(BatchError::InvalidConfig(format!(
                "max_quads {} overflows 32-bit indices",
                self.max_quads
            )));
        }
        if !(2..=MAX_TEXTURE_SLOTS).contains(&self.max_texture_slots) {
            return Err(BatchError::InvalidConfig(format!(
                "max_texture_slots must be within 2..={MAX_TEXTURE_SLOTS}, got {}",
                self.max_texture_slots
            )));
        }
        if !(1..=MAX_WHITE_TEXTURE_SIZE).contains(&self.white_texture_size) {
            return Err(BatchError::InvalidConfig(format!(
                "white_texture_size must be within 1..={MAX_WHITE_TEXTURE_SIZE}, got {}",
                self.white_texture_size
            )));
        }
        Ok(())
    }
}
