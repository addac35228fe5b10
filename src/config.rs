//! Runtime configuration for magic wand fills.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WandError};

/// Default edge length of a square tile, in pixels.
pub const DEFAULT_TILE_SIZE: usize = 64;

/// Largest accepted tile edge; keeps per-tile offsets within `i32`.
pub const MAX_TILE_SIZE: usize = 4096;

/// Parameters shared by the Python and WASM entry points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WandConfig {
    /// Color tolerance, 0.0-1.0. Values outside the range are clamped when used.
    pub tolerance: f64,
    /// Tile edge length used when splitting a flat image into tiles.
    pub tile_size: usize,
}

impl Default for WandConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.0,
            tile_size: DEFAULT_TILE_SIZE,
        }
    }
}

impl WandConfig {
    pub fn new(tolerance: f64, tile_size: usize) -> Result<Self> {
        let config = Self { tolerance, tile_size };
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON object; missing fields fall back to defaults.
    pub fn from_json_str(data: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(data)
            .map_err(|e| WandError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_tile_size(self.tile_size)?;
        if !self.tolerance.is_finite() {
            return Err(WandError::Config(format!(
                "tolerance must be finite, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Tile sizes must be non-zero powers of two, at most [`MAX_TILE_SIZE`].
pub fn validate_tile_size(tile_size: usize) -> Result<()> {
    if !tile_size.is_power_of_two() || tile_size > MAX_TILE_SIZE {
        return Err(WandError::InvalidTileSize(tile_size));
    }
    Ok(())
}
