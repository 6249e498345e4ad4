//! World generation configuration.
//!
//! Built once at startup (or loaded from JSON) and shared immutably by every
//! worker thread. Live tuning swaps a whole new value in; fields are never
//! mutated in place.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::catalog::AssetCatalog;
use crate::core::{Error, Result};
use crate::terrain::biome::{BiomeCategory, BiomeConfig, Span};
use crate::terrain::generator::{NoiseLayer, TerrainParams};

/// Chunk geometry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkParams {
    /// Edge length in meters
    pub size: f32,
    /// Grid cells per edge; the heightfield has `(resolution + 1)^2` samples
    pub resolution: u32,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            size: 64.0,
            resolution: 32,
        }
    }
}

/// Object placement parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementParams {
    /// Tree candidates per chunk before density scaling
    pub trees_per_chunk: u32,
    /// Rock candidates per chunk before density scaling
    pub rocks_per_chunk: u32,
    /// Grass patch candidates per chunk before density scaling
    pub grass_per_chunk: u32,
    /// Low-frequency noise giving each chunk its density factor
    pub density: NoiseLayer,
    /// Range the density factor is mapped into
    pub density_range: Span,
}

impl Default for PlacementParams {
    fn default() -> Self {
        Self {
            trees_per_chunk: 48,
            rocks_per_chunk: 16,
            grass_per_chunk: 96,
            density: NoiseLayer::new(0.002, 2, 1.0),
            density_range: Span::new(0.35, 1.0),
        }
    }
}

/// Streaming parameters
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingParams {
    /// Worker thread count; `None` uses hardware parallelism minus one
    pub worker_threads: Option<usize>,
}

/// Complete world configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub chunk: ChunkParams,
    pub terrain: TerrainParams,
    pub biomes: BiomeConfig,
    pub placement: PlacementParams,
    pub assets: AssetCatalog,
    pub streaming: StreamingParams,
}

impl WorldConfig {
    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: WorldConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// Check every section; unknown asset ids only warn since placement skips them
    pub fn validate(&self) -> Result<()> {
        if !(self.chunk.size.is_finite() && self.chunk.size > 0.0) {
            return Err(Error::Config("chunk.size must be positive".into()));
        }
        if self.chunk.resolution == 0 || self.chunk.resolution > 1024 {
            return Err(Error::Config("chunk.resolution must be within 1..=1024".into()));
        }
        self.terrain.validate().map_err(Error::Config)?;
        self.biomes.validate().map_err(Error::Config)?;
        self.placement.density.validate("placement.density").map_err(Error::Config)?;
        let range = self.placement.density_range;
        if !(range.min >= 0.0 && range.min <= range.max) {
            return Err(Error::Config(
                "placement.density_range must be ordered and non-negative".into(),
            ));
        }
        if self.streaming.worker_threads == Some(0) {
            return Err(Error::Config("streaming.worker_threads must be at least 1".into()));
        }

        for category in BiomeCategory::ALL {
            let profile = self.biomes.profile(category);
            for id in profile.tree_assets.iter().chain(&profile.rock_assets) {
                if !self.assets.contains(*id) {
                    log::warn!(
                        "{:?} references unknown asset {:?}; placements using it will be skipped",
                        category,
                        id
                    );
                }
            }
        }
        Ok(())
    }

    /// Number of generation worker threads to spawn
    pub fn worker_threads(&self) -> usize {
        self.streaming.worker_threads.unwrap_or_else(default_worker_count)
    }
}

/// Hardware parallelism minus one (for the owning thread), at least one
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}
