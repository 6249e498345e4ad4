//! World generation pipeline: config, asset catalog and chunk synthesis.
//!
//! The pipeline for one chunk:
//! 1. Heightfield sampling over a one-sample apron (seam-exact normals)
//! 2. Per-vertex biome blend weights
//! 3. Seeded rejection sampling of trees, rocks and grass patches

pub mod catalog;
pub mod config;
pub mod heightfield;
pub mod placement;
pub mod synthesizer;

pub use catalog::{AssetCatalog, AssetInfo, AssetKind, AssetShape, MeshId};
pub use config::{ChunkParams, PlacementParams, StreamingParams, WorldConfig};
pub use heightfield::{Heightfield, TerrainVertex};
pub use placement::{DetailClass, ObjectPlacement, LARGE_ROCK_SCALE};
pub use synthesizer::{ChunkSynthesizer, GeneratedChunk};
