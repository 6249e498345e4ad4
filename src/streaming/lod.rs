//! Level of detail tiers for streamed chunks
//!
//! Chunks carry one of four tiers. Each tier toggles a visibility class of
//! the chunk's content rather than changing its geometry:
//! - High: terrain + every object
//! - Medium: terrain + large objects (trees, big rocks)
//! - Low: terrain only
//! - Unloaded: nothing visible

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::chunk::ChunkCoord;

/// LOD tier, ordered so that `max` is the most detailed
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LodLevel {
    #[default]
    Unloaded,
    Low,
    Medium,
    High,
}

impl LodLevel {
    pub const ALL: [LodLevel; 4] = [
        LodLevel::Unloaded,
        LodLevel::Low,
        LodLevel::Medium,
        LodLevel::High,
    ];

    /// Whether terrain geometry is shown
    pub fn shows_terrain(self) -> bool {
        self >= LodLevel::Low
    }

    /// Whether trees and large rocks are shown
    pub fn shows_large_objects(self) -> bool {
        self >= LodLevel::Medium
    }

    /// Whether grass and small rocks are shown
    pub fn shows_fine_detail(self) -> bool {
        self == LodLevel::High
    }
}

/// Chebyshev-distance bands used to build a required-chunk map
///
/// # Examples
/// ```
/// use terrastream::chunk::ChunkCoord;
/// use terrastream::streaming::lod::{LodBands, LodLevel};
///
/// let bands = LodBands::new(0, 1, 2);
/// let required = bands.required_around(ChunkCoord::new(0, 0));
/// assert_eq!(required.len(), 25);
/// assert_eq!(required[&ChunkCoord::new(0, 0)], LodLevel::High);
/// assert_eq!(required[&ChunkCoord::new(2, -2)], LodLevel::Low);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LodBands {
    /// Chunks within this distance are High
    pub high: u32,
    /// Chunks within this distance are at least Medium
    pub medium: u32,
    /// Chunks within this distance are at least Low; beyond is not required
    pub low: u32,
}

impl Default for LodBands {
    fn default() -> Self {
        Self {
            high: 1,
            medium: 3,
            low: 6,
        }
    }
}

impl LodBands {
    /// Bands must be non-decreasing; narrower outer bands are widened
    pub fn new(high: u32, medium: u32, low: u32) -> Self {
        let medium = medium.max(high);
        let low = low.max(medium);
        Self { high, medium, low }
    }

    /// Tier for a chunk `distance` chunks away from the viewer's chunk
    pub fn lod_for_distance(&self, distance: u32) -> LodLevel {
        if distance <= self.high {
            LodLevel::High
        } else if distance <= self.medium {
            LodLevel::Medium
        } else if distance <= self.low {
            LodLevel::Low
        } else {
            LodLevel::Unloaded
        }
    }

    /// Required map for a viewer standing in `center`
    pub fn required_around(&self, center: ChunkCoord) -> HashMap<ChunkCoord, LodLevel> {
        let r = self.low as i32;
        let side = (2 * r + 1) as usize;
        let mut required = HashMap::with_capacity(side * side);
        for dz in -r..=r {
            for dx in -r..=r {
                let coord = center.offset(dx, dz);
                let lod = self.lod_for_distance(center.chebyshev_distance(coord));
                required.insert(coord, lod);
            }
        }
        required
    }

    /// Required map for a viewer at world position (x, z)
    pub fn required_at(&self, x: f32, z: f32, chunk_size: f32) -> HashMap<ChunkCoord, LodLevel> {
        self.required_around(ChunkCoord::from_world_pos(x, z, chunk_size))
    }
}
