//! Chunk grid coordinates

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Integer coordinate identifying a chunk in the horizontal world grid
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the world position (x, z)
    pub fn from_world_pos(x: f32, z: f32, chunk_size: f32) -> Self {
        Self {
            x: (x / chunk_size).floor() as i32,
            z: (z / chunk_size).floor() as i32,
        }
    }

    /// World-space origin (minimum corner) of this chunk on the XZ plane
    pub fn world_origin(&self, chunk_size: f32) -> Vec2 {
        Vec2::new(self.x as f32 * chunk_size, self.z as f32 * chunk_size)
    }

    /// World-space origin as a 3D point at height zero
    pub fn world_origin_3d(&self, chunk_size: f32) -> Vec3 {
        let o = self.world_origin(chunk_size);
        Vec3::new(o.x, 0.0, o.y)
    }

    /// Chebyshev distance in chunks
    pub fn chebyshev_distance(&self, other: ChunkCoord) -> u32 {
        (self.x - other.x).unsigned_abs().max((self.z - other.z).unsigned_abs())
    }

    /// Neighbor offset by (dx, dz)
    pub fn offset(&self, dx: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.z + dz)
    }
}
