//! Chunk coordinates and the per-chunk lifecycle

pub mod coord;
pub mod entity;

pub use coord::ChunkCoord;
pub use entity::{ChunkEntity, ChunkState};
