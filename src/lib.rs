//! Terrastream - streaming, seeded procedural terrain
//!
//! Deterministic heightfields and vegetation per chunk, generated on a
//! worker pool and streamed in and out around players with LOD tiers.

pub mod core;
pub mod math;
pub mod terrain;
pub mod generation;
pub mod chunk;
pub mod streaming;
pub mod scene;
pub mod world;

pub use world::World;
