//! Chunk streaming: worker pool, active-chunk registry and LOD tiers
//!
//! The owning thread calls `ChunkStore::update_required` whenever a player's
//! required map changes and `ChunkStore::tick` once per frame. Worker
//! threads only ever run chunk synthesis.

pub mod chunk_store;
pub mod lod;
pub mod scheduler;
pub mod signal;

pub use chunk_store::{ChunkStore, PlayerId, TickReport};
pub use lod::{LodBands, LodLevel};
pub use scheduler::{GenerationScheduler, JobQueue};
pub use signal::WakeSignal;
