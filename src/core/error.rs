//! Error types for terrastream

use thiserror::Error;

use crate::chunk::{ChunkCoord, ChunkState};
use crate::generation::catalog::MeshId;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Asset {id:?} unavailable: {reason}")]
    Asset { id: MeshId, reason: String },

    #[error("Chunk {coord:?} cannot go from {from:?} to {to:?}")]
    InvalidTransition {
        coord: ChunkCoord,
        from: ChunkState,
        to: ChunkState,
    },

    #[error("Chunk {0:?} is not active")]
    ChunkNotFound(ChunkCoord),

    #[error("Scene instance not found")]
    InstanceNotFound,

    #[error("World has not been initialized with a seed")]
    NotInitialized,

    #[error("World is already initialized")]
    AlreadyInitialized,
}

impl Error {
    /// Stale handles and unknown coordinates are reported, never fatal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ChunkNotFound(_) | Error::InstanceNotFound)
    }
}
