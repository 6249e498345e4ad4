//! Scene side of chunk streaming: pooled instances, meshes, colliders
//!
//! Everything here runs on the owning thread only.

pub mod assets;
pub mod builder;
pub mod collision;
pub mod material;
pub mod pool;

pub use assets::{
    JsonMeshSource, LoadedMesh, MeshAsset, MeshLibrary, MeshSource, ProceduralMeshSource,
};
pub use builder::{ChunkContent, InstanceBody, PooledSceneBuilder, SceneBuilder, SceneInstance};
pub use collision::{Collider, ColliderKind};
pub use material::{MaterialHandle, TerrainMaterial};
pub use pool::{InstanceHandle, InstancePool};
