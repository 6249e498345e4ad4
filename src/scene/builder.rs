//! Scene builder: placement records in, pooled instances out.
//!
//! The generation core never touches the scene directly. A chunk hands its
//! heightfield and placements to a `SceneBuilder` and gets back an opaque
//! `ChunkContent` of instance handles; visibility and release go through the
//! same interface.

use std::sync::Arc;

use glam::{Affine3A, Vec3};

use super::assets::{LoadedMesh, MeshLibrary, MeshSource};
use super::collision::Collider;
use super::pool::{InstanceHandle, InstancePool};
use crate::chunk::ChunkCoord;
use crate::generation::config::WorldConfig;
use crate::generation::heightfield::Heightfield;
use crate::generation::placement::{DetailClass, ObjectPlacement};
use crate::streaming::lod::LodLevel;

/// Handles for everything one chunk instantiated
#[derive(Debug)]
pub struct ChunkContent {
    pub coord: ChunkCoord,
    pub terrain: InstanceHandle,
    /// Trees and large rocks
    pub large: Vec<InstanceHandle>,
    /// Grass and small rocks
    pub fine: Vec<InstanceHandle>,
    /// Records dropped because their mesh was unavailable
    pub skipped: usize,
}

impl ChunkContent {
    pub fn object_count(&self) -> usize {
        self.large.len() + self.fine.len()
    }

    pub fn handles(&self) -> impl Iterator<Item = InstanceHandle> + '_ {
        std::iter::once(self.terrain)
            .chain(self.large.iter().copied())
            .chain(self.fine.iter().copied())
    }
}

/// Turns chunk data into scene content
pub trait SceneBuilder {
    /// Instantiate terrain and objects, all initially hidden
    fn build_chunk(
        &mut self,
        coord: ChunkCoord,
        heightfield: &Heightfield,
        placements: &[ObjectPlacement],
    ) -> ChunkContent;

    /// Show the tiers `lod` includes and hide the rest; returns instances toggled
    fn apply_lod(&mut self, content: &ChunkContent, lod: LodLevel) -> usize;

    /// Return every instance of the chunk to the pool
    fn release_chunk(&mut self, content: ChunkContent);

    /// Pick up a new configuration (catalog, chunk size)
    fn reconfigure(&mut self, _config: &WorldConfig) {}
}

/// What an instance draws and collides with
#[derive(Debug)]
pub enum InstanceBody {
    Terrain { collider: Collider },
    Object { mesh: Arc<LoadedMesh>, detail: DetailClass },
}

/// One pooled scene instance
#[derive(Debug)]
pub struct SceneInstance {
    pub coord: ChunkCoord,
    /// Chunk-local to world
    pub transform: Affine3A,
    pub body: InstanceBody,
    pub visible: bool,
}

impl SceneInstance {
    fn visible_at(&self, lod: LodLevel) -> bool {
        match &self.body {
            InstanceBody::Terrain { .. } => lod.shows_terrain(),
            InstanceBody::Object { detail: DetailClass::Large, .. } => lod.shows_large_objects(),
            InstanceBody::Object { detail: DetailClass::Fine, .. } => lod.shows_fine_detail(),
        }
    }

    pub fn collider(&self) -> &Collider {
        match &self.body {
            InstanceBody::Terrain { collider } => collider,
            InstanceBody::Object { mesh, .. } => &mesh.collider,
        }
    }
}

/// `SceneBuilder` backed by a mesh library and an instance pool
pub struct PooledSceneBuilder<S: MeshSource> {
    library: MeshLibrary<S>,
    pool: InstancePool<SceneInstance>,
    chunk_size: f32,
    visibility_toggles: u64,
}

impl<S: MeshSource> PooledSceneBuilder<S> {
    pub fn new(source: S, config: &WorldConfig) -> Self {
        Self {
            library: MeshLibrary::new(source, config.assets.clone()),
            pool: InstancePool::new(),
            chunk_size: config.chunk.size,
            visibility_toggles: 0,
        }
    }

    pub fn library(&self) -> &MeshLibrary<S> {
        &self.library
    }

    pub fn pool(&self) -> &InstancePool<SceneInstance> {
        &self.pool
    }

    pub fn instance(&self, handle: InstanceHandle) -> Option<&SceneInstance> {
        self.pool.get(handle)
    }

    pub fn visible_count(&self) -> usize {
        self.pool.iter().filter(|(_, i)| i.visible).count()
    }

    /// Visibility flips performed since creation
    pub fn visibility_toggles(&self) -> u64 {
        self.visibility_toggles
    }
}

impl<S: MeshSource> SceneBuilder for PooledSceneBuilder<S> {
    fn build_chunk(
        &mut self,
        coord: ChunkCoord,
        heightfield: &Heightfield,
        placements: &[ObjectPlacement],
    ) -> ChunkContent {
        let chunk_transform = Affine3A::from_translation(coord.world_origin_3d(self.chunk_size));
        let terrain = self.pool.insert(SceneInstance {
            coord,
            transform: chunk_transform,
            body: InstanceBody::Terrain {
                collider: Collider::for_terrain(heightfield),
            },
            visible: false,
        });

        let grass_mesh = self.library.grass_mesh_id();
        let mut content = ChunkContent {
            coord,
            terrain,
            large: Vec::new(),
            fine: Vec::new(),
            skipped: 0,
        };

        for placement in placements {
            let Some(id) = placement.mesh().or(grass_mesh) else {
                content.skipped += 1;
                continue;
            };
            let mesh = match self.library.get_or_load(id) {
                Ok(mesh) => mesh,
                Err(_) => {
                    content.skipped += 1;
                    continue;
                }
            };

            let detail = placement.detail();
            let handle = self.pool.insert(SceneInstance {
                coord,
                transform: chunk_transform * placement.local_transform(),
                body: InstanceBody::Object { mesh, detail },
                visible: false,
            });
            match detail {
                DetailClass::Large => content.large.push(handle),
                DetailClass::Fine => content.fine.push(handle),
            }
        }

        if content.skipped > 0 {
            log::warn!("Chunk {:?}: {} placements had no usable mesh", coord, content.skipped);
        }
        log::debug!(
            "Built chunk {:?}: {} large, {} fine instances",
            coord,
            content.large.len(),
            content.fine.len()
        );
        content
    }

    fn apply_lod(&mut self, content: &ChunkContent, lod: LodLevel) -> usize {
        let mut toggled = 0;
        for handle in content.handles() {
            let Some(instance) = self.pool.get_mut(handle) else {
                log::debug!("Chunk {:?}: stale instance {:?}", content.coord, handle);
                continue;
            };
            let visible = instance.visible_at(lod);
            if instance.visible != visible {
                instance.visible = visible;
                toggled += 1;
            }
        }
        self.visibility_toggles += toggled as u64;
        toggled
    }

    fn release_chunk(&mut self, content: ChunkContent) {
        let mut stale = 0;
        for handle in content.handles() {
            if let Err(e) = self.pool.remove(handle) {
                debug_assert!(e.is_not_found());
                stale += 1;
            }
        }
        if stale > 0 {
            log::debug!("Chunk {:?}: {} instances were already released", content.coord, stale);
        }
    }

    fn reconfigure(&mut self, config: &WorldConfig) {
        self.library.set_catalog(config.assets.clone());
        self.chunk_size = config.chunk.size;
    }
}
