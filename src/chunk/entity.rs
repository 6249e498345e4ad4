//! Per-chunk lifecycle state machine
//!
//! ```text
//! Unloaded -> Queued -> Generating -> Generated -> Loading -> Loaded -> Unloading -> Unloaded
//! ```
//!
//! Only the owning thread drives transitions. The reference count is the one
//! field other threads may touch, so it sits behind its own lock.

use glam::Vec2;
use parking_lot::Mutex;

use super::coord::ChunkCoord;
use crate::core::{Error, Result};
use crate::generation::heightfield::Heightfield;
use crate::generation::placement::ObjectPlacement;
use crate::scene::builder::{ChunkContent, SceneBuilder};
use crate::streaming::lod::LodLevel;
use crate::streaming::signal::lock;

/// Lifecycle state of a chunk
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkState {
    Unloaded,
    /// Job submitted, no worker has claimed it
    Queued,
    /// A worker is synthesizing it
    Generating,
    /// Data is ready, no content built yet
    Generated,
    Loading,
    Loaded,
    Unloading,
}

impl ChunkState {
    /// A job for this chunk is outstanding
    pub fn is_pending(self) -> bool {
        matches!(self, ChunkState::Queued | ChunkState::Generating)
    }
}

/// One active chunk
#[derive(Debug)]
pub struct ChunkEntity {
    coord: ChunkCoord,
    state: ChunkState,
    lod: LodLevel,
    refs: Mutex<u32>,
    heightfield: Option<Heightfield>,
    placements: Vec<ObjectPlacement>,
    content: Option<ChunkContent>,
    config_version: u64,
}

impl ChunkEntity {
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            state: ChunkState::Unloaded,
            lod: LodLevel::Unloaded,
            refs: Mutex::new(0),
            heightfield: None,
            placements: Vec::new(),
            content: None,
            config_version: 0,
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    /// Current LOD; for chunks not yet loaded this is the LOD they will load at
    pub fn lod(&self) -> LodLevel {
        self.lod
    }

    pub fn heightfield(&self) -> Option<&Heightfield> {
        self.heightfield.as_ref()
    }

    pub fn placements(&self) -> &[ObjectPlacement] {
        &self.placements
    }

    pub fn content(&self) -> Option<&ChunkContent> {
        self.content.as_ref()
    }

    /// Config version of the loaded data
    pub fn config_version(&self) -> u64 {
        self.config_version
    }

    fn transition(&mut self, allowed: &[ChunkState], to: ChunkState) -> Result<()> {
        if !allowed.contains(&self.state) {
            return Err(Error::InvalidTransition {
                coord: self.coord,
                from: self.state,
                to,
            });
        }
        log::trace!("Chunk {:?}: {:?} -> {:?}", self.coord, self.state, to);
        self.state = to;
        Ok(())
    }

    /// Job submitted. Also valid while a job is outstanding, for re-submission
    /// after a stale result.
    pub fn mark_queued(&mut self) -> Result<()> {
        self.transition(
            &[ChunkState::Unloaded, ChunkState::Queued, ChunkState::Generating],
            ChunkState::Queued,
        )
    }

    /// A worker claimed the job
    pub fn begin_generation(&mut self) -> Result<()> {
        self.transition(&[ChunkState::Queued], ChunkState::Generating)
    }

    /// Synthesis finished; results may arrive before the claim was observed
    pub fn finish_generation(&mut self) -> Result<()> {
        self.transition(&[ChunkState::Queued, ChunkState::Generating], ChunkState::Generated)
    }

    /// Store the generated data and build scene content; only valid from Generated
    pub fn load_data<B: SceneBuilder + ?Sized>(
        &mut self,
        heightfield: Heightfield,
        placements: Vec<ObjectPlacement>,
        config_version: u64,
        scene: &mut B,
    ) -> Result<()> {
        self.transition(&[ChunkState::Generated], ChunkState::Loading)?;

        let content = scene.build_chunk(self.coord, &heightfield, &placements);
        scene.apply_lod(&content, self.lod);

        self.heightfield = Some(heightfield);
        self.placements = placements;
        self.content = Some(content);
        self.config_version = config_version;
        self.transition(&[ChunkState::Loading], ChunkState::Loaded)
    }

    /// Switch LOD tier. Returns false, touching nothing, when `lod` is current.
    pub fn set_lod<B: SceneBuilder + ?Sized>(&mut self, lod: LodLevel, scene: &mut B) -> bool {
        if self.lod == lod {
            return false;
        }
        log::trace!("Chunk {:?}: LOD {:?} -> {:?}", self.coord, self.lod, lod);
        self.lod = lod;
        if let Some(content) = &self.content {
            scene.apply_lod(content, lod);
        }
        true
    }

    /// Release content and drop data; valid from Loaded or Generated
    pub fn unload<B: SceneBuilder + ?Sized>(&mut self, scene: &mut B) -> Result<()> {
        self.transition(&[ChunkState::Loaded, ChunkState::Generated], ChunkState::Unloading)?;
        if let Some(content) = self.content.take() {
            scene.release_chunk(content);
        }
        self.heightfield = None;
        self.placements.clear();
        self.lod = LodLevel::Unloaded;
        self.transition(&[ChunkState::Unloading], ChunkState::Unloaded)
    }

    /// Increment the reference count, returning the new count
    pub fn add_reference(&self) -> u32 {
        let mut refs = lock(&self.refs);
        *refs += 1;
        *refs
    }

    /// Decrement the reference count (floored at zero), returning the new count
    pub fn remove_reference(&self) -> u32 {
        let mut refs = lock(&self.refs);
        if *refs == 0 {
            log::debug!("Chunk {:?}: reference count already zero", self.coord);
        }
        *refs = refs.saturating_sub(1);
        *refs
    }

    pub fn reference_count(&self) -> u32 {
        *lock(&self.refs)
    }

    /// No references left and fully loaded
    pub fn should_unload(&self) -> bool {
        self.state == ChunkState::Loaded && self.reference_count() == 0
    }

    /// Bilinear height at a chunk-local position, once data is loaded
    pub fn height_at(&self, local: Vec2) -> Option<f32> {
        self.heightfield
            .as_ref()
            .map(|hf| hf.sample_height(local.x, local.y))
    }
}
