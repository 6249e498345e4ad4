//! World facade: one session of streamed, seeded terrain.
//!
//! Ties the generation scheduler, the chunk store and a scene builder
//! together behind the calls the rest of the game makes: initialize with a
//! seed, feed required maps, tick once per frame, query heights.

use std::collections::HashMap;
use std::sync::Arc;

use crate::chunk::{ChunkCoord, ChunkEntity};
use crate::core::{Error, Result};
use crate::generation::config::WorldConfig;
use crate::generation::synthesizer::ChunkSynthesizer;
use crate::scene::builder::SceneBuilder;
use crate::scene::material::TerrainMaterial;
use crate::streaming::chunk_store::{ChunkStore, PlayerId, TickReport};
use crate::streaming::lod::LodLevel;
use crate::streaming::scheduler::GenerationScheduler;
use crate::terrain::biome::BiomeCategory;

struct Session {
    seed: u32,
    scheduler: GenerationScheduler,
}

/// Streamed world owned by the interactive thread
pub struct World<B: SceneBuilder> {
    config: Arc<WorldConfig>,
    version: u64,
    material: Arc<TerrainMaterial>,
    store: ChunkStore,
    scene: B,
    session: Option<Session>,
}

impl<B: SceneBuilder> World<B> {
    /// Validate the config; no threads start until `initialize`
    pub fn new(config: WorldConfig, scene: B) -> Result<Self> {
        config.validate()?;
        let version = 1;
        Ok(Self {
            material: TerrainMaterial::from_config(&config.biomes, version),
            config: Arc::new(config),
            version,
            store: ChunkStore::new(),
            scene,
            session: None,
        })
    }

    /// Fix the session seed and start the generation workers
    pub fn initialize(&mut self, seed: u32) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        let synthesizer = ChunkSynthesizer::new(seed, Arc::clone(&self.config), self.version);
        let scheduler = GenerationScheduler::new(synthesizer, self.config.worker_threads())?;
        log::info!(
            "World initialized: seed {}, {} m chunks at resolution {}",
            seed,
            self.config.chunk.size,
            self.config.chunk.resolution
        );
        self.session = Some(Session { seed, scheduler });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    pub fn seed(&self) -> Option<u32> {
        self.session.as_ref().map(|s| s.seed)
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::NotInitialized)
    }

    /// Replace a player's required `{coordinate -> LOD}` map
    pub fn update_required(
        &mut self,
        player: PlayerId,
        required: HashMap<ChunkCoord, LodLevel>,
    ) -> Result<()> {
        let session = self.session.as_ref().ok_or(Error::NotInitialized)?;
        self.store
            .update_required(player, required, &session.scheduler, &mut self.scene);
        Ok(())
    }

    /// Forget a player and release its chunks
    pub fn remove_player(&mut self, player: PlayerId) -> Result<()> {
        let session = self.session.as_ref().ok_or(Error::NotInitialized)?;
        self.store.remove_player(player, &session.scheduler, &mut self.scene);
        Ok(())
    }

    pub fn add_reference(&self, coord: ChunkCoord) -> Result<u32> {
        self.store.add_reference(coord)
    }

    pub fn remove_reference(&self, coord: ChunkCoord) -> Result<u32> {
        self.store.remove_reference(coord)
    }

    /// Apply finished generation and retire unreferenced chunks
    pub fn tick(&mut self) -> Result<TickReport> {
        let session = self.session.as_ref().ok_or(Error::NotInitialized)?;
        Ok(self.store.tick(&session.scheduler, &mut self.scene))
    }

    /// Terrain height at world (x, z).
    ///
    /// Loaded chunks answer from their heightfield, so the value matches the
    /// rendered surface; elsewhere the height function is evaluated directly.
    pub fn height_at(&self, x: f32, z: f32) -> Result<f32> {
        let session = self.session()?;
        if let Some(h) = self.store.height_at(x, z, self.config.chunk.size) {
            return Ok(h);
        }
        Ok(session.scheduler.synthesizer().height_at(x, z))
    }

    /// Dominant biome at world (x, z)
    pub fn biome_at(&self, x: f32, z: f32) -> Result<BiomeCategory> {
        let session = self.session()?;
        Ok(session.scheduler.synthesizer().classifier().classify(x, z))
    }

    /// Swap in a new configuration, returning its version.
    ///
    /// Loaded chunks keep their content; jobs finished under the previous
    /// version are regenerated. Chunk geometry is fixed for the life of a
    /// session.
    pub fn reconfigure(&mut self, config: WorldConfig) -> Result<u64> {
        config.validate()?;
        if self.session.is_some() && config.chunk != self.config.chunk {
            return Err(Error::Config(
                "chunk size and resolution cannot change after initialize".into(),
            ));
        }

        self.version += 1;
        self.config = Arc::new(config);
        self.material = TerrainMaterial::from_config(&self.config.biomes, self.version);
        self.scene.reconfigure(&self.config);
        if let Some(session) = &self.session {
            let synthesizer =
                ChunkSynthesizer::new(session.seed, Arc::clone(&self.config), self.version);
            session.scheduler.reconfigure(synthesizer);
        }
        log::info!("World reconfigured to version {}", self.version);
        Ok(self.version)
    }

    pub fn config_version(&self) -> u64 {
        self.version
    }

    pub fn config(&self) -> &Arc<WorldConfig> {
        &self.config
    }

    /// Shared material handle for the renderer
    pub fn terrain_material(&self) -> Arc<TerrainMaterial> {
        Arc::clone(&self.material)
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&ChunkEntity> {
        self.store.get(coord)
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn scene(&self) -> &B {
        &self.scene
    }

    /// Stop the workers and release every chunk
    pub fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.scheduler.shutdown();
            self.store.clear(&mut self.scene);
            log::info!("World shut down");
        }
    }
}

impl<B: SceneBuilder> Drop for World<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
