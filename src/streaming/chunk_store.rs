//! Active chunk registry
//!
//! Owns exactly one `ChunkEntity` per active coordinate. Each player's
//! required map is diffed against the last one it sent; the difference
//! becomes reference count changes, job submissions and LOD switches. `tick`
//! applies finished generation results and retires chunks that have no
//! references left and that no player requires.

use std::collections::HashMap;

use glam::Vec2;

use super::lod::LodLevel;
use super::scheduler::JobQueue;
use crate::chunk::{ChunkCoord, ChunkEntity, ChunkState};
use crate::core::{Error, Result};
use crate::scene::builder::SceneBuilder;

/// Identifies one source of chunk requirements
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u32);

/// What one `tick` did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Chunks whose content was built this tick
    pub loaded: Vec<ChunkCoord>,
    /// Chunks released and removed from the registry
    pub unloaded: Vec<ChunkCoord>,
    /// Results dropped because nobody needs the chunk any more
    pub discarded: Vec<ChunkCoord>,
    /// Chunks resubmitted because their result predates a reconfiguration
    pub requeued: Vec<ChunkCoord>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
            && self.unloaded.is_empty()
            && self.discarded.is_empty()
            && self.requeued.is_empty()
    }
}

/// Registry of active chunks
#[derive(Default)]
pub struct ChunkStore {
    chunks: HashMap<ChunkCoord, ChunkEntity>,
    required: HashMap<PlayerId, HashMap<ChunkCoord, LodLevel>>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<&ChunkEntity> {
        self.chunks.get(&coord)
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.chunks.keys().copied()
    }

    pub fn count_in_state(&self, state: ChunkState) -> usize {
        self.chunks.values().filter(|c| c.state() == state).count()
    }

    /// Last required map a player sent
    pub fn required_by(&self, player: PlayerId) -> Option<&HashMap<ChunkCoord, LodLevel>> {
        self.required.get(&player)
    }

    pub fn player_count(&self) -> usize {
        self.required.len()
    }

    /// Replace a player's required map.
    ///
    /// Newly named chunks gain a reference (and a generation job if they are
    /// new); chunks the player no longer names lose one. Entries at
    /// `LodLevel::Unloaded` count as not required.
    pub fn update_required<Q, B>(
        &mut self,
        player: PlayerId,
        required: HashMap<ChunkCoord, LodLevel>,
        queue: &Q,
        scene: &mut B,
    ) where
        Q: JobQueue + ?Sized,
        B: SceneBuilder + ?Sized,
    {
        let required: HashMap<ChunkCoord, LodLevel> = required
            .into_iter()
            .filter(|(_, lod)| *lod != LodLevel::Unloaded)
            .collect();
        let previous = self.required.remove(&player).unwrap_or_default();

        let mut touched = Vec::new();
        for &coord in required.keys() {
            // A chunk this player already required can still be missing if
            // its references were released through the external API.
            if !previous.contains_key(&coord) || !self.chunks.contains_key(&coord) {
                self.acquire(coord, queue);
            }
            touched.push(coord);
        }
        for &coord in previous.keys() {
            if !required.contains_key(&coord) {
                if let Some(entity) = self.chunks.get(&coord) {
                    entity.remove_reference();
                }
                touched.push(coord);
            }
        }

        let (added, removed) = (
            required.keys().filter(|c| !previous.contains_key(c)).count(),
            previous.keys().filter(|c| !required.contains_key(c)).count(),
        );
        if !required.is_empty() {
            self.required.insert(player, required);
        }

        for coord in touched {
            let target = self.target_lod(coord);
            if target == LodLevel::Unloaded {
                continue;
            }
            if let Some(entity) = self.chunks.get_mut(&coord) {
                entity.set_lod(target, scene);
            }
        }

        if added > 0 || removed > 0 {
            log::debug!("{:?}: +{} / -{} required chunks", player, added, removed);
        }
    }

    /// Drop a player and every reference it held
    pub fn remove_player<Q, B>(&mut self, player: PlayerId, queue: &Q, scene: &mut B)
    where
        Q: JobQueue + ?Sized,
        B: SceneBuilder + ?Sized,
    {
        self.update_required(player, HashMap::new(), queue, scene);
    }

    /// Most detailed LOD any player asks for
    pub fn target_lod(&self, coord: ChunkCoord) -> LodLevel {
        Self::target_in(&self.required, coord)
    }

    fn target_in(
        required: &HashMap<PlayerId, HashMap<ChunkCoord, LodLevel>>,
        coord: ChunkCoord,
    ) -> LodLevel {
        required
            .values()
            .filter_map(|r| r.get(&coord).copied())
            .max()
            .unwrap_or(LodLevel::Unloaded)
    }

    /// A chunk stays active while it has references or any player requires it
    fn is_held(
        entity: &ChunkEntity,
        required: &HashMap<PlayerId, HashMap<ChunkCoord, LodLevel>>,
    ) -> bool {
        entity.reference_count() > 0
            || Self::target_in(required, entity.coord()) != LodLevel::Unloaded
    }

    fn acquire<Q: JobQueue + ?Sized>(&mut self, coord: ChunkCoord, queue: &Q) {
        let entity = self.chunks.entry(coord).or_insert_with(|| ChunkEntity::new(coord));
        entity.add_reference();
        if entity.state() == ChunkState::Unloaded {
            // Fresh entity
            if entity.mark_queued().is_ok() && !queue.enqueue(coord) {
                log::debug!("Chunk {:?} was already scheduled", coord);
            }
        }
    }

    /// Add a reference to an active chunk, returning the new count
    pub fn add_reference(&self, coord: ChunkCoord) -> Result<u32> {
        self.chunks
            .get(&coord)
            .map(ChunkEntity::add_reference)
            .ok_or(Error::ChunkNotFound(coord))
    }

    /// Remove a reference from an active chunk, returning the new count
    pub fn remove_reference(&self, coord: ChunkCoord) -> Result<u32> {
        self.chunks
            .get(&coord)
            .map(ChunkEntity::remove_reference)
            .ok_or(Error::ChunkNotFound(coord))
    }

    /// One drain-and-apply pass
    pub fn tick<Q, B>(&mut self, queue: &Q, scene: &mut B) -> TickReport
    where
        Q: JobQueue + ?Sized,
        B: SceneBuilder + ?Sized,
    {
        let mut report = TickReport::default();

        for entity in self.chunks.values_mut() {
            if entity.state() == ChunkState::Queued && queue.is_claimed(entity.coord()) {
                let _ = entity.begin_generation();
            }
        }

        let version = queue.config_version();
        for (coord, chunk) in queue.drain_results() {
            let Some(entity) = self.chunks.get_mut(&coord) else {
                log::debug!("Discarding result for inactive chunk {:?}", coord);
                report.discarded.push(coord);
                continue;
            };
            if !entity.state().is_pending() {
                log::debug!(
                    "Discarding duplicate result for {:?} in state {:?}",
                    coord,
                    entity.state()
                );
                report.discarded.push(coord);
                continue;
            }

            if !Self::is_held(entity, &self.required) {
                self.chunks.remove(&coord);
                report.discarded.push(coord);
                continue;
            }
            if chunk.config_version != version {
                log::debug!(
                    "Result for {:?} built under version {}, current is {}",
                    coord,
                    chunk.config_version,
                    version
                );
                if entity.mark_queued().is_ok() && queue.enqueue(coord) {
                    report.requeued.push(coord);
                }
                continue;
            }

            let applied = entity.finish_generation().and_then(|_| {
                entity.load_data(chunk.heightfield, chunk.placements, chunk.config_version, scene)
            });
            match applied {
                Ok(()) => report.loaded.push(coord),
                Err(e) => log::error!("Failed to load chunk {:?}: {}", coord, e),
            }
        }

        let idle: Vec<ChunkCoord> = self
            .chunks
            .values()
            .filter(|c| !Self::is_held(c, &self.required))
            .map(ChunkEntity::coord)
            .collect();
        for coord in idle {
            let Some(entity) = self.chunks.get_mut(&coord) else {
                continue;
            };
            let remove = match entity.state() {
                ChunkState::Loaded | ChunkState::Generated => match entity.unload(scene) {
                    Ok(()) => true,
                    Err(e) => {
                        log::error!("Failed to unload chunk {:?}: {}", coord, e);
                        false
                    }
                },
                ChunkState::Queued => queue.cancel(coord),
                ChunkState::Unloaded => true,
                // In flight; the result is discarded when it arrives.
                ChunkState::Generating | ChunkState::Loading | ChunkState::Unloading => false,
            };
            if remove {
                self.chunks.remove(&coord);
                report.unloaded.push(coord);
            }
        }

        if !report.is_empty() {
            log::debug!(
                "Tick: {} loaded, {} unloaded, {} discarded, {} requeued",
                report.loaded.len(),
                report.unloaded.len(),
                report.discarded.len(),
                report.requeued.len()
            );
        }
        report
    }

    /// Height at world (x, z) from a loaded chunk's heightfield
    pub fn height_at(&self, x: f32, z: f32, chunk_size: f32) -> Option<f32> {
        let coord = ChunkCoord::from_world_pos(x, z, chunk_size);
        let origin = coord.world_origin(chunk_size);
        self.chunks
            .get(&coord)
            .filter(|c| c.state() == ChunkState::Loaded)
            .and_then(|c| c.height_at(Vec2::new(x, z) - origin))
    }

    /// Unload everything that has content and forget all players
    pub fn clear<B: SceneBuilder + ?Sized>(&mut self, scene: &mut B) {
        for (_, mut entity) in self.chunks.drain() {
            if matches!(entity.state(), ChunkState::Loaded | ChunkState::Generated) {
                let _ = entity.unload(scene);
            }
        }
        self.required.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::generation::config::WorldConfig;
    use crate::generation::synthesizer::{ChunkSynthesizer, GeneratedChunk};
    use crate::scene::assets::ProceduralMeshSource;
    use crate::scene::builder::PooledSceneBuilder;

    /// Queue the test drives by hand: claim, complete, reconfigure.
    struct ManualQueue {
        synth: Mutex<ChunkSynthesizer>,
        config: Arc<WorldConfig>,
        queued: Mutex<Vec<ChunkCoord>>,
        claimed: Mutex<HashSet<ChunkCoord>>,
        results: Mutex<HashMap<ChunkCoord, GeneratedChunk>>,
    }

    impl ManualQueue {
        fn new(config: Arc<WorldConfig>) -> Self {
            Self {
                synth: Mutex::new(ChunkSynthesizer::new(12345, Arc::clone(&config), 1)),
                config,
                queued: Mutex::new(Vec::new()),
                claimed: Mutex::new(HashSet::new()),
                results: Mutex::new(HashMap::new()),
            }
        }

        fn claim(&self, coord: ChunkCoord) {
            let mut queued = self.queued.lock();
            let pos = queued.iter().position(|c| *c == coord).expect("not queued");
            queued.remove(pos);
            self.claimed.lock().insert(coord);
        }

        fn complete(&self, coord: ChunkCoord) {
            assert!(self.claimed.lock().remove(&coord), "not claimed");
            let chunk = self.synth.lock().synthesize(coord);
            self.results.lock().insert(coord, chunk);
        }

        fn run_all(&self) {
            let coords: Vec<_> = self.queued.lock().clone();
            for c in coords {
                self.claim(c);
                self.complete(c);
            }
        }

        fn bump_version(&self, version: u64) {
            *self.synth.lock() = ChunkSynthesizer::new(12345, Arc::clone(&self.config), version);
        }

        fn queued(&self) -> Vec<ChunkCoord> {
            self.queued.lock().clone()
        }
    }

    impl JobQueue for ManualQueue {
        fn enqueue(&self, coord: ChunkCoord) -> bool {
            let mut queued = self.queued.lock();
            if queued.contains(&coord) || self.claimed.lock().contains(&coord) {
                return false;
            }
            queued.push(coord);
            true
        }

        fn cancel(&self, coord: ChunkCoord) -> bool {
            let mut queued = self.queued.lock();
            let before = queued.len();
            queued.retain(|c| *c != coord);
            queued.len() != before
        }

        fn is_claimed(&self, coord: ChunkCoord) -> bool {
            self.claimed.lock().contains(&coord)
        }

        fn drain_results(&self) -> HashMap<ChunkCoord, GeneratedChunk> {
            std::mem::take(&mut *self.results.lock())
        }

        fn config_version(&self) -> u64 {
            self.synth.lock().version()
        }
    }

    fn setup() -> (ChunkStore, ManualQueue, PooledSceneBuilder<ProceduralMeshSource>) {
        let mut config = WorldConfig::default();
        config.chunk.size = 32.0;
        config.chunk.resolution = 8;
        let scene = PooledSceneBuilder::new(ProceduralMeshSource, &config);
        (ChunkStore::new(), ManualQueue::new(Arc::new(config)), scene)
    }

    fn required(entries: &[((i32, i32), LodLevel)]) -> HashMap<ChunkCoord, LodLevel> {
        entries
            .iter()
            .map(|&((x, z), lod)| (ChunkCoord::new(x, z), lod))
            .collect()
    }

    const P1: PlayerId = PlayerId(1);
    const P2: PlayerId = PlayerId(2);
    const ORIGIN: ChunkCoord = ChunkCoord::new(0, 0);

    #[test]
    fn test_new_requirement_enqueues_once() {
        let (mut store, queue, mut scene) = setup();
        store.update_required(P1, required(&[((0, 0), LodLevel::High)]), &queue, &mut scene);
        assert_eq!(queue.queued(), vec![ORIGIN]);
        assert_eq!(store.get(ORIGIN).unwrap().state(), ChunkState::Queued);

        // Same map again changes nothing.
        store.update_required(P1, required(&[((0, 0), LodLevel::High)]), &queue, &mut scene);
        assert_eq!(queue.queued().len(), 1);
        assert_eq!(store.get(ORIGIN).unwrap().reference_count(), 1);
    }

    #[test]
    fn test_claim_then_load() {
        let (mut store, queue, mut scene) = setup();
        store.update_required(P1, required(&[((0, 0), LodLevel::High)]), &queue, &mut scene);

        queue.claim(ORIGIN);
        store.tick(&queue, &mut scene);
        assert_eq!(store.get(ORIGIN).unwrap().state(), ChunkState::Generating);

        queue.complete(ORIGIN);
        let report = store.tick(&queue, &mut scene);
        assert_eq!(report.loaded, vec![ORIGIN]);
        let entity = store.get(ORIGIN).unwrap();
        assert_eq!(entity.state(), ChunkState::Loaded);
        assert_eq!(entity.lod(), LodLevel::High);
        assert!(!entity.heightfield().unwrap().is_empty());
        assert!(scene.visible_count() > 0);
    }

    #[test]
    fn test_unrequired_queued_job_cancelled() {
        let (mut store, queue, mut scene) = setup();
        store.update_required(P1, required(&[((0, 0), LodLevel::High)]), &queue, &mut scene);
        store.update_required(P1, HashMap::new(), &queue, &mut scene);

        let report = store.tick(&queue, &mut scene);
        assert_eq!(report.unloaded, vec![ORIGIN]);
        assert!(queue.queued().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_move_away_during_generation_then_back() {
        let (mut store, queue, mut scene) = setup();
        store.update_required(P1, required(&[((0, 0), LodLevel::High)]), &queue, &mut scene);
        queue.claim(ORIGIN);
        store.tick(&queue, &mut scene);

        // Player leaves while the worker is busy: entity stays until the result arrives.
        store.update_required(P1, HashMap::new(), &queue, &mut scene);
        store.tick(&queue, &mut scene);
        assert_eq!(store.get(ORIGIN).unwrap().state(), ChunkState::Generating);

        queue.complete(ORIGIN);
        let report = store.tick(&queue, &mut scene);
        assert_eq!(report.discarded, vec![ORIGIN]);
        assert!(store.is_empty());
        assert!(scene.pool().is_empty());

        // Coming back generates it fresh.
        store.update_required(P1, required(&[((0, 0), LodLevel::High)]), &queue, &mut scene);
        assert_eq!(queue.queued(), vec![ORIGIN]);
        queue.run_all();
        let report = store.tick(&queue, &mut scene);
        assert_eq!(report.loaded, vec![ORIGIN]);
    }

    #[test]
    fn test_return_before_result_reuses_job() {
        let (mut store, queue, mut scene) = setup();
        store.update_required(P1, required(&[((0, 0), LodLevel::High)]), &queue, &mut scene);
        queue.claim(ORIGIN);
        store.tick(&queue, &mut scene);

        store.update_required(P1, HashMap::new(), &queue, &mut scene);
        store.update_required(P1, required(&[((0, 0), LodLevel::Medium)]), &queue, &mut scene);
        // No duplicate job for the in-flight coordinate.
        assert!(queue.queued().is_empty());

        queue.complete(ORIGIN);
        let report = store.tick(&queue, &mut scene);
        assert_eq!(report.loaded, vec![ORIGIN]);
        assert_eq!(store.get(ORIGIN).unwrap().lod(), LodLevel::Medium);
    }

    #[test]
    fn test_two_players_share_chunk() {
        let (mut store, queue, mut scene) = setup();
        store.update_required(P1, required(&[((0, 0), LodLevel::Low)]), &queue, &mut scene);
        store.update_required(P2, required(&[((0, 0), LodLevel::High)]), &queue, &mut scene);
        queue.run_all();
        store.tick(&queue, &mut scene);

        let entity = store.get(ORIGIN).unwrap();
        assert_eq!(entity.reference_count(), 2);
        assert_eq!(entity.lod(), LodLevel::High);

        store.update_required(P2, HashMap::new(), &queue, &mut scene);
        let report = store.tick(&queue, &mut scene);
        assert!(report.unloaded.is_empty());
        let entity = store.get(ORIGIN).unwrap();
        assert_eq!(entity.reference_count(), 1);
        assert_eq!(entity.state(), ChunkState::Loaded);
        assert_eq!(entity.lod(), LodLevel::Low);

        store.remove_player(P1, &queue, &mut scene);
        assert!(store.get(ORIGIN).unwrap().should_unload());
        let report = store.tick(&queue, &mut scene);
        assert_eq!(report.unloaded, vec![ORIGIN]);
        assert!(scene.pool().is_empty());
        assert_eq!(store.player_count(), 0);
    }

    #[test]
    fn test_stale_version_requeued() {
        let (mut store, queue, mut scene) = setup();
        store.update_required(P1, required(&[((0, 0), LodLevel::High)]), &queue, &mut scene);
        queue.claim(ORIGIN);
        queue.complete(ORIGIN);
        queue.bump_version(2);

        let report = store.tick(&queue, &mut scene);
        assert_eq!(report.requeued, vec![ORIGIN]);
        assert_eq!(store.get(ORIGIN).unwrap().state(), ChunkState::Queued);

        queue.run_all();
        let report = store.tick(&queue, &mut scene);
        assert_eq!(report.loaded, vec![ORIGIN]);
        assert_eq!(store.get(ORIGIN).unwrap().config_version(), 2);
    }

    #[test]
    fn test_result_for_unknown_chunk_discarded() {
        let (mut store, queue, mut scene) = setup();
        queue.enqueue(ChunkCoord::new(9, 9));
        queue.run_all();
        let report = store.tick(&queue, &mut scene);
        assert_eq!(report.discarded, vec![ChunkCoord::new(9, 9)]);
        assert!(store.is_empty());
    }

    #[test]
    fn test_reference_api_reports_missing() {
        let (mut store, queue, mut scene) = setup();
        assert!(store.add_reference(ORIGIN).unwrap_err().is_not_found());
        assert!(store.remove_reference(ORIGIN).unwrap_err().is_not_found());

        store.update_required(P1, required(&[((0, 0), LodLevel::High)]), &queue, &mut scene);
        assert_eq!(store.add_reference(ORIGIN).unwrap(), 2);
        assert_eq!(store.remove_reference(ORIGIN).unwrap(), 1);
        assert_eq!(store.remove_reference(ORIGIN).unwrap(), 0);
        assert_eq!(store.remove_reference(ORIGIN).unwrap(), 0);
    }

    #[test]
    fn test_required_chunk_survives_external_release() {
        let (mut store, queue, mut scene) = setup();
        store.update_required(P1, required(&[((0, 0), LodLevel::High)]), &queue, &mut scene);
        queue.run_all();
        store.tick(&queue, &mut scene);

        assert_eq!(store.remove_reference(ORIGIN).unwrap(), 0);
        let report = store.tick(&queue, &mut scene);
        assert!(report.unloaded.is_empty());
        assert_eq!(store.get(ORIGIN).unwrap().state(), ChunkState::Loaded);

        store.remove_player(P1, &queue, &mut scene);
        let report = store.tick(&queue, &mut scene);
        assert_eq!(report.unloaded, vec![ORIGIN]);
    }

    #[test]
    fn test_external_reference_outlives_player() {
        let (mut store, queue, mut scene) = setup();
        store.update_required(P1, required(&[((0, 0), LodLevel::High)]), &queue, &mut scene);
        queue.run_all();
        store.tick(&queue, &mut scene);
        assert_eq!(store.add_reference(ORIGIN).unwrap(), 2);

        store.remove_player(P1, &queue, &mut scene);
        store.tick(&queue, &mut scene);
        assert!(store.contains(ORIGIN));

        assert_eq!(store.remove_reference(ORIGIN).unwrap(), 0);
        let report = store.tick(&queue, &mut scene);
        assert_eq!(report.unloaded, vec![ORIGIN]);
    }

    #[test]
    fn test_unloaded_lod_entries_ignored() {
        let (mut store, queue, mut scene) = setup();
        store.update_required(
            P1,
            required(&[((0, 0), LodLevel::High), ((5, 5), LodLevel::Unloaded)]),
            &queue,
            &mut scene,
        );
        assert_eq!(store.len(), 1);
        assert!(!store.contains(ChunkCoord::new(5, 5)));
    }

    #[test]
    fn test_height_at_uses_loaded_chunk() {
        let (mut store, queue, mut scene) = setup();
        store.update_required(P1, required(&[((-1, 0), LodLevel::High)]), &queue, &mut scene);
        assert!(store.height_at(-10.0, 5.0, 32.0).is_none());
        queue.run_all();
        store.tick(&queue, &mut scene);

        let h = store.height_at(-12.0, 4.0, 32.0).unwrap();
        let expected = queue.synth.lock().height_at(-12.0, 4.0);
        assert!((h - expected).abs() < 1e-3);
        assert!(store.height_at(40.0, 4.0, 32.0).is_none());
    }

    #[test]
    fn test_clear_releases_content() {
        let (mut store, queue, mut scene) = setup();
        store.update_required(
            P1,
            required(&[((0, 0), LodLevel::High), ((1, 0), LodLevel::High)]),
            &queue,
            &mut scene,
        );
        queue.run_all();
        store.tick(&queue, &mut scene);
        assert_eq!(store.count_in_state(ChunkState::Loaded), 2);

        store.clear(&mut scene);
        assert!(store.is_empty());
        assert!(scene.pool().is_empty());
    }
}
