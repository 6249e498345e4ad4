//! Background chunk generation on a fixed worker pool
//!
//! The owning thread enqueues coordinates; workers claim them one at a time,
//! synthesize without holding any lock, and park the result in a map the
//! owning thread drains once per tick. Results come back in arbitrary order.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use parking_lot::{Mutex, RwLock};

use super::signal::{lock, WakeSignal};
use crate::chunk::ChunkCoord;
use crate::core::Result;
use crate::generation::synthesizer::{ChunkSynthesizer, GeneratedChunk};

/// The scheduler operations the chunk store relies on
pub trait JobQueue {
    /// Submit a job; false when the coordinate is already queued or claimed
    fn enqueue(&self, coord: ChunkCoord) -> bool;

    /// Withdraw a job no worker has claimed yet; false otherwise
    fn cancel(&self, coord: ChunkCoord) -> bool;

    /// A worker is currently synthesizing `coord`
    fn is_claimed(&self, coord: ChunkCoord) -> bool;

    /// Take every result completed since the last drain
    fn drain_results(&self) -> HashMap<ChunkCoord, GeneratedChunk>;

    /// Version results must carry to be current
    fn config_version(&self) -> u64;
}

#[derive(Default)]
struct JobBoard {
    queue: VecDeque<ChunkCoord>,
    queued: HashSet<ChunkCoord>,
    claimed: HashSet<ChunkCoord>,
}

impl JobBoard {
    fn claim(&mut self) -> Option<ChunkCoord> {
        let coord = self.queue.pop_front()?;
        self.queued.remove(&coord);
        self.claimed.insert(coord);
        Some(coord)
    }
}

struct Shared {
    jobs: Mutex<JobBoard>,
    results: Mutex<HashMap<ChunkCoord, GeneratedChunk>>,
    signal: WakeSignal,
    stop: AtomicBool,
    synthesizer: RwLock<Arc<ChunkSynthesizer>>,
}

/// Fixed pool of generation workers
pub struct GenerationScheduler {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl GenerationScheduler {
    /// Spawn `worker_count` workers.
    ///
    /// Zero workers is allowed: jobs then stay queued, which lets callers
    /// inspect or cancel them deterministically.
    pub fn new(synthesizer: ChunkSynthesizer, worker_count: usize) -> Result<Self> {
        let shared = Arc::new(Shared {
            jobs: Mutex::new(JobBoard::default()),
            results: Mutex::new(HashMap::new()),
            signal: WakeSignal::new(),
            stop: AtomicBool::new(false),
            synthesizer: RwLock::new(Arc::new(synthesizer)),
        });
        let mut scheduler = Self {
            shared,
            workers: Vec::with_capacity(worker_count),
        };

        for id in 0..worker_count {
            let shared = Arc::clone(&scheduler.shared);
            let handle = std::thread::Builder::new()
                .name(format!("chunk-gen-{id}"))
                .spawn(move || worker_loop(id, shared))?;
            scheduler.workers.push(handle);
        }

        log::info!("Generation scheduler started with {} workers", worker_count);
        Ok(scheduler)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn is_running(&self) -> bool {
        !self.shared.stop.load(Ordering::Acquire)
    }

    /// Jobs waiting for a worker
    pub fn queued_len(&self) -> usize {
        lock(&self.shared.jobs).queue.len()
    }

    /// Jobs a worker is synthesizing right now
    pub fn claimed_len(&self) -> usize {
        lock(&self.shared.jobs).claimed.len()
    }

    pub fn is_queued(&self, coord: ChunkCoord) -> bool {
        lock(&self.shared.jobs).queued.contains(&coord)
    }

    /// Synthesizer new jobs run with
    pub fn synthesizer(&self) -> Arc<ChunkSynthesizer> {
        Arc::clone(&*self.shared.synthesizer.read())
    }

    /// Swap the synthesizer. Jobs already claimed finish under the old one
    /// and carry its version.
    pub fn reconfigure(&self, synthesizer: ChunkSynthesizer) {
        let version = synthesizer.version();
        *self.shared.synthesizer.write() = Arc::new(synthesizer);
        log::info!("Generation scheduler reconfigured to version {}", version);
    }

    /// Stop and join every worker.
    ///
    /// Posts the wake signal once per worker so each blocked worker wakes,
    /// sees the stop flag and exits. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() && !self.is_running() {
            return;
        }
        self.shared.stop.store(true, Ordering::Release);
        self.shared.signal.post(self.workers.len());

        let count = self.workers.len();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Chunk generation worker panicked");
            }
        }

        let dropped = {
            let mut jobs = lock(&self.shared.jobs);
            jobs.queued.clear();
            jobs.queue.drain(..).count()
        };
        log::info!(
            "Generation scheduler stopped ({} workers, {} queued jobs dropped)",
            count,
            dropped
        );
    }
}

impl JobQueue for GenerationScheduler {
    fn enqueue(&self, coord: ChunkCoord) -> bool {
        if !self.is_running() {
            return false;
        }
        {
            let mut jobs = lock(&self.shared.jobs);
            if jobs.queued.contains(&coord) || jobs.claimed.contains(&coord) {
                log::trace!("Chunk {:?} already scheduled", coord);
                return false;
            }
            jobs.queued.insert(coord);
            jobs.queue.push_back(coord);
        }
        self.shared.signal.post(1);
        true
    }

    fn cancel(&self, coord: ChunkCoord) -> bool {
        let mut jobs = lock(&self.shared.jobs);
        if !jobs.queued.remove(&coord) {
            return false;
        }
        jobs.queue.retain(|c| *c != coord);
        // The job's permit stays posted; a worker wakes, finds nothing, and waits again.
        true
    }

    fn is_claimed(&self, coord: ChunkCoord) -> bool {
        lock(&self.shared.jobs).claimed.contains(&coord)
    }

    fn drain_results(&self) -> HashMap<ChunkCoord, GeneratedChunk> {
        std::mem::take(&mut *lock(&self.shared.results))
    }

    fn config_version(&self) -> u64 {
        self.shared.synthesizer.read().version()
    }
}

impl Drop for GenerationScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(id: usize, shared: Arc<Shared>) {
    log::debug!("chunk-gen-{} started", id);
    loop {
        if shared.stop.load(Ordering::Acquire) {
            break;
        }
        shared.signal.wait();
        if shared.stop.load(Ordering::Acquire) {
            break;
        }

        let Some(coord) = lock(&shared.jobs).claim() else {
            continue;
        };
        let synthesizer = Arc::clone(&*shared.synthesizer.read());
        log::trace!("chunk-gen-{} claimed {:?}", id, coord);

        let chunk = synthesizer.synthesize(coord);

        // Release the claim before publishing so a re-enqueue triggered by
        // this result is never rejected as a duplicate.
        lock(&shared.jobs).claimed.remove(&coord);
        lock(&shared.results).insert(coord, chunk);
    }
    log::debug!("chunk-gen-{} stopped", id);
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::generation::config::WorldConfig;

    fn synthesizer(version: u64) -> ChunkSynthesizer {
        crate::core::logging::init_for_tests();
        let mut config = WorldConfig::default();
        config.chunk.size = 32.0;
        config.chunk.resolution = 8;
        ChunkSynthesizer::new(12345, Arc::new(config), version)
    }

    fn collect(
        scheduler: &GenerationScheduler,
        expected: usize,
    ) -> HashMap<ChunkCoord, GeneratedChunk> {
        let deadline = Instant::now() + Duration::from_secs(30);
        let mut all = HashMap::new();
        while all.len() < expected {
            assert!(Instant::now() < deadline, "timed out waiting for results");
            all.extend(scheduler.drain_results());
            std::thread::sleep(Duration::from_millis(2));
        }
        all
    }

    #[test]
    fn test_results_match_serial_synthesis() {
        let scheduler = GenerationScheduler::new(synthesizer(1), 3).unwrap();
        let coords = [ChunkCoord::new(0, 0), ChunkCoord::new(1, 0), ChunkCoord::new(-1, 2)];
        for c in coords {
            assert!(scheduler.enqueue(c));
        }

        let results = collect(&scheduler, coords.len());
        let serial = synthesizer(1);
        for c in coords {
            let expected = serial.synthesize(c);
            let got = &results[&c];
            assert_eq!(got.heightfield, expected.heightfield);
            assert_eq!(got.placements, expected.placements);
            assert_eq!(got.config_version, 1);
        }
    }

    #[test]
    fn test_enqueue_dedupes_queued() {
        let scheduler = GenerationScheduler::new(synthesizer(1), 0).unwrap();
        let c = ChunkCoord::new(4, 4);
        assert!(scheduler.enqueue(c));
        assert!(!scheduler.enqueue(c));
        assert_eq!(scheduler.queued_len(), 1);
        assert!(scheduler.is_queued(c));
    }

    #[test]
    fn test_enqueue_dedupes_claimed() {
        let scheduler = GenerationScheduler::new(synthesizer(1), 1).unwrap();
        let c = ChunkCoord::new(3, -1);

        // Holding the synthesizer parks the worker right after it claims the job.
        let parked = scheduler.shared.synthesizer.write();
        assert!(scheduler.enqueue(c));
        let deadline = Instant::now() + Duration::from_secs(30);
        while !scheduler.is_claimed(c) {
            assert!(Instant::now() < deadline, "worker never claimed the job");
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(!scheduler.enqueue(c));
        assert!(!scheduler.cancel(c));
        assert_eq!(scheduler.queued_len(), 0);
        assert_eq!(scheduler.claimed_len(), 1);
        drop(parked);

        let results = collect(&scheduler, 1);
        assert!(results.contains_key(&c));
        assert!(!scheduler.is_claimed(c));
        assert!(scheduler.enqueue(c));
        collect(&scheduler, 1);
    }

    #[test]
    fn test_cancel_unclaimed() {
        let scheduler = GenerationScheduler::new(synthesizer(1), 0).unwrap();
        let a = ChunkCoord::new(0, 0);
        let b = ChunkCoord::new(1, 0);
        scheduler.enqueue(a);
        scheduler.enqueue(b);
        assert!(scheduler.cancel(a));
        assert!(!scheduler.cancel(a));
        assert_eq!(scheduler.queued_len(), 1);
        assert!(!scheduler.is_queued(a));
        // Cancelled coordinates may be submitted again.
        assert!(scheduler.enqueue(a));
    }

    #[test]
    fn test_cancelled_job_never_completes() {
        let scheduler = GenerationScheduler::new(synthesizer(1), 0).unwrap();
        let c = ChunkCoord::new(0, 0);
        scheduler.enqueue(c);
        scheduler.cancel(c);
        assert!(scheduler.drain_results().is_empty());
        assert_eq!(scheduler.shared.signal.permits(), 1);
    }

    #[test]
    fn test_drain_empties_buffer() {
        let scheduler = GenerationScheduler::new(synthesizer(1), 2).unwrap();
        scheduler.enqueue(ChunkCoord::new(0, 0));
        collect(&scheduler, 1);
        assert!(scheduler.drain_results().is_empty());
        assert_eq!(scheduler.claimed_len(), 0);
    }

    #[test]
    fn test_shutdown_with_idle_workers() {
        let mut scheduler = GenerationScheduler::new(synthesizer(1), 4).unwrap();
        // Let the workers block on the signal first.
        std::thread::sleep(Duration::from_millis(20));
        scheduler.shutdown();
        assert_eq!(scheduler.worker_count(), 0);
        assert!(!scheduler.is_running());
        assert!(!scheduler.enqueue(ChunkCoord::new(0, 0)));
        scheduler.shutdown();
    }

    #[test]
    fn test_shutdown_with_pending_jobs() {
        let mut scheduler = GenerationScheduler::new(synthesizer(1), 2).unwrap();
        for x in 0..16 {
            scheduler.enqueue(ChunkCoord::new(x, 0));
        }
        scheduler.shutdown();
        assert_eq!(scheduler.queued_len(), 0);
        assert_eq!(scheduler.claimed_len(), 0);
    }

    #[test]
    fn test_drop_joins_workers() {
        let scheduler = GenerationScheduler::new(synthesizer(1), 2).unwrap();
        scheduler.enqueue(ChunkCoord::new(0, 0));
        drop(scheduler);
    }

    #[test]
    fn test_reconfigure_bumps_version() {
        let scheduler = GenerationScheduler::new(synthesizer(1), 1).unwrap();
        assert_eq!(scheduler.config_version(), 1);
        scheduler.reconfigure(synthesizer(2));
        assert_eq!(scheduler.config_version(), 2);
        assert_eq!(scheduler.synthesizer().version(), 2);

        scheduler.enqueue(ChunkCoord::new(2, 2));
        let results = collect(&scheduler, 1);
        assert_eq!(results[&ChunkCoord::new(2, 2)].config_version, 2);
    }

    #[test]
    fn test_worker_threads_named() {
        let scheduler = GenerationScheduler::new(synthesizer(1), 2).unwrap();
        let names: Vec<_> = scheduler
            .workers
            .iter()
            .filter_map(|h| h.thread().name().map(str::to_owned))
            .collect();
        assert_eq!(names, vec!["chunk-gen-0", "chunk-gen-1"]);
    }
}
