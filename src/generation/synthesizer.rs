//! Chunk synthesis: heightfield + object placements for one coordinate.
//!
//! `synthesize` is reentrant and touches no shared mutable state, so any
//! number of chunks can be built concurrently from one `ChunkSynthesizer`.

use std::f32::consts::TAU;
use std::sync::Arc;

use glam::Vec3;
use noise::{Fbm, NoiseFn, Perlin};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::catalog::MeshId;
use super::config::WorldConfig;
use super::heightfield::{Heightfield, TerrainVertex};
use super::placement::ObjectPlacement;
use crate::chunk::ChunkCoord;
use crate::terrain::biome::{BiomeCategory, BiomeClassifier, BiomeProfile};

/// Output of synthesizing one chunk
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedChunk {
    pub coord: ChunkCoord,
    pub heightfield: Heightfield,
    pub placements: Vec<ObjectPlacement>,
    /// Config version the chunk was built under
    pub config_version: u64,
}

impl GeneratedChunk {
    pub fn tree_count(&self) -> usize {
        self.placements.iter().filter(|p| p.is_tree()).count()
    }

    pub fn rock_count(&self) -> usize {
        self.placements.iter().filter(|p| p.is_rock()).count()
    }

    pub fn grass_count(&self) -> usize {
        self.placements.iter().filter(|p| p.is_grass()).count()
    }
}

/// Deterministic chunk builder for one seed and config
pub struct ChunkSynthesizer {
    seed: u32,
    version: u64,
    config: Arc<WorldConfig>,
    classifier: BiomeClassifier,
    density: Fbm<Perlin>,
}

/// Candidate kinds drawn during rejection sampling
#[derive(Clone, Copy)]
enum Candidate {
    Tree,
    Rock,
    Grass,
}

impl ChunkSynthesizer {
    /// Create a synthesizer; `version` tags every chunk it produces
    pub fn new(seed: u32, config: Arc<WorldConfig>, version: u64) -> Self {
        let classifier = BiomeClassifier::new(seed, config.terrain.clone(), config.biomes.clone());
        let density = config.placement.density.fbm(seed.wrapping_add(12));
        Self {
            seed,
            version,
            config,
            classifier,
            density,
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn config(&self) -> &Arc<WorldConfig> {
        &self.config
    }

    pub fn classifier(&self) -> &BiomeClassifier {
        &self.classifier
    }

    /// Exact terrain height at world (x, z)
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        self.classifier.height_at(x, z)
    }

    /// Build the heightfield and placements for `coord`
    pub fn synthesize(&self, coord: ChunkCoord) -> GeneratedChunk {
        let heightfield = self.build_heightfield(coord);
        let placements = self.place_objects(coord, &heightfield);
        log::debug!(
            "Synthesized chunk {:?}: {} vertices, {} placements",
            coord,
            heightfield.vertices().len(),
            placements.len()
        );
        GeneratedChunk {
            coord,
            heightfield,
            placements,
            config_version: self.version,
        }
    }

    /// Synthesize many chunks in parallel; output order matches `coords`
    pub fn synthesize_batch(&self, coords: &[ChunkCoord]) -> Vec<GeneratedChunk> {
        coords.par_iter().map(|&coord| self.synthesize(coord)).collect()
    }

    /// Per-chunk vegetation density factor from low-frequency noise
    pub fn density_factor(&self, coord: ChunkCoord) -> f32 {
        let size = self.config.chunk.size as f64;
        let cx = (coord.x as f64 + 0.5) * size;
        let cz = (coord.z as f64 + 0.5) * size;
        let n = ((self.density.get([cx, cz]) as f32 + 1.0) * 0.5).clamp(0.0, 1.0);
        self.config.placement.density_range.lerp(n)
    }

    fn build_heightfield(&self, coord: ChunkCoord) -> Heightfield {
        let res = self.config.chunk.resolution;
        let size = self.config.chunk.size;
        let step = size as f64 / res as f64;
        let step_f = step as f32;

        // Apron of one sample on every side so edge normals see the
        // neighbours' triangles too.
        let side = (res + 1) as usize;
        let apron = side + 2;
        let base_x = coord.x as i64 * res as i64 - 1;
        let base_z = coord.z as i64 * res as i64 - 1;

        let mut apron_heights = Vec::with_capacity(apron * apron);
        for j in 0..apron {
            let wz = (base_z + j as i64) as f64 * step;
            for i in 0..apron {
                let wx = (base_x + i as i64) as f64 * step;
                apron_heights.push(self.classifier.terrain().height_at_f64(wx, wz));
            }
        }

        // Area-weighted face normals accumulated per vertex. Edge vectors are
        // built from the step, not absolute positions, so shared vertices
        // get identical sums in both neighbouring chunks.
        let mut normals = vec![Vec3::ZERO; apron * apron];
        for j in 0..apron - 1 {
            for i in 0..apron - 1 {
                let i00 = j * apron + i;
                let i10 = i00 + 1;
                let i01 = i00 + apron;
                let i11 = i01 + 1;
                let (h00, h10, h01, h11) = (
                    apron_heights[i00],
                    apron_heights[i10],
                    apron_heights[i01],
                    apron_heights[i11],
                );

                let n0 =
                    Vec3::new(0.0, h01 - h00, step_f).cross(Vec3::new(step_f, h10 - h00, 0.0));
                let n1 =
                    Vec3::new(-step_f, h01 - h10, step_f).cross(Vec3::new(0.0, h11 - h10, step_f));
                for idx in [i00, i01, i10] {
                    normals[idx] += n0;
                }
                for idx in [i10, i01, i11] {
                    normals[idx] += n1;
                }
            }
        }

        let mut vertices = Vec::with_capacity(side * side);
        let mut heights = Vec::with_capacity(side * side);
        for j in 0..side {
            let wz = (base_z + 1 + j as i64) as f64 * step;
            for i in 0..side {
                let wx = (base_x + 1 + i as i64) as f64 * step;
                let a = (j + 1) * apron + (i + 1);
                let h = apron_heights[a];
                let normal = normals[a].try_normalize().unwrap_or(Vec3::Y);
                let weights = self.classifier.sample_with_height(wx, wz, h).weights;

                heights.push(h);
                vertices.push(TerrainVertex {
                    position: [(i as f64 * step) as f32, h, (j as f64 * step) as f32],
                    normal: normal.to_array(),
                    uv: [i as f32 / res as f32, j as f32 / res as f32],
                    blend: weights.as_array(),
                });
            }
        }

        Heightfield::from_parts(res, size, vertices, heights)
    }

    fn place_objects(&self, coord: ChunkCoord, heightfield: &Heightfield) -> Vec<ObjectPlacement> {
        let placement = &self.config.placement;
        let factor = self.density_factor(coord);
        let scaled = |base: u32| (base as f32 * factor).round() as u32;

        let mut rng = ChaCha8Rng::seed_from_u64(chunk_seed(self.seed, coord));
        let mut out = Vec::new();
        let mut skipped = 0usize;

        for (kind, count) in [
            (Candidate::Tree, scaled(placement.trees_per_chunk)),
            (Candidate::Rock, scaled(placement.rocks_per_chunk)),
            (Candidate::Grass, scaled(placement.grass_per_chunk)),
        ] {
            for _ in 0..count {
                match self.draw_candidate(kind, coord, heightfield, &mut rng) {
                    Draw::Accepted(p) => out.push(p),
                    Draw::Rejected => {}
                    Draw::MissingAsset => skipped += 1,
                }
            }
        }

        if skipped > 0 {
            log::warn!("Chunk {:?}: skipped {} placements with missing assets", coord, skipped);
        }
        out
    }

    fn draw_candidate(
        &self,
        kind: Candidate,
        coord: ChunkCoord,
        heightfield: &Heightfield,
        rng: &mut ChaCha8Rng,
    ) -> Draw {
        let size = self.config.chunk.size;
        // Every candidate consumes the same draws whatever its fate, so one
        // rejection never shifts the sequence of the next.
        let x = rng.random::<f32>() * size;
        let z = rng.random::<f32>() * size;
        let roll = rng.random::<f32>();
        let yaw = rng.random::<f32>() * TAU;
        let scale_t = rng.random::<f32>();
        let pick = rng.random::<u32>();

        // Keep points strictly inside the chunk even if x rounds up to size.
        let x = x.min(size * (1.0 - f32::EPSILON));
        let z = z.min(size * (1.0 - f32::EPSILON));
        let origin = coord.world_origin(size);
        let biome = self.classifier.classify(origin.x + x, origin.y + z);
        let profile = self.config.biomes.profile(biome);

        let density = match kind {
            Candidate::Tree => profile.tree_density,
            Candidate::Rock => profile.rock_density,
            Candidate::Grass => profile.grass_density,
        };
        if roll >= density {
            return Draw::Rejected;
        }

        let position = Vec3::new(x, heightfield.sample_height(x, z), z);
        match kind {
            Candidate::Tree => match self.pick_asset(&profile.tree_assets, pick, biome) {
                Some(mesh) => Draw::Accepted(ObjectPlacement::Tree {
                    position,
                    yaw,
                    scale: profile.tree_scale.lerp(scale_t),
                    mesh,
                    biome,
                }),
                None => Draw::MissingAsset,
            },
            Candidate::Rock => match self.pick_asset(&profile.rock_assets, pick, biome) {
                Some(mesh) => Draw::Accepted(ObjectPlacement::Rock {
                    position,
                    yaw,
                    scale: profile.rock_scale.lerp(scale_t),
                    mesh,
                    biome,
                }),
                None => Draw::MissingAsset,
            },
            Candidate::Grass => Draw::Accepted(ObjectPlacement::GrassPatch {
                position,
                yaw,
                scale: 0.75 + scale_t * 0.5,
                density: grass_density(profile, scale_t),
            }),
        }
    }

    fn pick_asset(&self, pool: &[MeshId], pick: u32, biome: BiomeCategory) -> Option<MeshId> {
        if pool.is_empty() {
            log::debug!("{:?} has an empty asset pool", biome);
            return None;
        }
        let id = pool[pick as usize % pool.len()];
        if !self.config.assets.contains(id) {
            log::debug!("{:?} picked unknown asset {:?}", biome, id);
            return None;
        }
        Some(id)
    }
}

enum Draw {
    Accepted(ObjectPlacement),
    Rejected,
    MissingAsset,
}

fn grass_density(profile: &BiomeProfile, t: f32) -> f32 {
    (profile.grass_density * (0.5 + 0.5 * t)).clamp(0.0, 1.0)
}

/// Stable 64-bit seed for one chunk's placement RNG
fn chunk_seed(seed: u32, coord: ChunkCoord) -> u64 {
    let mut h = (seed as u64) ^ 0x9E37_79B9_7F4A_7C15;
    h ^= ((coord.x as u32 as u64) << 32) | coord.z as u32 as u64;
    // splitmix64 finalizer
    h = (h ^ (h >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^ (h >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::config::ChunkParams;

    fn test_config() -> WorldConfig {
        WorldConfig {
            chunk: ChunkParams {
                size: 32.0,
                resolution: 8,
            },
            ..Default::default()
        }
    }

    fn synthesizer(seed: u32) -> ChunkSynthesizer {
        ChunkSynthesizer::new(seed, Arc::new(test_config()), 1)
    }

    fn assert_bit_identical(a: &GeneratedChunk, b: &GeneratedChunk) {
        assert_eq!(a.coord, b.coord);
        let bits = |c: &GeneratedChunk| -> Vec<u32> {
            c.heightfield.heights().iter().map(|h| h.to_bits()).collect()
        };
        assert_eq!(bits(a), bits(b));
        assert_eq!(a.heightfield.vertex_bytes(), b.heightfield.vertex_bytes());
        assert_eq!(a.placements, b.placements);
    }

    #[test]
    fn test_heightfield_dimensions() {
        let chunk = synthesizer(12345).synthesize(ChunkCoord::new(0, 0));
        assert_eq!(chunk.heightfield.vertices().len(), 81);
        assert_eq!(chunk.heightfield.heights().len(), 81);
        assert_eq!(chunk.heightfield.triangle_count(), 8 * 8 * 2);
        assert_eq!(chunk.config_version, 1);
    }

    #[test]
    fn test_synthesize_determinism() {
        let s = synthesizer(12345);
        for coord in [ChunkCoord::new(0, 0), ChunkCoord::new(-3, 7)] {
            let a = s.synthesize(coord);
            let b = s.synthesize(coord);
            assert_bit_identical(&a, &b);
            // A fresh instance with the same seed agrees too.
            let c = synthesizer(12345).synthesize(coord);
            assert_bit_identical(&a, &c);
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = synthesizer(1).synthesize(ChunkCoord::new(2, 2));
        let b = synthesizer(2).synthesize(ChunkCoord::new(2, 2));
        assert_ne!(a.heightfield.heights(), b.heightfield.heights());
    }

    #[test]
    fn test_seam_continuity() {
        let s = synthesizer(99);
        let left = s.synthesize(ChunkCoord::new(0, 0));
        let right = s.synthesize(ChunkCoord::new(1, 0));
        let below = s.synthesize(ChunkCoord::new(0, 1));
        let side = left.heightfield.side();

        for j in 0..side {
            // Shared vertical edge: x = size on the left, x = 0 on the right.
            let l = (j * side + side - 1) as usize;
            let r = (j * side) as usize;
            assert_eq!(
                left.heightfield.heights()[l].to_bits(),
                right.heightfield.heights()[r].to_bits()
            );
            assert_eq!(
                left.heightfield.vertices()[l].normal,
                right.heightfield.vertices()[r].normal
            );
        }
        for i in 0..side {
            let a = ((side - 1) * side + i) as usize;
            let b = i as usize;
            assert_eq!(
                left.heightfield.heights()[a].to_bits(),
                below.heightfield.heights()[b].to_bits()
            );
        }

        // Interpolated queries right at the boundary agree from both sides.
        let size = left.heightfield.size();
        for t in [0.0, 3.3, 10.0, 31.9] {
            let from_left = left.heightfield.sample_height(size, t);
            let from_right = right.heightfield.sample_height(0.0, t);
            assert!((from_left - from_right).abs() < 1e-4);
            let near_left = left.heightfield.sample_height(size - 1e-3, t);
            let near_right = right.heightfield.sample_height(1e-3, t);
            assert!((near_left - near_right).abs() < 0.05);
        }
    }

    #[test]
    fn test_heightfield_matches_height_function() {
        let s = synthesizer(5);
        let coord = ChunkCoord::new(-2, 3);
        let chunk = s.synthesize(coord);
        let origin = coord.world_origin(32.0);
        for v in chunk.heightfield.vertices().iter().step_by(7) {
            let expected = s.height_at(origin.x + v.position[0], origin.y + v.position[2]);
            assert!((v.position[1] - expected).abs() < 1e-3);
        }
    }

    #[test]
    fn test_normals_unit_and_upward() {
        let chunk = synthesizer(3).synthesize(ChunkCoord::new(4, -1));
        for v in chunk.heightfield.vertices() {
            let n = Vec3::from(v.normal);
            assert!((n.length() - 1.0).abs() < 1e-4);
            assert!(n.y > 0.0);
        }
    }

    #[test]
    fn test_vertex_weights_normalized() {
        let chunk = synthesizer(8).synthesize(ChunkCoord::new(1, 1));
        for v in chunk.heightfield.vertices() {
            let sum: f32 = v.blend.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_placements_sit_on_surface() {
        let s = synthesizer(12345);
        let mut seen = 0;
        for x in -2..2 {
            for z in -2..2 {
                let chunk = s.synthesize(ChunkCoord::new(x, z));
                for p in &chunk.placements {
                    let pos = p.position();
                    assert!(pos.x >= 0.0 && pos.x < 32.0 && pos.z >= 0.0 && pos.z < 32.0);
                    assert_eq!(pos.y, chunk.heightfield.sample_height(pos.x, pos.z));
                    seen += 1;
                }
            }
        }
        assert!(seen > 0, "expected some vegetation across 16 chunks");
    }

    #[test]
    fn test_placement_meshes_come_from_biome_pools() {
        let s = synthesizer(77);
        let config = s.config().clone();
        for x in 0..4 {
            let chunk = s.synthesize(ChunkCoord::new(x, 0));
            for p in &chunk.placements {
                match p {
                    ObjectPlacement::Tree { mesh, biome, .. } => {
                        assert!(config.biomes.profile(*biome).tree_assets.contains(mesh));
                    }
                    ObjectPlacement::Rock { mesh, biome, .. } => {
                        assert!(config.biomes.profile(*biome).rock_assets.contains(mesh));
                    }
                    ObjectPlacement::GrassPatch { density, .. } => {
                        assert!((0.0..=1.0).contains(density));
                    }
                }
            }
        }
    }

    #[test]
    fn test_missing_assets_skip_only_those_records() {
        let mut config = test_config();
        for category in BiomeCategory::ALL {
            let profile = match category {
                BiomeCategory::Mountain => &mut config.biomes.mountain,
                BiomeCategory::Forest => &mut config.biomes.forest,
                BiomeCategory::Autumn => &mut config.biomes.autumn,
                BiomeCategory::Snow => &mut config.biomes.snow,
            };
            profile.tree_assets = vec![MeshId(999)];
            profile.tree_density = 1.0;
            profile.grass_density = 1.0;
        }
        let s = ChunkSynthesizer::new(3, Arc::new(config), 1);
        let chunk = s.synthesize(ChunkCoord::new(0, 0));

        assert_eq!(chunk.tree_count(), 0);
        assert!(chunk.grass_count() > 0);
        assert_eq!(chunk.heightfield.side(), 9);
    }

    #[test]
    fn test_zero_density_places_nothing() {
        let mut config = test_config();
        config.placement.density_range = crate::terrain::Span::new(0.0, 0.0);
        let s = ChunkSynthesizer::new(3, Arc::new(config), 1);
        assert!(s.synthesize(ChunkCoord::new(5, 5)).placements.is_empty());
    }

    #[test]
    fn test_density_factor_in_range() {
        let s = synthesizer(10);
        let range = s.config().placement.density_range;
        for x in -5..5 {
            let f = s.density_factor(ChunkCoord::new(x, -x));
            assert!(f >= range.min && f <= range.max);
        }
    }

    #[test]
    fn test_batch_matches_serial() {
        let s = synthesizer(4242);
        let coords = [ChunkCoord::new(0, 0), ChunkCoord::new(1, 0), ChunkCoord::new(0, 1)];
        let serial: Vec<_> = coords.iter().map(|&c| s.synthesize(c)).collect();
        let parallel = s.synthesize_batch(&coords);
        assert_eq!(serial.len(), parallel.len());
        for (a, b) in serial.iter().zip(&parallel) {
            assert_bit_identical(a, b);
        }
    }

    #[test]
    fn test_threads_agree() {
        let s = Arc::new(synthesizer(31337));
        let coords = [ChunkCoord::new(0, 0), ChunkCoord::new(-1, 2), ChunkCoord::new(3, 3)];
        let serial: Vec<_> = coords.iter().map(|&c| s.synthesize(c)).collect();

        let handles: Vec<_> = coords
            .iter()
            .map(|&c| {
                let s = Arc::clone(&s);
                std::thread::spawn(move || s.synthesize(c))
            })
            .collect();
        for (handle, expected) in handles.into_iter().zip(&serial) {
            let got = handle.join().expect("synthesis thread panicked");
            assert_bit_identical(&got, expected);
        }
    }

    #[test]
    fn test_chunk_seed_distinct() {
        let a = chunk_seed(1, ChunkCoord::new(0, 1));
        let b = chunk_seed(1, ChunkCoord::new(1, 0));
        let c = chunk_seed(2, ChunkCoord::new(0, 1));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
