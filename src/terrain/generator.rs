//! Layered-noise height function
//!
//! Height is combined from four independent fractal layers:
//! - continentalness: very low frequency land/basin elevation
//! - erosion: inverted multiplier that flattens or roughens local relief
//! - peaks/valleys: ridged fractal for dramatic local relief
//! - detail: base fractal Brownian motion for small-scale variation
//!
//! The result is a pure function of `(seed, x, z)`. It is only clamped from
//! below (no underground terrain); there is no upper clamp.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin, RidgedMulti};
use serde::{Deserialize, Serialize};

/// Upper octave bound accepted by the fractal samplers
pub const MAX_OCTAVES: usize = 32;

/// Parameters of one fractal noise layer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseLayer {
    /// Base frequency in cycles per meter
    pub frequency: f64,
    /// Fractal octaves (1-32)
    pub octaves: usize,
    /// Amplitude falloff per octave
    pub persistence: f64,
    /// Frequency gain per octave
    pub lacunarity: f64,
    /// Output scale applied by the consumer of the layer
    pub amplitude: f32,
}

impl Default for NoiseLayer {
    fn default() -> Self {
        Self {
            frequency: 0.01,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            amplitude: 1.0,
        }
    }
}

impl NoiseLayer {
    /// Layer with the given frequency, octave count and amplitude
    pub fn new(frequency: f64, octaves: usize, amplitude: f32) -> Self {
        Self {
            frequency,
            octaves,
            amplitude,
            ..Default::default()
        }
    }

    /// Build an fBm sampler seeded with `seed`
    pub fn fbm(&self, seed: u32) -> Fbm<Perlin> {
        Fbm::<Perlin>::new(seed)
            .set_octaves(self.octaves)
            .set_frequency(self.frequency)
            .set_persistence(self.persistence)
            .set_lacunarity(self.lacunarity)
    }

    /// Build a ridged multifractal sampler seeded with `seed`
    pub fn ridged(&self, seed: u32) -> RidgedMulti<Perlin> {
        RidgedMulti::<Perlin>::new(seed)
            .set_octaves(self.octaves)
            .set_frequency(self.frequency)
            .set_persistence(self.persistence)
            .set_lacunarity(self.lacunarity)
    }

    pub(crate) fn validate(&self, name: &str) -> Result<(), String> {
        if !(self.frequency.is_finite() && self.frequency > 0.0) {
            return Err(format!("{name}: frequency must be positive"));
        }
        if self.octaves == 0 || self.octaves > MAX_OCTAVES {
            return Err(format!("{name}: octaves must be within 1..={MAX_OCTAVES}"));
        }
        if !self.amplitude.is_finite() {
            return Err(format!("{name}: amplitude must be finite"));
        }
        Ok(())
    }
}

/// Parameters controlling terrain height
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    /// Constant offset added to every sample
    pub base_height: f32,
    /// Nominal maximum height, used to normalise altitude (not a clamp)
    pub height_cap: f32,
    pub continentalness: NoiseLayer,
    pub erosion: NoiseLayer,
    /// Relief multiplier where erosion is strongest (0-1)
    pub erosion_floor: f32,
    pub peaks_valleys: NoiseLayer,
    pub detail: NoiseLayer,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            base_height: 12.0,
            height_cap: 160.0,
            continentalness: NoiseLayer::new(0.0007, 4, 40.0),
            erosion: NoiseLayer::new(0.0018, 3, 1.0),
            erosion_floor: 0.2,
            peaks_valleys: NoiseLayer::new(0.003, 5, 90.0),
            detail: NoiseLayer::new(0.02, 4, 5.0),
        }
    }
}

impl TerrainParams {
    pub(crate) fn validate(&self) -> Result<(), String> {
        self.continentalness.validate("terrain.continentalness")?;
        self.erosion.validate("terrain.erosion")?;
        self.peaks_valleys.validate("terrain.peaks_valleys")?;
        self.detail.validate("terrain.detail")?;
        if !(self.height_cap.is_finite() && self.height_cap > 0.0) {
            return Err("terrain.height_cap must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.erosion_floor) {
            return Err("terrain.erosion_floor must be within 0..=1".into());
        }
        Ok(())
    }
}

/// Deterministic height sampler
pub struct TerrainGenerator {
    params: TerrainParams,
    continentalness: Fbm<Perlin>,
    erosion: Fbm<Perlin>,
    peaks_valleys: RidgedMulti<Perlin>,
    detail: Fbm<Perlin>,
}

impl TerrainGenerator {
    /// Create a new terrain generator; each layer gets its own derived seed
    pub fn new(seed: u32, params: TerrainParams) -> Self {
        Self {
            continentalness: params.continentalness.fbm(seed),
            erosion: params.erosion.fbm(seed.wrapping_add(1)),
            peaks_valleys: params.peaks_valleys.ridged(seed.wrapping_add(2)),
            detail: params.detail.fbm(seed.wrapping_add(3)),
            params,
        }
    }

    /// Get terrain parameters
    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// Terrain height at world position (x, z)
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        self.height_at_f64(x as f64, z as f64)
    }

    /// Terrain height with double precision input coordinates.
    ///
    /// Chunk synthesis samples through this entry point so that vertices
    /// shared by neighbouring chunks see identical inputs.
    pub fn height_at_f64(&self, x: f64, z: f64) -> f32 {
        let p = [x, z];
        let params = &self.params;

        let continental = self.continentalness.get(p).clamp(-1.0, 1.0) as f32
            * params.continentalness.amplitude;

        // Strong erosion flattens relief, weak erosion keeps it.
        let erosion = ((self.erosion.get(p) as f32 + 1.0) * 0.5).clamp(0.0, 1.0);
        let relief_scale = 1.0 + (params.erosion_floor - 1.0) * erosion;

        let ridges = ((self.peaks_valleys.get(p) as f32 + 1.0) * 0.5).clamp(0.0, 1.0);
        let peaks = ridges * params.peaks_valleys.amplitude;

        let detail = self.detail.get(p).clamp(-1.0, 1.0) as f32 * params.detail.amplitude;

        let height = params.base_height + continental + relief_scale * (peaks + detail);
        height.max(0.0)
    }

    /// Height normalised against the nominal cap, clamped to [0, 1]
    pub fn altitude_factor(&self, height: f32) -> f32 {
        (height / self.params.height_cap).clamp(0.0, 1.0)
    }
}
