//! Biome classification from altitude, temperature and humidity
//!
//! Weights follow a fixed priority: Mountain wins above its altitude
//! threshold; below it Snow wins when cold, Autumn when warm and dry, and
//! Forest takes the remainder. Transitions are smoothstepped over the
//! configured blend radius, and lowland weights always scale by
//! `1 - mountain` so Mountain keeps priority inside its band.

use noise::{Fbm, NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use super::generator::{NoiseLayer, TerrainGenerator, TerrainParams};
use crate::generation::catalog::MeshId;
use crate::math::smoothstep;

/// Biome categories, in weight-channel order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiomeCategory {
    Mountain,
    Forest,
    Autumn,
    Snow,
}

impl BiomeCategory {
    /// All categories in channel order
    pub const ALL: [BiomeCategory; 4] = [
        BiomeCategory::Mountain,
        BiomeCategory::Forest,
        BiomeCategory::Autumn,
        BiomeCategory::Snow,
    ];

    /// Tie-break order when two weights are equal
    const PRIORITY: [BiomeCategory; 4] = [
        BiomeCategory::Mountain,
        BiomeCategory::Snow,
        BiomeCategory::Autumn,
        BiomeCategory::Forest,
    ];

    /// Weight channel index
    pub fn index(self) -> usize {
        match self {
            BiomeCategory::Mountain => 0,
            BiomeCategory::Forest => 1,
            BiomeCategory::Autumn => 2,
            BiomeCategory::Snow => 3,
        }
    }
}

/// Closed interval
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub min: f32,
    pub max: f32,
}

impl Span {
    pub const UNIT: Span = Span { min: 0.0, max: 1.0 };

    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Interpolate within the span, `t` in [0, 1]
    pub fn lerp(&self, t: f32) -> f32 {
        self.min + (self.max - self.min) * t
    }

    fn validate_unit(&self, name: &str) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.min)
            || !(0.0..=1.0).contains(&self.max)
            || self.min > self.max
        {
            return Err(format!("{name} must be an ordered range within 0..=1"));
        }
        Ok(())
    }
}

/// Per-biome rules
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomeProfile {
    /// Accepted altitude factor range
    pub altitude: Span,
    /// Accepted temperature range
    pub temperature: Span,
    /// Accepted humidity range
    pub humidity: Span,
    /// Tree acceptance probability (0-1)
    pub tree_density: f32,
    /// Rock acceptance probability (0-1)
    pub rock_density: f32,
    /// Grass acceptance probability (0-1)
    pub grass_density: f32,
    pub tree_scale: Span,
    pub rock_scale: Span,
    pub tree_assets: Vec<MeshId>,
    pub rock_assets: Vec<MeshId>,
    /// Linear RGB tint handed to the terrain material
    pub tint: [f32; 3],
}

impl Default for BiomeProfile {
    fn default() -> Self {
        Self {
            altitude: Span::UNIT,
            temperature: Span::UNIT,
            humidity: Span::UNIT,
            tree_density: 0.5,
            rock_density: 0.3,
            grass_density: 0.5,
            tree_scale: Span::new(0.8, 1.2),
            rock_scale: Span::new(0.6, 1.4),
            tree_assets: Vec::new(),
            rock_assets: Vec::new(),
            tint: [0.3, 0.5, 0.2],
        }
    }
}

impl BiomeProfile {
    fn validate(&self, name: &str) -> Result<(), String> {
        self.altitude.validate_unit(&format!("biomes.{name}.altitude"))?;
        self.temperature.validate_unit(&format!("biomes.{name}.temperature"))?;
        self.humidity.validate_unit(&format!("biomes.{name}.humidity"))?;
        for (field, v) in [
            ("tree_density", self.tree_density),
            ("rock_density", self.rock_density),
            ("grass_density", self.grass_density),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(format!("biomes.{name}.{field} must be within 0..=1"));
            }
        }
        for (field, span) in [("tree_scale", self.tree_scale), ("rock_scale", self.rock_scale)] {
            if !(span.min > 0.0 && span.min <= span.max) {
                return Err(format!("biomes.{name}.{field} must be a positive ordered range"));
            }
        }
        Ok(())
    }
}

/// Biome configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomeConfig {
    /// Half-width of every transition band, in factor units
    pub blend_radius: f32,
    pub temperature: NoiseLayer,
    pub humidity: NoiseLayer,
    pub mountain: BiomeProfile,
    pub forest: BiomeProfile,
    pub autumn: BiomeProfile,
    pub snow: BiomeProfile,
}

impl Default for BiomeConfig {
    fn default() -> Self {
        Self {
            blend_radius: 0.05,
            temperature: NoiseLayer::new(0.0012, 3, 1.0),
            humidity: NoiseLayer::new(0.0016, 3, 1.0),
            mountain: BiomeProfile {
                altitude: Span::new(0.55, 1.0),
                tree_density: 0.1,
                rock_density: 0.8,
                grass_density: 0.1,
                rock_scale: Span::new(0.8, 2.0),
                tree_assets: vec![MeshId(1)],
                rock_assets: vec![MeshId(10), MeshId(12)],
                tint: [0.45, 0.43, 0.4],
                ..Default::default()
            },
            forest: BiomeProfile {
                tree_density: 0.8,
                rock_density: 0.2,
                grass_density: 0.9,
                tree_assets: vec![MeshId(1), MeshId(2)],
                rock_assets: vec![MeshId(11)],
                tint: [0.22, 0.42, 0.16],
                ..Default::default()
            },
            autumn: BiomeProfile {
                temperature: Span::new(0.6, 1.0),
                humidity: Span::new(0.0, 0.45),
                tree_density: 0.6,
                rock_density: 0.3,
                grass_density: 0.6,
                tree_assets: vec![MeshId(3), MeshId(2)],
                rock_assets: vec![MeshId(11)],
                tint: [0.55, 0.35, 0.12],
                ..Default::default()
            },
            snow: BiomeProfile {
                temperature: Span::new(0.0, 0.3),
                tree_density: 0.35,
                rock_density: 0.4,
                grass_density: 0.05,
                tree_assets: vec![MeshId(4)],
                rock_assets: vec![MeshId(10), MeshId(12)],
                tint: [0.92, 0.94, 0.97],
                ..Default::default()
            },
        }
    }
}

impl BiomeConfig {
    pub fn profile(&self, category: BiomeCategory) -> &BiomeProfile {
        match category {
            BiomeCategory::Mountain => &self.mountain,
            BiomeCategory::Forest => &self.forest,
            BiomeCategory::Autumn => &self.autumn,
            BiomeCategory::Snow => &self.snow,
        }
    }

    /// Priority thresholds implied by the acceptance ranges
    pub fn thresholds(&self) -> BiomeThresholds {
        BiomeThresholds {
            mountain_altitude: self.mountain.altitude.min,
            snow_temperature: self.snow.temperature.max,
            autumn_temperature: self.autumn.temperature.min,
            autumn_humidity: self.autumn.humidity.max,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if !(0.0..=0.5).contains(&self.blend_radius) {
            return Err("biomes.blend_radius must be within 0..=0.5".into());
        }
        self.temperature.validate("biomes.temperature")?;
        self.humidity.validate("biomes.humidity")?;
        self.mountain.validate("mountain")?;
        self.forest.validate("forest")?;
        self.autumn.validate("autumn")?;
        self.snow.validate("snow")?;
        let t = self.thresholds();
        if t.snow_temperature >= t.autumn_temperature {
            return Err(
                "snow temperature ceiling must lie below the autumn temperature floor".into(),
            );
        }
        Ok(())
    }
}

/// Thresholds driving the priority rules
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiomeThresholds {
    pub mountain_altitude: f32,
    pub snow_temperature: f32,
    pub autumn_temperature: f32,
    pub autumn_humidity: f32,
}

/// Blend weights, one channel per category in `BiomeCategory::ALL` order
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiomeWeights(pub [f32; 4]);

impl BiomeWeights {
    pub fn get(&self, category: BiomeCategory) -> f32 {
        self.0[category.index()]
    }

    pub fn sum(&self) -> f32 {
        self.0.iter().sum()
    }

    /// Dominant category (argmax, ties broken by priority)
    pub fn dominant(&self) -> BiomeCategory {
        let mut best = BiomeCategory::PRIORITY[0];
        for category in BiomeCategory::PRIORITY.into_iter().skip(1) {
            if self.get(category) > self.get(best) {
                best = category;
            }
        }
        best
    }

    pub fn as_array(&self) -> [f32; 4] {
        self.0
    }
}

/// Everything the classifier knows about one world position
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiomeSample {
    pub height: f32,
    pub altitude: f32,
    pub temperature: f32,
    pub humidity: f32,
    pub weights: BiomeWeights,
}

impl BiomeSample {
    pub fn category(&self) -> BiomeCategory {
        self.weights.dominant()
    }
}

/// Pure classifier over `(seed, position)`
pub struct BiomeClassifier {
    terrain: TerrainGenerator,
    temperature: Fbm<Perlin>,
    humidity: Fbm<Perlin>,
    config: BiomeConfig,
    thresholds: BiomeThresholds,
}

impl BiomeClassifier {
    /// Create a classifier with the given seed
    pub fn new(seed: u32, terrain: TerrainParams, config: BiomeConfig) -> Self {
        Self {
            terrain: TerrainGenerator::new(seed, terrain),
            temperature: config.temperature.fbm(seed.wrapping_add(10)),
            humidity: config.humidity.fbm(seed.wrapping_add(11)),
            thresholds: config.thresholds(),
            config,
        }
    }

    pub fn terrain(&self) -> &TerrainGenerator {
        &self.terrain
    }

    pub fn config(&self) -> &BiomeConfig {
        &self.config
    }

    /// Terrain height at world position (x, z)
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        self.terrain.height_at(x, z)
    }

    /// Temperature and humidity factors at (x, z), both in [0, 1]
    pub fn climate_at(&self, x: f64, z: f64) -> (f32, f32) {
        let t = (self.temperature.get([x, z]) as f32 + 1.0) * 0.5;
        let h = (self.humidity.get([x, z]) as f32 + 1.0) * 0.5;
        (t.clamp(0.0, 1.0), h.clamp(0.0, 1.0))
    }

    /// Blend weights at world position (x, z)
    pub fn biome_weights(&self, x: f32, z: f32) -> BiomeWeights {
        self.sample_f64(x as f64, z as f64).weights
    }

    /// Dominant biome at world position (x, z)
    pub fn classify(&self, x: f32, z: f32) -> BiomeCategory {
        self.biome_weights(x, z).dominant()
    }

    /// Full sample at (x, z)
    pub fn sample_f64(&self, x: f64, z: f64) -> BiomeSample {
        let height = self.terrain.height_at_f64(x, z);
        self.sample_with_height(x, z, height)
    }

    /// Sample at (x, z) when the height is already known
    pub fn sample_with_height(&self, x: f64, z: f64, height: f32) -> BiomeSample {
        let altitude = self.terrain.altitude_factor(height);
        let (temperature, humidity) = self.climate_at(x, z);
        BiomeSample {
            height,
            altitude,
            temperature,
            humidity,
            weights: self.weights_for(altitude, temperature, humidity),
        }
    }

    /// Priority blend for explicit factors
    pub fn weights_for(&self, altitude: f32, temperature: f32, humidity: f32) -> BiomeWeights {
        let r = self.config.blend_radius;
        let t = &self.thresholds;
        let band = |edge: f32, v: f32| smoothstep(edge - r, edge + r, v);

        let mountain = band(t.mountain_altitude, altitude);

        let snow = 1.0 - band(t.snow_temperature, temperature);
        let warm = band(t.autumn_temperature, temperature);
        let dry = 1.0 - band(t.autumn_humidity, humidity);
        // Snow outranks autumn where their bands overlap.
        let autumn = warm * dry * (1.0 - snow);
        let forest = (1.0 - snow - autumn).max(0.0);

        let lowland = 1.0 - mountain;
        let mut w = [mountain, forest * lowland, autumn * lowland, snow * lowland];

        let sum: f32 = w.iter().sum();
        if sum > 0.0 {
            for v in &mut w {
                *v /= sum;
            }
        } else {
            w = [0.0, 1.0, 0.0, 0.0];
        }
        BiomeWeights(w)
    }
}
