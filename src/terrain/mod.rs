//! Procedural terrain height and biome classification

pub mod generator;
pub use generator::{NoiseLayer, TerrainGenerator, TerrainParams};

pub mod biome;
pub use biome::{
    BiomeCategory, BiomeClassifier, BiomeConfig, BiomeProfile, BiomeSample, BiomeWeights, Span,
};
