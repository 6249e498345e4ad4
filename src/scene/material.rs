//! Shared terrain material handed to the renderer

use std::sync::Arc;

use crate::terrain::biome::{BiomeCategory, BiomeConfig, BiomeWeights};

/// Opaque handle the renderer keys its shader state on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub u64);

/// Per-biome tints blended by the vertex weights.
///
/// Immutable once built. A reconfiguration builds a new material under a
/// new handle, so renderers notice the change by handle comparison.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainMaterial {
    handle: MaterialHandle,
    tints: [[f32; 3]; 4],
    /// Reciprocal of the blend band width
    blend_sharpness: f32,
}

impl TerrainMaterial {
    pub fn from_config(config: &BiomeConfig, version: u64) -> Arc<Self> {
        let mut tints = [[0.0; 3]; 4];
        for category in BiomeCategory::ALL {
            tints[category.index()] = config.profile(category).tint;
        }
        Arc::new(Self {
            handle: MaterialHandle(version),
            tints,
            blend_sharpness: 1.0 / (2.0 * config.blend_radius).max(1e-3),
        })
    }

    pub fn handle(&self) -> MaterialHandle {
        self.handle
    }

    pub fn tint(&self, category: BiomeCategory) -> [f32; 3] {
        self.tints[category.index()]
    }

    pub fn blend_sharpness(&self) -> f32 {
        self.blend_sharpness
    }

    /// Albedo for a vertex with the given blend weights
    pub fn shade(&self, weights: &BiomeWeights) -> [f32; 3] {
        let mut rgb = [0.0; 3];
        for category in BiomeCategory::ALL {
            let w = weights.get(category);
            let tint = self.tints[category.index()];
            for c in 0..3 {
                rgb[c] += tint[c] * w;
            }
        }
        rgb
    }
}
