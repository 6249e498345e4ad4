//! Object placement records produced by chunk synthesis

use glam::{Affine3A, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::catalog::MeshId;
use crate::terrain::biome::BiomeCategory;

/// Rocks at or above this scale stay visible at medium LOD
pub const LARGE_ROCK_SCALE: f32 = 1.0;

/// Visibility class of a placed object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DetailClass {
    /// Visible at High and Medium LOD
    Large,
    /// Fine vegetation, visible at High LOD only
    Fine,
}

/// One object to instantiate, positioned in chunk-local space
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectPlacement {
    Tree {
        position: Vec3,
        yaw: f32,
        scale: f32,
        mesh: MeshId,
        biome: BiomeCategory,
    },
    Rock {
        position: Vec3,
        yaw: f32,
        scale: f32,
        mesh: MeshId,
        biome: BiomeCategory,
    },
    GrassPatch {
        position: Vec3,
        yaw: f32,
        scale: f32,
        density: f32,
    },
}

impl ObjectPlacement {
    pub fn position(&self) -> Vec3 {
        match self {
            ObjectPlacement::Tree { position, .. }
            | ObjectPlacement::Rock { position, .. }
            | ObjectPlacement::GrassPatch { position, .. } => *position,
        }
    }

    pub fn yaw(&self) -> f32 {
        match self {
            ObjectPlacement::Tree { yaw, .. }
            | ObjectPlacement::Rock { yaw, .. }
            | ObjectPlacement::GrassPatch { yaw, .. } => *yaw,
        }
    }

    pub fn scale(&self) -> f32 {
        match self {
            ObjectPlacement::Tree { scale, .. }
            | ObjectPlacement::Rock { scale, .. }
            | ObjectPlacement::GrassPatch { scale, .. } => *scale,
        }
    }

    /// Mesh referenced by the record; grass patches use the scene's grass mesh
    pub fn mesh(&self) -> Option<MeshId> {
        match self {
            ObjectPlacement::Tree { mesh, .. } | ObjectPlacement::Rock { mesh, .. } => Some(*mesh),
            ObjectPlacement::GrassPatch { .. } => None,
        }
    }

    pub fn detail(&self) -> DetailClass {
        match self {
            ObjectPlacement::Tree { .. } => DetailClass::Large,
            ObjectPlacement::Rock { scale, .. } if *scale >= LARGE_ROCK_SCALE => DetailClass::Large,
            ObjectPlacement::Rock { .. } | ObjectPlacement::GrassPatch { .. } => DetailClass::Fine,
        }
    }

    /// Chunk-local transform: uniform scale, yaw about +Y, then translation
    pub fn local_transform(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(
            Vec3::splat(self.scale()),
            Quat::from_rotation_y(self.yaw()),
            self.position(),
        )
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, ObjectPlacement::Tree { .. })
    }

    pub fn is_rock(&self) -> bool {
        matches!(self, ObjectPlacement::Rock { .. })
    }

    pub fn is_grass(&self) -> bool {
        matches!(self, ObjectPlacement::GrassPatch { .. })
    }
}
