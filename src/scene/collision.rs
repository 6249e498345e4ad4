//! Collision volumes for chunk terrain and placed objects
//!
//! Objects try a convex hull first, then a triangle mesh, then a bounding
//! box. Something collidable always comes out.

use glam::Vec3;
use parry3d::math::Point;
use parry3d::shape::SharedShape;

use crate::generation::heightfield::Heightfield;
use crate::math::aabb::Aabb;

/// Smallest half-extent of a fallback box, so flat or point-like meshes still collide
pub const MIN_HALF_EXTENT: f32 = 0.01;

const MIN_HULL_VOLUME: f32 = 1e-6;

/// Which stage of the fallback chain produced the shape
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColliderKind {
    ConvexHull,
    TriMesh,
    Aabb,
}

/// Collision shape in mesh-local space
#[derive(Clone)]
pub struct Collider {
    kind: ColliderKind,
    shape: SharedShape,
    /// Local offset of the shape origin; non-zero only for box fallbacks
    offset: Vec3,
    bounds: Aabb,
}

impl std::fmt::Debug for Collider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collider")
            .field("kind", &self.kind)
            .field("offset", &self.offset)
            .field("bounds", &self.bounds)
            .finish()
    }
}

impl Collider {
    /// Build an object collider: convex hull, else trimesh, else box
    pub fn for_object(vertices: &[Vec3], triangles: &[[u32; 3]]) -> Self {
        let bounds = Aabb::from_points(vertices)
            .unwrap_or_else(|| Aabb::from_center_half_extent(Vec3::ZERO, Vec3::ZERO));

        if let Some(shape) = convex_hull(vertices, &bounds) {
            return Self {
                kind: ColliderKind::ConvexHull,
                shape,
                offset: Vec3::ZERO,
                bounds,
            };
        }
        log::warn!("Convex hull failed for {} points, trying trimesh", vertices.len());

        if let Some(shape) = trimesh(vertices, triangles) {
            return Self {
                kind: ColliderKind::TriMesh,
                shape,
                offset: Vec3::ZERO,
                bounds,
            };
        }
        log::warn!("Trimesh failed for {} triangles, using bounding box", triangles.len());

        Self::bounding_box(bounds)
    }

    /// Terrain collider: the heightfield as a trimesh, else its bounding box
    pub fn for_terrain(heightfield: &Heightfield) -> Self {
        let vertices: Vec<Vec3> = heightfield
            .vertices()
            .iter()
            .map(|v| Vec3::from(v.position))
            .collect();
        let triangles: Vec<[u32; 3]> = heightfield
            .indices()
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect();
        let bounds = Aabb::from_points(&vertices)
            .unwrap_or_else(|| Aabb::from_center_half_extent(Vec3::ZERO, Vec3::ZERO));

        match trimesh(&vertices, &triangles) {
            Some(shape) => Self {
                kind: ColliderKind::TriMesh,
                shape,
                offset: Vec3::ZERO,
                bounds,
            },
            None => {
                log::warn!("Terrain trimesh failed, using bounding box");
                Self::bounding_box(bounds)
            }
        }
    }

    fn bounding_box(bounds: Aabb) -> Self {
        let he = bounds.half_extent().max(Vec3::splat(MIN_HALF_EXTENT));
        Self {
            kind: ColliderKind::Aabb,
            shape: SharedShape::cuboid(he.x, he.y, he.z),
            offset: bounds.center(),
            bounds: Aabb::from_center_half_extent(bounds.center(), he),
        }
    }

    pub fn kind(&self) -> ColliderKind {
        self.kind
    }

    pub fn shape(&self) -> &SharedShape {
        &self.shape
    }

    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }
}

fn to_points(vertices: &[Vec3]) -> Vec<Point<f32>> {
    vertices.iter().map(|v| Point::new(v.x, v.y, v.z)).collect()
}

fn convex_hull(vertices: &[Vec3], bounds: &Aabb) -> Option<SharedShape> {
    // Hulls of flat or tiny point sets are degenerate; skip straight to the next stage.
    if vertices.len() < 4 || bounds.volume() < MIN_HULL_VOLUME {
        return None;
    }
    SharedShape::convex_hull(&to_points(vertices))
}

fn trimesh(vertices: &[Vec3], triangles: &[[u32; 3]]) -> Option<SharedShape> {
    if vertices.len() < 3 || triangles.is_empty() {
        return None;
    }
    let n = vertices.len() as u32;
    if triangles.iter().flatten().any(|&i| i >= n) {
        return None;
    }
    SharedShape::trimesh(to_points(vertices), triangles.to_vec()).ok()
}
