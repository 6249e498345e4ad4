//! Mesh assets: sources and the owning thread's cache.
//!
//! A `MeshSource` turns a catalog entry into triangles. The procedural source
//! builds simple stand-in shapes from the catalog description; the JSON
//! source reads authored meshes from a directory. `MeshLibrary` loads each id
//! once and keeps the mesh together with its collider.

use std::collections::{HashMap, HashSet};
use std::f32::consts::TAU;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::Vec3;
use noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use super::collision::Collider;
use crate::core::{Error, Result};
use crate::generation::catalog::{AssetCatalog, AssetInfo, AssetKind, AssetShape, MeshId};
use crate::math::aabb::Aabb;

/// Triangle mesh in object-local space (origin at the base, +Y up)
#[derive(Clone, Debug, PartialEq)]
pub struct MeshAsset {
    pub id: MeshId,
    pub name: String,
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
    bounds: Aabb,
}

impl MeshAsset {
    pub fn new(
        id: MeshId,
        name: impl Into<String>,
        vertices: Vec<Vec3>,
        triangles: Vec<[u32; 3]>,
    ) -> Self {
        let bounds = Aabb::from_points(&vertices).unwrap_or_default();
        Self {
            id,
            name: name.into(),
            vertices,
            triangles,
            bounds,
        }
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

/// Loads meshes for catalog entries
pub trait MeshSource {
    fn load(&self, info: &AssetInfo) -> Result<MeshAsset>;
}

/// Builds meshes from the catalog's procedural shape descriptions
#[derive(Clone, Copy, Debug, Default)]
pub struct ProceduralMeshSource;

impl MeshSource for ProceduralMeshSource {
    fn load(&self, info: &AssetInfo) -> Result<MeshAsset> {
        let (vertices, triangles) = match info.shape {
            AssetShape::Tree {
                trunk_height,
                trunk_radius,
                crown_height,
                crown_radius,
            } => tree_mesh(trunk_height, trunk_radius, crown_height, crown_radius),
            AssetShape::Rock { radius, roughness } => rock_mesh(info.id, radius, roughness),
            AssetShape::GrassCard { width, height } => grass_card_mesh(width, height),
        };
        if vertices.is_empty() {
            return Err(Error::Asset {
                id: info.id,
                reason: "procedural shape produced no vertices".into(),
            });
        }
        Ok(MeshAsset::new(info.id, info.name.clone(), vertices, triangles))
    }
}

/// On-disk mesh layout
#[derive(Debug, Serialize, Deserialize)]
struct MeshFile {
    vertices: Vec<[f32; 3]>,
    triangles: Vec<[u32; 3]>,
}

/// Reads `<dir>/<asset name>.json` mesh files
#[derive(Clone, Debug)]
pub struct JsonMeshSource {
    dir: PathBuf,
}

impl JsonMeshSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, info: &AssetInfo) -> PathBuf {
        self.dir.join(format!("{}.json", info.name))
    }

    /// Write a mesh in the layout `load` reads
    pub fn write(path: &Path, mesh: &MeshAsset) -> Result<()> {
        let file = MeshFile {
            vertices: mesh.vertices.iter().map(|v| v.to_array()).collect(),
            triangles: mesh.triangles.clone(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string(&file)?)?;
        Ok(())
    }
}

impl MeshSource for JsonMeshSource {
    fn load(&self, info: &AssetInfo) -> Result<MeshAsset> {
        let path = self.path_for(info);
        let json = std::fs::read_to_string(&path).map_err(|e| Error::Asset {
            id: info.id,
            reason: format!("{}: {}", path.display(), e),
        })?;
        let file: MeshFile = serde_json::from_str(&json)?;

        let n = file.vertices.len() as u32;
        if file.triangles.iter().flatten().any(|&i| i >= n) {
            return Err(Error::Asset {
                id: info.id,
                reason: "triangle index out of range".into(),
            });
        }
        let vertices = file.vertices.into_iter().map(Vec3::from).collect();
        Ok(MeshAsset::new(info.id, info.name.clone(), vertices, file.triangles))
    }
}

/// A loaded mesh and its collision volume
#[derive(Debug)]
pub struct LoadedMesh {
    pub mesh: MeshAsset,
    pub collider: Collider,
}

/// Cache of loaded meshes keyed by id.
///
/// Each id hits the source at most once; failures are remembered so a
/// missing asset is reported once rather than on every chunk.
pub struct MeshLibrary<S: MeshSource> {
    source: S,
    catalog: AssetCatalog,
    meshes: HashMap<MeshId, Arc<LoadedMesh>>,
    failed: HashSet<MeshId>,
    source_loads: usize,
}

impl<S: MeshSource> MeshLibrary<S> {
    pub fn new(source: S, catalog: AssetCatalog) -> Self {
        Self {
            source,
            catalog,
            meshes: HashMap::new(),
            failed: HashSet::new(),
            source_loads: 0,
        }
    }

    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    /// Swap the catalog; cached meshes for ids that left it are dropped
    pub fn set_catalog(&mut self, catalog: AssetCatalog) {
        self.meshes.retain(|id, _| catalog.contains(*id));
        self.failed.clear();
        self.catalog = catalog;
    }

    /// Cached mesh for `id`, loading it on first use
    pub fn get_or_load(&mut self, id: MeshId) -> Result<Arc<LoadedMesh>> {
        if let Some(mesh) = self.meshes.get(&id) {
            return Ok(Arc::clone(mesh));
        }
        if self.failed.contains(&id) {
            return Err(Error::Asset {
                id,
                reason: "previous load failed".into(),
            });
        }
        let Some(info) = self.catalog.get(id) else {
            self.failed.insert(id);
            return Err(Error::Asset {
                id,
                reason: "not in catalog".into(),
            });
        };

        self.source_loads += 1;
        match self.source.load(info) {
            Ok(mesh) => {
                let collider = Collider::for_object(&mesh.vertices, &mesh.triangles);
                log::debug!(
                    "Loaded mesh {:?} '{}': {} triangles, {:?} collider",
                    id,
                    mesh.name,
                    mesh.triangle_count(),
                    collider.kind()
                );
                let loaded = Arc::new(LoadedMesh { mesh, collider });
                self.meshes.insert(id, Arc::clone(&loaded));
                Ok(loaded)
            }
            Err(e) => {
                log::warn!("Failed to load mesh {:?}: {}", id, e);
                self.failed.insert(id);
                Err(e)
            }
        }
    }

    /// Mesh used for grass patches
    pub fn grass_mesh_id(&self) -> Option<MeshId> {
        self.catalog.first_of_kind(AssetKind::Grass).map(|info| info.id)
    }

    pub fn loaded_count(&self) -> usize {
        self.meshes.len()
    }

    /// Number of times the source was asked for a mesh
    pub fn source_loads(&self) -> usize {
        self.source_loads
    }
}

fn tree_mesh(
    trunk_height: f32,
    trunk_radius: f32,
    crown_height: f32,
    crown_radius: f32,
) -> (Vec<Vec3>, Vec<[u32; 3]>) {
    const SIDES: u32 = 6;
    let mut vertices = Vec::new();
    let mut triangles = Vec::new();

    // Trunk: hexagonal prism, rings at y=0 and y=trunk_height
    for ring in 0..2 {
        let y = ring as f32 * trunk_height;
        for i in 0..SIDES {
            let a = i as f32 / SIDES as f32 * TAU;
            vertices.push(Vec3::new(a.cos() * trunk_radius, y, a.sin() * trunk_radius));
        }
    }
    for i in 0..SIDES {
        let j = (i + 1) % SIDES;
        triangles.push([i, SIDES + i, j]);
        triangles.push([j, SIDES + i, SIDES + j]);
    }

    // Crown: cone from a base ring at the trunk top to an apex
    let base = vertices.len() as u32;
    for i in 0..SIDES {
        let a = i as f32 / SIDES as f32 * TAU;
        vertices.push(Vec3::new(a.cos() * crown_radius, trunk_height, a.sin() * crown_radius));
    }
    let apex = vertices.len() as u32;
    vertices.push(Vec3::new(0.0, trunk_height + crown_height, 0.0));
    let center = vertices.len() as u32;
    vertices.push(Vec3::new(0.0, trunk_height, 0.0));
    for i in 0..SIDES {
        let j = (i + 1) % SIDES;
        triangles.push([base + i, apex, base + j]);
        triangles.push([base + j, center, base + i]);
    }

    (vertices, triangles)
}

fn rock_mesh(id: MeshId, radius: f32, roughness: f32) -> (Vec<Vec3>, Vec<[u32; 3]>) {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    let corners = [
        [-1.0, t, 0.0], [1.0, t, 0.0], [-1.0, -t, 0.0], [1.0, -t, 0.0],
        [0.0, -1.0, t], [0.0, 1.0, t], [0.0, -1.0, -t], [0.0, 1.0, -t],
        [t, 0.0, -1.0], [t, 0.0, 1.0], [-t, 0.0, -1.0], [-t, 0.0, 1.0],
    ];
    let triangles = vec![
        [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
        [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
        [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
        [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
    ];

    // Radial jitter from Perlin noise keyed by the asset id, then flatten
    // slightly and sit the rock on y=0.
    let perlin = Perlin::new(id.0 as u32);
    let mut vertices: Vec<Vec3> = corners
        .iter()
        .map(|c| {
            let dir = Vec3::from(*c).normalize();
            let n = perlin.get([dir.x as f64 * 1.7, dir.y as f64 * 1.7, dir.z as f64 * 1.7]) as f32;
            let r = radius * (1.0 + roughness * n).max(0.2);
            Vec3::new(dir.x * r, dir.y * r * 0.7, dir.z * r)
        })
        .collect();
    let min_y = vertices.iter().map(|v| v.y).fold(f32::INFINITY, f32::min);
    for v in &mut vertices {
        v.y -= min_y;
    }

    (vertices, triangles)
}

fn grass_card_mesh(width: f32, height: f32) -> (Vec<Vec3>, Vec<[u32; 3]>) {
    let w = width * 0.5;
    let vertices = vec![
        Vec3::new(-w, 0.0, 0.0),
        Vec3::new(w, 0.0, 0.0),
        Vec3::new(-w, height, 0.0),
        Vec3::new(w, height, 0.0),
        Vec3::new(0.0, 0.0, -w),
        Vec3::new(0.0, 0.0, w),
        Vec3::new(0.0, height, -w),
        Vec3::new(0.0, height, w),
    ];
    let triangles = vec![[0, 2, 1], [1, 2, 3], [4, 6, 5], [5, 6, 7]];
    (vertices, triangles)
}
