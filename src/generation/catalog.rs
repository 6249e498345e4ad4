//! Asset catalog: the mesh ids placement records may reference.
//!
//! Plain data only. The scene side resolves ids to meshes; generation only
//! checks that an id is known before emitting a record for it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Identifier of a mesh asset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeshId(pub u16);

/// What kind of object an asset represents
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Tree,
    Rock,
    Grass,
}

/// Procedural description used when no authored mesh file exists
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssetShape {
    /// Hexagonal trunk with a conical crown
    Tree {
        trunk_height: f32,
        trunk_radius: f32,
        crown_height: f32,
        crown_radius: f32,
    },
    /// Jittered icosahedron
    Rock { radius: f32, roughness: f32 },
    /// Two crossed quads
    GrassCard { width: f32, height: f32 },
}

/// One catalog entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub id: MeshId,
    pub name: String,
    pub kind: AssetKind,
    pub shape: AssetShape,
}

/// Catalog of known assets.
///
/// Serialized as a plain list of entries; the id index is rebuilt on load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<AssetInfo>", into = "Vec<AssetInfo>")]
pub struct AssetCatalog {
    entries: Vec<AssetInfo>,
    index: HashMap<MeshId, usize>,
}

impl AssetCatalog {
    /// Build a catalog from entries; later duplicates of an id are ignored
    pub fn new(entries: Vec<AssetInfo>) -> Self {
        let mut catalog = Self {
            entries,
            index: HashMap::new(),
        };
        catalog.reindex();
        catalog
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, entry) in self.entries.iter().enumerate() {
            self.index.entry(entry.id).or_insert(i);
        }
    }

    pub fn get(&self, id: MeshId) -> Option<&AssetInfo> {
        self.index.get(&id).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, id: MeshId) -> bool {
        self.index.contains_key(&id)
    }

    /// First asset of the given kind
    pub fn first_of_kind(&self, kind: AssetKind) -> Option<&AssetInfo> {
        self.entries.iter().find(|e| e.kind == kind)
    }

    pub fn entries(&self) -> &[AssetInfo] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<AssetInfo>> for AssetCatalog {
    fn from(entries: Vec<AssetInfo>) -> Self {
        Self::new(entries)
    }
}

impl From<AssetCatalog> for Vec<AssetInfo> {
    fn from(catalog: AssetCatalog) -> Self {
        catalog.entries
    }
}

impl Default for AssetCatalog {
    fn default() -> Self {
        let tree = |id, name: &str, trunk_height, crown_height, crown_radius| AssetInfo {
            id: MeshId(id),
            name: name.to_string(),
            kind: AssetKind::Tree,
            shape: AssetShape::Tree {
                trunk_height,
                trunk_radius: 0.3,
                crown_height,
                crown_radius,
            },
        };
        let rock = |id, name: &str, radius, roughness| AssetInfo {
            id: MeshId(id),
            name: name.to_string(),
            kind: AssetKind::Rock,
            shape: AssetShape::Rock { radius, roughness },
        };

        Self::new(vec![
            tree(1, "pine", 3.0, 7.0, 2.2),
            tree(2, "oak", 2.5, 4.5, 3.5),
            tree(3, "maple_autumn", 2.5, 4.0, 3.2),
            tree(4, "snow_fir", 2.0, 6.0, 2.0),
            rock(10, "boulder", 1.6, 0.25),
            rock(11, "stone", 0.6, 0.3),
            rock(12, "scree", 0.9, 0.45),
            AssetInfo {
                id: MeshId(20),
                name: "grass_tuft".to_string(),
                kind: AssetKind::Grass,
                shape: AssetShape::GrassCard { width: 1.2, height: 0.6 },
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_lookup() {
        let catalog = AssetCatalog::default();
        assert!(catalog.contains(MeshId(1)));
        assert!(!catalog.contains(MeshId(999)));
        assert_eq!(catalog.get(MeshId(10)).map(|a| a.kind), Some(AssetKind::Rock));
        assert_eq!(
            catalog.first_of_kind(AssetKind::Grass).map(|a| a.id),
            Some(MeshId(20))
        );
    }

    #[test]
    fn test_catalog_json_reindexes() {
        let json = serde_json::to_string(&AssetCatalog::default()).unwrap();
        assert!(json.starts_with('['));
        let catalog: AssetCatalog = serde_json::from_str(&json).unwrap();
        assert!(catalog.contains(MeshId(4)));
        assert_eq!(catalog, AssetCatalog::default());
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let mut entries = AssetCatalog::default().entries().to_vec();
        let mut dup = entries[0].clone();
        dup.name = "shadow".into();
        entries.push(dup);
        let catalog = AssetCatalog::new(entries);
        assert_eq!(catalog.get(MeshId(1)).map(|a| a.name.as_str()), Some("pine"));
    }
}
