//! Per-chunk heightfield: vertex grid, index list and a flat height array

use bytemuck::{Pod, Zeroable};

/// One terrain vertex, laid out for direct GPU upload
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    /// Chunk-local position
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    /// Biome blend weights (Mountain, Forest, Autumn, Snow)
    pub blend: [f32; 4],
}

/// Dense `(resolution + 1)^2` sample grid covering one chunk
#[derive(Clone, Debug, PartialEq)]
pub struct Heightfield {
    resolution: u32,
    size: f32,
    vertices: Vec<TerrainVertex>,
    heights: Vec<f32>,
    indices: Vec<u32>,
}

impl Heightfield {
    pub(crate) fn from_parts(
        resolution: u32,
        size: f32,
        vertices: Vec<TerrainVertex>,
        heights: Vec<f32>,
    ) -> Self {
        debug_assert_eq!(vertices.len(), heights.len());
        debug_assert_eq!(heights.len(), ((resolution + 1) * (resolution + 1)) as usize);
        Self {
            resolution,
            size,
            vertices,
            heights,
            indices: grid_indices(resolution),
        }
    }

    /// Cells per edge
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Samples per edge
    pub fn side(&self) -> u32 {
        self.resolution + 1
    }

    /// Edge length in meters
    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn cell_size(&self) -> f32 {
        self.size / self.resolution as f32
    }

    pub fn vertices(&self) -> &[TerrainVertex] {
        &self.vertices
    }

    /// Row-major heights, `z * side + x`
    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    /// Height at grid sample (ix, iz), clamped to the grid
    pub fn height_at_grid(&self, ix: u32, iz: u32) -> f32 {
        let side = self.side();
        let ix = ix.min(side - 1);
        let iz = iz.min(side - 1);
        self.heights[(iz * side + ix) as usize]
    }

    /// Bilinear height at chunk-local (x, z); positions outside the chunk clamp to its edge
    pub fn sample_height(&self, x: f32, z: f32) -> f32 {
        let res = self.resolution as f32;
        let gx = (x / self.size * res).clamp(0.0, res);
        let gz = (z / self.size * res).clamp(0.0, res);

        let ix = (gx.floor() as u32).min(self.resolution - 1);
        let iz = (gz.floor() as u32).min(self.resolution - 1);
        let fx = gx - ix as f32;
        let fz = gz - iz as f32;

        let h00 = self.height_at_grid(ix, iz);
        let h10 = self.height_at_grid(ix + 1, iz);
        let h01 = self.height_at_grid(ix, iz + 1);
        let h11 = self.height_at_grid(ix + 1, iz + 1);

        let a = h00 + (h10 - h00) * fx;
        let b = h01 + (h11 - h01) * fx;
        a + (b - a) * fz
    }

    pub fn min_height(&self) -> f32 {
        self.heights.iter().copied().fold(f32::INFINITY, f32::min)
    }

    pub fn max_height(&self) -> f32 {
        self.heights.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Vertex array as raw bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index array as raw bytes
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Triangle list for a grid, counter-clockwise seen from +Y
pub fn grid_indices(resolution: u32) -> Vec<u32> {
    let side = resolution + 1;
    let mut indices = Vec::with_capacity((resolution * resolution * 6) as usize);
    for z in 0..resolution {
        for x in 0..resolution {
            let i00 = z * side + x;
            let i10 = i00 + 1;
            let i01 = i00 + side;
            let i11 = i01 + 1;
            indices.extend_from_slice(&[i00, i01, i10, i10, i01, i11]);
        }
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(resolution: u32, size: f32) -> Heightfield {
        let side = resolution + 1;
        let step = size / resolution as f32;
        let mut vertices = Vec::new();
        let mut heights = Vec::new();
        for z in 0..side {
            for x in 0..side {
                // h = x + 2z in meters
                let h = x as f32 * step + 2.0 * z as f32 * step;
                heights.push(h);
                vertices.push(TerrainVertex {
                    position: [x as f32 * step, h, z as f32 * step],
                    normal: [0.0, 1.0, 0.0],
                    ..Default::default()
                });
            }
        }
        Heightfield::from_parts(resolution, size, vertices, heights)
    }

    #[test]
    fn test_grid_indices_count_and_range() {
        let indices = grid_indices(4);
        assert_eq!(indices.len(), 4 * 4 * 6);
        assert!(indices.iter().all(|&i| i < 25));
    }

    #[test]
    fn test_winding_faces_up() {
        let hf = ramp(4, 8.0);
        for tri in hf.indices().chunks(3) {
            let p = |i: u32| glam::Vec3::from(hf.vertices()[i as usize].position);
            let n = (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0]));
            assert!(n.y > 0.0, "triangle {:?} faces down", tri);
        }
    }

    #[test]
    fn test_bilinear_sampling_exact_on_plane() {
        let hf = ramp(4, 8.0);
        for (x, z) in [(0.0, 0.0), (1.3, 2.7), (7.99, 0.5), (8.0, 8.0), (4.0, 6.0)] {
            let expected = x + 2.0 * z;
            assert!((hf.sample_height(x, z) - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn test_sampling_clamps_outside() {
        let hf = ramp(4, 8.0);
        assert_eq!(hf.sample_height(-5.0, 0.0), hf.height_at_grid(0, 0));
        assert_eq!(hf.sample_height(100.0, 100.0), hf.height_at_grid(4, 4));
    }

    #[test]
    fn test_bytes_views() {
        let hf = ramp(2, 2.0);
        assert_eq!(hf.vertex_bytes().len(), 9 * std::mem::size_of::<TerrainVertex>());
        assert_eq!(hf.index_bytes().len(), hf.indices().len() * 4);
        assert_eq!(std::mem::size_of::<TerrainVertex>(), 48);
    }

    #[test]
    fn test_min_max() {
        let hf = ramp(2, 2.0);
        assert_eq!(hf.min_height(), 0.0);
        assert_eq!(hf.max_height(), 6.0);
    }
}
