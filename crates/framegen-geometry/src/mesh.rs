//! Indexed mesh buffers

use framegen_core::{FrameGenError, Result, Vec3};

/// Flat, indexed triangle mesh.
///
/// Invariants: `positions` and `normals` hold 3 floats per vertex, `uvs`
/// holds 2, and every index is less than the vertex count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBuffer {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    /// Triangle indices (CCW winding seen from outside)
    pub indices: Vec<u32>,
}

impl MeshBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.is_empty()
    }

    /// Append a vertex and return its index
    pub fn push_vertex(&mut self, position: Vec3, normal: Vec3, uv: [f32; 2]) -> u32 {
        let index = self.vertex_count() as u32;
        self.positions.extend_from_slice(&position.to_array());
        self.normals.extend_from_slice(&normal.to_array());
        self.uvs.extend_from_slice(&uv);
        index
    }

    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    pub fn position(&self, index: usize) -> Vec3 {
        Vec3::new(
            self.positions[index * 3],
            self.positions[index * 3 + 1],
            self.positions[index * 3 + 2],
        )
    }

    pub fn normal(&self, index: usize) -> Vec3 {
        Vec3::new(
            self.normals[index * 3],
            self.normals[index * 3 + 1],
            self.normals[index * 3 + 2],
        )
    }

    /// Check the buffer's length and index invariants
    pub fn validate(&self) -> Result<()> {
        if self.positions.len() % 3 != 0 {
            return Err(FrameGenError::Geometry(format!(
                "position array length {} is not a multiple of 3",
                self.positions.len()
            )));
        }
        let count = self.vertex_count();
        if self.normals.len() != count * 3 {
            return Err(FrameGenError::Geometry(format!(
                "expected {} normal floats, got {}",
                count * 3,
                self.normals.len()
            )));
        }
        if self.uvs.len() != count * 2 {
            return Err(FrameGenError::Geometry(format!(
                "expected {} uv floats, got {}",
                count * 2,
                self.uvs.len()
            )));
        }
        if self.indices.len() % 3 != 0 {
            return Err(FrameGenError::Geometry(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        if let Some(bad) = self.indices.iter().find(|&&i| i as usize >= count) {
            return Err(FrameGenError::Geometry(format!(
                "index {} out of range for {} vertices",
                bad, count
            )));
        }
        Ok(())
    }

    /// Axis-aligned bounds of all vertex positions
    pub fn bounds(&self) -> Option<MeshBounds> {
        MeshBounds::from_flat_positions(&self.positions)
    }

    /// Concatenate meshes, rebasing each part's indices by the running vertex count
    pub fn merge(parts: &[MeshBuffer]) -> MeshBuffer {
        let mut merged = MeshBuffer {
            positions: Vec::with_capacity(parts.iter().map(|p| p.positions.len()).sum()),
            normals: Vec::with_capacity(parts.iter().map(|p| p.normals.len()).sum()),
            uvs: Vec::with_capacity(parts.iter().map(|p| p.uvs.len()).sum()),
            indices: Vec::with_capacity(parts.iter().map(|p| p.indices.len()).sum()),
        };

        for part in parts {
            let base = merged.vertex_count() as u32;
            merged.positions.extend_from_slice(&part.positions);
            merged.normals.extend_from_slice(&part.normals);
            merged.uvs.extend_from_slice(&part.uvs);
            merged.indices.extend(part.indices.iter().map(|i| i + base));
        }

        merged
    }

    /// Replace normals with area-weighted face normals accumulated per vertex.
    ///
    /// Vertices touched only by zero-area faces keep their previous normal.
    pub fn recompute_normals(&mut self) {
        let count = self.vertex_count();
        let mut accum = vec![Vec3::ZERO; count];

        for tri in self.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let pa = self.position(a);
            let face = (self.position(b) - pa).cross(&(self.position(c) - pa));
            accum[a] = accum[a] + face;
            accum[b] = accum[b] + face;
            accum[c] = accum[c] + face;
        }

        for (i, sum) in accum.iter().enumerate() {
            let n = sum.normalized();
            if n == Vec3::ZERO {
                continue;
            }
            self.normals[i * 3] = n.x;
            self.normals[i * 3 + 1] = n.y;
            self.normals[i * 3 + 2] = n.z;
        }
    }

    /// Translate all positions so the bounding-box center sits at the origin.
    /// Returns the offset that was subtracted.
    pub fn recenter(&mut self) -> Vec3 {
        let Some(bounds) = self.bounds() else {
            return Vec3::ZERO;
        };
        let center = bounds.center();
        for p in self.positions.chunks_exact_mut(3) {
            p[0] -= center.x;
            p[1] -= center.y;
            p[2] -= center.z;
        }
        center
    }
}

/// Axis-aligned bounding box computed from vertex positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshBounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl MeshBounds {
    /// Compute bounds from a flat xyz position array
    pub fn from_flat_positions(positions: &[f32]) -> Option<Self> {
        let mut chunks = positions.chunks_exact(3);
        let first = chunks.next()?;
        let mut min = [first[0], first[1], first[2]];
        let mut max = min;
        for p in chunks {
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }
        Some(Self { min, max })
    }

    /// Size along each axis
    pub fn size(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    pub fn center(&self) -> Vec3 {
        Vec3::new(
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        )
    }

    /// Largest absolute coordinate on any axis
    pub fn max_extent(&self) -> f32 {
        self.min
            .iter()
            .chain(self.max.iter())
            .fold(0.0f32, |acc, v| acc.max(v.abs()))
    }
}

impl std::fmt::Display for MeshBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.size();
        write!(f, "{:.3} x {:.3} x {:.3} m", s[0], s[1], s[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(offset: f32) -> MeshBuffer {
        let mut mesh = MeshBuffer::new();
        let n = Vec3::Z;
        let a = mesh.push_vertex(Vec3::new(offset, 0.0, 0.0), n, [0.0, 0.0]);
        let b = mesh.push_vertex(Vec3::new(offset + 1.0, 0.0, 0.0), n, [1.0, 0.0]);
        let c = mesh.push_vertex(Vec3::new(offset + 1.0, 1.0, 0.0), n, [1.0, 1.0]);
        let d = mesh.push_vertex(Vec3::new(offset, 1.0, 0.0), n, [0.0, 1.0]);
        mesh.push_triangle(a, b, c);
        mesh.push_triangle(a, c, d);
        mesh
    }

    #[test]
    fn test_merge_rebases_indices() {
        let merged = MeshBuffer::merge(&[quad(0.0), quad(2.0), quad(4.0)]);
        assert_eq!(merged.vertex_count(), 12);
        assert_eq!(merged.triangle_count(), 6);
        assert_eq!(&merged.indices[6..9], &[4, 5, 6]);
        assert_eq!(&merged.indices[12..15], &[8, 9, 10]);
        merged.validate().unwrap();
    }

    #[test]
    fn test_recompute_normals_ccw_faces_point_up() {
        let mut mesh = quad(0.0);
        mesh.normals.iter_mut().for_each(|n| *n = 0.0);
        mesh.recompute_normals();
        for i in 0..mesh.vertex_count() {
            assert_eq!(mesh.normal(i), Vec3::Z);
        }
    }

    #[test]
    fn test_recenter() {
        let mut mesh = quad(4.0);
        let offset = mesh.recenter();
        assert_eq!(offset, Vec3::new(4.5, 0.5, 0.0));
        let bounds = mesh.bounds().unwrap();
        assert_eq!(bounds.center(), Vec3::ZERO);
        assert_eq!(bounds.size(), [1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_validate_rejects_out_of_range_index() {
        let mut mesh = quad(0.0);
        mesh.indices.push(0);
        mesh.indices.push(1);
        mesh.indices.push(99);
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_empty_mesh_has_no_bounds() {
        let mut mesh = MeshBuffer::new();
        assert!(mesh.bounds().is_none());
        assert_eq!(mesh.recenter(), Vec3::ZERO);
        assert!(mesh.is_empty());
    }
}
