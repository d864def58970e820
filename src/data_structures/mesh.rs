//! Host-side mesh data.
//!
//! A [`MeshBuffer`] is the hand-off format between everything that produces
//! geometry (the procedural builders in [`crate::geometry`], the OBJ importer)
//! and the GPU upload in [`crate::resources::mesh::GpuMesh`].

use cgmath::{InnerSpace, Vector3, Zero};

/// Vertex capacity of a mesh addressed with `u16` indices.
pub const MAX_VERTICES: usize = u16::MAX as usize + 1;

/// Primitive topology of a mesh's index list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Topology {
    #[default]
    Triangles,
    Lines,
}

impl Topology {
    pub fn to_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            Topology::Triangles => wgpu::PrimitiveTopology::TriangleList,
            Topology::Lines => wgpu::PrimitiveTopology::LineList,
        }
    }

    /// Number of indices that make up one primitive.
    pub fn arity(self) -> usize {
        match self {
            Topology::Triangles => 3,
            Topology::Lines => 2,
        }
    }
}

/// Parallel vertex arrays plus a 16 bit index list.
///
/// `colors` always has one entry per vertex. `normals` is either empty or has
/// one entry per vertex.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffer {
    pub vertices: Vec<Vector3<f32>>,
    pub colors: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub indices: Vec<u16>,
    pub topology: Topology,
}

impl MeshBuffer {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty() && self.normals.len() == self.vertices.len()
    }

    /// Appends a vertex and returns its index.
    ///
    /// `None` once the mesh already holds [`MAX_VERTICES`]; the vertex is not added.
    pub fn push_vertex(&mut self, position: Vector3<f32>, color: Vector3<f32>) -> Option<u16> {
        let Ok(index) = u16::try_from(self.vertices.len()) else {
            log::warn!(
                "Mesh already holds {} vertices, the 16 bit index range is exhausted.",
                MAX_VERTICES
            );
            return None;
        };
        self.vertices.push(position);
        self.colors.push(color);
        Some(index)
    }

    /// Appends a line segment between two new vertices. `false` when the index range is exhausted.
    pub fn push_segment(&mut self, start: Vector3<f32>, end: Vector3<f32>, color: Vector3<f32>) -> bool {
        if self.vertices.len() + 2 > MAX_VERTICES {
            log::warn!("Mesh cannot take another segment, the 16 bit index range is exhausted.");
            return false;
        }
        let (Some(a), Some(b)) = (self.push_vertex(start, color), self.push_vertex(end, color)) else {
            return false;
        };
        self.indices.extend_from_slice(&[a, b]);
        true
    }

    /// Checks the array-length and index-range invariants.
    pub fn is_well_formed(&self) -> bool {
        let vertex_count = self.vertices.len();
        self.colors.len() == vertex_count
            && (self.normals.is_empty() || self.normals.len() == vertex_count)
            && self.indices.len() % self.topology.arity() == 0
            && self.indices.iter().all(|&i| (i as usize) < vertex_count)
    }

    /**
     * Replaces `normals` with smooth per-vertex normals.
     *
     * Every triangle adds its unnormalized face normal (so larger faces weigh more)
     * to its three corners, the sums are normalized afterwards. Vertices that are
     * not referenced by any non-degenerate triangle end up with a zero normal.
     */
    pub fn compute_vertex_normals(&mut self) {
        if self.topology != Topology::Triangles {
            log::warn!("Normals can only be derived for triangle meshes, leaving line mesh unchanged.");
            return;
        }
        let mut normals = vec![Vector3::zero(); self.vertices.len()];
        for tri in self.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            if a >= normals.len() || b >= normals.len() || c >= normals.len() {
                continue;
            }
            let face = (self.vertices[b] - self.vertices[a]).cross(self.vertices[c] - self.vertices[a]);
            normals[a] += face;
            normals[b] += face;
            normals[c] += face;
        }
        for normal in normals.iter_mut() {
            if normal.magnitude2() > f32::EPSILON {
                *normal = normal.normalize();
            }
        }
        self.normals = normals;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> MeshBuffer {
        let mut mesh = MeshBuffer::new(Topology::Triangles);
        let white = Vector3::new(1.0, 1.0, 1.0);
        mesh.push_vertex(Vector3::new(0.0, 0.0, 0.0), white);
        mesh.push_vertex(Vector3::new(1.0, 0.0, 0.0), white);
        mesh.push_vertex(Vector3::new(0.0, 1.0, 0.0), white);
        mesh.indices = vec![0, 1, 2];
        mesh
    }

    #[test]
    fn counter_clockwise_triangle_faces_positive_z() {
        let mut mesh = triangle();
        mesh.compute_vertex_normals();
        assert_eq!(mesh.normals.len(), 3);
        for n in &mesh.normals {
            assert!((n - Vector3::unit_z()).magnitude() < 1e-6);
        }
        assert!(mesh.has_normals());
    }

    #[test]
    fn unreferenced_vertex_keeps_zero_normal() {
        let mut mesh = triangle();
        mesh.push_vertex(Vector3::new(5.0, 5.0, 5.0), Vector3::zero());
        mesh.compute_vertex_normals();
        assert_eq!(mesh.normals[3], Vector3::zero());
    }

    #[test]
    fn line_meshes_are_left_alone() {
        let mut mesh = MeshBuffer::new(Topology::Lines);
        mesh.push_vertex(Vector3::zero(), Vector3::zero());
        mesh.push_vertex(Vector3::unit_x(), Vector3::zero());
        mesh.indices = vec![0, 1];
        mesh.compute_vertex_normals();
        assert!(mesh.normals.is_empty());
    }

    #[test]
    fn push_vertex_stops_at_the_index_range() {
        let mut mesh = MeshBuffer::new(Topology::Lines);
        mesh.vertices = vec![Vector3::zero(); MAX_VERTICES - 1];
        mesh.colors = vec![Vector3::zero(); MAX_VERTICES - 1];
        assert_eq!(mesh.push_vertex(Vector3::unit_x(), Vector3::zero()), Some(u16::MAX));
        assert_eq!(mesh.push_vertex(Vector3::unit_y(), Vector3::zero()), None);
        assert_eq!(mesh.vertex_count(), MAX_VERTICES);
        assert_eq!(mesh.colors.len(), MAX_VERTICES);
    }

    #[test]
    fn segment_is_not_split_across_the_index_range() {
        let mut mesh = MeshBuffer::new(Topology::Lines);
        mesh.vertices = vec![Vector3::zero(); MAX_VERTICES - 1];
        mesh.colors = vec![Vector3::zero(); MAX_VERTICES - 1];
        assert!(!mesh.push_segment(Vector3::zero(), Vector3::unit_x(), Vector3::zero()));
        assert_eq!(mesh.vertex_count(), MAX_VERTICES - 1);
        assert!(mesh.indices.is_empty());
    }

    #[test]
    fn out_of_range_index_is_not_well_formed() {
        let mut mesh = triangle();
        assert!(mesh.is_well_formed());
        mesh.indices[2] = 7;
        assert!(!mesh.is_well_formed());
    }

    #[test]
    fn topology_maps_to_wgpu_lists() {
        assert_eq!(Topology::Triangles.to_wgpu(), wgpu::PrimitiveTopology::TriangleList);
        assert_eq!(Topology::Lines.to_wgpu(), wgpu::PrimitiveTopology::LineList);
    }
}
