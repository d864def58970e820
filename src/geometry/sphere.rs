use cgmath::{InnerSpace, Vector3};

use crate::data_structures::mesh::{MeshBuffer, Topology};

/// Highest subdivision level whose vertex count still fits into `u16` indices.
pub const MAX_SPHERE_SUBDIVISIONS: u8 = 125;

/// Default vertex colour of generated spheres.
pub const DEFAULT_SPHERE_COLOR: Vector3<f32> = Vector3::new(1.0, 1.0, 0.0);

/// Vertices emitted for one octahedron face at subdivision level `n`.
pub fn face_vertex_count(subdivisions: u8) -> usize {
    let n = subdivisions as usize;
    (n + 2) * (n + 3) / 2
}

/// Indices emitted for one octahedron face at subdivision level `n`.
pub fn face_index_count(subdivisions: u8) -> usize {
    let n = subdivisions as usize + 1;
    3 * n * n
}

/**
 * Builds a sphere by subdividing the 8 faces of a regular octahedron and pushing
 * every lattice point onto the sphere of the given `radius`.
 *
 * Faces are not welded: vertices on shared edges are emitted once per face.
 * Normals are the analytic sphere normals `vertex / radius`.
 *
 * Levels above [`MAX_SPHERE_SUBDIVISIONS`] would overflow the `u16` index range
 * and yield an empty buffer.
 */
pub fn build_sphere(subdivisions: u8, radius: f32, color: Vector3<f32>) -> MeshBuffer {
    let mut mesh = MeshBuffer::new(Topology::Triangles);
    if subdivisions > MAX_SPHERE_SUBDIVISIONS {
        log::warn!(
            "Sphere subdivision level {} exceeds the 16 bit index range (max {}), returning an empty mesh.",
            subdivisions,
            MAX_SPHERE_SUBDIVISIONS
        );
        return mesh;
    }
    if !(radius > 0.0) || !radius.is_finite() {
        log::warn!("Sphere radius must be positive and finite, got {}.", radius);
        return mesh;
    }

    let e = std::f32::consts::FRAC_1_SQRT_2;
    let top = Vector3::new(0.0, 1.0, 0.0);
    let bottom = Vector3::new(0.0, -1.0, 0.0);
    let front_left = Vector3::new(-e, 0.0, -e);
    let front_right = Vector3::new(e, 0.0, -e);
    let back_left = Vector3::new(-e, 0.0, e);
    let back_right = Vector3::new(e, 0.0, e);

    let faces = [
        (front_left, top, front_right),
        (back_left, top, back_right),
        (front_right, top, back_right),
        (front_left, top, back_left),
        (front_left, bottom, front_right),
        (back_left, bottom, back_right),
        (front_right, bottom, back_right),
        (front_left, bottom, back_left),
    ];

    mesh.vertices.reserve(8 * face_vertex_count(subdivisions));
    mesh.indices.reserve(8 * face_index_count(subdivisions));
    for (a, b, c) in faces {
        subdivide_face(&mut mesh, a, b, c, subdivisions, color);
    }

    mesh.normals = mesh.vertices.iter().map(|v| v.normalize()).collect();
    mesh.vertices = mesh.normals.iter().map(|n| n * radius).collect();
    mesh
}

/**
 * Emits the triangular lattice of one face.
 *
 * Rows run from the `a`/`c` edge towards the apex `b`. Row `y` is spanned between
 * the rails `a -> b` and `c -> b` and holds `n + 2 - y` points, so the apex row
 * holds a single point. Upward and downward pointing triangles are emitted in two
 * separate sweeps with their own running index triples.
 */
fn subdivide_face(
    mesh: &mut MeshBuffer,
    a: Vector3<f32>,
    b: Vector3<f32>,
    c: Vector3<f32>,
    n: u8,
    color: Vector3<f32>,
) {
    let n = n as u16;
    let base = mesh.vertices.len() as u16;
    let rows = n + 2;
    let outer_step = 1.0 / (n + 1) as f32;

    for y in 0..rows {
        let t = y as f32 * outer_step;
        let ab = a + (b - a) * t;
        let cb = c + (b - c) * t;
        let bridge = cb - ab;
        let divisions = n + 1 - y;
        let inner_step = if divisions == 0 {
            0.0
        } else {
            1.0 / divisions as f32
        };
        for x in 0..(rows - y) {
            mesh.vertices.push(ab + bridge * (x as f32 * inner_step));
            mesh.colors.push(color);
        }
    }

    let up_rows = n + 1;
    let mut up = [base, base + 1, base + n + 2];
    for y in 0..up_rows {
        for _ in y..up_rows {
            mesh.indices.extend_from_slice(&up);
            up.iter_mut().for_each(|i| *i += 1);
        }
        up[0] += 1;
        up[1] += 1;
    }

    let down_rows = n;
    let mut down = [base + n + 3, base + n + 2, base + 1];
    for y in 0..down_rows {
        for _ in y..down_rows {
            mesh.indices.extend_from_slice(&down);
            down.iter_mut().for_each(|i| *i += 1);
        }
        down[0] += 1;
        down[1] += 1;
        down[2] += 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn index_count_follows_closed_form() {
        for n in 0..=20u8 {
            let mesh = build_sphere(n, 1.5, DEFAULT_SPHERE_COLOR);
            let expected = 3 * 8 * (n as usize + 1).pow(2);
            assert_eq!(mesh.indices.len(), expected, "subdivisions = {}", n);
            assert_eq!(mesh.vertices.len(), 8 * face_vertex_count(n));
            assert_eq!(mesh.topology, Topology::Triangles);
        }
    }

    #[test]
    fn every_vertex_lies_on_the_sphere() {
        for n in [0u8, 1, 2, 7, 12, 20] {
            for radius in [0.25f32, 1.0, 3.5] {
                let mesh = build_sphere(n, radius, DEFAULT_SPHERE_COLOR);
                for v in &mesh.vertices {
                    assert!((v.magnitude() - radius).abs() < EPS * radius.max(1.0));
                }
            }
        }
    }

    #[test]
    fn normals_are_vertices_over_radius() {
        let radius = 0.75;
        let mesh = build_sphere(6, radius, DEFAULT_SPHERE_COLOR);
        assert_eq!(mesh.normals.len(), mesh.vertices.len());
        for (v, n) in mesh.vertices.iter().zip(&mesh.normals) {
            assert!((v / radius - n).magnitude() < EPS);
        }
    }

    #[test]
    fn indices_stay_in_range_and_buffer_is_well_formed() {
        for n in [0u8, 3, 11] {
            let mesh = build_sphere(n, 1.0, Vector3::new(0.2, 0.2, 0.8));
            assert!(mesh.is_well_formed());
            assert!(mesh.colors.iter().all(|c| *c == Vector3::new(0.2, 0.2, 0.8)));
        }
    }

    #[test]
    fn no_triangle_is_degenerate() {
        let mesh = build_sphere(4, 1.0, DEFAULT_SPHERE_COLOR);
        for tri in mesh.indices.chunks_exact(3) {
            let a = mesh.vertices[tri[0] as usize];
            let b = mesh.vertices[tri[1] as usize];
            let c = mesh.vertices[tri[2] as usize];
            assert!((b - a).cross(c - a).magnitude() > 1e-6);
        }
    }

    #[test]
    fn zero_subdivisions_is_the_octahedron() {
        let mesh = build_sphere(0, 2.0, DEFAULT_SPHERE_COLOR);
        assert_eq!(mesh.indices.len(), 24);
        assert_eq!(mesh.vertices.len(), 24);
        assert!(mesh.vertices.contains(&Vector3::new(0.0, 2.0, 0.0)));
        assert!(mesh.vertices.contains(&Vector3::new(0.0, -2.0, 0.0)));
    }

    #[test]
    fn largest_level_fits_u16_and_next_is_rejected() {
        let mesh = build_sphere(MAX_SPHERE_SUBDIVISIONS, 1.0, DEFAULT_SPHERE_COLOR);
        assert!(mesh.vertices.len() <= u16::MAX as usize + 1);
        assert!(mesh.is_well_formed());

        let rejected = build_sphere(MAX_SPHERE_SUBDIVISIONS + 1, 1.0, DEFAULT_SPHERE_COLOR);
        assert!(rejected.is_empty());
        assert!(rejected.vertices.is_empty() && rejected.indices.is_empty());
    }

    #[test]
    fn non_positive_radius_yields_empty_mesh() {
        assert!(build_sphere(3, 0.0, DEFAULT_SPHERE_COLOR).is_empty());
        assert!(build_sphere(3, -1.0, DEFAULT_SPHERE_COLOR).is_empty());
    }
}
