use cgmath::Vector3;

use crate::data_structures::mesh::{MAX_VERTICES, MeshBuffer, Topology};

/// Segment length used by the normal overlay when nothing else is asked for.
pub const NORMAL_OVERLAY_LENGTH: f32 = 0.1;

/// Colour of normal overlay segments when nothing else is asked for.
pub const NORMAL_OVERLAY_COLOR: Vector3<f32> = Vector3::new(1.0, 1.0, 0.0);

/// A single segment of `length` along `direction`, centered on `center`.
pub fn build_line(
    length: f32,
    direction: Vector3<f32>,
    color: Vector3<f32>,
    center: Vector3<f32>,
) -> MeshBuffer {
    let mut mesh = MeshBuffer::new(Topology::Lines);
    let half = direction * (0.5 * length);
    mesh.push_segment(center - half, center + half, color);
    mesh
}

/// Unit axis cross at the origin: X red, Y green, Z blue.
pub fn build_origin() -> MeshBuffer {
    let mut mesh = MeshBuffer::new(Topology::Lines);
    let axes = [
        (Vector3::new(1.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0)),
        (Vector3::new(0.0, 1.0, 0.0), Vector3::new(0.0, 1.0, 0.0)),
        (Vector3::new(0.0, 0.0, 1.0), Vector3::new(0.0, 0.0, 1.0)),
    ];
    for (tip, color) in axes {
        mesh.push_segment(Vector3::new(0.0, 0.0, 0.0), tip, color);
    }
    mesh
}

/**
 * One segment per vertex of `source`, from the vertex along its normal.
 *
 * Returns an empty buffer when `source` carries no usable normals (their count
 * differs from the vertex count) or has too many vertices for the doubled
 * overlay to stay within `u16` indices.
 */
pub fn build_normal_overlay(source: &MeshBuffer, length: f32, color: Vector3<f32>) -> MeshBuffer {
    let mut mesh = MeshBuffer::new(Topology::Lines);
    if source.normals.len() != source.vertices.len() {
        log::warn!(
            "Cannot visualise normals: {} normals for {} vertices.",
            source.normals.len(),
            source.vertices.len()
        );
        return mesh;
    }
    if source.vertices.len() * 2 > MAX_VERTICES {
        log::warn!(
            "Normal overlay for {} vertices would overflow 16 bit indices.",
            source.vertices.len()
        );
        return mesh;
    }
    for (vertex, normal) in source.vertices.iter().zip(&source.normals) {
        mesh.push_segment(*vertex, vertex + normal * length, color);
    }
    mesh
}
