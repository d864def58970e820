//! Wavefront OBJ import into a single triangle [`MeshBuffer`].

use std::{
    io::{BufReader, Cursor},
    path::Path,
};

use anyhow::bail;
use cgmath::Vector3;

use crate::{
    data_structures::mesh::{MAX_VERTICES, MeshBuffer, Topology},
    resources::load_string,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObjOptions {
    /// Uniform factor applied to every position.
    pub scale: f32,
    /// Vertex colour for files without per-vertex colours.
    pub color: Vector3<f32>,
}

impl Default for ObjOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            color: Vector3::new(0.8, 0.1, 0.1),
        }
    }
}

pub async fn load_obj(path: impl AsRef<Path>, options: &ObjOptions) -> anyhow::Result<MeshBuffer> {
    let path = path.as_ref();
    let obj_text = load_string(path).await?;
    let mesh = parse_obj(&obj_text, options)?;
    log::info!(
        "Loaded {}: {} vertices, {} triangles",
        path.display(),
        mesh.vertex_count(),
        mesh.index_count() / 3
    );
    Ok(mesh)
}

/**
 * Parses OBJ text and merges all objects into one triangle mesh.
 *
 * Triangles are kept, quads are split along their first diagonal and faces with
 * any other number of corners are dropped. Materials are ignored. Normals are
 * taken from the file when every object provides them, otherwise they are
 * computed from the triangles.
 */
pub fn parse_obj(text: &str, options: &ObjOptions) -> anyhow::Result<MeshBuffer> {
    let mut reader = BufReader::new(Cursor::new(text));
    let (models, _) = tobj::load_obj_buf(
        &mut reader,
        &tobj::LoadOptions {
            single_index: true,
            triangulate: false,
            ignore_points: false,
            ignore_lines: false,
            ..Default::default()
        },
        |_| Ok(Default::default()),
    )?;

    let mut out = MeshBuffer::new(Topology::Triangles);
    let mut file_normals = !models.is_empty();
    let mut dropped = 0usize;

    for model in &models {
        let mesh = &model.mesh;
        let vertex_count = mesh.positions.len() / 3;
        let offset = out.vertices.len();
        if offset + vertex_count > MAX_VERTICES {
            bail!(
                "OBJ has more than {} vertices, which exceeds 16 bit indices",
                MAX_VERTICES
            );
        }

        let has_colors = mesh.vertex_color.len() == mesh.positions.len();
        let has_normals = mesh.normals.len() == mesh.positions.len();
        file_normals &= has_normals;
        for i in 0..vertex_count {
            let p = &mesh.positions[3 * i..3 * i + 3];
            out.vertices
                .push(Vector3::new(p[0], p[1], p[2]) * options.scale);
            out.colors.push(if has_colors {
                let c = &mesh.vertex_color[3 * i..3 * i + 3];
                Vector3::new(c[0], c[1], c[2])
            } else {
                options.color
            });
            if has_normals {
                let n = &mesh.normals[3 * i..3 * i + 3];
                out.normals.push(Vector3::new(n[0], n[1], n[2]));
            }
        }

        let index = |i: u32| (offset + i as usize) as u16;
        if mesh.face_arities.is_empty() {
            out.indices
                .extend(mesh.indices.iter().map(|&i| index(i)));
            continue;
        }
        let mut start = 0usize;
        for &arity in &mesh.face_arities {
            let end = start + arity as usize;
            let Some(face) = mesh.indices.get(start..end) else {
                bail!("OBJ object {:?} has fewer indices than its faces declare", model.name);
            };
            match face {
                [a, b, c] => out.indices.extend([index(*a), index(*b), index(*c)]),
                [a, b, c, d] => out.indices.extend([
                    index(*a),
                    index(*b),
                    index(*c),
                    index(*a),
                    index(*c),
                    index(*d),
                ]),
                _ => dropped += 1,
            }
            start = end;
        }
    }

    if dropped > 0 {
        log::warn!("Dropped {} OBJ faces that are neither triangles nor quads.", dropped);
    }
    if file_normals {
        log::debug!("Using normals from the OBJ file");
    } else {
        out.normals.clear();
        out.compute_vertex_normals();
    }
    Ok(out)
}
