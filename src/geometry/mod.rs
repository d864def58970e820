//! Procedural mesh builders.
//!
//! Pure functions producing [`MeshBuffer`](crate::data_structures::mesh::MeshBuffer)s:
//!
//! - `sphere`: subdivided octahedron projected onto a sphere
//! - `lines`: single segments, the origin axis cross and normal overlays
//!
//! Malformed input never panics. It produces an empty buffer and a log line.

pub mod lines;
pub mod sphere;

pub use lines::{
    NORMAL_OVERLAY_COLOR, NORMAL_OVERLAY_LENGTH, build_line, build_normal_overlay, build_origin,
};
pub use sphere::{DEFAULT_SPHERE_COLOR, MAX_SPHERE_SUBDIVISIONS, build_sphere};
