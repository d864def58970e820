//! Scene data: CPU meshes, transforms, the scene graph and render target textures.
//!
//! - `mesh` holds vertex arrays before they are uploaded
//! - `transform` is a node's position, rotation and scale
//! - `scene_graph` enables hierarchical scene organization
//! - `texture` wraps depth and offscreen colour targets

pub mod mesh;
pub mod scene_graph;
pub mod texture;
pub mod transform;
