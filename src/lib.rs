//! orrery
//!
//! A small scene-graph renderer on wgpu. Procedural meshes (subdivided spheres,
//! lines, axis crosses, normal overlays) are uploaded once, bound to WGSL
//! programs by attribute name and drawn through a hierarchy of nodes whose
//! transforms compose from parent to child.
//!
//! High-level modules
//! - `camera`: a perspective camera looking at the world origin
//! - `context`: GPU device/queue and the window surface
//! - `data_structures`: CPU meshes, transforms and the scene graph
//! - `flow`: winit event loop driving an animated scene
//! - `geometry`: procedural mesh builders
//! - `pipelines`: render pipeline creation and mesh/program bindings
//! - `resources`: GPU meshes, shader programs and OBJ import
//! - `render`: per-frame uniform derivation and draw recording
//!

pub mod camera;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod geometry;
pub mod pipelines;
pub mod render;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use wgpu;
pub use winit::event::WindowEvent;
