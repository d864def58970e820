use std::path::Path;

use anyhow::Context as _;

/**
 * This module contains all logic for turning external data into GPU resources:
 * meshes, shader programs and OBJ files.
 */
pub mod mesh;
pub mod obj;
pub mod shader;

pub async fn load_string(path: impl AsRef<Path>) -> anyhow::Result<String> {
    let path = path.as_ref();
    let txt = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(txt)
}
