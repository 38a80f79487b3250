//! JSON mesh loader.
//!
//! Reads a minimal triangle-mesh document:
//!
//! ```json
//! { "vertices": [[0, 0, 0], [1, 0, 0], [0, 1, 0]], "faces": [[0, 1, 2]], "scale": 0.5 }
//! ```
//!
//! `scale` is optional and applied uniformly to every vertex. An optional
//! `uvs` array gives one texture coordinate per vertex.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::{Vec2, Vec3};
use serde::Deserialize;

use super::handle::AssetHandle;
use crate::errors::{PostFxError, Result};
use crate::scene::Mesh;

#[derive(Debug, Deserialize)]
struct MeshDocument {
    vertices: Vec<[f32; 3]>,
    faces: Vec<[u32; 3]>,
    #[serde(default)]
    scale: Option<f32>,
    #[serde(default)]
    uvs: Option<Vec<[f32; 2]>>,
}

/// Parses a mesh document.
pub fn parse_mesh_json(text: &str) -> Result<Mesh> {
    let doc: MeshDocument = serde_json::from_str(text)?;
    if doc.faces.is_empty() {
        return Err(PostFxError::AssetLoadFailed("mesh has no faces".to_string()));
    }

    let vertex_count = doc.vertices.len();
    if let Some(face) = doc
        .faces
        .iter()
        .find(|face| face.iter().any(|&i| i as usize >= vertex_count))
    {
        return Err(PostFxError::AssetLoadFailed(format!(
            "face {face:?} references a vertex beyond {vertex_count}"
        )));
    }

    let scale = doc.scale.unwrap_or(1.0);
    let positions = doc
        .vertices
        .iter()
        .map(|v| Vec3::from_array(*v) * scale)
        .collect();
    let indices = doc.faces.iter().flatten().copied().collect();
    let mesh = Mesh::new(positions, indices);

    match doc.uvs {
        Some(uvs) if uvs.len() != vertex_count => Err(PostFxError::AssetLoadFailed(format!(
            "{} texture coordinates for {vertex_count} vertices",
            uvs.len()
        ))),
        Some(uvs) => Ok(mesh.with_uvs(uvs.into_iter().map(Vec2::from_array).collect())),
        None => Ok(mesh),
    }
}

/// Loads a mesh document from disk, blocking.
pub fn load_mesh(path: impl AsRef<Path>) -> Result<Mesh> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_mesh_json(&text)
}

/// Loads a mesh document on a background thread.
pub fn load_mesh_async(path: impl Into<PathBuf>) -> AssetHandle<Arc<Mesh>> {
    let path = path.into();
    let label = path.display().to_string();
    AssetHandle::spawn_load(label, move || load_mesh(&path).map(Arc::new))
}
