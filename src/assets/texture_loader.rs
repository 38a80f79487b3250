//! Image texture loader.
//!
//! Decodes PNG or JPEG files into a [`PixelBuffer`] of linear `[0, 1]`
//! texels, ready to be wrapped in a [`TextureMap`](crate::scene::TextureMap).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::handle::AssetHandle;
use crate::errors::Result;
use crate::pixels::PixelBuffer;

/// Decodes an encoded image held in memory.
pub fn decode_texture(bytes: &[u8]) -> Result<PixelBuffer> {
    let image = image::load_from_memory(bytes)?.to_rgba8();
    Ok(PixelBuffer::from_rgba8(&image))
}

/// Loads an image file from disk, blocking.
pub fn load_texture(path: impl AsRef<Path>) -> Result<PixelBuffer> {
    let bytes = std::fs::read(path.as_ref())?;
    let texture = decode_texture(&bytes)?;
    log::debug!(
        "Decoded texture '{}' ({}x{})",
        path.as_ref().display(),
        texture.width(),
        texture.height()
    );
    Ok(texture)
}

/// Loads an image file on a background thread.
pub fn load_texture_async(path: impl Into<PathBuf>) -> AssetHandle<Arc<PixelBuffer>> {
    let path = path.into();
    let label = path.display().to_string();
    AssetHandle::spawn_load(label, move || load_texture(&path).map(Arc::new))
}
