//! Asynchronous asset loading.

pub mod handle;
pub mod mesh_loader;
pub mod texture_loader;

pub use handle::{AssetHandle, AssetPoll, AssetSender};
pub use mesh_loader::{load_mesh, load_mesh_async, parse_mesh_json};
pub use texture_loader::{decode_texture, load_texture, load_texture_async};
