#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! # Myth PostFX
//!
//! A multi-pass post-processing compositor: a ring-weighted box blur,
//! selective sharpness through a depth-tested focus mask, and additive focus
//! compositing, rendered either through wgpu or through a CPU reference
//! backend.
//!
//! ```rust,ignore
//! use myth_postfx::prelude::*;
//!
//! let backend = SoftwareBackend::new(320, 240);
//! let mut compositor = Compositor::new(backend, CompositorSettings::default(), 320, 240)?;
//! let report = compositor.render_frame(&scene, &camera)?;
//! ```

pub mod app;
pub mod assets;
pub mod errors;
pub mod kernel;
pub mod pixels;
pub mod renderer;
pub mod scene;
pub mod settings;

pub use errors::{PostFxError, Result};
pub use kernel::BlurKernel;
pub use pixels::PixelBuffer;
pub use renderer::{
    Compositor, FrameReport, FrameStage, RenderBackend, SoftwareBackend, WgpuBackend,
};
pub use scene::{Camera, Material, Mesh, Scene, SceneObject, TextureMap};
pub use settings::{BlurSettings, CompositorSettings, PipelineVariant};

pub mod prelude {
    pub use crate::assets::{AssetHandle, AssetPoll, load_mesh_async, load_texture_async};
    pub use crate::errors::{PostFxError, Result};
    pub use crate::kernel::BlurKernel;
    pub use crate::renderer::{
        Compositor, Extent, FrameReport, FrameStage, RenderBackend, SoftwareBackend, TargetSlot,
        WgpuBackend,
    };
    pub use crate::pixels::PixelBuffer;
    pub use crate::scene::{
        Camera, Lighting, Material, Mesh, Scene, SceneObject, Shading, TextureMap,
    };
    pub use crate::settings::{BlurSettings, CompositorSettings, PipelineVariant};
}
