//! Rendering Module
//!
//! The post-processing compositor and everything it renders through:
//!
//! - [`target`]: the viewport-sized [`RenderTargetSet`]
//! - [`program`]: full-screen [`ShaderProgram`]s built from WGSL templates
//! - [`pass`]: [`FullscreenPass`], one program drawn over one output
//! - [`depth`]: depth sharing between two targets
//! - [`compositor`]: the per-frame pass chain
//! - [`backend`]: the [`RenderBackend`] trait with CPU and wgpu
//!   implementations

pub mod backend;
pub mod compositor;
pub mod depth;
pub mod pass;
pub mod program;
pub mod shader_library;
pub mod target;

pub use backend::{DrawOutput, GpuTarget, RenderBackend, SoftwareBackend, SoftwareTarget, WgpuBackend};
pub use compositor::{Compositor, FrameReport, FrameStage};
pub use pass::{FullscreenPass, PassOutput};
pub use program::{ProgramKind, ShaderProgram, UniformType, UniformValue};
pub use target::{ClearOps, Extent, RenderTargetSet, TargetDesc, TargetSlot};
