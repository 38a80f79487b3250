//! Render Backends
//!
//! The compositor is written against [`RenderBackend`]. Two implementations
//! are provided:
//!
//! - [`SoftwareBackend`]: CPU reference rasterizer. Deterministic, runs
//!   anywhere, and can simulate allocation failures and missing
//!   capabilities.
//! - [`WgpuBackend`]: GPU implementation, rendering to a window surface or
//!   to an offscreen screen texture.

pub mod gpu;
pub mod software;

pub use gpu::{GpuTarget, WgpuBackend};
pub use software::{SoftwareBackend, SoftwareTarget};

use super::program::ShaderProgram;
use super::target::{ClearOps, Extent, TargetDesc};
use crate::errors::Result;
use crate::scene::RenderRequest;

/// Where a full-screen draw writes.
#[derive(Debug)]
pub enum DrawOutput<'a, T> {
    Target(&'a mut T),
    /// The frame being presented.
    Screen,
}

/// Device-level operations the compositor needs.
///
/// Calls between [`begin_frame`](Self::begin_frame) and
/// [`present`](Self::present) execute in submission order.
pub trait RenderBackend {
    type Target;

    fn name(&self) -> &'static str;

    /// Allocates one offscreen target. Fails with
    /// [`ResourceExhausted`](crate::errors::PostFxError::ResourceExhausted)
    /// when the platform cannot provide it.
    fn create_target(&mut self, desc: &TargetDesc, extent: Extent) -> Result<Self::Target>;

    fn target_extent(&self, target: &Self::Target) -> Extent;

    fn has_depth(&self, target: &Self::Target) -> bool;

    fn clear(&mut self, target: &mut Self::Target, ops: &ClearOps) -> Result<()>;

    /// Draws `request` into `target`, depth-testing against the target's
    /// depth attachment when it has one.
    fn draw_scene(&mut self, request: &RenderRequest, target: &mut Self::Target) -> Result<()>;

    /// Runs `program` over the whole output. `inputs` pairs each of the
    /// program's texture names with the target bound to it.
    fn draw_fullscreen(
        &mut self,
        program: &ShaderProgram,
        inputs: &[(&str, &Self::Target)],
        output: DrawOutput<'_, Self::Target>,
    ) -> Result<()>;

    fn supports_depth_sharing(&self) -> bool;

    /// Makes `target` use `source`'s depth attachment. Its own attachment is
    /// released.
    fn share_depth(&mut self, source: &Self::Target, target: &mut Self::Target) -> Result<()>;

    /// Resizes the presentation surface.
    fn resize_surface(&mut self, extent: Extent) -> Result<()>;

    fn begin_frame(&mut self) -> Result<()>;

    fn present(&mut self) -> Result<()>;
}
