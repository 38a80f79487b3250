//! Software Render Backend
//!
//! A CPU implementation of [`RenderBackend`] that evaluates every
//! full-screen program per pixel with the same math as the WGSL templates.
//!
//! Depth planes live behind `Arc<RwLock<_>>`, so depth sharing is literally
//! two targets holding the same plane. Allocation failures can be simulated
//! with [`SoftwareBackend::with_max_dimension`] and
//! [`SoftwareBackend::with_memory_budget`]; the depth-sharing capability can
//! be switched off with [`SoftwareBackend::with_depth_sharing`].

mod raster;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Vec2, Vec4};
use parking_lot::RwLock;

use super::{DrawOutput, RenderBackend};
use crate::errors::{PostFxError, Result};
use crate::pixels::PixelBuffer;
use crate::renderer::program::{ProgramKind, ShaderProgram, uniforms};
use crate::renderer::target::{ClearOps, Extent, TargetDesc};
use crate::scene::RenderRequest;

/// Bytes per pixel of a color plane (`Rgba8Unorm`).
const COLOR_BYTES: u64 = 4;
/// Bytes per pixel of a depth/stencil plane (`Depth24PlusStencil8`).
const DEPTH_STENCIL_BYTES: u64 = 4;

/// Default largest width or height of a target.
pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

/// Accounted bytes, returned to the backend when dropped.
#[derive(Debug)]
struct Allocation {
    bytes: u64,
    live: Arc<AtomicU64>,
}

impl Drop for Allocation {
    fn drop(&mut self) {
        self.live.fetch_sub(self.bytes, Ordering::Relaxed);
    }
}

/// Depth attachment of a software target.
#[derive(Debug)]
pub struct DepthPlane {
    width: u32,
    values: Vec<f32>,
    _allocation: Allocation,
}

impl DepthPlane {
    #[inline]
    fn get(&self, x: u32, y: u32) -> f32 {
        self.values[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    fn set(&mut self, x: u32, y: u32, value: f32) {
        let i = y as usize * self.width as usize + x as usize;
        self.values[i] = value;
    }
}

/// Offscreen target of the software backend.
#[derive(Debug)]
pub struct SoftwareTarget {
    label: &'static str,
    color: PixelBuffer,
    depth: Option<Arc<RwLock<DepthPlane>>>,
    stencil: Option<Vec<u8>>,
    _allocation: Allocation,
}

impl SoftwareTarget {
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    #[inline]
    #[must_use]
    pub fn color(&self) -> &PixelBuffer {
        &self.color
    }

    #[must_use]
    pub fn depth_at(&self, x: u32, y: u32) -> Option<f32> {
        self.depth.as_ref().map(|plane| plane.read().get(x, y))
    }

    #[must_use]
    pub fn stencil_at(&self, x: u32, y: u32) -> Option<u8> {
        self.stencil
            .as_ref()
            .map(|s| s[y as usize * self.color.width() as usize + x as usize])
    }

    /// `true` when both targets use the same depth attachment.
    #[must_use]
    pub fn shares_depth_with(&self, other: &Self) -> bool {
        match (&self.depth, &other.depth) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// CPU reference backend.
#[derive(Debug)]
pub struct SoftwareBackend {
    screen: PixelBuffer,
    frame_open: bool,
    presented: u64,
    max_dimension: u32,
    memory_budget: Option<u64>,
    live_bytes: Arc<AtomicU64>,
    depth_sharing: bool,
}

impl SoftwareBackend {
    /// Creates a backend whose screen is `width × height`.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            screen: PixelBuffer::new(width, height, Vec4::ZERO),
            frame_open: false,
            presented: 0,
            max_dimension: DEFAULT_MAX_DIMENSION,
            memory_budget: None,
            live_bytes: Arc::new(AtomicU64::new(0)),
            depth_sharing: true,
        }
    }

    /// Rejects targets wider or taller than `max`.
    #[must_use]
    pub fn with_max_dimension(mut self, max: u32) -> Self {
        self.max_dimension = max;
        self
    }

    /// Rejects allocations that would raise the live target memory above
    /// `bytes`.
    #[must_use]
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget = Some(bytes);
        self
    }

    #[must_use]
    pub fn with_depth_sharing(mut self, supported: bool) -> Self {
        self.depth_sharing = supported;
        self
    }

    pub fn set_max_dimension(&mut self, max: u32) {
        self.max_dimension = max;
    }

    pub fn set_memory_budget(&mut self, bytes: Option<u64>) {
        self.memory_budget = bytes;
    }

    /// The last presented frame.
    #[inline]
    #[must_use]
    pub fn screen(&self) -> &PixelBuffer {
        &self.screen
    }

    #[inline]
    #[must_use]
    pub fn presented_frames(&self) -> u64 {
        self.presented
    }

    /// Bytes held by live targets.
    #[inline]
    #[must_use]
    pub fn live_bytes(&self) -> u64 {
        self.live_bytes.load(Ordering::Relaxed)
    }

    /// Bytes a target with `desc` at `extent` occupies.
    #[must_use]
    pub fn target_bytes(desc: &TargetDesc, extent: Extent) -> u64 {
        let per_pixel = if desc.has_depth || desc.has_stencil {
            COLOR_BYTES + DEPTH_STENCIL_BYTES
        } else {
            COLOR_BYTES
        };
        extent.pixel_count() * per_pixel
    }

    fn reserve(&self, desc: &TargetDesc, extent: Extent, bytes: u64) -> Result<Allocation> {
        let exhausted = |reason: String| PostFxError::ResourceExhausted {
            label: desc.label(),
            width: extent.width,
            height: extent.height,
            reason,
        };

        if extent.width > self.max_dimension || extent.height > self.max_dimension {
            return Err(exhausted(format!(
                "exceeds the maximum dimension {}",
                self.max_dimension
            )));
        }
        let live = self.live_bytes();
        if let Some(budget) = self.memory_budget
            && live + bytes > budget
        {
            return Err(exhausted(format!(
                "{bytes} bytes requested with {live} of {budget} in use"
            )));
        }

        self.live_bytes.fetch_add(bytes, Ordering::Relaxed);
        Ok(Allocation {
            bytes,
            live: Arc::clone(&self.live_bytes),
        })
    }

    fn evaluate(program: &ShaderProgram, inputs: &[(&str, &SoftwareTarget)], output: &mut PixelBuffer) {
        let input = |name| bound_input(program, inputs, name);

        match *program.kind() {
            ProgramKind::BoxBlur(kernel) => {
                let source = input("source");
                let intensity = if program.flag(uniforms::BLUR_ENABLED) {
                    program.float(uniforms::BLUR)
                } else {
                    0.0
                };
                let viewport = program.render_size();
                shade_each(output, |uv| {
                    kernel.filter(intensity, viewport, uv, |p| source.sample(p))
                });
            }
            ProgramKind::MaskComposite => {
                let (main, blur, mask) = (input("main"), input("blur"), input("mask"));
                shade_each(output, |uv| {
                    if mask.sample(uv).x > 0.0 {
                        main.sample(uv)
                    } else {
                        blur.sample(uv)
                    }
                });
            }
            ProgramKind::FocusComposite => {
                let (blur, focus) = (input("blur"), input("focus"));
                shade_each(output, |uv| {
                    (blur.sample(uv) + focus.sample(uv)).clamp(Vec4::ZERO, Vec4::ONE)
                });
            }
            ProgramKind::Present => {
                let source = input("source");
                shade_each(output, |uv| source.sample(uv));
            }
        }
    }
}

fn bound_input<'a>(
    program: &ShaderProgram,
    inputs: &[(&str, &'a SoftwareTarget)],
    name: &str,
) -> &'a PixelBuffer {
    let Some((_, target)) = inputs.iter().find(|(n, _)| *n == name) else {
        panic!("program '{}' has no input bound to '{name}'", program.label());
    };
    &target.color
}

/// Runs `shader` at the center of every texel of `output`.
fn shade_each(output: &mut PixelBuffer, shader: impl Fn(Vec2) -> Vec4) {
    for y in 0..output.height() {
        for x in 0..output.width() {
            let uv = output.texel_center(x, y);
            output.set(x, y, shader(uv));
        }
    }
}

impl RenderBackend for SoftwareBackend {
    type Target = SoftwareTarget;

    fn name(&self) -> &'static str {
        "software"
    }

    fn create_target(&mut self, desc: &TargetDesc, extent: Extent) -> Result<SoftwareTarget> {
        let color_bytes = extent.pixel_count() * COLOR_BYTES;
        let depth_bytes = Self::target_bytes(desc, extent) - color_bytes;

        let allocation = self.reserve(desc, extent, color_bytes)?;
        let depth = if desc.has_depth {
            let depth_allocation = self.reserve(desc, extent, depth_bytes)?;
            Some(Arc::new(RwLock::new(DepthPlane {
                width: extent.width,
                values: vec![1.0; extent.pixel_count() as usize],
                _allocation: depth_allocation,
            })))
        } else {
            None
        };
        let stencil = desc
            .has_stencil
            .then(|| vec![0u8; extent.pixel_count() as usize]);

        log::debug!(
            "Created software target '{}' {}x{} (depth: {}, stencil: {})",
            desc.label(),
            extent.width,
            extent.height,
            desc.has_depth,
            desc.has_stencil
        );

        Ok(SoftwareTarget {
            label: desc.label(),
            color: PixelBuffer::new(extent.width, extent.height, Vec4::ZERO),
            depth,
            stencil,
            _allocation: allocation,
        })
    }

    fn target_extent(&self, target: &SoftwareTarget) -> Extent {
        Extent::new(target.color.width(), target.color.height())
    }

    fn has_depth(&self, target: &SoftwareTarget) -> bool {
        target.depth.is_some()
    }

    fn clear(&mut self, target: &mut SoftwareTarget, ops: &ClearOps) -> Result<()> {
        if let Some(color) = ops.color {
            target.color.fill(color);
        }
        if let (Some(value), Some(plane)) = (ops.depth, &target.depth) {
            plane.write().values.fill(value);
        }
        if let (Some(value), Some(stencil)) = (ops.stencil, &mut target.stencil) {
            stencil.fill(value as u8);
        }
        Ok(())
    }

    fn draw_scene(&mut self, request: &RenderRequest, target: &mut SoftwareTarget) -> Result<()> {
        match &target.depth {
            Some(plane) => {
                let mut plane = plane.write();
                raster::draw_request(request, &mut target.color, Some(&mut *plane));
            }
            None => raster::draw_request(request, &mut target.color, None),
        }
        Ok(())
    }

    fn draw_fullscreen(
        &mut self,
        program: &ShaderProgram,
        inputs: &[(&str, &SoftwareTarget)],
        output: DrawOutput<'_, SoftwareTarget>,
    ) -> Result<()> {
        match output {
            DrawOutput::Target(target) => Self::evaluate(program, inputs, &mut target.color),
            DrawOutput::Screen => Self::evaluate(program, inputs, &mut self.screen),
        }
        Ok(())
    }

    fn supports_depth_sharing(&self) -> bool {
        self.depth_sharing
    }

    fn share_depth(&mut self, source: &SoftwareTarget, target: &mut SoftwareTarget) -> Result<()> {
        if !self.depth_sharing {
            return Err(PostFxError::CapabilityMissing {
                backend: self.name(),
                capability: "depth sharing",
            });
        }
        let plane = source
            .depth
            .as_ref()
            .ok_or(PostFxError::MissingDepthAttachment(source.label))?;
        if target.depth.is_none() {
            return Err(PostFxError::MissingDepthAttachment(target.label));
        }
        target.depth = Some(Arc::clone(plane));
        Ok(())
    }

    fn resize_surface(&mut self, extent: Extent) -> Result<()> {
        if extent.is_empty() {
            return Err(PostFxError::InvalidExtent {
                width: extent.width,
                height: extent.height,
            });
        }
        self.screen.reset(extent.width, extent.height, Vec4::ZERO);
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<()> {
        self.frame_open = true;
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        if !self.frame_open {
            log::warn!("present() called without begin_frame()");
        }
        self.frame_open = false;
        self.presented += 1;
        Ok(())
    }
}
