//! Compositor Pipeline
//!
//! Runs the per-frame pass chain over a [`RenderBackend`]:
//!
//! ```text
//! ┌───────┐   ┌──────┐   ┌──────────────┐   ┌──────┐   ┌───────────┐   ┌─────────┐
//! │ Clear │ → │ Main │ → │ Mask | Focus │ → │ Blur │ → │ Composite │ → │ Present │
//! └───────┘   └──────┘   └──────────────┘   └──────┘   └───────────┘   └─────────┘
//! ```
//!
//! - **Clear** applies a queued resize first, then clears every target used
//!   this frame.
//! - **Main** draws the whole scene into `main`.
//! - **Mask** (masked focus) draws only the focus subject, flat white, into
//!   `mask`, depth-tested against the depth of `main` (shared).
//!   **Focus** (additive focus) draws the focus subject with its own
//!   materials into `focus` with its own depth.
//! - **Blur** reads `main` and writes `blur`. A disabled blur still runs,
//!   with intensity 0.
//! - **Composite** writes the screen: `mask.r > 0 ? main : blur`,
//!   `clamp(blur + focus, 0, 1)`, or plain `blur`.
//!
//! # Failure handling
//!
//! A failed resize keeps the previous targets and the previous screen size,
//! and is flagged in the [`FrameReport`]. The request stays queued and is
//! retried every frame until it succeeds or a newer one replaces it. A backend that cannot share depth degrades
//! [`PipelineVariant::MaskedFocus`] to [`PipelineVariant::BlurOnly`]. In
//! both cases the frame is still composited.

use glam::Vec4;
use smallvec::SmallVec;

use super::backend::RenderBackend;
use super::depth;
use super::pass::{FullscreenPass, PassOutput};
use super::program::{ShaderProgram, UniformValue, uniforms};
use super::target::{ClearOps, Extent, RenderTargetSet, TargetSlot};
use crate::errors::{PostFxError, Result};
use crate::scene::{Camera, RenderRequest, RequestKind, Scene};
use crate::settings::{CompositorSettings, PipelineVariant};

/// Stages of one frame, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStage {
    Clear,
    MainPass,
    MaskPass,
    FocusPass,
    BlurPass,
    CompositePass,
    Present,
}

/// What happened while rendering one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    /// Variant that actually ran.
    pub variant: PipelineVariant,
    /// `true` when `variant` differs from the requested one.
    pub degraded: bool,
    /// Size of the render targets used.
    pub extent: Extent,
    /// A queued resize failed; the previous targets were used.
    pub resize_failed: bool,
    /// Objects drawn by the main pass.
    pub main_draws: usize,
    pub stages: SmallVec<[FrameStage; 7]>,
}

pub struct Compositor<B: RenderBackend> {
    backend: B,
    settings: CompositorSettings,
    targets: RenderTargetSet<B::Target>,

    blur_pass: FullscreenPass,
    mask_composite: FullscreenPass,
    focus_composite: FullscreenPass,
    blur_composite: FullscreenPass,

    pending_resize: Option<Extent>,
    /// Last queued size the targets could not be resized to.
    failed_resize: Option<Extent>,
    active_variant: PipelineVariant,
    /// Target generation whose mask currently shares the main depth.
    depth_shared_generation: Option<u64>,
    /// Target generation on which depth sharing last failed.
    depth_failed_generation: Option<u64>,
    frame_index: u64,
}

impl<B: RenderBackend> Compositor<B> {
    /// Allocates the render targets at `width × height` and builds every
    /// program.
    pub fn new(mut backend: B, settings: CompositorSettings, width: u32, height: u32) -> Result<Self> {
        let mut targets = RenderTargetSet::new();
        targets.allocate(&mut backend, width, height)?;
        backend.resize_surface(Extent::new(width, height))?;

        let blur_pass = FullscreenPass::new(
            "Blur",
            ShaderProgram::box_blur(settings.blur.kernel())?,
            &[("source", TargetSlot::Main)],
            PassOutput::Target(TargetSlot::Blur),
        );
        let mask_composite = FullscreenPass::new(
            "Mask Composite",
            ShaderProgram::mask_composite()?,
            &[
                ("main", TargetSlot::Main),
                ("blur", TargetSlot::Blur),
                ("mask", TargetSlot::Mask),
            ],
            PassOutput::Screen,
        );
        let focus_composite = FullscreenPass::new(
            "Focus Composite",
            ShaderProgram::focus_composite()?,
            &[("blur", TargetSlot::Blur), ("focus", TargetSlot::Focus)],
            PassOutput::Screen,
        );
        let blur_composite = FullscreenPass::new(
            "Blur Composite",
            ShaderProgram::present()?,
            &[("source", TargetSlot::Blur)],
            PassOutput::Screen,
        );

        log::info!(
            "Compositor on '{}' at {width}x{height}, variant {}",
            backend.name(),
            settings.variant.label()
        );

        Ok(Self {
            backend,
            active_variant: settings.variant,
            settings,
            targets,
            blur_pass,
            mask_composite,
            focus_composite,
            blur_composite,
            pending_resize: None,
            failed_resize: None,
            depth_shared_generation: None,
            depth_failed_generation: None,
            frame_index: 0,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &CompositorSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn targets(&self) -> &RenderTargetSet<B::Target> {
        &self.targets
    }

    /// Variant used by the last frame (possibly degraded).
    #[inline]
    #[must_use]
    pub fn active_variant(&self) -> PipelineVariant {
        self.active_variant
    }

    #[inline]
    #[must_use]
    pub fn pending_resize(&self) -> Option<Extent> {
        self.pending_resize
    }

    #[inline]
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    // ========================================================================
    // Controls
    // ========================================================================

    /// Queues a resize, applied at the start of the next frame. Later
    /// requests replace earlier ones; zero-sized requests are ignored.
    pub fn request_resize(&mut self, width: u32, height: u32) {
        let extent = Extent::new(width, height);
        if extent.is_empty() {
            log::debug!("Ignoring resize to {width}x{height}");
            return;
        }
        self.pending_resize = Some(extent);
    }

    pub fn set_blur_enabled(&mut self, enabled: bool) {
        self.settings.blur.enabled = enabled;
    }

    /// Flips the blur switch and returns the new state.
    pub fn toggle_blur(&mut self) -> bool {
        self.settings.blur.enabled = !self.settings.blur.enabled;
        log::info!(
            "Blur {}",
            if self.settings.blur.enabled { "on" } else { "off" }
        );
        self.settings.blur.enabled
    }

    /// Sets the blur intensity, clamped to `[0, 1]`.
    pub fn set_blur_intensity(&mut self, intensity: f32) {
        self.settings.blur.intensity = if intensity.is_finite() {
            intensity.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    /// Requests a pass topology. Takes effect on the next frame.
    pub fn set_variant(&mut self, variant: PipelineVariant) {
        if self.settings.variant != variant {
            log::info!("Switching to variant {}", variant.label());
        }
        self.settings.variant = variant;
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Renders and presents one frame of `scene` seen through `camera`.
    pub fn render_frame(&mut self, scene: &Scene, camera: &Camera) -> Result<FrameReport> {
        let resize_failed = !self.apply_pending_resize()?;
        let variant = self.resolve_variant();
        self.active_variant = variant;

        let extent = self
            .targets
            .extent()
            .ok_or(PostFxError::TargetNotAllocated(TargetSlot::Main.label()))?;

        let mut report = FrameReport {
            frame_index: self.frame_index,
            variant,
            degraded: variant != self.settings.variant,
            extent,
            resize_failed,
            main_draws: 0,
            stages: SmallVec::new(),
        };

        self.backend.begin_frame()?;

        // 1. Clear
        self.clear_targets(variant)?;
        report.stages.push(FrameStage::Clear);

        // 2. Main pass
        let main = RenderRequest::build(scene, camera, RequestKind::Main);
        report.main_draws = main.items.len();
        self.backend
            .draw_scene(&main, self.targets.get_mut(TargetSlot::Main)?)?;
        report.stages.push(FrameStage::MainPass);

        // 3. Mask / focus pass
        match variant {
            PipelineVariant::MaskedFocus => {
                let mask = RenderRequest::build(scene, camera, RequestKind::Mask);
                self.backend
                    .draw_scene(&mask, self.targets.get_mut(TargetSlot::Mask)?)?;
                report.stages.push(FrameStage::MaskPass);
            }
            PipelineVariant::AdditiveFocus => {
                let focus = RenderRequest::build(scene, camera, RequestKind::Focus);
                self.backend
                    .draw_scene(&focus, self.targets.get_mut(TargetSlot::Focus)?)?;
                report.stages.push(FrameStage::FocusPass);
            }
            PipelineVariant::BlurOnly => {}
        }

        // 4. Blur pass
        let render_size = UniformValue::Vec2(extent.as_vec2());
        let blur = &self.settings.blur;
        self.blur_pass.set_uniform(uniforms::RENDER_SIZE, render_size);
        self.blur_pass
            .set_uniform(uniforms::BLUR, UniformValue::Float(blur.effective_intensity()));
        self.blur_pass
            .set_uniform(uniforms::BLUR_ENABLED, UniformValue::Bool(blur.enabled));
        self.blur_pass.run(&mut self.backend, &mut self.targets)?;
        report.stages.push(FrameStage::BlurPass);

        // 5. Composite
        let composite = match variant {
            PipelineVariant::MaskedFocus => &mut self.mask_composite,
            PipelineVariant::AdditiveFocus => &mut self.focus_composite,
            PipelineVariant::BlurOnly => &mut self.blur_composite,
        };
        composite.set_uniform(uniforms::RENDER_SIZE, render_size);
        composite.run(&mut self.backend, &mut self.targets)?;
        report.stages.push(FrameStage::CompositePass);

        // 6. Present
        self.backend.present()?;
        report.stages.push(FrameStage::Present);

        self.frame_index += 1;
        Ok(report)
    }

    /// Returns `false` when a queued resize could not be applied.
    ///
    /// The screen follows the targets only once they have been resized, so
    /// screen and targets always share one size. A failed request stays
    /// queued.
    fn apply_pending_resize(&mut self) -> Result<bool> {
        let Some(extent) = self.pending_resize else {
            return Ok(true);
        };

        match self
            .targets
            .resize(&mut self.backend, extent.width, extent.height)
        {
            Ok(_) => {
                self.backend.resize_surface(extent)?;
                self.pending_resize = None;
                self.failed_resize = None;
                Ok(true)
            }
            Err(e) => {
                if self.failed_resize == Some(extent) {
                    log::debug!("Retried resize to {}x{}: {e}", extent.width, extent.height);
                } else {
                    log::warn!(
                        "Resize to {}x{} failed, keeping {:?}: {e}",
                        extent.width,
                        extent.height,
                        self.targets.extent()
                    );
                    self.failed_resize = Some(extent);
                }
                Ok(false)
            }
        }
    }

    /// Picks the variant for this frame, setting up depth sharing when the
    /// requested variant needs it.
    fn resolve_variant(&mut self) -> PipelineVariant {
        let requested = self.settings.variant;
        if !requested.requires_depth_sharing() {
            return requested;
        }

        let generation = self.targets.generation();
        if self.depth_shared_generation == Some(generation) {
            return requested;
        }
        if self.depth_failed_generation == Some(generation) {
            return requested.degraded();
        }

        match depth::share_depth(
            &mut self.backend,
            &mut self.targets,
            TargetSlot::Main,
            TargetSlot::Mask,
        ) {
            Ok(()) => {
                self.depth_shared_generation = Some(generation);
                requested
            }
            Err(e) => {
                let fallback = requested.degraded();
                log::warn!(
                    "{e}; running {} instead of {}",
                    fallback.label(),
                    requested.label()
                );
                self.depth_failed_generation = Some(generation);
                fallback
            }
        }
    }

    fn clear_targets(&mut self, variant: PipelineVariant) -> Result<()> {
        let clear_color = Vec4::from_array(self.settings.clear_color);
        let backend = &mut self.backend;
        let targets = &mut self.targets;

        targets.clear(
            backend,
            TargetSlot::Main,
            &ClearOps::color(clear_color).with_depth(1.0).with_stencil(0),
        )?;
        match variant {
            // Depth belongs to main and was cleared above.
            PipelineVariant::MaskedFocus => {
                targets.clear(backend, TargetSlot::Mask, &ClearOps::color(Vec4::ZERO))?;
            }
            PipelineVariant::AdditiveFocus => {
                targets.clear(
                    backend,
                    TargetSlot::Focus,
                    &ClearOps::color(Vec4::ZERO).with_depth(1.0),
                )?;
            }
            PipelineVariant::BlurOnly => {}
        }
        targets.clear(backend, TargetSlot::Blur, &ClearOps::color(Vec4::ZERO))
    }
}
