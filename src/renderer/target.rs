//! Render Target Set
//!
//! Owns the offscreen buffers the compositor renders into and keeps them the
//! size of the viewport.
//!
//! | Slot    | Color | Depth | Stencil | Written by          |
//! |---------|-------|-------|---------|---------------------|
//! | `Main`  | ✓     | ✓     | ✓       | main scene pass     |
//! | `Mask`  | ✓     | shared  |         | mask pass           |
//! | `Blur`  | ✓     |       |         | blur pass           |
//! | `Focus` | ✓     | ✓     |         | focus pass          |
//!
//! Every target uses nearest filtering and clamp-to-edge addressing.
//!
//! # Atomic reallocation
//!
//! [`RenderTargetSet::allocate`] builds the complete new set before touching
//! the current one. If any allocation fails, the partially built set is
//! dropped and the previous targets stay in place, so the set never holds
//! buffers of different sizes.

use glam::{Vec2, Vec4};

use super::backend::RenderBackend;
use crate::errors::{PostFxError, Result};

/// Fixed roles in the render target set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetSlot {
    Main,
    Mask,
    Blur,
    Focus,
}

impl TargetSlot {
    pub const ALL: [Self; 4] = [Self::Main, Self::Mask, Self::Blur, Self::Focus];

    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Mask => "mask",
            Self::Blur => "blur",
            Self::Focus => "focus",
        }
    }

    /// Attachment layout for this slot.
    #[must_use]
    pub fn desc(self) -> TargetDesc {
        let (has_depth, has_stencil) = match self {
            Self::Main => (true, true),
            Self::Mask | Self::Focus => (true, false),
            Self::Blur => (false, false),
        };
        TargetDesc {
            slot: self,
            has_depth,
            has_stencil,
            filter: FilterMode::Nearest,
            wrap: WrapMode::ClampToEdge,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    Nearest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
}

/// Description of one offscreen buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDesc {
    pub slot: TargetSlot,
    pub has_depth: bool,
    pub has_stencil: bool,
    pub filter: FilterMode,
    pub wrap: WrapMode,
}

impl TargetDesc {
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.slot.label()
    }
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    #[must_use]
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    #[inline]
    #[must_use]
    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

/// Which channels of a target to clear, and to what.
///
/// `None` leaves the channel untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearOps {
    pub color: Option<Vec4>,
    pub depth: Option<f32>,
    pub stencil: Option<u32>,
}

impl ClearOps {
    #[must_use]
    pub fn color(color: Vec4) -> Self {
        Self {
            color: Some(color),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_depth(mut self, depth: f32) -> Self {
        self.depth = Some(depth);
        self
    }

    #[must_use]
    pub fn with_stencil(mut self, stencil: u32) -> Self {
        self.stencil = Some(stencil);
        self
    }

    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.color.is_none() && self.depth.is_none() && self.stencil.is_none()
    }
}

/// Viewport-sized offscreen buffers, one per [`TargetSlot`].
#[derive(Debug)]
pub struct RenderTargetSet<T> {
    extent: Option<Extent>,
    targets: [Option<T>; 4],
    /// Bumped on every successful (re)allocation.
    generation: u64,
}

impl<T> Default for RenderTargetSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RenderTargetSet<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            extent: None,
            targets: [None, None, None, None],
            generation: 0,
        }
    }

    /// Current size, or `None` before the first allocation.
    #[inline]
    #[must_use]
    pub fn extent(&self) -> Option<Extent> {
        self.extent
    }

    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `true` when every slot holds a target.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.targets.iter().all(Option::is_some)
    }

    /// Creates every target at `width × height`, replacing the current set
    /// only if all of them succeed.
    pub fn allocate<B>(&mut self, backend: &mut B, width: u32, height: u32) -> Result<()>
    where
        B: RenderBackend<Target = T>,
    {
        let extent = Extent::new(width, height);
        if extent.is_empty() {
            return Err(PostFxError::InvalidExtent { width, height });
        }

        let mut staged: [Option<T>; 4] = [None, None, None, None];
        for slot in TargetSlot::ALL {
            staged[slot.index()] = Some(backend.create_target(&slot.desc(), extent)?);
        }

        // Old targets are released here, after the new set is complete.
        self.targets = staged;
        self.extent = Some(extent);
        self.generation += 1;

        log::debug!(
            "Allocated render targets at {width}x{height} on '{}' (generation {})",
            backend.name(),
            self.generation
        );
        Ok(())
    }

    /// Resizes all targets. Returns `Ok(false)` when the set already has this
    /// size and nothing was reallocated.
    pub fn resize<B>(&mut self, backend: &mut B, width: u32, height: u32) -> Result<bool>
    where
        B: RenderBackend<Target = T>,
    {
        if self.extent == Some(Extent::new(width, height)) && self.is_complete() {
            return Ok(false);
        }
        self.allocate(backend, width, height)?;
        Ok(true)
    }

    /// Clears the selected channels of one target.
    pub fn clear<B>(&mut self, backend: &mut B, slot: TargetSlot, ops: &ClearOps) -> Result<()>
    where
        B: RenderBackend<Target = T>,
    {
        let target = self.get_mut(slot)?;
        backend.clear(target, ops)
    }

    pub fn get(&self, slot: TargetSlot) -> Result<&T> {
        self.targets[slot.index()]
            .as_ref()
            .ok_or(PostFxError::TargetNotAllocated(slot.label()))
    }

    pub fn get_mut(&mut self, slot: TargetSlot) -> Result<&mut T> {
        self.targets[slot.index()]
            .as_mut()
            .ok_or(PostFxError::TargetNotAllocated(slot.label()))
    }

    /// Moves a target out so it can be written while others are read.
    /// Must be handed back with [`restore`](Self::restore).
    pub fn take(&mut self, slot: TargetSlot) -> Result<T> {
        self.targets[slot.index()]
            .take()
            .ok_or(PostFxError::TargetNotAllocated(slot.label()))
    }

    pub fn restore(&mut self, slot: TargetSlot, target: T) {
        debug_assert!(
            self.targets[slot.index()].is_none(),
            "restoring '{}' over a live target",
            slot.label()
        );
        self.targets[slot.index()] = Some(target);
    }
}
