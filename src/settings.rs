//! Compositor Settings & Pipeline Variants
//!
//! This module defines the configuration consumed by the
//! [`Compositor`](crate::renderer::Compositor).
//!
//! The core abstraction is [`PipelineVariant`], which selects the topology of
//! the per-frame pass chain:
//!
//! | Variant         | Extra scene pass          | Composite                         |
//! |-----------------|---------------------------|-----------------------------------|
//! | `BlurOnly`      | none                      | `blur`                            |
//! | `MaskedFocus`   | mask (shared main depth)  | `mask.r > 0 ? main : blur`        |
//! | `AdditiveFocus` | focus subject (own depth) | `clamp(blur + focus, 0, 1)`       |
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use myth_postfx::settings::{CompositorSettings, PipelineVariant};
//!
//! let settings = CompositorSettings::default()
//!     .with_variant(PipelineVariant::AdditiveFocus)
//!     .with_blur_intensity(0.5);
//!
//! // Or from a JSON file, missing fields fall back to defaults:
//! let settings = CompositorSettings::load("postfx.json")?;
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::kernel::{BlurKernel, DEFAULT_KERNEL_RADIUS, DEFAULT_SAMPLE_SPACING};

// ---------------------------------------------------------------------------
// PipelineVariant
// ---------------------------------------------------------------------------

/// Topology of the post-processing pass chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineVariant {
    /// Main → Blur → Composite(blur). The degraded fallback.
    BlurOnly,
    /// Main → Mask → Blur → Composite(select by mask). Requires depth sharing.
    #[default]
    MaskedFocus,
    /// Main → Focus → Blur → Composite(blur + focus).
    AdditiveFocus,
}

impl PipelineVariant {
    /// Returns `true` when the variant needs the mask target to reuse the
    /// main target's depth attachment.
    #[inline]
    #[must_use]
    pub fn requires_depth_sharing(self) -> bool {
        matches!(self, Self::MaskedFocus)
    }

    /// Variant to fall back to when a required capability is missing.
    #[inline]
    #[must_use]
    pub fn degraded(self) -> Self {
        match self {
            Self::MaskedFocus => Self::BlurOnly,
            other => other,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::BlurOnly => "blur-only",
            Self::MaskedFocus => "masked-focus",
            Self::AdditiveFocus => "additive-focus",
        }
    }
}

// ---------------------------------------------------------------------------
// BlurSettings
// ---------------------------------------------------------------------------

/// Blur pass parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurSettings {
    /// When `false` the blur pass still runs, but with intensity 0.
    pub enabled: bool,
    /// Blur strength in `[0, 1]`.
    pub intensity: f32,
    /// Kernel extent in samples. Default: `10`
    pub kernel_radius: u32,
    /// Tap spacing in pixels. Default: `3.0`
    pub sample_spacing: f32,
}

impl Default for BlurSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: 0.5,
            kernel_radius: DEFAULT_KERNEL_RADIUS,
            sample_spacing: DEFAULT_SAMPLE_SPACING,
        }
    }
}

impl BlurSettings {
    /// Intensity actually uploaded to the blur pass: clamped to `[0, 1]` and
    /// forced to `0` while the blur is disabled.
    #[inline]
    #[must_use]
    pub fn effective_intensity(&self) -> f32 {
        if self.enabled && self.intensity.is_finite() {
            self.intensity.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn kernel(&self) -> BlurKernel {
        BlurKernel::new(self.kernel_radius, self.sample_spacing)
    }
}

// ---------------------------------------------------------------------------
// CompositorSettings
// ---------------------------------------------------------------------------

/// Global configuration for the compositor and its backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorSettings {
    /// Requested pass topology. The active variant may be degraded at
    /// runtime if the backend lacks a capability.
    pub variant: PipelineVariant,
    pub blur: BlurSettings,
    /// Clear color of the main target (linear RGBA).
    pub clear_color: [f32; 4],
    /// Present with vertical sync.
    pub vsync: bool,
    /// Prefer a discrete / high-performance adapter.
    pub high_performance: bool,
}

impl Default for CompositorSettings {
    fn default() -> Self {
        Self {
            variant: PipelineVariant::default(),
            blur: BlurSettings::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            vsync: true,
            high_performance: true,
        }
    }
}

impl CompositorSettings {
    /// Parses settings from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    #[must_use]
    pub fn with_variant(mut self, variant: PipelineVariant) -> Self {
        self.variant = variant;
        self
    }

    #[must_use]
    pub fn with_blur_enabled(mut self, enabled: bool) -> Self {
        self.blur.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_blur_intensity(mut self, intensity: f32) -> Self {
        self.blur.intensity = intensity.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    #[must_use]
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }
}
