//! Full-Screen Shader Programs
//!
//! A [`ShaderProgram`] is the rendered WGSL source of one full-screen pass,
//! the names of the textures it samples, and its scalar uniforms. The source
//! is immutable after creation; uniform values are updated by the compositor
//! once per frame.
//!
//! # Bindings
//!
//! Every program shares one bind group layout:
//!
//! ```text
//! @binding(0)       PassUniforms { render_size, blur, flags }
//! @binding(1)       nearest / clamp-to-edge sampler
//! @binding(2 + i)   texture i, in declaration order
//! ```

use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use serde::Serialize;

use super::shader_library::{render_template, source_hash};
use crate::errors::Result;
use crate::kernel::BlurKernel;

/// Well-known uniform names.
pub mod uniforms {
    /// `f32`: blur intensity, `0` selects the identity path.
    pub const BLUR: &str = "blur";
    /// `vec2`: viewport size in pixels.
    pub const RENDER_SIZE: &str = "render_size";
    /// `bool`: whether the user has the blur switched on. When off the blur
    /// program copies its source whatever the intensity.
    pub const BLUR_ENABLED: &str = "blur_enabled";
}

/// Flag bits packed into [`PassUniforms::flags`].
pub const FLAG_BLUR_ENABLED: u32 = 1;

/// What a program computes per pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgramKind {
    /// Ring-weighted box blur of `source`.
    BoxBlur(BlurKernel),
    /// `mask.r > 0 ? main : blur`.
    MaskComposite,
    /// `clamp(blur + focus, 0, 1)`.
    FocusComposite,
    /// Copies `source` unchanged.
    Present,
}

impl ProgramKind {
    #[must_use]
    pub fn template(&self) -> &'static str {
        match self {
            Self::BoxBlur(_) => "passes/box_blur",
            Self::MaskComposite => "passes/mask_composite",
            Self::FocusComposite => "passes/focus_composite",
            Self::Present => "passes/present",
        }
    }

    /// Texture bindings, in binding order.
    #[must_use]
    pub fn textures(&self) -> &'static [&'static str] {
        match self {
            Self::BoxBlur(_) | Self::Present => &["source"],
            Self::MaskComposite => &["main", "blur", "mask"],
            Self::FocusComposite => &["blur", "focus"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformType {
    Float,
    Vec2,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Bool(bool),
}

impl UniformValue {
    #[must_use]
    pub fn ty(&self) -> UniformType {
        match self {
            Self::Float(_) => UniformType::Float,
            Self::Vec2(_) => UniformType::Vec2,
            Self::Bool(_) => UniformType::Bool,
        }
    }
}

/// GPU layout of the per-pass uniform block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PassUniforms {
    pub render_size: [f32; 2],
    pub blur: f32,
    pub flags: u32,
}

#[derive(Serialize)]
struct ProgramContext<'a> {
    textures: &'a [&'a str],
    center_offset: i32,
    max_level: String,
    sample_spacing: String,
    flag_blur_enabled: u32,
}

#[derive(Debug, Clone)]
pub struct ShaderProgram {
    label: &'static str,
    kind: ProgramKind,
    source: String,
    source_hash: u128,
    uniforms: BTreeMap<&'static str, UniformValue>,
}

impl ShaderProgram {
    /// Renders the template for `kind`.
    pub fn new(label: &'static str, kind: ProgramKind) -> Result<Self> {
        let kernel = match kind {
            ProgramKind::BoxBlur(kernel) => kernel,
            _ => BlurKernel::default(),
        };
        let ctx = ProgramContext {
            textures: kind.textures(),
            center_offset: kernel.center_offset(),
            // Debug formatting keeps the decimal point WGSL needs for f32.
            max_level: format!("{:?}", kernel.max_level()),
            sample_spacing: format!("{:?}", kernel.sample_spacing()),
            flag_blur_enabled: FLAG_BLUR_ENABLED,
        };
        let source = render_template(kind.template(), &ctx)?;
        let source_hash = source_hash(&source);

        let mut values = BTreeMap::new();
        values.insert(uniforms::RENDER_SIZE, UniformValue::Vec2(Vec2::ONE));
        if matches!(kind, ProgramKind::BoxBlur(_)) {
            values.insert(uniforms::BLUR, UniformValue::Float(0.0));
            values.insert(uniforms::BLUR_ENABLED, UniformValue::Bool(false));
        }

        log::debug!("Built shader program '{label}' from {}", kind.template());
        Ok(Self {
            label,
            kind,
            source,
            source_hash,
            uniforms: values,
        })
    }

    pub fn box_blur(kernel: BlurKernel) -> Result<Self> {
        Self::new("Box Blur", ProgramKind::BoxBlur(kernel))
    }

    pub fn mask_composite() -> Result<Self> {
        Self::new("Mask Composite", ProgramKind::MaskComposite)
    }

    pub fn focus_composite() -> Result<Self> {
        Self::new("Focus Composite", ProgramKind::FocusComposite)
    }

    pub fn present() -> Result<Self> {
        Self::new("Present", ProgramKind::Present)
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &ProgramKind {
        &self.kind
    }

    /// Complete WGSL module with `vs_main` and `fs_main` entry points.
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    #[must_use]
    pub fn source_hash(&self) -> u128 {
        self.source_hash
    }

    #[inline]
    #[must_use]
    pub fn textures(&self) -> &'static [&'static str] {
        self.kind.textures()
    }

    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms.get(name).copied()
    }

    pub fn uniforms(&self) -> impl Iterator<Item = (&'static str, UniformValue)> + '_ {
        self.uniforms.iter().map(|(k, v)| (*k, *v))
    }

    /// Updates a declared uniform.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not declared or `value` has a different type.
    pub fn set_uniform(&mut self, name: &str, value: UniformValue) {
        let Some(slot) = self.uniforms.get_mut(name) else {
            panic!("program '{}' has no uniform '{name}'", self.label);
        };
        assert_eq!(
            slot.ty(),
            value.ty(),
            "uniform '{name}' of program '{}' has a different type",
            self.label
        );
        *slot = value;
    }

    #[must_use]
    pub fn float(&self, name: &str) -> f32 {
        match self.uniform(name) {
            Some(UniformValue::Float(v)) => v,
            _ => 0.0,
        }
    }

    /// Value of a `bool` uniform, `false` if undeclared.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.uniform(name), Some(UniformValue::Bool(true)))
    }

    #[must_use]
    pub fn render_size(&self) -> Vec2 {
        match self.uniform(uniforms::RENDER_SIZE) {
            Some(UniformValue::Vec2(v)) => v,
            _ => Vec2::ONE,
        }
    }

    /// Packs the current values into the GPU uniform block.
    #[must_use]
    pub fn pack_uniforms(&self) -> PassUniforms {
        let mut flags = 0;
        if self.flag(uniforms::BLUR_ENABLED) {
            flags |= FLAG_BLUR_ENABLED;
        }
        PassUniforms {
            render_size: self.render_size().to_array(),
            blur: self.float(uniforms::BLUR),
            flags,
        }
    }
}
