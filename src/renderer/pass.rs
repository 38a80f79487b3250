//! Full-Screen Pass
//!
//! Binds a program's textures to slots of the [`RenderTargetSet`], draws one
//! screen-covering quad and writes either another slot or the screen.
//!
//! ```text
//! inputs (slot per texture name) ──► ShaderProgram ──► output slot | screen
//! ```
//!
//! A pass may never read the buffer it writes. This is checked when the
//! pass is built and again before each draw.

use smallvec::SmallVec;

use super::backend::{DrawOutput, RenderBackend};
use super::program::{ShaderProgram, UniformValue};
use super::target::{RenderTargetSet, TargetSlot};
use crate::errors::Result;

/// Destination of a full-screen pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutput {
    Target(TargetSlot),
    Screen,
}

#[derive(Debug, Clone)]
pub struct FullscreenPass {
    label: &'static str,
    program: ShaderProgram,
    inputs: SmallVec<[(&'static str, TargetSlot); 4]>,
    output: PassOutput,
}

fn assert_not_aliased(label: &str, inputs: &[(&'static str, TargetSlot)], output: PassOutput) {
    if let PassOutput::Target(out) = output {
        assert!(
            inputs.iter().all(|(_, slot)| *slot != out),
            "pass '{label}' reads and writes render target '{}'",
            out.label()
        );
    }
}

impl FullscreenPass {
    /// # Panics
    ///
    /// Panics if `output` is also one of `inputs`, or if a texture the
    /// program samples is left unbound.
    #[must_use]
    pub fn new(
        label: &'static str,
        program: ShaderProgram,
        inputs: &[(&'static str, TargetSlot)],
        output: PassOutput,
    ) -> Self {
        assert_not_aliased(label, inputs, output);
        for name in program.textures() {
            assert!(
                inputs.iter().any(|(n, _)| n == name),
                "pass '{label}' does not bind texture '{name}'"
            );
        }
        Self {
            label,
            program,
            inputs: inputs.iter().copied().collect(),
            output,
        }
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    #[inline]
    #[must_use]
    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    #[inline]
    #[must_use]
    pub fn inputs(&self) -> &[(&'static str, TargetSlot)] {
        &self.inputs
    }

    #[inline]
    #[must_use]
    pub fn output(&self) -> PassOutput {
        self.output
    }

    pub fn set_uniform(&mut self, name: &str, value: UniformValue) {
        self.program.set_uniform(name, value);
    }

    /// Rebinds a texture name to another slot.
    ///
    /// # Panics
    ///
    /// Panics if the new binding would alias the output.
    pub fn bind_input(&mut self, name: &'static str, slot: TargetSlot) {
        match self.inputs.iter_mut().find(|(n, _)| *n == name) {
            Some(binding) => binding.1 = slot,
            None => self.inputs.push((name, slot)),
        }
        assert_not_aliased(self.label, &self.inputs, self.output);
    }

    /// Draws the pass.
    pub fn run<B: RenderBackend>(
        &self,
        backend: &mut B,
        targets: &mut RenderTargetSet<B::Target>,
    ) -> Result<()> {
        assert_not_aliased(self.label, &self.inputs, self.output);

        match self.output {
            PassOutput::Screen => self.draw(backend, targets, DrawOutput::Screen),
            PassOutput::Target(slot) => {
                let mut output = targets.take(slot)?;
                let result = self.draw(backend, targets, DrawOutput::Target(&mut output));
                targets.restore(slot, output);
                result
            }
        }
    }

    fn draw<B: RenderBackend>(
        &self,
        backend: &mut B,
        targets: &RenderTargetSet<B::Target>,
        output: DrawOutput<'_, B::Target>,
    ) -> Result<()> {
        let mut bound: SmallVec<[(&str, &B::Target); 4]> = SmallVec::new();
        for (name, slot) in &self.inputs {
            bound.push((*name, targets.get(*slot)?));
        }
        backend.draw_fullscreen(&self.program, &bound, output)
    }
}
