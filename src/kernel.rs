//! Box Blur Kernel
//!
//! Weight table for the fixed-radius, ring-weighted box blur used by the blur
//! pass. The same math is emitted into `passes/box_blur.wgsl` (with the loop
//! bounds as template constants) and evaluated on the CPU by the software
//! backend, so both paths produce identical weights.
//!
//! # Weights
//!
//! For every offset `(dx, dy)` in `[-c, c]²` except the center, where
//! `c = (radius - 1) / 2`:
//!
//! ```text
//! level  = max(|dx|, |dy|) - 1
//! weight = clamp(intensity * max_level - level, 0, 1)     max_level = c
//! ```
//!
//! Rings are switched on from the inside out as `intensity` grows. The output
//! is `(center + Σ weight·sample) / (Σ weight + 1)`; the `+ 1` is the
//! unweighted center sample.

use glam::{Vec2, Vec4};

/// Kernel extent used by the reference demos.
pub const DEFAULT_KERNEL_RADIUS: u32 = 10;

/// Distance between neighbouring taps, in pixels.
pub const DEFAULT_SAMPLE_SPACING: f32 = 3.0;

/// One off-center sample of the kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelTap {
    pub dx: i32,
    pub dy: i32,
    /// Offset in normalized texture space.
    pub offset: Vec2,
    pub weight: f32,
}

/// Fixed-radius box blur with ring weights driven by an intensity scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurKernel {
    radius: u32,
    sample_spacing: f32,
}

impl Default for BlurKernel {
    fn default() -> Self {
        Self::new(DEFAULT_KERNEL_RADIUS, DEFAULT_SAMPLE_SPACING)
    }
}

impl BlurKernel {
    /// Creates a kernel. A radius of zero is treated as one (center only).
    #[must_use]
    pub fn new(radius: u32, sample_spacing: f32) -> Self {
        Self {
            radius: radius.max(1),
            sample_spacing,
        }
    }

    #[inline]
    #[must_use]
    pub fn radius(&self) -> u32 {
        self.radius
    }

    #[inline]
    #[must_use]
    pub fn sample_spacing(&self) -> f32 {
        self.sample_spacing
    }

    /// Largest `|dx|` / `|dy|` sampled: `(radius - 1) / 2`.
    #[inline]
    #[must_use]
    pub fn center_offset(&self) -> i32 {
        ((self.radius - 1) / 2) as i32
    }

    /// `floor((radius - 1) / 2)` as a float.
    #[inline]
    #[must_use]
    pub fn max_level(&self) -> f32 {
        self.center_offset() as f32
    }

    /// Ring index of an offset; the ring adjacent to the center is level 0.
    #[inline]
    #[must_use]
    pub fn level(dx: i32, dy: i32) -> f32 {
        dx.abs().max(dy.abs()) as f32 - 1.0
    }

    /// Weight of the tap at `(dx, dy)` for the given intensity.
    #[inline]
    #[must_use]
    pub fn weight(&self, intensity: f32, dx: i32, dy: i32) -> f32 {
        (intensity * self.max_level() - Self::level(dx, dy)).clamp(0.0, 1.0)
    }

    /// Offset of `(dx, dy)` in normalized texture coordinates.
    #[inline]
    #[must_use]
    pub fn uv_offset(&self, dx: i32, dy: i32, viewport: Vec2) -> Vec2 {
        Vec2::new(dx as f32, dy as f32) * self.sample_spacing / viewport
    }

    /// All off-center offsets, row-major.
    pub fn offsets(&self) -> impl Iterator<Item = (i32, i32)> {
        let c = self.center_offset();
        (-c..=c)
            .flat_map(move |dy| (-c..=c).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
    }

    /// Full tap table for one intensity / viewport combination.
    #[must_use]
    pub fn taps(&self, intensity: f32, viewport: Vec2) -> Vec<KernelTap> {
        self.offsets()
            .map(|(dx, dy)| KernelTap {
                dx,
                dy,
                offset: self.uv_offset(dx, dy, viewport),
                weight: self.weight(intensity, dx, dy),
            })
            .collect()
    }

    /// Sum of all off-center weights.
    #[must_use]
    pub fn weight_sum(&self, intensity: f32) -> f32 {
        self.offsets()
            .map(|(dx, dy)| self.weight(intensity, dx, dy))
            .sum()
    }

    /// `true` when the kernel degenerates to the center sample.
    #[inline]
    #[must_use]
    pub fn is_identity(intensity: f32) -> bool {
        intensity <= 0.0
    }

    /// Evaluates the blur at `uv`, reading texels through `sample`.
    ///
    /// This is the per-pixel computation of the blur fragment shader.
    pub fn filter<F>(&self, intensity: f32, viewport: Vec2, uv: Vec2, sample: F) -> Vec4
    where
        F: Fn(Vec2) -> Vec4,
    {
        let center = sample(uv);
        if Self::is_identity(intensity) {
            return center;
        }

        let mut color = center;
        let mut total = 0.0;
        for (dx, dy) in self.offsets() {
            let weight = self.weight(intensity, dx, dy);
            if weight <= 0.0 {
                continue;
            }
            color += sample(uv + self.uv_offset(dx, dy, viewport)) * weight;
            total += weight;
        }
        color / (total + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_kernel_geometry() {
        let kernel = BlurKernel::default();
        assert_eq!(kernel.center_offset(), 4);
        assert!((kernel.max_level() - 4.0).abs() < f32::EPSILON);
        // 9x9 grid minus the center.
        assert_eq!(kernel.offsets().count(), 80);
    }

    #[test]
    fn radius_one_has_no_taps() {
        let kernel = BlurKernel::new(1, 3.0);
        assert_eq!(kernel.offsets().count(), 0);
        assert!(kernel.weight_sum(1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_radius_is_clamped() {
        assert_eq!(BlurKernel::new(0, 3.0).radius(), 1);
    }

    #[test]
    fn uv_offset_scales_by_spacing_and_viewport() {
        let kernel = BlurKernel::default();
        let offset = kernel.uv_offset(2, -1, Vec2::new(600.0, 300.0));
        assert!((offset.x - 0.01).abs() < 1e-6);
        assert!((offset.y + 0.01).abs() < 1e-6);
    }
}
