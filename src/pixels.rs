//! CPU Pixel Surfaces
//!
//! [`PixelBuffer`] is the color plane of the software backend's render
//! targets and its presented screen. Texels are linear RGBA `f32`; sampling
//! uses nearest filtering with clamp-to-edge addressing, matching the
//! sampler the GPU backend binds for every full-screen pass.

use std::path::Path;

use glam::{Vec2, Vec4};

use crate::errors::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Vec4>,
}

impl PixelBuffer {
    #[must_use]
    pub fn new(width: u32, height: u32, fill: Vec4) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill; width as usize * height as usize],
        }
    }

    /// Builds a buffer by evaluating `f(x, y)` for every texel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Vec4) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn pixels(&self) -> &[Vec4] {
        &self.pixels
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// # Panics
    ///
    /// Panics if `(x, y)` is outside the buffer.
    #[inline]
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        self.pixels[self.index(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: Vec4) {
        let i = self.index(x, y);
        self.pixels[i] = value;
    }

    pub fn fill(&mut self, value: Vec4) {
        self.pixels.fill(value);
    }

    /// Resizes in place, discarding contents.
    pub fn reset(&mut self, width: u32, height: u32, fill: Vec4) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize(width as usize * height as usize, fill);
    }

    /// Normalized coordinate of the center of texel `(x, y)`.
    #[inline]
    #[must_use]
    pub fn texel_center(&self, x: u32, y: u32) -> Vec2 {
        Vec2::new(
            (x as f32 + 0.5) / self.width as f32,
            (y as f32 + 0.5) / self.height as f32,
        )
    }

    /// Nearest-filtered, clamp-to-edge lookup at a normalized coordinate.
    #[must_use]
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        if self.pixels.is_empty() {
            return Vec4::ZERO;
        }
        let x = (uv.x * self.width as f32).floor();
        let y = (uv.y * self.height as f32).floor();
        let x = x.clamp(0.0, (self.width - 1) as f32) as u32;
        let y = y.clamp(0.0, (self.height - 1) as f32) as u32;
        self.get(x, y)
    }

    /// Nearest-filtered lookup with repeat addressing, the sampler state of
    /// material textures.
    #[must_use]
    pub fn sample_repeat(&self, uv: Vec2) -> Vec4 {
        if self.pixels.is_empty() {
            return Vec4::ZERO;
        }
        let wrapped = uv - uv.floor();
        let x = ((wrapped.x * self.width as f32) as u32).min(self.width - 1);
        let y = ((wrapped.y * self.height as f32) as u32).min(self.height - 1);
        self.get(x, y)
    }

    /// Converts a decoded 8-bit image to linear `[0, 1]` texels.
    #[must_use]
    pub fn from_rgba8(image: &image::RgbaImage) -> Self {
        Self::from_fn(image.width(), image.height(), |x, y| {
            let [r, g, b, a] = image.get_pixel(x, y).0;
            Vec4::new(
                f32::from(r),
                f32::from(g),
                f32::from(b),
                f32::from(a),
            ) / 255.0
        })
    }

    /// Quantizes to 8-bit RGBA (what an `Rgba8Unorm` target would store).
    #[must_use]
    pub fn to_rgba8(&self) -> image::RgbaImage {
        image::RgbaImage::from_fn(self.width, self.height, |x, y| {
            let c = self.get(x, y).clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
            image::Rgba([
                c.x.round() as u8,
                c.y.round() as u8,
                c.z.round() as u8,
                c.w.round() as u8,
            ])
        })
    }

    /// Writes the buffer as a PNG file.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_rgba8().save(path)?;
        Ok(())
    }
}
