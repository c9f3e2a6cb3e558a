//! Raster pixel buffers
//!
//! A [`Raster`] is a row-major RGBA8 buffer with straight alpha. It is the
//! common currency between layers, the compositor and the archive codec.

use image::{imageops, RgbaImage};
use sha2::{Digest, Sha256};

use crate::engine::color::{blend_over, Rgba};
use crate::error::{PaintError, Result};

/// Bytes per RGBA pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// RGBA8 pixel buffer, straight alpha
#[derive(Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Raster {
    /// Create a fully transparent raster
    ///
    /// A zero-sized raster is representable (it is "empty") but rejected by
    /// every operation that consumes images.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Rgba::TRANSPARENT)
    }

    /// Create a raster filled with a single color
    pub fn filled(width: u32, height: u32, color: Rgba) -> Self {
        let count = width as usize * height as usize;
        let pixels = color.to_array().repeat(count);
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Wrap raw RGBA bytes
    ///
    /// # Errors
    /// Returns `InvalidDimensions` when the byte count does not match
    /// `width * height * 4`.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        if pixels.len() != width as usize * height as usize * BYTES_PER_PIXEL {
            return Err(PaintError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Convert from an `image` crate buffer
    pub fn from_rgba_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: image.into_raw(),
        }
    }

    /// Convert into an `image` crate buffer
    pub fn to_rgba_image(&self) -> RgbaImage {
        // Length is an invariant of Raster, so this cannot fail
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`
    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// True for a zero-area raster
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Raw RGBA bytes
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable raw RGBA bytes
    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Consume and return the raw bytes
    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL
    }

    /// Whether `(x, y)` lies inside the raster
    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }

    /// Read one pixel. Caller guarantees bounds.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Rgba {
        let i = self.offset(x, y);
        Rgba::from_slice(&self.pixels[i..i + BYTES_PER_PIXEL])
    }

    /// Write one pixel. Caller guarantees bounds.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, color: Rgba) {
        let i = self.offset(x, y);
        self.pixels[i..i + BYTES_PER_PIXEL].copy_from_slice(&color.to_array());
    }

    /// Overwrite every pixel with `color`
    pub fn fill(&mut self, color: Rgba) {
        let px = color.to_array();
        for chunk in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            chunk.copy_from_slice(&px);
        }
    }

    /// Source-over composite `src` onto this raster.
    ///
    /// A source of a different size is resampled to this raster's size
    /// first.
    pub fn draw_over(&mut self, src: &Raster) {
        if src.size() != self.size() {
            let scaled = src.resized(self.width, self.height);
            self.blend_same_size(&scaled);
        } else {
            self.blend_same_size(src);
        }
    }

    fn blend_same_size(&mut self, src: &Raster) {
        for (dst, s) in self
            .pixels
            .chunks_exact_mut(BYTES_PER_PIXEL)
            .zip(src.pixels.chunks_exact(BYTES_PER_PIXEL))
        {
            match s[3] {
                0 => {}
                255 => dst.copy_from_slice(s),
                a => {
                    let out = blend_over(
                        [dst[0], dst[1], dst[2], dst[3]],
                        [s[0], s[1], s[2]],
                        a as f32 / 255.0,
                    );
                    dst.copy_from_slice(&out);
                }
            }
        }
    }

    /// Source-over composite `src` with its top-left corner at `(x, y)`.
    /// Parts falling outside this raster are clipped.
    pub fn draw_at(&mut self, src: &Raster, x: i64, y: i64) {
        for sy in 0..src.height {
            let dy = y + sy as i64;
            if dy < 0 || dy >= self.height as i64 {
                continue;
            }
            for sx in 0..src.width {
                let dx = x + sx as i64;
                if dx < 0 || dx >= self.width as i64 {
                    continue;
                }
                let s = src.get(sx, sy);
                if s.a == 0 {
                    continue;
                }
                let d = self.get(dx as u32, dy as u32);
                let out = blend_over(d.to_array(), [s.r, s.g, s.b], s.alpha_f32());
                self.set(dx as u32, dy as u32, Rgba::from_slice(&out));
            }
        }
    }

    /// Scale every pixel's alpha by `opacity` (clamped to 0..=1)
    pub fn multiply_alpha(&mut self, opacity: f32) {
        let o = opacity.clamp(0.0, 1.0);
        if o >= 1.0 {
            return;
        }
        for px in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            px[3] = (px[3] as f32 * o).round() as u8;
        }
    }

    /// Resample to a new size (bilinear). Same size returns a clone.
    pub fn resized(&self, width: u32, height: u32) -> Raster {
        if self.size() == (width, height) {
            return self.clone();
        }
        if self.is_empty() || width == 0 || height == 0 {
            return Raster::new(width, height);
        }
        let scaled = imageops::resize(
            &self.to_rgba_image(),
            width,
            height,
            imageops::FilterType::Triangle,
        );
        Raster::from_rgba_image(scaled)
    }

    /// Aspect-preserving downscale so the longest side is at most `max_side`.
    ///
    /// Rasters already within the limit are returned unchanged.
    pub fn thumbnail(&self, max_side: u32) -> Raster {
        let longest = self.width.max(self.height);
        if longest <= max_side || self.is_empty() || max_side == 0 {
            return self.clone();
        }
        let scale = max_side as f64 / longest as f64;
        let w = ((self.width as f64 * scale).round() as u32).clamp(1, max_side);
        let h = ((self.height as f64 * scale).round() as u32).clamp(1, max_side);
        Raster::from_rgba_image(imageops::thumbnail(&self.to_rgba_image(), w, h))
    }

    /// 64-bit content fingerprint (truncated SHA-256 of size and pixels)
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(self.width.to_le_bytes());
        hasher.update(self.height.to_le_bytes());
        hasher.update(&self.pixels);
        let digest = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(head)
    }

    /// Number of pixels whose color equals `color`
    pub fn count_color(&self, color: Rgba) -> usize {
        let px = color.to_array();
        self.pixels
            .chunks_exact(BYTES_PER_PIXEL)
            .filter(|c| *c == px)
            .count()
    }
}
