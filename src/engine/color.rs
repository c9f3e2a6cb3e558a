//! Straight-alpha RGBA color

use serde::{Deserialize, Serialize};

/// 8-bit RGBA color with straight (non-premultiplied) alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    /// Create a color from its four channels
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque color
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Build from a 4-byte RGBA slice
    #[inline]
    pub fn from_slice(px: &[u8]) -> Self {
        Self::new(px[0], px[1], px[2], px[3])
    }

    /// Channels as an array in RGBA order
    #[inline]
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Alpha as a 0.0..=1.0 float
    #[inline]
    pub fn alpha_f32(self) -> f32 {
        self.a as f32 / 255.0
    }

    /// True when fully transparent
    #[inline]
    pub fn is_transparent(self) -> bool {
        self.a == 0
    }

    /// Parse `#rrggbb` or `#rrggbbaa`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        match digits.len() {
            6 => Some(Self::opaque(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }

    /// Format as `#rrggbbaa`
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

/// Source-over composite of `src` onto `dst`, both straight alpha.
///
/// `src_alpha` overrides the source alpha (coverage already applied).
#[inline]
pub fn blend_over(dst: [u8; 4], src: [u8; 3], src_alpha: f32) -> [u8; 4] {
    let sa = src_alpha.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return dst;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);

    let mut out = [0u8; 4];
    for c in 0..3 {
        let s = src[c] as f32 / 255.0;
        let d = dst[c] as f32 / 255.0;
        let mut v = s * sa + d * da * (1.0 - sa);
        if out_a > 0.0001 {
            v /= out_a;
        }
        out[c] = to_byte(v);
    }
    out[3] = to_byte(out_a);
    out
}

#[inline]
fn to_byte(v: f32) -> u8 {
    (v * 255.0).clamp(0.0, 255.0).round() as u8
}
