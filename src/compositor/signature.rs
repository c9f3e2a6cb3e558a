//! Cache keys
//!
//! A [`LayerSignature`] summarises everything that affects a layer's
//! rendered image. Two equal signatures mean the cached image is still valid.

use super::snapshot::{LayerSnapshot, RenderSnapshot};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Odd constant mixing a layer's stack position into the base key
const POSITION_MIX: u64 = 0x9e37_79b9_7f4a_7c15;

#[inline]
fn mix(hash: u64, value: u64) -> u64 {
    (hash ^ value).wrapping_mul(FNV_PRIME)
}

/// Cache key of one layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerSignature {
    pub stroke_count: usize,
    pub erase_count: usize,
    /// Hash of every stroke's id and point count, in order
    pub strokes_digest: u64,
    pub has_raster: bool,
    pub raster_fingerprint: u64,
    pub visible: bool,
}

impl LayerSignature {
    pub fn of(layer: &LayerSnapshot) -> Self {
        let mut strokes_digest = FNV_OFFSET;
        let mut erase_count = 0;
        for stroke in &layer.strokes {
            strokes_digest = mix(strokes_digest, stroke.id.get());
            strokes_digest = mix(strokes_digest, stroke.points.len() as u64);
            if stroke.is_erase() {
                erase_count += 1;
            }
        }
        Self {
            stroke_count: layer.strokes.len(),
            erase_count,
            strokes_digest,
            has_raster: layer.raster.is_some(),
            raster_fingerprint: layer.raster_fingerprint,
            visible: layer.visible,
        }
    }

    /// Fold the signature into one word
    pub fn digest(&self) -> u64 {
        let mut h = FNV_OFFSET;
        h = mix(h, self.stroke_count as u64);
        h = mix(h, self.erase_count as u64);
        h = mix(h, self.strokes_digest);
        h = mix(h, self.has_raster as u64);
        h = mix(h, self.raster_fingerprint);
        mix(h, self.visible as u64)
    }
}

/// Key of the composite that excludes the active layer.
///
/// Non-active layers contribute their digest mixed with their position, so
/// moving a layer past another changes the key even when neither was
/// re-rendered.
pub fn base_key(snapshot: &RenderSnapshot, signatures: &[LayerSignature], width: u32, height: u32) -> u64 {
    let mut combined = 0u64;
    for (index, signature) in signatures.iter().enumerate() {
        if Some(index) == snapshot.active {
            continue;
        }
        let position = (index as u64 + 1).wrapping_mul(POSITION_MIX);
        combined ^= signature.digest().wrapping_add(position).wrapping_mul(POSITION_MIX);
    }

    let active = snapshot.active.map_or(u64::MAX, |i| i as u64);
    let mut key = mix(FNV_OFFSET, combined);
    key = mix(key, active);
    key = mix(key, snapshot.base_fingerprint);
    key = mix(key, width as u64);
    mix(key, height as u64)
}
