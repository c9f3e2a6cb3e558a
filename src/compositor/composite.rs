//! Frame Compositor
//!
//! Turns a [`RenderSnapshot`] into one displayable image while redoing as
//! little work as possible between frames:
//!
//! 1. Each visible layer's committed content is cached per [`LayerId`] and
//!    re-rendered only when its [`LayerSignature`] changes.
//! 2. Everything except the active layer is pre-composited into two parts,
//!    `below` (white, base image, layers under the active one) and `above`
//!    (layers over it). Both are rebuilt only when the base key changes.
//! 3. While a stroke is in progress, only its new tail is stamped, into a
//!    clone of the active layer and, when the result is equivalent, straight
//!    into the output.

use std::collections::HashMap;

use log::debug;

use super::signature::{base_key, LayerSignature};
use super::snapshot::{LayerSnapshot, RenderSnapshot};
use crate::config::Background;
use crate::engine::{render_strokes, stamp_points, stamp_segments, Raster, Rgba, Stroke, StrokeId, StrokeMode};
use crate::error::{PaintError, Result};
use crate::layers::{Layer, LayerId, LayerStack};

/// Work counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompositorStats {
    /// Layer cache images rendered from scratch
    pub layer_renders: u64,
    /// Rebuilds of the below/above composites
    pub base_rebuilds: u64,
    /// Tails of an in-progress stroke stamped
    pub incremental_stamps: u64,
    /// Output images composed from below, active and above
    pub full_composites: u64,
}

#[derive(Debug)]
struct CachedLayer {
    signature: LayerSignature,
    /// `None` for invisible layers
    image: Option<Raster>,
}

#[derive(Debug)]
struct InProgress {
    stroke_id: StrokeId,
    layer_id: LayerId,
    /// Active layer cache plus the stamped part of the stroke
    image: Raster,
    /// Points of the stroke already stamped
    stamped: usize,
    /// Whether stamping straight into the output gives the full composite
    direct: bool,
}

/// Cached, incremental compositor for one viewport
#[derive(Debug)]
pub struct Compositor {
    width: u32,
    height: u32,
    scale: f32,
    layers: HashMap<LayerId, CachedLayer>,
    base_key: Option<u64>,
    below: Raster,
    above: Raster,
    above_visible: bool,
    output: Raster,
    output_valid: bool,
    in_progress: Option<InProgress>,
    stats: CompositorStats,
}

impl Compositor {
    /// Create a compositor for a `width x height` pixel viewport showing a
    /// document at `scale` pixels per logical unit
    pub fn new(width: u32, height: u32, scale: f32) -> Result<Self> {
        if width == 0 || height == 0 || !(scale.is_finite() && scale > 0.0) {
            return Err(PaintError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            scale,
            layers: HashMap::new(),
            base_key: None,
            below: Raster::new(width, height),
            above: Raster::new(width, height),
            above_visible: false,
            output: Raster::new(width, height),
            output_valid: false,
            in_progress: None,
            stats: CompositorStats::default(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn stats(&self) -> CompositorStats {
        self.stats
    }

    /// Signature the cached image of `layer_id` was rendered for
    pub fn cached_signature(&self, layer_id: LayerId) -> Option<LayerSignature> {
        self.layers.get(&layer_id).map(|c| c.signature)
    }

    /// The last rendered frame
    pub fn output(&self) -> &Raster {
        &self.output
    }

    /// Active layer plus the stroke in progress, while one is being drawn
    pub fn in_progress_image(&self) -> Option<&Raster> {
        self.in_progress.as_ref().map(|p| &p.image)
    }

    /// Change the viewport size. Any change drops every cache.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(PaintError::InvalidDimensions { width, height });
        }
        if (width, height) != (self.width, self.height) {
            debug!("Viewport resized to {width}x{height}, dropping caches");
            self.width = width;
            self.height = height;
            self.reset();
        }
        Ok(())
    }

    /// Drop every cached image
    pub fn reset(&mut self) {
        self.layers.clear();
        self.base_key = None;
        self.below = Raster::new(self.width, self.height);
        self.above = Raster::new(self.width, self.height);
        self.above_visible = false;
        self.output = Raster::new(self.width, self.height);
        self.output_valid = false;
        self.in_progress = None;
    }

    /// Produce the frame for `snapshot`
    pub fn render(&mut self, snapshot: &RenderSnapshot) -> &Raster {
        let signatures: Vec<LayerSignature> = snapshot.layers.iter().map(LayerSignature::of).collect();

        let active_rerendered = self.refresh_layers(snapshot, &signatures);
        let base_rebuilt = self.refresh_base(snapshot, &signatures);
        if active_rerendered || base_rebuilt {
            self.output_valid = false;
        }

        match (snapshot.current_stroke.as_ref(), snapshot.active_layer()) {
            (Some(stroke), Some(active)) if active.visible => {
                self.render_in_progress(active.id, stroke, active_rerendered);
            }
            _ => self.render_committed(snapshot),
        }
        &self.output
    }

    /// Re-render stale layer caches and drop caches of removed layers.
    ///
    /// Returns whether the active layer's cache changed.
    fn refresh_layers(&mut self, snapshot: &RenderSnapshot, signatures: &[LayerSignature]) -> bool {
        self.layers
            .retain(|id, _| snapshot.layers.iter().any(|l| l.id == *id));

        let mut active_rerendered = false;
        for (index, (layer, signature)) in snapshot.layers.iter().zip(signatures).enumerate() {
            if self.cached_signature(layer.id) == Some(*signature) {
                continue;
            }
            let image = if layer.visible {
                self.stats.layer_renders += 1;
                Some(render_layer(layer, self.width, self.height, self.scale))
            } else {
                None
            };
            self.layers.insert(
                layer.id,
                CachedLayer {
                    signature: *signature,
                    image,
                },
            );
            if Some(index) == snapshot.active {
                active_rerendered = true;
            }
        }
        active_rerendered
    }

    /// Rebuild the below/above composites when the base key changed
    fn refresh_base(&mut self, snapshot: &RenderSnapshot, signatures: &[LayerSignature]) -> bool {
        let key = base_key(snapshot, signatures, self.width, self.height);
        if self.base_key == Some(key) {
            return false;
        }

        self.below.fill(Rgba::WHITE);
        if let Some(base) = &snapshot.base_image {
            self.below.draw_over(base);
        }
        self.above.fill(Rgba::TRANSPARENT);
        self.above_visible = false;

        for (index, layer) in snapshot.layers.iter().enumerate() {
            if Some(index) == snapshot.active {
                continue;
            }
            let Some(image) = self.layers.get(&layer.id).and_then(|c| c.image.as_ref()) else {
                continue;
            };
            if snapshot.active.map_or(true, |active| index < active) {
                self.below.draw_over(image);
            } else {
                self.above.draw_over(image);
                self.above_visible = true;
            }
        }

        debug!(
            "Rebuilt base composite ({} layers, active {:?})",
            snapshot.layers.len(),
            snapshot.active
        );
        self.base_key = Some(key);
        self.stats.base_rebuilds += 1;
        if let Some(progress) = self.in_progress.as_mut() {
            progress.direct = false;
        }
        true
    }

    fn cached_image(&self, id: LayerId) -> Option<&Raster> {
        self.layers.get(&id).and_then(|c| c.image.as_ref())
    }

    fn render_in_progress(&mut self, layer_id: LayerId, stroke: &Stroke, active_rerendered: bool) {
        let restart = active_rerendered
            || self
                .in_progress
                .as_ref()
                .map_or(true, |p| p.stroke_id != stroke.id || p.layer_id != layer_id);
        let mut full = !self.output_valid;

        if restart {
            let image = self
                .cached_image(layer_id)
                .cloned()
                .unwrap_or_else(|| Raster::new(self.width, self.height));
            self.in_progress = Some(InProgress {
                stroke_id: stroke.id,
                layer_id,
                image,
                stamped: 0,
                direct: stroke.mode == StrokeMode::Draw && !self.above_visible,
            });
            full = true;
        }
        let Some(progress) = self.in_progress.as_mut() else {
            return;
        };

        let count = stroke.points.len();
        if count > progress.stamped {
            let scale = self.scale;
            if progress.stamped == 0 {
                let tail = &stroke.points[..];
                stamp_points(&mut progress.image, tail, stroke.color, stroke.size, stroke.mode, scale);
                if progress.direct && !full {
                    stamp_points(&mut self.output, tail, stroke.color, stroke.size, stroke.mode, scale);
                } else {
                    full = true;
                }
            } else {
                let tail = &stroke.points[progress.stamped - 1..];
                stamp_segments(&mut progress.image, tail, stroke.color, stroke.size, stroke.mode, scale);
                if progress.direct && !full {
                    stamp_segments(&mut self.output, tail, stroke.color, stroke.size, stroke.mode, scale);
                } else {
                    full = true;
                }
            }
            progress.stamped = count;
            self.stats.incremental_stamps += 1;
        }

        if full {
            let above = self.above_visible.then_some(&self.above);
            compose(&mut self.output, &self.below, Some(&progress.image), above);
            self.stats.full_composites += 1;
            self.output_valid = true;
        }
    }

    fn render_committed(&mut self, snapshot: &RenderSnapshot) {
        if self.in_progress.take().is_some() {
            self.output_valid = false;
        }
        if self.output_valid {
            return;
        }
        let active = snapshot
            .active_layer()
            .and_then(|l| self.layers.get(&l.id))
            .and_then(|c| c.image.as_ref());
        let above = self.above_visible.then_some(&self.above);
        compose(&mut self.output, &self.below, active, above);
        self.stats.full_composites += 1;
        self.output_valid = true;
    }
}

/// `output = below + middle + above`; all rasters share one size
fn compose(output: &mut Raster, below: &Raster, middle: Option<&Raster>, above: Option<&Raster>) {
    output.pixels_mut().copy_from_slice(below.pixels());
    if let Some(middle) = middle {
        output.draw_over(middle);
    }
    if let Some(above) = above {
        output.draw_over(above);
    }
}

/// A layer's raster (resampled to fit) with its committed strokes on top
fn render_layer(layer: &LayerSnapshot, width: u32, height: u32, scale: f32) -> Raster {
    render_content(layer.raster.as_deref(), &layer.strokes, width, height, scale)
}

fn render_content(raster: Option<&Raster>, strokes: &[Stroke], width: u32, height: u32, scale: f32) -> Raster {
    let mut image = Raster::new(width, height);
    if let Some(raster) = raster {
        image.draw_over(raster);
    }
    render_strokes(&mut image, strokes, scale);
    image
}

/// Committed content of every visible layer, base image included, over
/// `background` at `width x height`
pub fn export_flattened(stack: &LayerStack, width: u32, height: u32, background: Background) -> Raster {
    let mut out = Raster::filled(width, height, background.color());
    if out.is_empty() {
        return out;
    }
    if let Some(base) = stack.base_image() {
        out.draw_over(base);
    }
    let scale = width as f32 / stack.width() as f32;
    for layer in stack.layers().iter().filter(|l| l.is_visible()) {
        let image = render_content(layer.raster().map(|r| r.as_ref()), layer.strokes(), width, height, scale);
        out.draw_over(&image);
    }
    out
}

/// One layer alone over transparent at canvas scale
pub fn export_layer(layer: &Layer, width: u32, height: u32) -> Raster {
    layer.flattened(width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Point;

    fn doc(layers: usize) -> LayerStack {
        let mut stack = LayerStack::new(32, 32).unwrap();
        for _ in 0..layers {
            stack.add_layer(None);
        }
        stack
    }

    fn draw(stack: &mut LayerStack, from: Point, to: Point, color: Rgba) {
        stack.begin_stroke(from, color, 4.0, StrokeMode::Draw).unwrap();
        stack.add_point(to);
        stack.end_stroke();
    }

    #[test]
    fn test_rejects_zero_viewport() {
        assert!(Compositor::new(0, 10, 1.0).is_err());
        assert!(Compositor::new(10, 10, 0.0).is_err());
    }

    #[test]
    fn test_empty_document_is_white() {
        let stack = doc(1);
        let mut comp = Compositor::new(32, 32, 1.0).unwrap();
        let frame = comp.render(&stack.snapshot());
        assert_eq!(frame.count_color(Rgba::WHITE), 32 * 32);
    }

    #[test]
    fn test_unchanged_document_does_no_work() {
        let mut stack = doc(2);
        draw(&mut stack, Point::new(2.0, 2.0), Point::new(20.0, 20.0), Rgba::BLACK);
        let mut comp = Compositor::new(32, 32, 1.0).unwrap();
        comp.render(&stack.snapshot());
        let before = comp.stats();

        comp.render(&stack.snapshot());
        assert_eq!(comp.stats(), before);
    }

    #[test]
    fn test_only_changed_layer_rerenders() {
        let mut stack = doc(2);
        let mut comp = Compositor::new(32, 32, 1.0).unwrap();
        comp.render(&stack.snapshot());
        let bottom = stack.layers()[0].id();
        let sig = comp.cached_signature(bottom);
        let renders = comp.stats().layer_renders;

        draw(&mut stack, Point::new(2.0, 2.0), Point::new(20.0, 2.0), Rgba::BLACK);
        comp.render(&stack.snapshot());
        assert_eq!(comp.stats().layer_renders, renders + 1);
        assert_eq!(comp.cached_signature(bottom), sig);
    }

    #[test]
    fn test_hiding_a_layer_invalidates() {
        let mut stack = doc(1);
        draw(&mut stack, Point::new(2.0, 16.0), Point::new(30.0, 16.0), Rgba::BLACK);
        let mut comp = Compositor::new(32, 32, 1.0).unwrap();
        assert_eq!(comp.render(&stack.snapshot()).get(16, 16), Rgba::BLACK);

        stack.set_visible(0, false).unwrap();
        assert_eq!(comp.render(&stack.snapshot()).get(16, 16), Rgba::WHITE);
    }

    #[test]
    fn test_layer_above_active_stays_on_top() {
        let red = Rgba::opaque(255, 0, 0);
        let mut stack = doc(2);
        // Top layer red, bottom layer black at the same spot
        draw(&mut stack, Point::new(2.0, 16.0), Point::new(30.0, 16.0), red);
        stack.set_active(0).unwrap();
        draw(&mut stack, Point::new(2.0, 16.0), Point::new(30.0, 16.0), Rgba::BLACK);

        let mut comp = Compositor::new(32, 32, 1.0).unwrap();
        assert_eq!(comp.render(&stack.snapshot()).get(16, 16), red);
    }

    #[test]
    fn test_removed_layer_cache_dropped() {
        let mut stack = doc(2);
        let mut comp = Compositor::new(32, 32, 1.0).unwrap();
        comp.render(&stack.snapshot());
        let removed = stack.remove_layer(1).unwrap();
        comp.render(&stack.snapshot());
        assert!(comp.cached_signature(removed.id()).is_none());
    }

    #[test]
    fn test_resize_resets_caches() {
        let stack = doc(1);
        let mut comp = Compositor::new(32, 32, 1.0).unwrap();
        comp.render(&stack.snapshot());
        comp.resize(16, 16).unwrap();
        assert!(comp.cached_signature(stack.layers()[0].id()).is_none());
        assert_eq!(comp.render(&stack.snapshot()).size(), (16, 16));
    }

    #[test]
    fn test_in_progress_stroke_is_shown() {
        let mut stack = doc(1);
        let mut comp = Compositor::new(32, 32, 1.0).unwrap();
        stack
            .begin_stroke(Point::new(4.0, 16.0), Rgba::BLACK, 4.0, StrokeMode::Draw)
            .unwrap();
        comp.render(&stack.snapshot());
        stack.add_point(Point::new(28.0, 16.0));
        let frame = comp.render(&stack.snapshot());
        assert_eq!(frame.get(16, 16), Rgba::BLACK);
        assert_eq!(comp.stats().incremental_stamps, 2);
        // Second frame stamped straight into the output
        assert_eq!(comp.stats().full_composites, 1);
    }

    #[test]
    fn test_erase_in_progress_uses_full_composite() {
        let mut stack = doc(1);
        draw(&mut stack, Point::new(2.0, 16.0), Point::new(30.0, 16.0), Rgba::BLACK);
        let mut comp = Compositor::new(32, 32, 1.0).unwrap();
        stack
            .begin_stroke(Point::new(16.0, 16.0), Rgba::BLACK, 6.0, StrokeMode::Erase)
            .unwrap();
        comp.render(&stack.snapshot());
        stack.add_point(Point::new(17.0, 16.0));
        let frame = comp.render(&stack.snapshot());
        // Erased through to the white background, not to transparent
        assert_eq!(frame.get(16, 16), Rgba::WHITE);
        assert_eq!(comp.stats().full_composites, 2);
    }

    #[test]
    fn test_export_flattened_backgrounds() {
        let mut stack = doc(1);
        draw(&mut stack, Point::new(2.0, 16.0), Point::new(30.0, 16.0), Rgba::BLACK);
        let white = export_flattened(&stack, 32, 32, Background::White);
        assert_eq!(white.get(0, 0), Rgba::WHITE);
        assert_eq!(white.get(16, 16), Rgba::BLACK);

        let clear = export_flattened(&stack, 32, 32, Background::Transparent);
        assert_eq!(clear.get(0, 0), Rgba::TRANSPARENT);
        assert_eq!(clear.get(16, 16), Rgba::BLACK);

        let doubled = export_flattened(&stack, 64, 64, Background::White);
        assert_eq!(doubled.get(32, 32), Rgba::BLACK);
    }
}
