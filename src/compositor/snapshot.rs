//! Render snapshots
//!
//! A [`RenderSnapshot`] is an owned, immutable copy of everything the
//! compositor reads from a [`LayerStack`]. Rasters are shared through `Arc`,
//! so capturing one costs a stroke-list clone per layer and nothing more.

use std::sync::Arc;

use crate::engine::{Raster, Stroke};
use crate::layers::{LayerId, LayerStack};

/// One layer as the compositor sees it
#[derive(Debug, Clone)]
pub struct LayerSnapshot {
    pub id: LayerId,
    pub visible: bool,
    pub raster: Option<Arc<Raster>>,
    pub raster_fingerprint: u64,
    pub strokes: Vec<Stroke>,
}

/// The whole document at one instant
#[derive(Debug, Clone)]
pub struct RenderSnapshot {
    /// Bottom to top
    pub layers: Vec<LayerSnapshot>,
    pub active: Option<usize>,
    /// Stroke in progress on the active layer
    pub current_stroke: Option<Stroke>,
    pub base_image: Option<Arc<Raster>>,
    pub base_fingerprint: u64,
    pub width: u32,
    pub height: u32,
    pub revision: u64,
}

impl RenderSnapshot {
    pub fn capture(stack: &LayerStack) -> Self {
        let layers = stack
            .layers()
            .iter()
            .map(|layer| LayerSnapshot {
                id: layer.id(),
                visible: layer.is_visible(),
                raster: layer.raster().cloned(),
                raster_fingerprint: layer.raster_fingerprint(),
                strokes: layer.strokes().to_vec(),
            })
            .collect();

        Self {
            layers,
            active: stack.active_index(),
            current_stroke: stack.active_layer().and_then(|l| l.current_stroke()).cloned(),
            base_image: stack.base_image().cloned(),
            base_fingerprint: stack.base_fingerprint(),
            width: stack.width(),
            height: stack.height(),
            revision: stack.revision(),
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.current_stroke.is_some()
    }

    pub fn active_layer(&self) -> Option<&LayerSnapshot> {
        self.active.and_then(|i| self.layers.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Point, Rgba, StrokeMode};

    #[test]
    fn test_capture_shares_rasters() {
        let mut stack = LayerStack::new(8, 8).unwrap();
        stack.add_layer(None);
        stack
            .layer_mut(0)
            .unwrap()
            .set_raster(Some(Raster::filled(8, 8, Rgba::BLACK)));

        let snap = stack.snapshot();
        let original = stack.layers()[0].raster().unwrap();
        assert!(Arc::ptr_eq(snap.layers[0].raster.as_ref().unwrap(), original));
        assert_eq!(snap.layers[0].raster_fingerprint, original.fingerprint());
    }

    #[test]
    fn test_capture_in_progress_stroke() {
        let mut stack = LayerStack::new(8, 8).unwrap();
        stack.add_layer(None);
        assert!(!stack.snapshot().is_drawing());

        stack
            .begin_stroke(Point::new(1.0, 1.0), Rgba::BLACK, 2.0, StrokeMode::Draw)
            .unwrap();
        let snap = stack.snapshot();
        assert!(snap.is_drawing());
        assert_eq!(snap.active, Some(0));
        assert!(snap.layers[0].strokes.is_empty());
    }

    #[test]
    fn test_snapshot_is_send() {
        fn assert_send<T: Send + 'static>() {}
        assert_send::<RenderSnapshot>();
    }
}
