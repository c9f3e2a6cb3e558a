//! Layer Stack
//!
//! The document: an ordered list of layers (bottom to top), the active
//! layer, the canvas size and an optional imported base image that sits
//! below every layer and is never painted on.
//!
//! Every mutation bumps [`LayerStack::revision`], which callers poll to
//! decide whether to redraw.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info};

use super::layer::{FillOutcome, Layer, LayerId};
use crate::compositor::{export_flattened, RenderSnapshot};
use crate::config::{Background, PaintConfig};
use crate::engine::{decode_png, Point, Raster, Rgba, StrokeMode};
use crate::error::{PaintError, Result};

/// Ordered layers plus document-wide state
#[derive(Debug, Clone)]
pub struct LayerStack {
    layers: Vec<Layer>,
    active: Option<usize>,
    width: u32,
    height: u32,
    base_image: Option<Arc<Raster>>,
    base_fingerprint: u64,
    max_undo_levels: Option<usize>,
    revision: u64,
    layers_created: usize,
}

impl LayerStack {
    /// Create an empty document (no layers) of the given canvas size
    ///
    /// # Errors
    /// `InvalidDimensions` when either side is zero.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PaintError::InvalidDimensions { width, height });
        }
        Ok(Self {
            layers: Vec::new(),
            active: None,
            width,
            height,
            base_image: None,
            base_fingerprint: 0,
            max_undo_levels: None,
            revision: 0,
            layers_created: 0,
        })
    }

    /// Create a document with one empty layer, sized and limited per `config`
    pub fn with_config(config: &PaintConfig) -> Result<Self> {
        let mut stack = Self::new(config.canvas.width, config.canvas.height)?;
        stack.max_undo_levels = config.history.max_undo_levels;
        stack.add_layer(None);
        Ok(stack)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Undo limit given to layers created from now on
    pub fn max_undo_levels(&self) -> Option<usize> {
        self.max_undo_levels
    }

    pub fn set_max_undo_levels(&mut self, max_undo_levels: Option<usize>) {
        self.max_undo_levels = max_undo_levels;
    }

    /// Monotonic change counter
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    // ------------------------------------------------------------------
    // Layer management
    // ------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers bottom to top
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.layers.len() {
            return Err(PaintError::LayerIndexOutOfRange {
                index,
                len: self.layers.len(),
            });
        }
        Ok(())
    }

    pub fn layer(&self, index: usize) -> Result<&Layer> {
        self.check_index(index)?;
        Ok(&self.layers[index])
    }

    /// Mutable access to a layer; counts as a change
    pub fn layer_mut(&mut self, index: usize) -> Result<&mut Layer> {
        self.check_index(index)?;
        self.touch();
        Ok(&mut self.layers[index])
    }

    /// Stack position of the layer with `id`
    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id() == id)
    }

    /// Add an empty layer directly above the active one and activate it.
    ///
    /// # Returns
    /// The new layer's index.
    pub fn add_layer(&mut self, name: Option<&str>) -> usize {
        self.layers_created += 1;
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("Layer {}", self.layers_created));
        let layer = Layer::with_history_limit(name, self.max_undo_levels);
        let index = self.active.map_or(self.layers.len(), |a| a + 1);
        self.insert_layer(index, layer)
    }

    /// Put an existing layer on top of the stack and activate it
    pub fn push_layer(&mut self, layer: Layer) -> usize {
        self.layers_created += 1;
        let index = self.layers.len();
        self.insert_layer(index, layer)
    }

    fn insert_layer(&mut self, index: usize, layer: Layer) -> usize {
        debug!("Adding layer '{}' at {}", layer.name(), index);
        self.layers.insert(index, layer);
        self.active = Some(index);
        self.touch();
        index
    }

    /// Remove and return a layer. The active index follows the layer that
    /// was active, or falls to the layer below when the active one is
    /// removed.
    pub fn remove_layer(&mut self, index: usize) -> Result<Layer> {
        self.check_index(index)?;
        let layer = self.layers.remove(index);
        self.active = match self.active {
            _ if self.layers.is_empty() => None,
            Some(a) if a > index => Some(a - 1),
            Some(a) if a == index => Some(a.saturating_sub(1).min(self.layers.len() - 1)),
            other => other,
        };
        self.touch();
        Ok(layer)
    }

    /// Move a layer to a new position; the active layer stays active
    pub fn move_layer(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from == to {
            return Ok(());
        }
        let active_id = self.active_layer().map(Layer::id);
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);
        self.active = active_id.and_then(|id| self.index_of(id));
        self.touch();
        Ok(())
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn set_active(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        if self.active != Some(index) {
            self.active = Some(index);
            self.touch();
        }
        Ok(())
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.active.map(|i| &self.layers[i])
    }

    /// Mutable access to the active layer; counts as a change
    pub fn active_layer_mut(&mut self) -> Option<&mut Layer> {
        let index = self.active?;
        self.touch();
        Some(&mut self.layers[index])
    }

    fn require_active(&mut self) -> Result<&mut Layer> {
        self.active_layer_mut().ok_or(PaintError::NoLayers)
    }

    pub fn set_visible(&mut self, index: usize, visible: bool) -> Result<()> {
        self.check_index(index)?;
        if self.layers[index].is_visible() != visible {
            self.layers[index].set_visible(visible);
            self.touch();
        }
        Ok(())
    }

    pub fn rename_layer(&mut self, index: usize, name: &str) -> Result<()> {
        self.layer_mut(index)?.set_name(name);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Base image
    // ------------------------------------------------------------------

    pub fn base_image(&self) -> Option<&Arc<Raster>> {
        self.base_image.as_ref()
    }

    /// Fingerprint of the base image (0 when there is none)
    pub fn base_fingerprint(&self) -> u64 {
        self.base_fingerprint
    }

    /// Replace the background image. Empty rasters are rejected.
    pub fn set_base_image(&mut self, image: Option<Raster>) -> Result<()> {
        if image.as_ref().is_some_and(Raster::is_empty) {
            return Err(PaintError::EmptyImage);
        }
        self.base_fingerprint = image.as_ref().map_or(0, Raster::fingerprint);
        self.base_image = image.map(Arc::new);
        self.touch();
        Ok(())
    }

    /// Import a PNG file as the background image
    pub fn load_base_image(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(PaintError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = fs::read(path).map_err(|e| PaintError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let image = decode_png(&bytes)?;
        info!(
            "Loaded base image {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        self.set_base_image(Some(image))
    }

    // ------------------------------------------------------------------
    // Painting on the active layer
    // ------------------------------------------------------------------

    pub fn begin_stroke(&mut self, pos: Point, color: Rgba, size: f32, mode: StrokeMode) -> Result<()> {
        self.require_active()?.begin_stroke(pos, color, size, mode)
    }

    pub fn add_point(&mut self, pos: Point) {
        if let Some(layer) = self.active_layer_mut() {
            layer.add_point(pos);
        }
    }

    /// Commit the active layer's stroke. Returns whether one was committed.
    pub fn end_stroke(&mut self) -> bool {
        self.active_layer_mut()
            .is_some_and(|layer| layer.end_stroke().is_some())
    }

    /// Flood fill on the active layer at canvas size
    pub fn fill(&mut self, seed: Point, color: Rgba) -> Result<FillOutcome> {
        let (width, height) = (self.width, self.height);
        self.require_active()?.fill(seed, color, width, height)
    }

    /// Undo on the active layer. `Ok(false)` when nothing to undo.
    pub fn undo(&mut self) -> Result<bool> {
        match self.active_layer_mut() {
            Some(layer) => layer.undo(),
            None => Ok(false),
        }
    }

    /// Redo on the active layer. `Ok(false)` when nothing to redo.
    pub fn redo(&mut self) -> Result<bool> {
        match self.active_layer_mut() {
            Some(layer) => layer.redo(),
            None => Ok(false),
        }
    }

    pub fn can_undo(&self) -> bool {
        self.active_layer().is_some_and(Layer::can_undo)
    }

    pub fn can_redo(&self) -> bool {
        self.active_layer().is_some_and(Layer::can_redo)
    }

    // ------------------------------------------------------------------
    // Rendering hand-off
    // ------------------------------------------------------------------

    /// Immutable copy of everything the compositor needs
    pub fn snapshot(&self) -> RenderSnapshot {
        RenderSnapshot::capture(self)
    }

    /// All visible layers at canvas size over `background`
    pub fn export_flattened(&self, background: Background) -> Raster {
        export_flattened(self, self.width, self.height, background)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_with(names: &[&str]) -> LayerStack {
        let mut stack = LayerStack::new(10, 10).unwrap();
        for name in names {
            stack.push_layer(Layer::new(*name));
        }
        stack
    }

    fn names(stack: &LayerStack) -> Vec<&str> {
        stack.layers().iter().map(Layer::name).collect()
    }

    #[test]
    fn test_zero_canvas_rejected() {
        assert!(LayerStack::new(0, 5).is_err());
    }

    #[test]
    fn test_with_config_has_one_layer() {
        let stack = LayerStack::with_config(&PaintConfig::default()).unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.active_index(), Some(0));
        assert_eq!(stack.layers()[0].name(), "Layer 1");
    }

    #[test]
    fn test_add_layer_above_active() {
        let mut stack = stack_with(&["a", "b"]);
        stack.set_active(0).unwrap();
        let idx = stack.add_layer(Some("c"));
        assert_eq!(idx, 1);
        assert_eq!(names(&stack), vec!["a", "c", "b"]);
        assert_eq!(stack.active_index(), Some(1));
    }

    #[test]
    fn test_remove_adjusts_active() {
        let mut stack = stack_with(&["a", "b", "c"]);
        stack.set_active(2).unwrap();
        stack.remove_layer(0).unwrap();
        assert_eq!(stack.active_layer().unwrap().name(), "c");

        stack.remove_layer(1).unwrap();
        assert_eq!(stack.active_layer().unwrap().name(), "b");

        stack.remove_layer(0).unwrap();
        assert!(stack.active_layer().is_none());
        assert!(stack.remove_layer(0).is_err());
    }

    #[test]
    fn test_move_keeps_active_layer() {
        let mut stack = stack_with(&["a", "b", "c"]);
        stack.set_active(0).unwrap();
        stack.move_layer(0, 2).unwrap();
        assert_eq!(names(&stack), vec!["b", "c", "a"]);
        assert_eq!(stack.active_index(), Some(2));
    }

    #[test]
    fn test_revision_bumps_on_change() {
        let mut stack = stack_with(&["a"]);
        let r0 = stack.revision();
        stack.set_visible(0, false).unwrap();
        let r1 = stack.revision();
        assert!(r1 > r0);
        // No-op visibility change is not a change
        stack.set_visible(0, false).unwrap();
        assert_eq!(stack.revision(), r1);
    }

    #[test]
    fn test_painting_requires_a_layer() {
        let mut stack = LayerStack::new(10, 10).unwrap();
        let err = stack
            .begin_stroke(Point::default(), Rgba::BLACK, 2.0, StrokeMode::Draw)
            .unwrap_err();
        assert_eq!(err.error_code(), "NO_LAYERS");
        assert!(!stack.end_stroke());
        assert!(!stack.undo().unwrap());
    }

    #[test]
    fn test_stroke_through_stack() {
        let mut stack = stack_with(&["ink"]);
        stack
            .begin_stroke(Point::new(2.0, 2.0), Rgba::BLACK, 2.0, StrokeMode::Draw)
            .unwrap();
        stack.add_point(Point::new(6.0, 6.0));
        assert!(stack.end_stroke());
        assert!(stack.can_undo());
        assert!(stack.undo().unwrap());
        assert!(stack.can_redo());
    }

    #[test]
    fn test_base_image() {
        let mut stack = stack_with(&["a"]);
        assert!(stack.set_base_image(Some(Raster::new(0, 0))).is_err());
        stack
            .set_base_image(Some(Raster::filled(10, 10, Rgba::BLACK)))
            .unwrap();
        assert_ne!(stack.base_fingerprint(), 0);
        stack.set_base_image(None).unwrap();
        assert_eq!(stack.base_fingerprint(), 0);
    }
}
