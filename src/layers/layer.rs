//! Paintable Layer
//!
//! A layer owns an optional raster, its committed strokes (through a
//! [`BrushEngine`]) and an undo log. Strokes and fills are the only
//! undoable operations; clearing the layer resets the log.

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::history::{FillRecord, History, Operation};
use crate::engine::{flatten_layer, flood_fill, BrushEngine, Point, Raster, Rgba, Stroke, StrokeMode};
use crate::error::{PaintError, Result};

/// Stable identity of a layer, independent of its stack position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerId(Uuid);

impl LayerId {
    pub fn new() -> Self {
        LayerId(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a fill request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// Seed already had the fill color; nothing recorded
    Unchanged,
    /// Region recolored and a Fill operation recorded
    Filled { pixels: usize },
}

/// An independently paintable raster plus its stroke/fill history
#[derive(Debug, Clone)]
pub struct Layer {
    id: LayerId,
    name: String,
    visible: bool,
    raster: Option<Arc<Raster>>,
    raster_fingerprint: u64,
    engine: BrushEngine,
    history: History,
}

impl Layer {
    /// Create an empty, visible layer with unlimited history
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_history_limit(name, None)
    }

    /// Create an empty layer keeping at most `max_undo_levels` operations
    pub fn with_history_limit(name: impl Into<String>, max_undo_levels: Option<usize>) -> Self {
        Self {
            id: LayerId::new(),
            name: name.into(),
            visible: true,
            raster: None,
            raster_fingerprint: 0,
            engine: BrushEngine::new(),
            history: History::with_limit(max_undo_levels),
        }
    }

    /// Create a layer whose content is an existing raster (import/load)
    pub fn from_raster(name: impl Into<String>, raster: Raster) -> Self {
        let mut layer = Self::new(name);
        layer.set_raster(Some(raster));
        layer
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// The layer's raster, if it has one
    pub fn raster(&self) -> Option<&Arc<Raster>> {
        self.raster.as_ref()
    }

    pub fn has_raster(&self) -> bool {
        self.raster.is_some()
    }

    /// Content fingerprint of the raster (0 when there is none)
    pub fn raster_fingerprint(&self) -> u64 {
        self.raster_fingerprint
    }

    /// Replace the raster without recording an operation
    pub fn set_raster(&mut self, raster: Option<Raster>) {
        self.install_raster(raster.map(Arc::new));
    }

    fn install_raster(&mut self, raster: Option<Arc<Raster>>) {
        self.raster_fingerprint = raster.as_ref().map_or(0, |r| r.fingerprint());
        self.raster = raster;
    }

    pub fn engine(&self) -> &BrushEngine {
        &self.engine
    }

    /// Committed strokes, oldest first
    pub fn strokes(&self) -> &[Stroke] {
        self.engine.strokes()
    }

    pub fn current_stroke(&self) -> Option<&Stroke> {
        self.engine.current_stroke()
    }

    pub fn is_drawing(&self) -> bool {
        self.engine.is_drawing()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    // ------------------------------------------------------------------
    // Strokes
    // ------------------------------------------------------------------

    /// Start a stroke at `pos`, discarding any uncommitted one
    ///
    /// # Errors
    /// `InvalidBrushSize` for a non-positive or non-finite diameter.
    pub fn begin_stroke(&mut self, pos: Point, color: Rgba, size: f32, mode: StrokeMode) -> Result<()> {
        if !(size.is_finite() && size > 0.0) {
            warn!("Rejected stroke on '{}': brush size {}", self.name, size);
            return Err(PaintError::InvalidBrushSize { size });
        }
        self.engine.begin_stroke(pos, color, size, mode);
        Ok(())
    }

    /// Append a sample to the stroke in progress; no-op when idle
    pub fn add_point(&mut self, pos: Point) {
        self.engine.add_point(pos);
    }

    /// Commit the stroke in progress and record it in the history
    ///
    /// # Returns
    /// The committed stroke, or `None` when no stroke was in progress.
    pub fn end_stroke(&mut self) -> Option<&Stroke> {
        let stroke = self.engine.end_stroke()?;
        debug!(
            "Layer '{}': committed {:?} stroke with {} points",
            self.name,
            stroke.mode,
            stroke.points.len()
        );
        self.history.record(Operation::Stroke {
            stroke_added: stroke,
        });
        self.engine.strokes().last()
    }

    /// Abandon the stroke in progress without recording anything
    pub fn cancel_stroke(&mut self) {
        self.engine.cancel_stroke();
    }

    // ------------------------------------------------------------------
    // Fill
    // ------------------------------------------------------------------

    /// Flood-fill the region under `seed` on a canvas of `width x height`.
    ///
    /// Committed strokes and the raster are flattened first so stroke edges
    /// bound the region; afterwards the layer holds only the filled raster.
    ///
    /// # Errors
    /// `InvalidDimensions` for a zero canvas, `SeedOutOfBounds` when the
    /// seed is not finite or the rounded seed is outside it. The layer is
    /// untouched on error.
    pub fn fill(&mut self, seed: Point, color: Rgba, width: u32, height: u32) -> Result<FillOutcome> {
        if width == 0 || height == 0 {
            return Err(PaintError::InvalidDimensions { width, height });
        }
        let x = seed.x.round() as i64;
        let y = seed.y.round() as i64;
        let finite = seed.x.is_finite() && seed.y.is_finite();
        if !finite || x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
            warn!("Fill seed ({x}, {y}) outside {width}x{height} canvas");
            return Err(PaintError::SeedOutOfBounds {
                x,
                y,
                width,
                height,
            });
        }

        let mut flat = flatten_layer(self.raster.as_deref(), self.engine.strokes(), width, height);
        if flat.get(x as u32, y as u32) == color {
            debug!("Layer '{}': fill at ({x}, {y}) is a no-op", self.name);
            return Ok(FillOutcome::Unchanged);
        }
        let pixels = flood_fill(&mut flat, x as u32, y as u32, color);

        let raster_after = Arc::new(flat);
        let record = FillRecord {
            raster_before: self.raster.clone(),
            strokes_before: self.engine.strokes().to_vec(),
            raster_after: Some(Arc::clone(&raster_after)),
            strokes_after: Vec::new(),
        };
        self.install_raster(Some(raster_after));
        self.engine.clear_strokes();
        self.history.record(Operation::Fill(Box::new(record)));

        debug!("Layer '{}': filled {pixels} pixels from ({x}, {y})", self.name);
        Ok(FillOutcome::Filled { pixels })
    }

    // ------------------------------------------------------------------
    // Undo / Redo
    // ------------------------------------------------------------------

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history_cursor(&self) -> usize {
        self.history.cursor()
    }

    /// Revert the most recent applied operation.
    ///
    /// # Returns
    /// `Ok(false)` when there is nothing to undo.
    ///
    /// # Errors
    /// `ConsistencyFault` when a stroke operation has no matching committed
    /// stroke. The cursor is not moved in that case.
    pub fn undo(&mut self) -> Result<bool> {
        let Some(op) = self.history.undo_target() else {
            return Ok(false);
        };
        match op {
            Operation::Stroke { stroke_added } => {
                let last_id = self.engine.strokes().last().map(|s| s.id);
                if last_id != Some(stroke_added.id) {
                    let reason = format!(
                        "layer '{}' expected stroke {:?} on top, found {:?}",
                        self.name, stroke_added.id, last_id
                    );
                    warn!("Undo failed: {reason}");
                    return Err(PaintError::ConsistencyFault { reason });
                }
                self.engine.remove_last_stroke();
            }
            Operation::Fill(record) => {
                let raster = record.raster_before.clone();
                let strokes = record.strokes_before.clone();
                self.install_raster(raster);
                self.engine.replace_strokes(strokes);
            }
        }
        self.history.step_back();
        Ok(true)
    }

    /// Reapply the next undone operation.
    ///
    /// # Returns
    /// `Ok(false)` when there is nothing to redo.
    pub fn redo(&mut self) -> Result<bool> {
        let Some(op) = self.history.redo_target() else {
            return Ok(false);
        };
        match op {
            Operation::Stroke { stroke_added } => {
                let stroke = stroke_added.clone();
                self.engine.append_stroke(stroke);
            }
            Operation::Fill(record) => {
                let raster = record.raster_after.clone();
                let strokes = record.strokes_after.clone();
                self.install_raster(raster);
                self.engine.replace_strokes(strokes);
            }
        }
        self.history.step_forward();
        Ok(true)
    }

    /// Remove all content and history. Not undoable.
    pub fn clear(&mut self) {
        self.install_raster(None);
        self.engine.cancel_stroke();
        self.engine.clear_strokes();
        self.history.clear();
    }

    /// Raster plus committed strokes at canvas size, over transparent
    pub fn flattened(&self, width: u32, height: u32) -> Raster {
        flatten_layer(self.raster.as_deref(), self.engine.strokes(), width, height)
    }
}
