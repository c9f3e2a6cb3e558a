//! Per-layer operation log
//!
//! The log is a list of [`Operation`]s plus a cursor. Everything below the
//! cursor is applied; everything at or above it is redoable. Recording a new
//! operation discards the redo tail.

use std::sync::Arc;

use crate::engine::{Raster, Stroke};

/// Before/after snapshots of a flood fill
#[derive(Debug, Clone)]
pub struct FillRecord {
    pub raster_before: Option<Arc<Raster>>,
    pub strokes_before: Vec<Stroke>,
    pub raster_after: Option<Arc<Raster>>,
    pub strokes_after: Vec<Stroke>,
}

/// One undoable change to a layer
#[derive(Debug, Clone)]
pub enum Operation {
    /// A committed stroke; undo removes it, redo re-appends it
    Stroke { stroke_added: Stroke },
    /// A fill; undo/redo restore the recorded snapshots verbatim
    Fill(Box<FillRecord>),
}

impl Operation {
    /// Short label for history listings
    pub fn label(&self) -> &'static str {
        match self {
            Operation::Stroke { stroke_added } if stroke_added.is_erase() => "Erase",
            Operation::Stroke { .. } => "Stroke",
            Operation::Fill(_) => "Fill",
        }
    }
}

/// Operation log with an undo cursor
#[derive(Debug, Clone, Default)]
pub struct History {
    operations: Vec<Operation>,
    cursor: usize,
    max_levels: Option<usize>,
}

impl History {
    /// Unlimited history
    pub fn new() -> Self {
        Self::default()
    }

    /// History keeping at most `max_levels` operations (`None` = unlimited)
    pub fn with_limit(max_levels: Option<usize>) -> Self {
        Self {
            max_levels,
            ..Self::default()
        }
    }

    /// Append an operation at the cursor, discarding the redo tail.
    ///
    /// # Returns
    /// How many of the oldest operations were dropped to honour the limit.
    pub fn record(&mut self, op: Operation) -> usize {
        self.operations.truncate(self.cursor);
        self.operations.push(op);
        self.cursor = self.operations.len();
        self.trim()
    }

    fn trim(&mut self) -> usize {
        let Some(max) = self.max_levels else {
            return 0;
        };
        let excess = self.operations.len().saturating_sub(max);
        if excess > 0 {
            self.operations.drain(..excess);
            self.cursor -= excess;
        }
        excess
    }

    #[inline]
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    #[inline]
    pub fn can_redo(&self) -> bool {
        self.cursor < self.operations.len()
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// The operation the next undo would revert
    pub fn undo_target(&self) -> Option<&Operation> {
        self.cursor.checked_sub(1).map(|i| &self.operations[i])
    }

    /// The operation the next redo would reapply
    pub fn redo_target(&self) -> Option<&Operation> {
        self.operations.get(self.cursor)
    }

    /// Move the cursor back one step after a successful revert
    pub(crate) fn step_back(&mut self) {
        debug_assert!(self.can_undo());
        self.cursor -= 1;
    }

    /// Move the cursor forward one step after a successful reapply
    pub(crate) fn step_forward(&mut self) {
        debug_assert!(self.can_redo());
        self.cursor += 1;
    }

    /// All operations, oldest first
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Drop every operation
    pub fn clear(&mut self) {
        self.operations.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Point, Rgba, StrokeMode};

    fn stroke_op() -> Operation {
        Operation::Stroke {
            stroke_added: Stroke::new(Point::default(), Rgba::BLACK, 1.0, StrokeMode::Draw),
        }
    }

    #[test]
    fn test_record_moves_cursor() {
        let mut h = History::new();
        h.record(stroke_op());
        h.record(stroke_op());
        assert_eq!(h.len(), 2);
        assert_eq!(h.cursor(), 2);
        assert!(h.can_undo());
        assert!(!h.can_redo());
    }

    #[test]
    fn test_record_truncates_redo_tail() {
        let mut h = History::new();
        h.record(stroke_op());
        h.record(stroke_op());
        h.step_back();
        assert!(h.can_redo());
        h.record(stroke_op());
        assert_eq!(h.len(), 2);
        assert!(!h.can_redo());
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut h = History::with_limit(Some(2));
        assert_eq!(h.record(stroke_op()), 0);
        assert_eq!(h.record(stroke_op()), 0);
        assert_eq!(h.record(stroke_op()), 1);
        assert_eq!(h.len(), 2);
        assert_eq!(h.cursor(), 2);
    }

    #[test]
    fn test_targets() {
        let mut h = History::new();
        assert!(h.undo_target().is_none());
        h.record(stroke_op());
        assert_eq!(h.undo_target().map(Operation::label), Some("Stroke"));
        assert!(h.redo_target().is_none());
        h.step_back();
        assert!(h.undo_target().is_none());
        assert!(h.redo_target().is_some());
    }
}
