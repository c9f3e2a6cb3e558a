//! Stroke Model
//!
//! A [`Stroke`] is one continuous brush gesture: an ordered point path with a
//! fixed color, diameter and mode. The [`BrushEngine`] owns a layer's
//! committed strokes plus at most one stroke in progress.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::engine::color::Rgba;

/// 2D coordinate in device-independent units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`
    #[inline]
    pub fn distance(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    #[inline]
    pub fn scaled(self, factor: f32) -> Point {
        Point::new(self.x * factor, self.y * factor)
    }
}

/// Whether a stroke paints color or clears to transparent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeMode {
    #[default]
    Draw,
    Erase,
}

/// Process-unique stroke identity, assigned when a stroke begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrokeId(u64);

static NEXT_STROKE_ID: AtomicU64 = AtomicU64::new(1);

impl StrokeId {
    /// Allocate a fresh id
    pub fn next() -> Self {
        StrokeId(NEXT_STROKE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn get(self) -> u64 {
        self.0
    }
}

/// A single brush action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: StrokeId,
    pub color: Rgba,
    /// Brush diameter in logical units
    pub size: f32,
    pub mode: StrokeMode,
    pub points: Vec<Point>,
}

impl Stroke {
    /// Start a stroke at `start`
    pub fn new(start: Point, color: Rgba, size: f32, mode: StrokeMode) -> Self {
        Self {
            id: StrokeId::next(),
            color,
            size,
            mode,
            points: vec![start],
        }
    }

    /// True when the stroke clears pixels
    #[inline]
    pub fn is_erase(&self) -> bool {
        self.mode == StrokeMode::Erase
    }
}

/// Per-layer stroke storage and in-progress gesture state
#[derive(Debug, Clone, Default)]
pub struct BrushEngine {
    strokes: Vec<Stroke>,
    current: Option<Stroke>,
}

impl BrushEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new stroke, discarding any uncommitted one
    pub fn begin_stroke(&mut self, pos: Point, color: Rgba, size: f32, mode: StrokeMode) {
        self.current = Some(Stroke::new(pos, color, size, mode));
    }

    /// Append a sample to the stroke in progress; no-op when idle
    pub fn add_point(&mut self, pos: Point) {
        if let Some(stroke) = self.current.as_mut() {
            stroke.points.push(pos);
        }
    }

    /// Commit the stroke in progress
    ///
    /// # Returns
    /// The committed stroke, or `None` if no stroke was in progress.
    pub fn end_stroke(&mut self) -> Option<Stroke> {
        let stroke = self.current.take()?;
        self.strokes.push(stroke.clone());
        Some(stroke)
    }

    /// Drop the stroke in progress without committing it
    pub fn cancel_stroke(&mut self) -> Option<Stroke> {
        self.current.take()
    }

    /// Whether a stroke is in progress
    #[inline]
    pub fn is_drawing(&self) -> bool {
        self.current.is_some()
    }

    /// The stroke in progress, if any
    pub fn current_stroke(&self) -> Option<&Stroke> {
        self.current.as_ref()
    }

    /// Committed strokes, oldest first
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }

    /// Remove the most recently committed stroke
    pub fn remove_last_stroke(&mut self) -> Option<Stroke> {
        self.strokes.pop()
    }

    /// Re-append a previously committed stroke
    pub fn append_stroke(&mut self, stroke: Stroke) {
        self.strokes.push(stroke);
    }

    /// Replace the committed list wholesale
    pub fn replace_strokes(&mut self, strokes: Vec<Stroke>) {
        self.strokes = strokes;
    }

    pub fn clear_strokes(&mut self) {
        self.strokes.clear();
    }
}
