//! Tools
//!
//! Pointer gestures (press, drag, release) resolved against the active layer
//! of a [`LayerStack`]. The tool set is closed: brush, eraser and bucket fill.

use log::debug;
use serde::{Deserialize, Serialize};

use super::layer::FillOutcome;
use super::stack::LayerStack;
use crate::config::BrushConfig;
use crate::engine::{Point, Rgba, StrokeMode};
use crate::error::Result;

/// Selected tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[default]
    Brush,
    Eraser,
    Fill,
}

/// What a gesture did to the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOutcome {
    Nothing,
    StrokeStarted,
    StrokeExtended,
    StrokeCommitted,
    Filled { pixels: usize },
    /// The fill seed already had the fill color
    FillSkipped,
}

/// Current tool, color and brush size
#[derive(Debug, Clone, PartialEq)]
pub struct ToolManager {
    pub kind: ToolKind,
    pub color: Rgba,
    pub size: f32,
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::from_config(&BrushConfig::default())
    }
}

impl ToolManager {
    pub fn new(kind: ToolKind, color: Rgba, size: f32) -> Self {
        Self { kind, color, size }
    }

    pub fn from_config(brush: &BrushConfig) -> Self {
        Self::new(ToolKind::Brush, brush.color, brush.size)
    }

    fn stroke_mode(&self) -> Option<StrokeMode> {
        match self.kind {
            ToolKind::Brush => Some(StrokeMode::Draw),
            ToolKind::Eraser => Some(StrokeMode::Erase),
            ToolKind::Fill => None,
        }
    }

    /// Pointer down: start a stroke, or fill at `pos`
    pub fn press(&self, stack: &mut LayerStack, pos: Point) -> Result<ToolOutcome> {
        match self.stroke_mode() {
            Some(mode) => {
                stack.begin_stroke(pos, self.color, self.size, mode)?;
                Ok(ToolOutcome::StrokeStarted)
            }
            None => match stack.fill(pos, self.color)? {
                FillOutcome::Filled { pixels } => Ok(ToolOutcome::Filled { pixels }),
                FillOutcome::Unchanged => {
                    debug!("Fill at ({}, {}) skipped", pos.x, pos.y);
                    Ok(ToolOutcome::FillSkipped)
                }
            },
        }
    }

    /// Pointer move with the button held
    pub fn drag(&self, stack: &mut LayerStack, pos: Point) -> ToolOutcome {
        if !self.is_drawing(stack) {
            return ToolOutcome::Nothing;
        }
        stack.add_point(pos);
        ToolOutcome::StrokeExtended
    }

    /// Pointer up: the release position is the last stroke point
    pub fn release(&self, stack: &mut LayerStack, pos: Point) -> ToolOutcome {
        if !self.is_drawing(stack) {
            return ToolOutcome::Nothing;
        }
        stack.add_point(pos);
        if stack.end_stroke() {
            ToolOutcome::StrokeCommitted
        } else {
            ToolOutcome::Nothing
        }
    }

    /// Whether the active layer has a stroke in progress
    pub fn is_drawing(&self, stack: &LayerStack) -> bool {
        stack.active_layer().is_some_and(|l| l.is_drawing())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaintConfig;

    fn stack() -> LayerStack {
        let mut config = PaintConfig::default();
        config.canvas.width = 20;
        config.canvas.height = 20;
        LayerStack::with_config(&config).unwrap()
    }

    #[test]
    fn test_brush_gesture() {
        let mut stack = stack();
        let tools = ToolManager::new(ToolKind::Brush, Rgba::BLACK, 3.0);
        assert_eq!(tools.press(&mut stack, Point::new(2.0, 2.0)).unwrap(), ToolOutcome::StrokeStarted);
        assert!(tools.is_drawing(&stack));
        assert_eq!(tools.drag(&mut stack, Point::new(5.0, 5.0)), ToolOutcome::StrokeExtended);
        assert_eq!(tools.release(&mut stack, Point::new(9.0, 9.0)), ToolOutcome::StrokeCommitted);

        let layer = stack.active_layer().unwrap();
        assert_eq!(layer.strokes().len(), 1);
        assert_eq!(layer.strokes()[0].points.len(), 3);
        assert_eq!(layer.strokes()[0].mode, StrokeMode::Draw);
    }

    #[test]
    fn test_eraser_uses_erase_mode() {
        let mut stack = stack();
        let tools = ToolManager::new(ToolKind::Eraser, Rgba::BLACK, 3.0);
        tools.press(&mut stack, Point::new(2.0, 2.0)).unwrap();
        tools.release(&mut stack, Point::new(3.0, 3.0));
        assert!(stack.active_layer().unwrap().strokes()[0].is_erase());
    }

    #[test]
    fn test_drag_without_press_does_nothing() {
        let mut stack = stack();
        let tools = ToolManager::default();
        assert_eq!(tools.drag(&mut stack, Point::new(1.0, 1.0)), ToolOutcome::Nothing);
        assert_eq!(tools.release(&mut stack, Point::new(1.0, 1.0)), ToolOutcome::Nothing);
        assert_eq!(stack.active_layer().unwrap().history_len(), 0);
    }

    #[test]
    fn test_fill_then_repeat_is_skipped() {
        let mut stack = stack();
        let tools = ToolManager::new(ToolKind::Fill, Rgba::opaque(0, 0, 255), 1.0);
        let first = tools.press(&mut stack, Point::new(4.0, 4.0)).unwrap();
        assert_eq!(first, ToolOutcome::Filled { pixels: 400 });
        let second = tools.press(&mut stack, Point::new(4.0, 4.0)).unwrap();
        assert_eq!(second, ToolOutcome::FillSkipped);
        assert_eq!(stack.active_layer().unwrap().history_len(), 1);
    }

    #[test]
    fn test_fill_out_of_bounds_is_error() {
        let mut stack = stack();
        let tools = ToolManager::new(ToolKind::Fill, Rgba::BLACK, 1.0);
        assert!(tools.press(&mut stack, Point::new(50.0, 2.0)).is_err());
    }
}
