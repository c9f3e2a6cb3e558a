//! Paint scripts
//!
//! A JSON description of pointer gestures and document edits, replayed
//! through the same tool and stack calls an interactive front end makes.
//!
//! ```json
//! {
//!   "width": 100, "height": 100,
//!   "ops": [
//!     { "op": "stroke", "color": "#000000", "size": 10, "points": [[10, 50], [90, 50]] },
//!     { "op": "fill", "x": 5, "y": 5, "color": "#ff0000" },
//!     { "op": "undo" }
//!   ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::PaintConfig;
use crate::engine::{Point, Rgba};
use crate::error::{PaintError, Result};
use crate::layers::{LayerStack, ToolKind, ToolManager, ToolOutcome};

/// One scripted action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptOp {
    AddLayer {
        #[serde(default)]
        name: Option<String>,
    },
    SelectLayer {
        index: usize,
    },
    RemoveLayer {
        index: usize,
    },
    MoveLayer {
        from: usize,
        to: usize,
    },
    RenameLayer {
        index: usize,
        name: String,
    },
    SetVisible {
        index: usize,
        visible: bool,
    },
    Stroke {
        #[serde(default)]
        color: Option<String>,
        #[serde(default)]
        size: Option<f32>,
        points: Vec<[f32; 2]>,
    },
    Erase {
        #[serde(default)]
        size: Option<f32>,
        points: Vec<[f32; 2]>,
    },
    Fill {
        x: f32,
        y: f32,
        #[serde(default)]
        color: Option<String>,
    },
    Undo,
    Redo,
    ClearLayer,
}

/// A whole script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaintScript {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// PNG placed below every layer
    #[serde(default)]
    pub base_image: Option<PathBuf>,
    #[serde(default)]
    pub ops: Vec<ScriptOp>,
}

fn script_error(reason: impl Into<String>) -> PaintError {
    PaintError::InvalidScript { reason: reason.into() }
}

fn parse_color(hex: Option<&str>, default: Rgba) -> Result<Rgba> {
    match hex {
        None => Ok(default),
        Some(hex) => Rgba::from_hex(hex).ok_or_else(|| script_error(format!("bad color '{hex}'"))),
    }
}

fn to_points(points: &[[f32; 2]]) -> Result<Vec<Point>> {
    if points.is_empty() {
        return Err(script_error("stroke without points"));
    }
    Ok(points.iter().map(|[x, y]| Point::new(*x, *y)).collect())
}

impl PaintScript {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PaintError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path).map_err(|e| PaintError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Build a document and replay every op on it.
    ///
    /// A relative `base_image` is resolved against `base_dir`.
    pub fn run(&self, config: &PaintConfig, base_dir: &Path) -> Result<LayerStack> {
        let mut config = config.clone();
        if let Some(width) = self.width {
            config.canvas.width = width;
        }
        if let Some(height) = self.height {
            config.canvas.height = height;
        }
        config.validate()?;

        let mut stack = LayerStack::with_config(&config)?;
        if let Some(base) = &self.base_image {
            stack.load_base_image(&base_dir.join(base))?;
        }

        let mut tools = ToolManager::from_config(&config.brush);
        for (step, op) in self.ops.iter().enumerate() {
            debug!("Script step {step}: {op:?}");
            apply(&mut stack, &mut tools, &config, op)
                .map_err(|e| script_error(format!("step {step}: {e}")))?;
        }
        info!("Replayed {} script ops", self.ops.len());
        Ok(stack)
    }
}

fn gesture(stack: &mut LayerStack, tools: &ToolManager, points: &[Point]) -> Result<()> {
    let Some((first, rest)) = points.split_first() else {
        return Ok(());
    };
    tools.press(stack, *first)?;
    match rest.split_last() {
        Some((last, middle)) => {
            for p in middle {
                tools.drag(stack, *p);
            }
            tools.release(stack, *last);
        }
        None => {
            tools.release(stack, *first);
        }
    }
    Ok(())
}

fn apply(stack: &mut LayerStack, tools: &mut ToolManager, config: &PaintConfig, op: &ScriptOp) -> Result<()> {
    match op {
        ScriptOp::AddLayer { name } => {
            stack.add_layer(name.as_deref());
        }
        ScriptOp::SelectLayer { index } => stack.set_active(*index)?,
        ScriptOp::RemoveLayer { index } => {
            stack.remove_layer(*index)?;
        }
        ScriptOp::MoveLayer { from, to } => stack.move_layer(*from, *to)?,
        ScriptOp::RenameLayer { index, name } => stack.rename_layer(*index, name)?,
        ScriptOp::SetVisible { index, visible } => stack.set_visible(*index, *visible)?,
        ScriptOp::Stroke { color, size, points } => {
            tools.kind = ToolKind::Brush;
            tools.color = parse_color(color.as_deref(), config.brush.color)?;
            tools.size = size.unwrap_or(config.brush.size);
            gesture(stack, tools, &to_points(points)?)?;
        }
        ScriptOp::Erase { size, points } => {
            tools.kind = ToolKind::Eraser;
            tools.size = size.unwrap_or(config.brush.size);
            gesture(stack, tools, &to_points(points)?)?;
        }
        ScriptOp::Fill { x, y, color } => {
            tools.kind = ToolKind::Fill;
            tools.color = parse_color(color.as_deref(), config.brush.color)?;
            if tools.press(stack, Point::new(*x, *y))? == ToolOutcome::FillSkipped {
                info!("Fill at ({x}, {y}) changed nothing");
            }
        }
        ScriptOp::Undo => {
            if !stack.undo()? {
                info!("Nothing to undo");
            }
        }
        ScriptOp::Redo => {
            if !stack.redo()? {
                info!("Nothing to redo");
            }
        }
        ScriptOp::ClearLayer => {
            if let Some(layer) = stack.active_layer_mut() {
                layer.clear();
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(json: &str) -> Result<LayerStack> {
        let script: PaintScript = serde_json::from_str(json).unwrap();
        script.run(&PaintConfig::default(), Path::new("."))
    }

    #[test]
    fn test_parse_ops() {
        let script: PaintScript = serde_json::from_str(
            r##"{"width": 40, "ops": [
                {"op": "add_layer", "name": "Ink"},
                {"op": "stroke", "color": "#ff0000", "size": 3, "points": [[1, 1], [5, 5]]},
                {"op": "undo"}
            ]}"##,
        )
        .unwrap();
        assert_eq!(script.width, Some(40));
        assert_eq!(script.ops.len(), 3);
        assert_eq!(script.ops[2], ScriptOp::Undo);
    }

    #[test]
    fn test_replay_builds_layers() {
        let stack = run(
            r##"{"width": 32, "height": 32, "ops": [
                {"op": "stroke", "color": "#000000", "size": 4, "points": [[2, 16], [30, 16]]},
                {"op": "add_layer", "name": "Top"},
                {"op": "fill", "x": 1, "y": 1, "color": "#00ff00"},
                {"op": "undo"},
                {"op": "redo"}
            ]}"##,
        )
        .unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.layers()[0].strokes().len(), 1);
        assert_eq!(stack.layers()[1].name(), "Top");
        assert!(stack.layers()[1].has_raster());
    }

    #[test]
    fn test_single_point_stroke() {
        let stack = run(r##"{"width": 8, "height": 8, "ops": [
            {"op": "stroke", "points": [[4, 4]]}
        ]}"##)
        .unwrap();
        assert_eq!(stack.layers()[0].strokes()[0].points.len(), 2);
    }

    #[test]
    fn test_bad_color_reports_step() {
        let err = run(r##"{"ops": [{"op": "fill", "x": 1, "y": 1, "color": "red"}]}"##).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SCRIPT");
        assert!(err.to_string().contains("step 0"));
    }

    #[test]
    fn test_empty_stroke_rejected() {
        assert!(run(r##"{"ops": [{"op": "stroke", "points": []}]}"##).is_err());
    }
}
