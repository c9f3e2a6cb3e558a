//! Layer Model Module
//!
//! The document side of the painter:
//! - Layer: raster, committed strokes and a per-layer undo log
//! - LayerStack: ordered layers, active layer, base image
//! - Tools: pointer gestures resolved against the active layer

mod history;
mod layer;
mod stack;
mod tools;

pub use history::{FillRecord, History, Operation};
pub use layer::{FillOutcome, Layer, LayerId};
pub use stack::LayerStack;
pub use tools::{ToolKind, ToolManager, ToolOutcome};
