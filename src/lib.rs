//! orapaint - layered raster painting with OpenRaster persistence
//!
//! The crate is split along the data flow of a paint session:
//! - `engine`: pixels, colors, strokes and the stamping rasterizer
//! - `layers`: layers with undo history, the layer stack, pointer tools
//! - `compositor`: cached, incremental compositing of a stack snapshot
//! - `archive`: ZIP container and `.ora` save/load
//!
//! # Architecture
//!
//! Editing happens on a [`LayerStack`]. A [`RenderSnapshot`] captured from
//! it is immutable and can be handed to a [`Compositor`], either inline or
//! on a [`compositor::RenderThread`], so rendering never borrows the live
//! document.

pub mod archive;
pub mod cli;
pub mod compositor;
pub mod config;
pub mod engine;
pub mod error;
pub mod layers;

pub use compositor::{Compositor, RenderSnapshot};
pub use config::PaintConfig;
pub use engine::{Point, Raster, Rgba};
pub use error::{PaintError, Result};
pub use layers::{Layer, LayerStack, ToolKind, ToolManager};
