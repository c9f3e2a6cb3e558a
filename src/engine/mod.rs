//! Painting Engine Module
//!
//! Pixel-level building blocks:
//! - Colors and raster buffers
//! - Stroke model and brush engine
//! - Antialiased stamp rasterizer
//! - Flood fill
//! - PNG encode/decode

pub mod codec;
pub mod color;
pub mod fill;
pub mod raster;
pub mod rasterizer;
pub mod stroke;

pub use codec::{decode_png, encode_png};
pub use color::Rgba;
pub use fill::{flatten_layer, flood_fill};
pub use raster::Raster;
pub use rasterizer::{render_stroke, render_strokes, stamp_points, stamp_segments};
pub use stroke::{BrushEngine, Point, Stroke, StrokeId, StrokeMode};
