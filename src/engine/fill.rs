//! Flood Fill
//!
//! Breadth-first 4-connected region fill. The region is every pixel reachable
//! from the seed through neighbours that exactly equal the seed's original
//! color.

use std::collections::VecDeque;

use crate::engine::color::Rgba;
use crate::engine::raster::Raster;
use crate::engine::rasterizer::render_strokes;
use crate::engine::stroke::Stroke;

/// Recolor the region containing `(x, y)`.
///
/// A fill color with zero alpha clears the region to fully transparent.
///
/// # Returns
/// The number of pixels recolored. Zero when the seed is outside the raster
/// or already has the fill color.
pub fn flood_fill(raster: &mut Raster, x: u32, y: u32, fill: Rgba) -> usize {
    if !raster.contains(x as i64, y as i64) {
        return 0;
    }
    let target = raster.get(x, y);
    if target == fill {
        return 0;
    }
    let replacement = if fill.is_transparent() {
        Rgba::TRANSPARENT
    } else {
        fill
    };

    let width = raster.width() as usize;
    let height = raster.height() as usize;
    let mut visited = vec![false; width * height];
    let mut queue = VecDeque::new();

    visited[y as usize * width + x as usize] = true;
    queue.push_back((x as usize, y as usize));

    let mut painted = 0;
    while let Some((px, py)) = queue.pop_front() {
        raster.set(px as u32, py as u32, replacement);
        painted += 1;

        let neighbours = [
            (px + 1 < width).then(|| (px + 1, py)),
            px.checked_sub(1).map(|nx| (nx, py)),
            (py + 1 < height).then(|| (px, py + 1)),
            py.checked_sub(1).map(|ny| (px, ny)),
        ];
        for (nx, ny) in neighbours.into_iter().flatten() {
            let idx = ny * width + nx;
            if visited[idx] {
                continue;
            }
            if raster.get(nx as u32, ny as u32) == target {
                visited[idx] = true;
                queue.push_back((nx, ny));
            }
        }
    }
    painted
}

/// Flatten a layer's raster and committed strokes into one canvas-size raster.
///
/// The raster is resampled when its size differs from the canvas. Strokes
/// are rendered at scale 1 so their boundaries take part in fill detection.
pub fn flatten_layer(raster: Option<&Raster>, strokes: &[Stroke], width: u32, height: u32) -> Raster {
    let mut base = Raster::new(width, height);
    if let Some(existing) = raster {
        base.draw_over(existing);
    }
    render_strokes(&mut base, strokes, 1.0);
    base
}
