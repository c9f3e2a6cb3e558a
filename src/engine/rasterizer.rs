//! Stroke Rasterizer
//!
//! Strokes are rendered by stamping antialiased filled circles along each
//! segment of the point path. Coverage is exact-or-nothing away from the
//! circle edge and estimated with a 4x4 supersample grid near it.
//!
//! Erase strokes clear every touched pixel to transparent with a hard edge;
//! only draw strokes are antialiased.

use crate::engine::color::{blend_over, Rgba};
use crate::engine::raster::Raster;
use crate::engine::stroke::{Point, Stroke, StrokeMode};

/// Half the pixel diagonal; pixels whose centre is nearer than
/// `radius - HALF_DIAGONAL` are fully covered
const HALF_DIAGONAL: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Supersample offsets from the pixel centre
const SUBSAMPLE_OFFSETS: [f32; 4] = [-0.375, -0.125, 0.125, 0.375];

/// Segments shorter than this stamp only their end point
const MIN_SEGMENT_LEN: f32 = 1e-3;

/// Smallest stamp radius in pixels
const MIN_RADIUS: f32 = 0.5;

/// Stamp radius in pixels for a brush diameter in logical units
#[inline]
pub fn stamp_radius(size: f32, scale: f32) -> f32 {
    (size * 0.5 * scale).max(MIN_RADIUS)
}

/// Distance between consecutive stamps along a segment
#[inline]
pub fn stamp_spacing(radius: f32) -> f32 {
    (radius * 0.5).max(1.0)
}

/// Fraction of pixel `(px, py)` covered by a circle at `(cx, cy)`.
///
/// Returns a value in `0.0..=1.0`.
pub fn pixel_coverage(px: u32, py: u32, cx: f32, cy: f32, radius: f32) -> f32 {
    let r = radius.max(MIN_RADIUS);
    let inner = (r - HALF_DIAGONAL).max(0.0);
    let outer = r + HALF_DIAGONAL;

    let center_x = px as f32 + 0.5;
    let center_y = py as f32 + 0.5;
    let dx = center_x - cx;
    let dy = center_y - cy;
    let dist_sq = dx * dx + dy * dy;

    if dist_sq <= inner * inner {
        return 1.0;
    }
    if dist_sq >= outer * outer {
        return 0.0;
    }

    let r_sq = r * r;
    let mut inside = 0u32;
    for oy in SUBSAMPLE_OFFSETS {
        let sy = center_y + oy - cy;
        for ox in SUBSAMPLE_OFFSETS {
            let sx = center_x + ox - cx;
            if sx * sx + sy * sy <= r_sq {
                inside += 1;
            }
        }
    }
    inside as f32 / 16.0
}

/// Stamp one circle of `radius` pixels centred at `(cx, cy)` pixels.
pub fn stamp_circle(target: &mut Raster, cx: f32, cy: f32, radius: f32, color: Rgba, mode: StrokeMode) {
    if target.is_empty() {
        return;
    }
    let r = radius.max(MIN_RADIUS);
    let reach = r.ceil();
    let max_x = target.width() as i64 - 1;
    let max_y = target.height() as i64 - 1;
    let x0 = ((cx - reach).floor() as i64).max(0);
    let x1 = ((cx + reach).ceil() as i64).min(max_x);
    let y0 = ((cy - reach).floor() as i64).max(0);
    let y1 = ((cy + reach).ceil() as i64).min(max_y);
    if x0 > x1 || y0 > y1 {
        return;
    }

    let brush_alpha = color.alpha_f32();
    let rgb = [color.r, color.g, color.b];

    for y in y0 as u32..=y1 as u32 {
        for x in x0 as u32..=x1 as u32 {
            let coverage = pixel_coverage(x, y, cx, cy, r);
            if coverage <= 0.0 {
                continue;
            }
            match mode {
                StrokeMode::Erase => target.set(x, y, Rgba::TRANSPARENT),
                StrokeMode::Draw => {
                    let src_alpha = (coverage * brush_alpha).clamp(0.0, 1.0);
                    if src_alpha <= 0.0 {
                        continue;
                    }
                    let dst = target.get(x, y).to_array();
                    let out = blend_over(dst, rgb, src_alpha);
                    target.set(x, y, Rgba::from_slice(&out));
                }
            }
        }
    }
}

/// Stamp a run of logical points onto `target`.
///
/// The first point is always stamped; every following segment is stamped at
/// [`stamp_spacing`] intervals plus its exact end point.
pub fn stamp_points(
    target: &mut Raster,
    points: &[Point],
    color: Rgba,
    size: f32,
    mode: StrokeMode,
    scale: f32,
) {
    let Some(first) = points.first() else {
        return;
    };
    let radius = stamp_radius(size, scale);
    let p0 = first.scaled(scale);
    stamp_circle(target, p0.x, p0.y, radius, color, mode);
    stamp_segments(target, points, color, size, mode, scale);
}

/// Stamp only the segments joining consecutive points, without the lone
/// stamp at the first point.
///
/// Stamping `points[k..]` this way after `stamp_points(&points[..=k])`
/// produces exactly what `stamp_points(points)` would. The compositor uses
/// it to extend a stroke in progress by its newly sampled tail.
pub fn stamp_segments(
    target: &mut Raster,
    points: &[Point],
    color: Rgba,
    size: f32,
    mode: StrokeMode,
    scale: f32,
) {
    let radius = stamp_radius(size, scale);
    let step = stamp_spacing(radius);

    for pair in points.windows(2) {
        let a = pair[0].scaled(scale);
        let b = pair[1].scaled(scale);
        let len = a.distance(b);
        if len < MIN_SEGMENT_LEN {
            stamp_circle(target, b.x, b.y, radius, color, mode);
            continue;
        }
        if !len.is_finite() {
            continue;
        }
        let dir_x = (b.x - a.x) / len;
        let dir_y = (b.y - a.y) / len;
        if let Some((first, last)) = visible_stamps(target, a, (dir_x, dir_y), len, step, radius) {
            for i in first..=last {
                let t = i as f64 * f64::from(step);
                let cx = f64::from(a.x) + f64::from(dir_x) * t;
                let cy = f64::from(a.y) + f64::from(dir_y) * t;
                stamp_circle(target, cx as f32, cy as f32, radius, color, mode);
            }
        }
        stamp_circle(target, b.x, b.y, radius, color, mode);
    }
}

/// Range of stamp indices `i` (stamp at `t = i * step`, `0 <= t <= len`)
/// whose circle can reach `target`. `None` when the segment misses it.
fn visible_stamps(
    target: &Raster,
    a: Point,
    dir: (f32, f32),
    len: f32,
    step: f32,
    radius: f32,
) -> Option<(u64, u64)> {
    let margin = f64::from(radius.ceil()) + 1.0;
    let mut lo = 0.0f64;
    let mut hi = f64::from(len);
    let axes = [
        (f64::from(a.x), f64::from(dir.0), f64::from(target.width())),
        (f64::from(a.y), f64::from(dir.1), f64::from(target.height())),
    ];
    for (start, d, extent) in axes {
        let (min, max) = (-margin, extent + margin);
        if d.abs() < 1e-12 {
            if start < min || start > max {
                return None;
            }
            continue;
        }
        let t0 = (min - start) / d;
        let t1 = (max - start) / d;
        lo = lo.max(t0.min(t1));
        hi = hi.min(t0.max(t1));
    }
    if lo > hi {
        return None;
    }
    let step = f64::from(step);
    let last_stamp = (f64::from(len) / step).floor();
    let first = (lo / step).floor().max(0.0);
    let last = (hi / step).ceil().min(last_stamp);
    (first <= last).then(|| (first as u64, last as u64))
}

/// Render a whole stroke
pub fn render_stroke(target: &mut Raster, stroke: &Stroke, scale: f32) {
    stamp_points(target, &stroke.points, stroke.color, stroke.size, stroke.mode, scale);
}

/// Render strokes in commit order
pub fn render_strokes(target: &mut Raster, strokes: &[Stroke], scale: f32) {
    for stroke in strokes {
        render_stroke(target, stroke, scale);
    }
}
