//! Tool-radius compensation of closed loops.
//!
//! Loops are normalised to counter-clockwise before offsetting, so a positive
//! cavalier delta always moves the boundary inward. Arcs produced at rounded
//! joins are flattened back to chords within the requested tolerance.

use super::polygon::ClosedPath;
use cavalier_contours::polyline::{PlineSource, PlineSourceMut, PlineVertex, Polyline};
use std::f64::consts::TAU;
use std::panic;
use thiserror::Error;
use tracing::warn;

/// Why an offset produced no usable loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OffsetFailure {
    #[error("offset by {distance:.4} collapsed the loop")]
    Collapsed { distance: f64 },
    #[error("offset by {distance:.4} inverted the loop")]
    Inverted { distance: f64 },
    #[error("offset by {distance:.4} did not shrink the loop (area {original:.4} -> {offset:.4})")]
    NotShrunk {
        distance: f64,
        original: f64,
        offset: f64,
    },
    #[error("offset by {distance:.4} did not grow the loop")]
    NotGrown { distance: f64 },
    #[error("offset engine failed on a degenerate loop")]
    Degenerate,
}

/// Grow a loop by `distance`. The result is the single outer loop, wound CCW.
pub fn outward_offset(
    path: &ClosedPath,
    distance: f64,
    chord_tolerance: f64,
) -> Result<ClosedPath, OffsetFailure> {
    let original = path.area();
    let loops = offset_ccw(path, -distance, chord_tolerance)?;
    let outer = loops
        .into_iter()
        .max_by(|a, b| a.area().total_cmp(&b.area()))
        .ok_or(OffsetFailure::Collapsed { distance })?;
    if !outer.is_ccw() {
        return Err(OffsetFailure::Inverted { distance });
    }
    if distance > 0.0 && outer.area() <= original {
        return Err(OffsetFailure::NotGrown { distance });
    }
    Ok(outer)
}

/// Shrink a loop by `distance`. A narrow waist can split it into several loops.
pub fn inward_offset(
    path: &ClosedPath,
    distance: f64,
    chord_tolerance: f64,
) -> Result<Vec<ClosedPath>, OffsetFailure> {
    let original = path.area();
    let loops = offset_ccw(path, distance, chord_tolerance)?;
    if loops.is_empty() {
        return Err(OffsetFailure::Collapsed { distance });
    }
    if loops.iter().any(|l| !l.is_ccw()) {
        return Err(OffsetFailure::Inverted { distance });
    }
    let offset: f64 = loops.iter().map(ClosedPath::area).sum();
    if distance > 0.0 && offset >= original {
        return Err(OffsetFailure::NotShrunk {
            distance,
            original,
            offset,
        });
    }
    Ok(loops)
}

fn offset_ccw(
    path: &ClosedPath,
    delta: f64,
    chord_tolerance: f64,
) -> Result<Vec<ClosedPath>, OffsetFailure> {
    let pline = to_polyline(&path.to_ccw());
    if pline.vertex_count() < 3 {
        return Err(OffsetFailure::Degenerate);
    }

    let offsets = panic::catch_unwind(panic::AssertUnwindSafe(|| pline.parallel_offset(delta)))
        .map_err(|_| {
            warn!(delta, "Panic during parallel offset");
            OffsetFailure::Degenerate
        })?;

    Ok(offsets
        .iter()
        .filter_map(|result| ClosedPath::new(flatten(result, chord_tolerance)))
        .collect())
}

fn to_polyline(path: &ClosedPath) -> Polyline<f64> {
    let mut pline = Polyline::new();
    for &(x, y) in path.vertices() {
        pline.add_vertex(PlineVertex::new(x, y, 0.0));
    }
    pline.set_is_closed(true);
    pline
}

/// Vertices of a closed polyline with every bulge replaced by chords.
fn flatten(pline: &Polyline<f64>, chord_tolerance: f64) -> Vec<(f64, f64)> {
    let count = pline.vertex_count();
    let mut points = Vec::with_capacity(count);
    for i in 0..count {
        let v = pline.at(i);
        points.push((v.x, v.y));
        if v.bulge.abs() > 1e-9 {
            let next = pline.at((i + 1) % count);
            points.extend(arc_chords((v.x, v.y), (next.x, next.y), v.bulge, chord_tolerance));
        }
    }
    points
}

/// Interior points of a bulge arc, spaced so no chord deviates more than `tolerance`.
fn arc_chords(p0: (f64, f64), p1: (f64, f64), bulge: f64, tolerance: f64) -> Vec<(f64, f64)> {
    let (dx, dy) = (p1.0 - p0.0, p1.1 - p0.1);
    let chord = dx.hypot(dy);
    if chord < 1e-12 {
        return Vec::new();
    }
    let theta = 4.0 * bulge.atan();
    let radius = chord / (2.0 * (theta.abs() / 2.0).sin());
    let offset = radius * (theta.abs() / 2.0).cos() * bulge.signum();
    let (cx, cy) = (
        (p0.0 + p1.0) / 2.0 - dy / chord * offset,
        (p0.1 + p1.1) / 2.0 + dx / chord * offset,
    );

    let max_step = if tolerance < radius {
        2.0 * (1.0 - tolerance / radius).acos()
    } else {
        TAU / 4.0
    };
    let segments = (theta.abs() / max_step).ceil().max(1.0) as usize;
    let start = (p0.1 - cy).atan2(p0.0 - cx);
    (1..segments)
        .map(|k| {
            let angle = start + theta * k as f64 / segments as f64;
            (cx + radius * angle.cos(), cy + radius * angle.sin())
        })
        .collect()
}
