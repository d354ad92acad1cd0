use crate::config::JobConfig;
use crate::error::{PlateCutError, PlateCutResult};
use crate::geometry::polygon::distance;
use crate::geometry::{inward_offset, outward_offset, ClosedPath};
use crate::types::{Toolpath, ToolpathBuilder, ZModel};
use clipper2::{inflate, EndType, JoinType, Path, PathType, Polygon, Polygons, Vertex};
use tracing::debug;

/// clipper2 rounds to two decimals; working in thousandths of an inch keeps
/// its rounding well below machine resolution.
const CLIPPER_SCALE: f64 = 1000.0;

/// Generate a 2D pocket toolpath using iterative offset (contour-parallel) strategy
///
/// The pocket wall is compensated inward by the tool radius. At every depth
/// level each compensated loop is traced counter-clockwise, then cleared by
/// shrinking it with clipper2 one stepover at a time until nothing is left.
pub fn generate_pocket_toolpath(
    boundary: &ClosedPath,
    label: &str,
    config: &JobConfig,
) -> PlateCutResult<Toolpath> {
    let compensated = inward_offset(boundary, config.tool.radius(), config.chord_tolerance)
        .map_err(|failure| PlateCutError::ToolTooLarge {
            feature: label.to_string(),
            reason: failure.to_string(),
        })?;

    let stepover = config.stepover_distance();
    let regions: Vec<PocketRegion> = compensated
        .into_iter()
        .map(|wall| {
            let rings = clearing_rings(&wall, stepover, config.chord_tolerance);
            // Connectors may graze the wall they start on.
            let envelope =
                outward_offset(&wall, config.tool.clearance_tolerance, config.chord_tolerance)
                    .unwrap_or_else(|_| wall.clone());
            PocketRegion {
                wall,
                rings,
                envelope,
            }
        })
        .collect();
    debug!(
        label,
        regions = regions.len(),
        rings = regions.iter().map(|r| r.rings.len()).sum::<usize>(),
        "Generated pocket clearing rings"
    );

    let z = config.z_model();
    let mut path = ToolpathBuilder::new(config.preset.feed_rate, config.preset.plunge_rate);
    for level in z.depth_levels(config.preset.stepdown) {
        for region in &regions {
            for ring in std::iter::once(&region.wall).chain(region.rings.iter()) {
                let ring = start_nearest(ring, path.position());
                let start = ring.points()[0];
                move_to_start(&mut path, &z, region, start, level);
                for &(x, y) in &ring.points()[1..] {
                    path.line_to(x, y, level);
                }
            }
        }
    }
    path.rapid_z(z.safe);
    Ok(path.finish())
}

struct PocketRegion {
    wall: ClosedPath,
    rings: Vec<ClosedPath>,
    envelope: ClosedPath,
}

/// Stay at depth when the straight connector never leaves the region,
/// otherwise lift to safe height and plunge again.
fn move_to_start(
    path: &mut ToolpathBuilder,
    z: &ZModel,
    region: &PocketRegion,
    start: (f64, f64),
    level: f64,
) {
    if let Some((x, y, current)) = path.position() {
        let at_depth = current < z.top;
        let inside = distance((x, y), start) < 1e-9
            || region.envelope.contains_segment((x, y), start);
        if at_depth && inside {
            path.line_to(start.0, start.1, current);
            path.line_z(level);
            return;
        }
    }
    path.rapid_z(z.safe);
    path.rapid_to(start.0, start.1, z.safe);
    path.rapid_z(z.top);
    path.line_z(level);
}

/// Rotate a loop to start at the vertex closest to the tool, wound CCW.
fn start_nearest(ring: &ClosedPath, position: Option<(f64, f64, f64)>) -> ClosedPath {
    let ring = ring.to_ccw();
    let Some((x, y, _)) = position else {
        return ring;
    };
    let nearest = ring
        .vertices()
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| distance(**a, (x, y)).total_cmp(&distance(**b, (x, y))))
        .map(|(index, _)| index)
        .unwrap_or(0);
    ring.rotated_to(nearest)
}

/// Successive inward offsets of the wall, outermost first.
pub fn clearing_rings(wall: &ClosedPath, stepover: f64, chord_tolerance: f64) -> Vec<ClosedPath> {
    let mut current = to_polygons(wall);
    let mut rings = Vec::new();
    let mut frontier = vec![wall.to_ccw()];

    // Loop: shrink the polygon inward by stepover distance until it collapses
    loop {
        let offset_result = inflate(
            current.clone(),
            -stepover * CLIPPER_SCALE,
            JoinType::Round,
            EndType::ClosedPolygon,
            2.0,
            chord_tolerance * CLIPPER_SCALE,
        );

        let pass = from_polygons(&offset_result);
        if pass.is_empty() {
            break;
        }
        rings.extend(pass.iter().cloned());
        frontier = pass;
        current = offset_result;
    }

    for core in frontier {
        finish_core(core, stepover, chord_tolerance, &mut rings);
    }
    rings
}

/// clipper2 drops a loop while it is still a couple of stepovers wide. The
/// remaining core is shrunk with cavalier instead, halving the step down to a
/// quarter stepover once a full step collapses it.
fn finish_core(core: ClosedPath, stepover: f64, chord_tolerance: f64, rings: &mut Vec<ClosedPath>) {
    let min_step = stepover / 4.0;
    let mut pending = vec![core];
    while let Some(ring) = pending.pop() {
        let mut step = stepover;
        while step >= min_step {
            match inward_offset(&ring, step, chord_tolerance) {
                Ok(loops) => {
                    for inner in loops {
                        rings.push(inner.to_ccw());
                        pending.push(inner);
                    }
                    break;
                }
                Err(_) => step /= 2.0,
            }
        }
    }
}

fn from_polygons(polygons: &Polygons) -> Vec<ClosedPath> {
    let mut rings = Vec::new();
    for polygon in polygons.polygons() {
        for ring_path in polygon.paths() {
            let points: Vec<(f64, f64)> = ring_path
                .vertices()
                .iter()
                .map(|v| (v.x() / CLIPPER_SCALE, v.y() / CLIPPER_SCALE))
                .collect();
            if let Some(ring) = ClosedPath::new(points) {
                rings.push(ring.to_ccw());
            }
        }
    }
    rings
}

fn to_polygons(path: &ClosedPath) -> Polygons {
    let vertices: Vec<Vertex> = path
        .vertices()
        .iter()
        .map(|(x, y)| Vertex::new(x * CLIPPER_SCALE, y * CLIPPER_SCALE))
        .collect();
    let outer_path = Path::new(vertices, true); // closed polygon
    Polygons::new(vec![Polygon::new(vec![outer_path], PathType::Subject)])
}
