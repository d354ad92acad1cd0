use crate::config::JobConfig;
use crate::error::{PlateCutError, PlateCutResult, Warning};
use crate::geometry::polygon::distance;
use crate::geometry::{outward_offset, ClosedPath};
use crate::tabs::place_tabs;
use crate::types::{Tab, Toolpath, ToolpathBuilder};
use tracing::debug;

/// The perimeter cut together with what the caller reports about it.
#[derive(Debug, Clone, PartialEq)]
pub struct PerimeterToolpath {
    pub toolpath: Toolpath,
    /// Path of the cutter centre, clockwise, starting at the plunge corner.
    pub compensated: ClosedPath,
    pub tabs: Vec<Tab>,
    pub warnings: Vec<Warning>,
}

/// Generate the tabbed perimeter cut.
///
/// The boundary is grown by the tool radius and walked clockwise, which climbs
/// on an outside cut. Each depth level is one full lap starting and ending at
/// the lowest, then leftmost vertex. Levels below the tab height lift over
/// every tab.
pub fn generate_perimeter_toolpath(
    perimeter: &ClosedPath,
    config: &JobConfig,
) -> PlateCutResult<PerimeterToolpath> {
    let radius = config.tool.radius();
    let grown = outward_offset(perimeter, radius, config.chord_tolerance).map_err(|failure| {
        PlateCutError::GeometryReconstruction {
            boundary: "perimeter".to_string(),
            reason: format!("tool compensation failed: {failure}"),
        }
    })?;
    let compensated = start_at_corner(&grown.to_cw());

    let plan = place_tabs(&compensated, &config.tabs, config.tool.diameter);
    debug!(
        vertices = compensated.vertices().len(),
        length = compensated.length(),
        tabs = plan.tabs.len(),
        "Compensated perimeter"
    );

    let z = config.z_model();
    let (sx, sy) = compensated.points()[0];
    let mut path = ToolpathBuilder::new(config.preset.feed_rate, config.preset.plunge_rate);
    path.rapid_to(sx, sy, z.safe);
    path.rapid_z(z.top);
    for level in z.depth_levels(config.preset.stepdown) {
        path.line_z(level);
        let lift = if level < z.tab { Some(z.tab) } else { None };
        cut_lap(&mut path, &compensated, &plan.tabs, level, lift);
    }
    path.rapid_z(z.safe);

    Ok(PerimeterToolpath {
        toolpath: path.finish(),
        compensated,
        tabs: plan.tabs,
        warnings: plan.warnings,
    })
}

/// One lap of the loop at `level`. With `lift` set, stretches covered by a
/// tab are cut at the lift height instead.
fn cut_lap(
    path: &mut ToolpathBuilder,
    lap: &ClosedPath,
    tabs: &[Tab],
    level: f64,
    lift: Option<f64>,
) {
    let height_at = |s: f64| match lift {
        Some(tab_z) if tabs.iter().any(|t| s > t.start() && s < t.end()) => tab_z,
        _ => level,
    };

    let mut travelled = 0.0;
    for edge in lap.points().windows(2) {
        let (a, b) = (edge[0], edge[1]);
        let length = distance(a, b);
        if length < 1e-12 {
            continue;
        }
        let edge_end = travelled + length;

        let mut breaks: Vec<f64> = match lift {
            Some(_) => tabs
                .iter()
                .flat_map(|t| [t.start(), t.end()])
                .filter(|&s| s > travelled + 1e-9 && s < edge_end - 1e-9)
                .collect(),
            None => Vec::new(),
        };
        breaks.sort_by(f64::total_cmp);
        breaks.push(edge_end);

        let mut from = travelled;
        for to in breaks {
            let height = height_at((from + to) / 2.0);
            if path.position().map(|p| p.2) != Some(height) {
                path.line_z(height);
            }
            let t = (to - travelled) / length;
            path.line_to(a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t, height);
            from = to;
        }
        travelled = edge_end;
    }

    if path.position().map(|p| p.2) != Some(level) {
        path.line_z(level);
    }
}

/// Rotate the loop to begin at its lowest vertex, leftmost among ties.
fn start_at_corner(lap: &ClosedPath) -> ClosedPath {
    let corner = lap
        .vertices()
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            if (a.1 - b.1).abs() < 1e-9 {
                a.0.total_cmp(&b.0)
            } else {
                a.1.total_cmp(&b.1)
            }
        })
        .map(|(index, _)| index)
        .unwrap_or(0);
    lap.rotated_to(corner)
}
