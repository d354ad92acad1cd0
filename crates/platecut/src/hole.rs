use crate::config::{HoleStrategy, JobConfig};
use crate::error::{PlateCutError, PlateCutResult};
use crate::types::{Toolpath, ToolpathBuilder};
use tracing::debug;

/// Clearance above the previous peck depth when re-entering the hole.
const PECK_REENTRY_CLEARANCE: f64 = 0.02;

/// Radius the cutter centre follows to cut a hole of `hole_radius`.
pub fn compensated_radius(hole_radius: f64, tool_radius: f64) -> f64 {
    hole_radius - tool_radius
}

/// Toolpath for one round hole, using the job's hole strategy.
pub fn generate_hole_toolpath(
    center: (f64, f64),
    radius: f64,
    label: &str,
    config: &JobConfig,
) -> PlateCutResult<Toolpath> {
    match config.hole_strategy {
        HoleStrategy::Helical => helical_toolpath(center, radius, label, config),
        HoleStrategy::Drill => Ok(drill_toolpath(center, config)),
    }
}

/// Helical entry down to the cut depth, then counter-clockwise rings out to
/// the compensated radius.
pub fn helical_toolpath(
    center: (f64, f64),
    radius: f64,
    label: &str,
    config: &JobConfig,
) -> PlateCutResult<Toolpath> {
    let tool_radius = config.tool.radius();
    let target = compensated_radius(radius, tool_radius);
    if target <= 0.0 {
        return Err(PlateCutError::ToolTooLarge {
            feature: label.to_string(),
            reason: format!(
                "tool radius {tool_radius:.4} leaves compensated radius {target:.4} for hole radius {radius:.4}"
            ),
        });
    }

    let z = config.z_model();
    let stepover = config.stepover_distance();
    let entry = target.min(stepover);
    let (cx, cy) = center;
    debug!(label, target, entry, "Generating helical hole");

    let mut path = ToolpathBuilder::new(config.preset.feed_rate, config.preset.plunge_rate);
    path.rapid_to(cx, cy, z.safe);
    path.rapid_z(z.top);
    path.line_to(cx + entry, cy, z.top);

    // One revolution per depth level.
    for level in z.depth_levels(config.preset.stepdown) {
        path.full_circle(false, center, level);
    }

    let mut ring = entry;
    let mut rings = 0;
    while ring < target - 1e-9 {
        ring = (ring + stepover).min(target);
        path.line_to(cx + ring, cy, z.cut);
        path.full_circle(false, center, z.cut);
        rings += 1;
    }
    if rings == 0 {
        // The helix ramps the whole way down; finish with a flat pass.
        path.full_circle(false, center, z.cut);
    }

    path.line_to(cx, cy, z.cut);
    path.rapid_z(z.safe);
    Ok(path.finish())
}

/// Peck drill at the hole centre. No radius compensation is applied.
pub fn drill_toolpath(center: (f64, f64), config: &JobConfig) -> Toolpath {
    let z = config.z_model();
    let (cx, cy) = center;

    let mut path = ToolpathBuilder::new(config.preset.feed_rate, config.preset.plunge_rate);
    path.rapid_to(cx, cy, z.safe);
    path.rapid_z(z.top);

    let levels = z.depth_levels(config.preset.stepdown);
    let mut previous = z.top;
    for (index, level) in levels.iter().enumerate() {
        if index > 0 {
            path.rapid_z((previous + PECK_REENTRY_CLEARANCE).min(z.top));
        }
        path.line_z(*level);
        if index + 1 < levels.len() {
            path.rapid_z(z.top);
        }
        previous = *level;
    }
    path.rapid_z(z.safe);
    path.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MoveKind;

    #[test]
    fn test_screw_hole_compensated_radius() {
        let config = JobConfig::default();
        let toolpath = generate_hole_toolpath((1.0, 1.0), 0.095, "hole", &config).expect("hole");
        let arcs: Vec<_> = toolpath
            .moves
            .iter()
            .filter(|m| m.kind == MoveKind::ArcCcw)
            .collect();
        assert!(!arcs.is_empty());
        for arc in &arcs {
            let (i, j) = arc.center_offset.unwrap();
            assert!((i + 0.0165).abs() < 1e-9);
            assert!(j.abs() < 1e-12);
        }
        // Three helix turns plus the flat finishing circle.
        assert_eq!(arcs.len(), 4);
        assert_eq!(toolpath.min_z(), Some(-0.02));
    }

    #[test]
    fn test_large_hole_steps_out_to_wall() {
        let config = JobConfig::default();
        let toolpath = helical_toolpath((2.0, 2.0), 0.5625, "bearing", &config).expect("hole");
        let bounds = toolpath.cut_bounds().unwrap();
        let target = 0.5625 - 0.0785;
        assert!((bounds.max_x() - (2.0 + target)).abs() < 1e-9);
        assert!((bounds.min_y() - (2.0 - target)).abs() < 1e-9);
        // Ends back at the centre at safe height.
        let last = toolpath.moves.last().unwrap();
        assert_eq!(last.target, (2.0, 2.0, config.z_model().safe));
    }

    #[test]
    fn test_tool_too_large() {
        let config = JobConfig::default().with_tool_diameter(0.25);
        let err = helical_toolpath((1.0, 1.0), 0.095, "hole 1", &config).unwrap_err();
        assert!(matches!(err, PlateCutError::ToolTooLarge { .. }));
        assert!(err.to_string().contains("hole 1"));
    }

    #[test]
    fn test_drill_mode_pecks_without_arcs() {
        let config = JobConfig::default()
            .with_tool_diameter(0.25)
            .with_hole_strategy(HoleStrategy::Drill);
        let toolpath = generate_hole_toolpath((1.0, 1.0), 0.095, "hole", &config).expect("drill");
        assert!(toolpath.moves.iter().all(|m| !m.kind.is_arc()));
        assert!(toolpath
            .moves
            .iter()
            .all(|m| (m.target.0, m.target.1) == (1.0, 1.0)));
        assert_eq!(toolpath.min_z(), Some(-0.02));
        let plunges = toolpath
            .moves
            .iter()
            .filter(|m| m.kind == MoveKind::Linear)
            .count();
        assert_eq!(plunges, 3);
    }
}
