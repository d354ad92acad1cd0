use kurbo::{Circle, Line};
use platecut::*;

fn line(a: (f64, f64), b: (f64, f64)) -> RawSegment {
    RawSegment::Line(Line::new(a, b))
}

fn rect_segments(x: f64, y: f64, w: f64, h: f64) -> Vec<RawSegment> {
    vec![
        line((x, y), (x + w, y)),
        line((x + w, y), (x + w, y + h)),
        line((x + w, y + h), (x, y + h)),
        line((x, y + h), (x, y)),
    ]
}

fn loop_of(points: &[(f64, f64)]) -> ClosedPath {
    ClosedPath::new(points.to_vec()).expect("closed path")
}

#[test]
fn test_pocket_toolpath_stays_inside_wall() {
    let config = JobConfig::default();
    let pocket = loop_of(&[(2.0, 2.0), (4.0, 2.0), (4.0, 3.5), (2.0, 3.5)]);
    let toolpath = generate_pocket_toolpath(&pocket, "pocket", &config).expect("pocket");

    let r = config.tool.radius();
    let bounds = toolpath.cut_bounds().expect("bounds");
    assert!(bounds.min_x() >= 2.0 + r - 1e-6);
    assert!(bounds.max_x() <= 4.0 - r + 1e-6);
    assert!(bounds.min_y() >= 2.0 + r - 1e-6);
    assert!(bounds.max_y() <= 3.5 - r + 1e-6);

    // Every level reaches the floor eventually and no move goes below it.
    assert_eq!(toolpath.min_z(), Some(config.z_model().cut));
}

#[test]
fn test_narrow_waist_splits_into_regions() {
    let config = JobConfig::default();
    // Two 1x1 lobes joined by a channel narrower than the tool.
    let dumbbell = loop_of(&[
        (0.0, 0.0),
        (1.0, 0.0),
        (1.0, 0.45),
        (2.0, 0.45),
        (2.0, 0.0),
        (3.0, 0.0),
        (3.0, 1.0),
        (2.0, 1.0),
        (2.0, 0.55),
        (1.0, 0.55),
        (1.0, 1.0),
        (0.0, 1.0),
    ]);
    let toolpath = generate_pocket_toolpath(&dumbbell, "dumbbell", &config).expect("pocket");
    let bounds = toolpath.cut_bounds().expect("bounds");
    let r = config.tool.radius();
    assert!((bounds.min_x() - r).abs() < 1e-3);
    assert!((bounds.max_x() - (3.0 - r)).abs() < 1e-3);

    // Travelling between lobes has to lift over the channel.
    let safe = config.z_model().safe;
    let retracts = toolpath
        .moves
        .iter()
        .filter(|m| m.kind == MoveKind::Rapid && m.target.2 == safe)
        .count();
    assert!(retracts > 2);
}

#[test]
fn test_clearing_rings_reach_the_middle() {
    let wall = loop_of(&[(0.0, 0.0), (3.0, 0.0), (3.0, 3.0), (0.0, 3.0)]);
    let stepover = 0.157 * 0.4;
    let rings = pocket::clearing_rings(&wall, stepover, 0.002);
    let innermost = rings.last().expect("rings");
    let bounds = innermost.bounding_box();
    // The last ring is within one stepover of collapsing.
    assert!(bounds.width() <= 2.0 * stepover + 1e-3);
    assert!(rings.iter().all(ClosedPath::is_ccw));
}

#[test]
fn test_pocket_too_narrow_is_skipped_in_job() {
    let mut segments = rect_segments(0.0, 0.0, 6.0, 6.0);
    segments.extend(rect_segments(1.0, 1.0, 2.0, 1.0));
    segments.extend(rect_segments(4.0, 1.0, 0.1, 3.0));
    let drawing = Drawing::from_parts(segments, vec![Circle::new((5.0, 5.0), 0.095)]);

    let output = generate_from_drawing(&drawing, &JobConfig::default()).expect("job");
    assert_eq!(output.summary.pockets, 2);
    assert_eq!(output.summary.skipped, 1);
    assert!(output.summary.warnings.iter().any(|w| matches!(
        w,
        Warning::FeatureSkipped { feature, .. } if feature.starts_with("pocket at (4.0000")
    )));

    let generated = output
        .summary
        .features
        .iter()
        .filter(|f| matches!(f.status, FeatureStatus::Generated { .. }))
        .count();
    assert_eq!(generated, 3);
    assert!(output
        .gcode
        .lines
        .iter()
        .any(|l| l == "(pocket at [1.0000, 1.0000])"));
}
