use kurbo::{Line, Point};
use platecut::geometry::{ArcSegment, SplineSegment};
use platecut::*;
use std::f64::consts::PI;

fn line(a: (f64, f64), b: (f64, f64)) -> RawSegment {
    RawSegment::Line(Line::new(a, b))
}

/// Rounded-right plate with a bulging spline on the left, stored out of
/// order and with two pieces reversed. `bottom_end` moves the end of the
/// bottom edge to open a gap at the lower right.
fn fragmented_outline(bottom_end: (f64, f64)) -> Drawing {
    let spline = RawSegment::Spline(SplineSegment::new(
        3,
        vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0],
        vec![
            Point::new(0.0, 3.0),
            Point::new(-0.5, 2.0),
            Point::new(-0.5, 1.0),
            Point::new(0.0, 0.0),
        ],
        vec![],
        vec![],
    ));
    // Top edge drawn left to right, against the loop direction.
    let top = line((0.0, 3.0), (4.0, 3.0));
    let bottom = line((0.0, 0.0), bottom_end);
    // Right-hand arc drawn clockwise, top to bottom.
    let right = RawSegment::Arc(ArcSegment::new(Point::new(4.0, 1.5), 1.5, PI / 2.0, -PI));
    Drawing::from_parts(vec![spline, top, bottom, right], vec![])
}

#[test]
fn test_mixed_fragments_stitch_into_one_loop() {
    let drawing = fragmented_outline((4.0, 0.0));
    let result = reconstruct(&drawing, &ReconstructionSettings::default()).expect("reconstruct");

    assert_eq!(result.paths.len(), 1);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    assert!(result.open_segments.is_empty());
    assert_eq!(result.strategies_used(), vec![Strategy::GraphStitch]);

    let path = &result.paths[0];
    assert_eq!(path.segments.len(), 4);
    // Rectangle 12, half disc 9π/8, spline bulge 0.75.
    let expected = 12.0 + PI * 1.5 * 1.5 / 2.0 + 0.75;
    assert!(
        (path.path.area() - expected).abs() < 0.05,
        "area {} expected {}",
        path.path.area(),
        expected
    );
}

#[test]
fn test_small_gap_uses_approximate_merge() {
    let drawing = fragmented_outline((4.03, 0.0));
    let result = reconstruct(&drawing, &ReconstructionSettings::default()).expect("reconstruct");

    assert_eq!(result.paths.len(), 1);
    assert_eq!(result.paths[0].strategy, Strategy::LineMerge);
    assert!(!result.is_approximate());
    assert!(result
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::ApproximateMerge { rings: 1, segments: 4 })));
}

#[test]
fn test_wide_gap_falls_back_to_hull() {
    let drawing = fragmented_outline((3.5, 0.0));
    let result = reconstruct(&drawing, &ReconstructionSettings::default()).expect("reconstruct");

    assert_eq!(result.paths.len(), 1);
    assert_eq!(result.paths[0].strategy, Strategy::ConvexHull);
    assert!(result.is_approximate());
    let warning = result
        .warnings
        .iter()
        .find(|w| matches!(w, Warning::Approximation { .. }))
        .expect("hull warning");
    assert!(warning.to_string().starts_with("APPROXIMATE"));

    // The hull loses the spline's concave side but keeps the arc's extent.
    let bounds = result.paths[0].path.bounding_box();
    assert!((bounds.max_x() - 5.5).abs() < 1e-6);
    assert!(bounds.min_x() < 0.0);
}

#[test]
fn test_pocket_loops_stitch_alongside_perimeter() {
    let mut segments = vec![
        line((0.0, 0.0), (6.0, 0.0)),
        line((6.0, 0.0), (6.0, 6.0)),
        line((6.0, 6.0), (0.0, 6.0)),
        line((0.0, 6.0), (0.0, 0.0)),
    ];
    // Inner pocket with its edges interleaved between perimeter edges.
    segments.insert(1, line((2.0, 2.0), (4.0, 2.0)));
    segments.insert(3, line((4.0, 3.0), (4.0, 2.0)));
    segments.push(line((4.0, 3.0), (2.0, 3.0)));
    segments.push(line((2.0, 2.0), (2.0, 3.0)));
    let drawing = Drawing::from_parts(segments, vec![]);

    let result = reconstruct(&drawing, &ReconstructionSettings::default()).expect("reconstruct");
    assert_eq!(result.paths.len(), 2);
    assert!(result.warnings.is_empty());

    let mut used: Vec<SegmentId> = result
        .paths
        .iter()
        .flat_map(|p| p.segments.iter().copied())
        .collect();
    used.sort();
    used.dedup();
    assert_eq!(used.len(), 8, "every segment used exactly once");
}

#[test]
fn test_reconstruction_is_deterministic() {
    let drawing = fragmented_outline((4.0, 0.0));
    let settings = ReconstructionSettings::default();
    let first = reconstruct(&drawing, &settings).expect("reconstruct");
    let second = reconstruct(&drawing, &settings).expect("reconstruct");
    assert_eq!(first, second);
}

fn plate_with_open_pocket(pocket_closing_end: (f64, f64)) -> Drawing {
    let segments = vec![
        line((0.0, 0.0), (6.0, 0.0)),
        line((6.0, 0.0), (6.0, 6.0)),
        line((6.0, 6.0), (0.0, 6.0)),
        line((0.0, 6.0), (0.0, 0.0)),
        line((2.0, 2.0), (4.0, 2.0)),
        line((4.0, 2.0), (4.0, 3.0)),
        line((4.0, 3.0), (2.0, 3.0)),
        line((2.0, 3.0), pocket_closing_end),
    ];
    Drawing::from_parts(segments, vec![])
}

#[test]
fn test_open_pocket_inside_perimeter_is_merged_and_cut() {
    let drawing = plate_with_open_pocket((2.0, 2.03));
    let result = reconstruct(&drawing, &ReconstructionSettings::default()).expect("reconstruct");

    assert_eq!(result.paths.len(), 2);
    assert_eq!(
        result.strategies_used(),
        vec![Strategy::GraphStitch, Strategy::LineMerge]
    );
    assert!(result.open_segments.is_empty());
    assert!(result
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::ApproximateMerge { rings: 1, segments: 4 })));

    let output = generate_from_drawing(&drawing, &JobConfig::default()).expect("job");
    assert_eq!(output.summary.pockets, 1);
    assert_eq!(output.summary.skipped, 0);
    assert!(output
        .gcode
        .lines
        .iter()
        .any(|l| l.starts_with("(pocket at")));
}

#[test]
fn test_unrecoverable_pocket_candidate_is_reported_skipped() {
    // A lone straight edge: nothing to merge and no area to hull.
    let mut drawing = plate_with_open_pocket((2.0, 2.03));
    drawing.segments.truncate(5);
    let output = generate_from_drawing(&drawing, &JobConfig::default()).expect("job");

    assert_eq!(output.summary.pockets, 0);
    assert_eq!(output.summary.skipped, 1);
    let skipped = output
        .summary
        .warnings
        .iter()
        .find(|w| matches!(w, Warning::FeatureSkipped { .. }))
        .expect("skip warning");
    assert!(skipped.to_string().contains("pocket at (2.0000, 2.0000)"), "{skipped}");
}

#[test]
fn test_open_pocket_with_wide_gap_is_hulled_as_pocket() {
    let drawing = plate_with_open_pocket((2.0, 2.4));
    let result = reconstruct(&drawing, &ReconstructionSettings::default()).expect("reconstruct");

    assert_eq!(result.paths.len(), 2);
    assert!(result.is_approximate());
    assert!(result
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::Approximation { boundary, .. } if boundary == "pocket")));
    // The perimeter itself still came from stitching.
    let largest = result
        .paths
        .iter()
        .max_by(|a, b| a.path.area().total_cmp(&b.path.area()))
        .expect("perimeter");
    assert_eq!(largest.strategy, Strategy::GraphStitch);
}
