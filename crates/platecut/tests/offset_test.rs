use kurbo::Line;
use platecut::geometry::{inward_offset, outward_offset};
use platecut::*;
use platecut::Strategy;
use proptest::prelude::*;
use proptest::strategy::Strategy as _;

fn rect(w: f64, h: f64) -> ClosedPath {
    ClosedPath::new(vec![(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)]).expect("rect")
}

proptest! {
    #[test]
    fn outward_offset_grows_bounds_by_radius(
        w in 0.5f64..12.0,
        h in 0.5f64..12.0,
        r in 0.01f64..0.25,
    ) {
        let grown = outward_offset(&rect(w, h), r, 0.002).expect("offset");
        let bounds = grown.bounding_box();
        prop_assert!((bounds.width() - (w + 2.0 * r)).abs() < 1e-3);
        prop_assert!((bounds.height() - (h + 2.0 * r)).abs() < 1e-3);
        prop_assert!(grown.area() > w * h);
        prop_assert!(grown.is_ccw());
    }

    #[test]
    fn inward_offset_shrinks_bounds_by_radius(
        w in 1.0f64..12.0,
        h in 1.0f64..12.0,
        r in 0.01f64..0.25,
    ) {
        let loops = inward_offset(&rect(w, h), r, 0.002).expect("offset");
        prop_assert_eq!(loops.len(), 1);
        let bounds = loops[0].bounding_box();
        prop_assert!((bounds.width() - (w - 2.0 * r)).abs() < 1e-6);
        prop_assert!((bounds.height() - (h - 2.0 * r)).abs() < 1e-6);
        prop_assert!(loops[0].area() < w * h);
    }

    #[test]
    fn inward_offset_wider_than_pocket_fails(
        w in 0.05f64..0.3,
        extra in 0.001f64..0.1,
    ) {
        let r = w / 2.0 + extra;
        prop_assert!(inward_offset(&rect(w, 4.0), r, 0.002).is_err());
    }

    #[test]
    fn shuffled_rectangle_edges_stitch_back(
        x in -20.0f64..20.0,
        y in -20.0f64..20.0,
        w in 0.5f64..10.0,
        h in 0.5f64..10.0,
        order in Just(vec![0usize, 1, 2, 3]).prop_shuffle(),
        flips in proptest::array::uniform4(any::<bool>()),
    ) {
        let corners = [(x, y), (x + w, y), (x + w, y + h), (x, y + h)];
        let segments: Vec<RawSegment> = order
            .iter()
            .zip(flips)
            .map(|(&i, flip)| {
                let (a, b) = (corners[i], corners[(i + 1) % 4]);
                let (a, b) = if flip { (b, a) } else { (a, b) };
                RawSegment::Line(Line::new(a, b))
            })
            .collect();
        let drawing = Drawing::from_parts(segments, vec![]);

        let result = reconstruct(&drawing, &ReconstructionSettings::default()).expect("reconstruct");
        prop_assert_eq!(result.paths.len(), 1);
        prop_assert!(result.warnings.is_empty());
        prop_assert_eq!(result.paths[0].strategy, Strategy::GraphStitch);
        prop_assert!((result.paths[0].path.area() - w * h).abs() < 1e-6);
    }
}
