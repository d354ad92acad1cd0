use crate::types::angle_within_sweep;
use kurbo::{Affine, Line, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Number of chords used when a spline only needs a bounding box.
const SPLINE_BOUNDS_SAMPLES: usize = 64;

/// One drawing primitive as loaded from the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawSegment {
    /// A straight line segment.
    Line(Line),
    /// A circular arc.
    Arc(ArcSegment),
    /// A (possibly rational) B-spline.
    Spline(SplineSegment),
}

impl RawSegment {
    pub fn start(&self) -> Point {
        match self {
            RawSegment::Line(line) => line.p0,
            RawSegment::Arc(arc) => arc.start(),
            RawSegment::Spline(spline) => spline.start(),
        }
    }

    pub fn end(&self) -> Point {
        match self {
            RawSegment::Line(line) => line.p1,
            RawSegment::Arc(arc) => arc.end(),
            RawSegment::Spline(spline) => spline.end(),
        }
    }

    /// Points along the segment from start to end. Lines keep their two endpoints.
    pub fn sample(&self, arc_segments: usize, spline_segments: usize) -> Vec<Point> {
        match self {
            RawSegment::Line(line) => vec![line.p0, line.p1],
            RawSegment::Arc(arc) => arc.sample(arc_segments),
            RawSegment::Spline(spline) => spline.sample(spline_segments),
        }
    }

    pub fn bounding_box(&self) -> Rect {
        match self {
            RawSegment::Line(line) => Rect::from_points(line.p0, line.p1),
            RawSegment::Arc(arc) => arc.bounding_box(),
            RawSegment::Spline(spline) => points_bounds(&spline.sample(SPLINE_BOUNDS_SAMPLES))
                .unwrap_or_else(|| Rect::from_points(spline.start(), spline.end())),
        }
    }

    /// Apply a similarity transform (scale, rotation, translation, optional mirror).
    pub fn transformed(&self, affine: Affine) -> RawSegment {
        match self {
            RawSegment::Line(line) => RawSegment::Line(Line::new(affine * line.p0, affine * line.p1)),
            RawSegment::Arc(arc) => RawSegment::Arc(arc.transformed(affine)),
            RawSegment::Spline(spline) => RawSegment::Spline(spline.transformed(affine)),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            RawSegment::Line(_) => "line",
            RawSegment::Arc(_) => "arc",
            RawSegment::Spline(_) => "spline",
        }
    }
}

/// A circular arc. Angles are radians; a positive sweep runs counter-clockwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcSegment {
    pub center: Point,
    pub radius: f64,
    pub start_angle: f64,
    pub sweep: f64,
}

impl ArcSegment {
    pub fn new(center: Point, radius: f64, start_angle: f64, sweep: f64) -> Self {
        Self {
            center,
            radius,
            start_angle,
            sweep,
        }
    }

    /// Counter-clockwise arc from `start_degrees` to `end_degrees`, as DXF stores them.
    pub fn from_degrees(center: Point, radius: f64, start_degrees: f64, end_degrees: f64) -> Self {
        let mut sweep = (end_degrees - start_degrees).rem_euclid(360.0);
        if sweep < 1e-9 {
            sweep = 360.0;
        }
        Self::new(center, radius, start_degrees.to_radians(), sweep.to_radians())
    }

    /// Arc between two polyline vertices; `bulge` is tan(sweep / 4), positive for CCW.
    ///
    /// Returns `None` when the chord is degenerate.
    pub fn from_bulge(p0: Point, p1: Point, bulge: f64) -> Option<Self> {
        let chord = p1 - p0;
        let chord_len = chord.hypot();
        if chord_len < 1e-12 || bulge.abs() < 1e-12 {
            return None;
        }

        let theta = 4.0 * bulge.atan();
        let radius = chord_len / (2.0 * (theta.abs() / 2.0).sin());
        let normal = Vec2::new(-chord.y, chord.x) / chord_len;
        let distance = radius * (theta.abs() / 2.0).cos() * bulge.signum();
        let center = p0.midpoint(p1) + normal * distance;
        let start_angle = (p0 - center).atan2();

        Some(Self::new(center, radius, start_angle, theta))
    }

    pub fn point_at_angle(&self, angle: f64) -> Point {
        self.center + Vec2::from_angle(angle) * self.radius
    }

    pub fn start(&self) -> Point {
        self.point_at_angle(self.start_angle)
    }

    pub fn end(&self) -> Point {
        self.point_at_angle(self.start_angle + self.sweep)
    }

    pub fn length(&self) -> f64 {
        self.radius * self.sweep.abs()
    }

    /// `segments` chords, so `segments + 1` points.
    pub fn sample(&self, segments: usize) -> Vec<Point> {
        let segments = segments.max(1);
        (0..=segments)
            .map(|i| {
                let t = i as f64 / segments as f64;
                self.point_at_angle(self.start_angle + self.sweep * t)
            })
            .collect()
    }

    /// Exact bounds: the endpoints plus every axis extreme the sweep passes.
    pub fn bounding_box(&self) -> Rect {
        let mut rect = Rect::from_points(self.start(), self.end());
        for quadrant in 0..4 {
            let angle = quadrant as f64 * PI / 2.0;
            if angle_within_sweep(self.start_angle, self.sweep, angle) {
                rect = rect.union_pt(self.point_at_angle(angle));
            }
        }
        rect
    }

    fn transformed(&self, affine: Affine) -> Self {
        let det = affine.determinant();
        let center = affine * self.center;
        let start = affine * self.start();
        let sweep = if det < 0.0 { -self.sweep } else { self.sweep };
        Self::new(
            center,
            self.radius * det.abs().sqrt(),
            (start - center).atan2(),
            sweep,
        )
    }
}

/// A NURBS curve as stored in a DXF SPLINE entity.
///
/// When the control net is unusable the fit points are used as a polyline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplineSegment {
    pub degree: usize,
    pub knots: Vec<f64>,
    pub control_points: Vec<Point>,
    /// One weight per control point; empty means non-rational.
    pub weights: Vec<f64>,
    pub fit_points: Vec<Point>,
}

impl SplineSegment {
    pub fn new(
        degree: usize,
        knots: Vec<f64>,
        control_points: Vec<Point>,
        weights: Vec<f64>,
        fit_points: Vec<Point>,
    ) -> Self {
        Self {
            degree,
            knots,
            control_points,
            weights,
            fit_points,
        }
    }

    /// True when the knot vector and control points describe an evaluable curve.
    pub fn has_control_net(&self) -> bool {
        let n = self.control_points.len();
        let p = self.degree;
        p >= 1
            && n > p
            && self.knots.len() == n + p + 1
            && self.knots.windows(2).all(|w| w[0] <= w[1])
            && self.knots[p] < self.knots[n]
    }

    /// True when there is anything to draw at all.
    pub fn is_usable(&self) -> bool {
        self.has_control_net() || self.fit_points.len() >= 2
    }

    fn weight(&self, index: usize) -> f64 {
        if self.weights.len() == self.control_points.len() {
            self.weights[index]
        } else {
            1.0
        }
    }

    fn domain(&self) -> (f64, f64) {
        (
            self.knots[self.degree],
            self.knots[self.control_points.len()],
        )
    }

    /// Evaluate at parameter `u` with de Boor's algorithm in homogeneous coordinates.
    ///
    /// Callers must check [`SplineSegment::has_control_net`] first.
    pub fn evaluate(&self, u: f64) -> Point {
        let p = self.degree;
        let n = self.control_points.len();
        let (lo, hi) = self.domain();
        let u = u.clamp(lo, hi);

        let mut span = p;
        while span + 1 < n && self.knots[span + 1] <= u {
            span += 1;
        }

        // (w*x, w*y, w)
        let mut d: Vec<(f64, f64, f64)> = (0..=p)
            .map(|j| {
                let index = j + span - p;
                let w = self.weight(index);
                let cp = self.control_points[index];
                (cp.x * w, cp.y * w, w)
            })
            .collect();

        for r in 1..=p {
            for j in (r..=p).rev() {
                let left = self.knots[j + span - p];
                let right = self.knots[j + 1 + span - r];
                let denom = right - left;
                let alpha = if denom.abs() < 1e-15 {
                    0.0
                } else {
                    (u - left) / denom
                };
                let (a, b) = (d[j - 1], d[j]);
                d[j] = (
                    (1.0 - alpha) * a.0 + alpha * b.0,
                    (1.0 - alpha) * a.1 + alpha * b.1,
                    (1.0 - alpha) * a.2 + alpha * b.2,
                );
            }
        }

        let (x, y, w) = d[p];
        if w.abs() < 1e-15 {
            Point::new(x, y)
        } else {
            Point::new(x / w, y / w)
        }
    }

    pub fn start(&self) -> Point {
        if self.has_control_net() {
            self.evaluate(self.domain().0)
        } else {
            self.fit_points
                .first()
                .or(self.control_points.first())
                .copied()
                .unwrap_or(Point::ZERO)
        }
    }

    pub fn end(&self) -> Point {
        if self.has_control_net() {
            self.evaluate(self.domain().1)
        } else {
            self.fit_points
                .last()
                .or(self.control_points.last())
                .copied()
                .unwrap_or(Point::ZERO)
        }
    }

    /// `segments` chords evenly spaced in parameter; fit points as-is otherwise.
    pub fn sample(&self, segments: usize) -> Vec<Point> {
        if !self.has_control_net() {
            return if self.fit_points.len() >= 2 {
                self.fit_points.clone()
            } else {
                self.control_points.clone()
            };
        }
        let segments = segments.max(1);
        let (lo, hi) = self.domain();
        (0..=segments)
            .map(|i| self.evaluate(lo + (hi - lo) * i as f64 / segments as f64))
            .collect()
    }

    fn transformed(&self, affine: Affine) -> Self {
        Self {
            degree: self.degree,
            knots: self.knots.clone(),
            control_points: self.control_points.iter().map(|p| affine * *p).collect(),
            weights: self.weights.clone(),
            fit_points: self.fit_points.iter().map(|p| affine * *p).collect(),
        }
    }
}

/// Bounding box of a point list, `None` when it is empty.
pub fn points_bounds(points: &[Point]) -> Option<Rect> {
    let (first, rest) = points.split_first()?;
    Some(
        rest.iter()
            .fold(Rect::from_points(*first, *first), |rect, p| rect.union_pt(*p)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a - b).hypot() < 1e-9
    }

    #[test]
    fn test_arc_from_degrees_endpoints() {
        let arc = ArcSegment::from_degrees(Point::new(1.0, 1.0), 1.0, 0.0, 90.0);
        assert!(close(arc.start(), Point::new(2.0, 1.0)));
        assert!(close(arc.end(), Point::new(1.0, 2.0)));
        assert!((arc.length() - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_arc_wrapping_through_zero_degrees() {
        let arc = ArcSegment::from_degrees(Point::ZERO, 2.0, 270.0, 90.0);
        assert!((arc.sweep - PI).abs() < 1e-12);
        let bbox = arc.bounding_box();
        assert!((bbox.max_x() - 2.0).abs() < 1e-9);
        assert!(bbox.min_x().abs() < 1e-9);
    }

    #[test]
    fn test_bulge_half_circle() {
        // bulge 1 = 180 degrees counter-clockwise
        let arc = ArcSegment::from_bulge(Point::new(0.0, 0.0), Point::new(2.0, 0.0), 1.0)
            .expect("arc");
        assert!(close(arc.center, Point::new(1.0, 0.0)));
        assert!((arc.radius - 1.0).abs() < 1e-12);
        assert!(close(arc.end(), Point::new(2.0, 0.0)));
        // CCW from (0,0) to (2,0) about (1,0) passes below the chord.
        let mid = arc.point_at_angle(arc.start_angle + arc.sweep / 2.0);
        assert!(close(mid, Point::new(1.0, -1.0)));
    }

    #[test]
    fn test_bulge_quarter_clockwise() {
        let bulge = -(PI / 8.0).tan();
        let arc = ArcSegment::from_bulge(Point::new(1.0, 0.0), Point::new(0.0, 1.0), bulge)
            .expect("arc");
        assert!(arc.sweep < 0.0);
        assert!((arc.radius - 1.0).abs() < 1e-9);
        assert!(close(arc.center, Point::new(1.0, 1.0)));
    }

    #[test]
    fn test_arc_sampling_count() {
        let arc = ArcSegment::from_degrees(Point::ZERO, 1.0, 0.0, 180.0);
        let points = arc.sample(20);
        assert_eq!(points.len(), 21);
        assert!(close(points[20], Point::new(-1.0, 0.0)));
    }

    #[test]
    fn test_cubic_spline_endpoints_and_midpoint() {
        let spline = SplineSegment::new(
            3,
            vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0],
            vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 2.0),
                Point::new(3.0, 2.0),
                Point::new(4.0, 0.0),
            ],
            vec![],
            vec![],
        );
        assert!(spline.has_control_net());
        assert!(close(spline.start(), Point::new(0.0, 0.0)));
        assert!(close(spline.end(), Point::new(4.0, 0.0)));
        // Bezier midpoint: (P0 + 3P1 + 3P2 + P3) / 8
        assert!(close(spline.evaluate(0.5), Point::new(2.0, 1.5)));
        assert_eq!(spline.sample(30).len(), 31);
    }

    #[test]
    fn test_rational_quadratic_quarter_circle() {
        let w = std::f64::consts::FRAC_1_SQRT_2;
        let spline = SplineSegment::new(
            2,
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            vec![Point::new(1.0, 0.0), Point::new(1.0, 1.0), Point::new(0.0, 1.0)],
            vec![1.0, w, 1.0],
            vec![],
        );
        for point in spline.sample(10) {
            assert!((point.to_vec2().hypot() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_spline_falls_back_to_fit_points() {
        let spline = SplineSegment::new(
            3,
            vec![],
            vec![],
            vec![],
            vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0), Point::new(2.0, 0.0)],
        );
        assert!(!spline.has_control_net());
        assert!(spline.is_usable());
        assert_eq!(spline.sample(30).len(), 3);
        assert!(close(spline.end(), Point::new(2.0, 0.0)));
    }

    #[test]
    fn test_transform_rotates_arc() {
        let arc = RawSegment::Arc(ArcSegment::from_degrees(Point::new(1.0, 0.0), 1.0, 0.0, 90.0));
        let rotated = arc.transformed(Affine::rotate(PI / 2.0));
        assert!(close(rotated.start(), Point::new(0.0, 2.0)));
        assert!(close(rotated.end(), Point::new(-1.0, 1.0)));
    }

    #[test]
    fn test_transform_scales_line() {
        let line = RawSegment::Line(Line::new((0.0, 0.0), (25.4, 0.0)));
        let scaled = line.transformed(Affine::scale(1.0 / 25.4));
        assert!(close(scaled.end(), Point::new(1.0, 0.0)));
    }
}
