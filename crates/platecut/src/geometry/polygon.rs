use geo::{Area, Centroid, Contains, ConvexHull, Coord, LineString, MultiPoint, Polygon};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// A closed loop of (x, y) points. The last point repeats the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedPath {
    points: Vec<(f64, f64)>,
}

impl ClosedPath {
    /// Build a loop from ordered points, closing it exactly if the ends differ.
    ///
    /// Consecutive duplicates are removed. Returns `None` for fewer than three
    /// distinct points.
    pub fn new(points: Vec<(f64, f64)>) -> Option<Self> {
        let mut cleaned: Vec<(f64, f64)> = Vec::with_capacity(points.len() + 1);
        for point in points {
            if cleaned
                .last()
                .map_or(true, |last| distance(*last, point) > 1e-12)
            {
                cleaned.push(point);
            }
        }
        while cleaned.len() > 1 && distance(cleaned[0], cleaned[cleaned.len() - 1]) <= 1e-12 {
            cleaned.pop();
        }
        if cleaned.len() < 3 {
            return None;
        }
        let first = cleaned[0];
        cleaned.push(first);
        Some(Self { points: cleaned })
    }

    /// Points including the repeated closing point.
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Points without the repeated closing point.
    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.points[..self.points.len() - 1]
    }

    pub fn to_geo(&self) -> Polygon<f64> {
        Polygon::new(LineString::from(self.points.clone()), vec![])
    }

    /// Positive for counter-clockwise loops.
    pub fn signed_area(&self) -> f64 {
        self.to_geo().signed_area()
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    pub fn is_ccw(&self) -> bool {
        self.signed_area() > 0.0
    }

    pub fn centroid(&self) -> Option<(f64, f64)> {
        self.to_geo().centroid().map(|p| (p.x(), p.y()))
    }

    /// Strict interior test; points on the boundary are outside.
    pub fn contains_point(&self, point: (f64, f64)) -> bool {
        self.to_geo().contains(&geo::Point::new(point.0, point.1))
    }

    /// True when the straight segment between the points stays inside the loop.
    pub fn contains_segment(&self, from: (f64, f64), to: (f64, f64)) -> bool {
        let line = geo::Line::new(Coord { x: from.0, y: from.1 }, Coord { x: to.0, y: to.1 });
        self.to_geo().contains(&line)
    }

    pub fn bounding_box(&self) -> Rect {
        let (x0, y0) = self.points[0];
        self.points
            .iter()
            .fold(Rect::new(x0, y0, x0, y0), |rect, &(x, y)| {
                rect.union_pt(Point::new(x, y))
            })
    }

    /// Perimeter length.
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| distance(w[0], w[1]))
            .sum()
    }

    pub fn reversed(&self) -> Self {
        let mut points = self.points.clone();
        points.reverse();
        Self { points }
    }

    /// Same loop wound counter-clockwise.
    pub fn to_ccw(&self) -> Self {
        if self.is_ccw() {
            self.clone()
        } else {
            self.reversed()
        }
    }

    /// Same loop wound clockwise.
    pub fn to_cw(&self) -> Self {
        if self.is_ccw() {
            self.reversed()
        } else {
            self.clone()
        }
    }

    /// Same loop, starting at vertex `index`.
    pub fn rotated_to(&self, index: usize) -> Self {
        let vertices = self.vertices();
        let index = index % vertices.len();
        let mut points: Vec<(f64, f64)> = vertices[index..]
            .iter()
            .chain(vertices[..index].iter())
            .copied()
            .collect();
        points.push(points[0]);
        Self { points }
    }
}

/// Convex hull of a point cloud, counter-clockwise.
///
/// `None` when the points are fewer than three or all collinear.
pub fn convex_hull(points: &[(f64, f64)]) -> Option<ClosedPath> {
    let cloud: MultiPoint<f64> = points
        .iter()
        .map(|&(x, y)| geo::Point::new(x, y))
        .collect::<Vec<_>>()
        .into();
    let hull = cloud.convex_hull();
    if hull.unsigned_area() < 1e-9 {
        return None;
    }
    let ring: Vec<(f64, f64)> = hull.exterior().coords().map(|c| (c.x, c.y)).collect();
    ClosedPath::new(ring).map(|path| path.to_ccw())
}

pub fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}
