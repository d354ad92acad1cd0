use crate::config::Units;
use crate::error::{PlateCutError, PlateCutResult};
use dxf::entities::EntityType;
use kurbo::{Affine, Circle, Line, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Cursor;
use std::path::Path as StdPath;
use tracing::{debug, info};

pub mod curve;
pub mod ids;
pub mod offset;
pub mod polygon;

// Re-export public types
pub use curve::{ArcSegment, RawSegment, SplineSegment};
pub use ids::{FeatureId, SegmentId};
pub use offset::{inward_offset, outward_offset, OffsetFailure};
pub use polygon::{convex_hull, ClosedPath};

/// Geometry loaded from one drawing: a segment arena plus the circles.
///
/// Circles are kept apart from segments because they are holes, never
/// pieces of a boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    pub segments: Vec<RawSegment>,
    pub circles: Vec<Circle>,
    /// Entities of kinds that are not machined.
    pub unsupported: usize,
}

impl Drawing {
    /// Create a new empty drawing.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(segments: Vec<RawSegment>, circles: Vec<Circle>) -> Self {
        Self {
            segments,
            circles,
            unsupported: 0,
        }
    }

    /// Parse DXF bytes. Malformed files are input validation failures.
    pub fn from_bytes(bytes: &[u8]) -> PlateCutResult<Self> {
        let drawing = dxf::Drawing::load(&mut Cursor::new(bytes))
            .map_err(|err| PlateCutError::invalid(format!("malformed DXF: {err}")))?;
        Ok(Self::from_dxf(&drawing))
    }

    pub fn from_path<P: AsRef<StdPath>>(path: P) -> PlateCutResult<Self> {
        let bytes = fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    /// Convert the ENTITIES section. Blocks are not exploded.
    pub fn from_dxf(source: &dxf::Drawing) -> Self {
        let mut drawing = Self::new();
        for entity in source.entities() {
            drawing.add_entity(&entity.specific);
        }
        info!(
            segments = drawing.segments.len(),
            circles = drawing.circles.len(),
            unsupported = drawing.unsupported,
            "Loaded DXF drawing"
        );
        drawing
    }

    fn add_entity(&mut self, entity: &EntityType) {
        match entity {
            EntityType::Line(line) => {
                self.push_line(
                    Point::new(line.p1.x, line.p1.y),
                    Point::new(line.p2.x, line.p2.y),
                );
            }
            EntityType::Arc(arc) => {
                if arc.radius > 0.0 {
                    self.segments.push(RawSegment::Arc(ArcSegment::from_degrees(
                        Point::new(arc.center.x, arc.center.y),
                        arc.radius,
                        arc.start_angle,
                        arc.end_angle,
                    )));
                } else {
                    debug!(radius = arc.radius, "Dropping degenerate arc");
                }
            }
            EntityType::Circle(circle) => {
                if circle.radius > 0.0 {
                    self.circles.push(Circle::new(
                        Point::new(circle.center.x, circle.center.y),
                        circle.radius,
                    ));
                } else {
                    debug!(radius = circle.radius, "Dropping degenerate circle");
                }
            }
            EntityType::Spline(spline) => {
                let segment = SplineSegment::new(
                    spline.degree_of_curve.max(0) as usize,
                    spline.knot_values.clone(),
                    spline
                        .control_points
                        .iter()
                        .map(|p| Point::new(p.x, p.y))
                        .collect(),
                    spline.weight_values.clone(),
                    spline
                        .fit_points
                        .iter()
                        .map(|p| Point::new(p.x, p.y))
                        .collect(),
                );
                if segment.is_usable() {
                    self.segments.push(RawSegment::Spline(segment));
                } else {
                    debug!("Dropping spline without usable control points or fit points");
                }
            }
            EntityType::LwPolyline(polyline) => {
                let vertices: Vec<(Point, f64)> = polyline
                    .vertices
                    .iter()
                    .map(|v| (Point::new(v.x, v.y), v.bulge))
                    .collect();
                self.push_polyline(&vertices, polyline.is_closed());
            }
            EntityType::Polyline(polyline) => {
                let vertices: Vec<(Point, f64)> = polyline
                    .vertices()
                    .map(|v| (Point::new(v.location.x, v.location.y), v.bulge))
                    .collect();
                self.push_polyline(&vertices, polyline.is_closed());
            }
            _ => {
                debug!("Ignoring unsupported DXF entity");
                self.unsupported += 1;
            }
        }
    }

    fn push_line(&mut self, p0: Point, p1: Point) {
        if (p1 - p0).hypot() > 1e-12 {
            self.segments.push(RawSegment::Line(Line::new(p0, p1)));
        } else {
            debug!(x = p0.x, y = p0.y, "Dropping zero-length line");
        }
    }

    /// One segment per vertex pair; a bulged pair becomes an arc.
    fn push_polyline(&mut self, vertices: &[(Point, f64)], closed: bool) {
        let count = vertices.len();
        if count < 2 {
            return;
        }
        let pairs = if closed { count } else { count - 1 };
        for i in 0..pairs {
            let (p0, bulge) = vertices[i];
            let (p1, _) = vertices[(i + 1) % count];
            match ArcSegment::from_bulge(p0, p1, bulge) {
                Some(arc) if bulge.abs() > 1e-12 => self.segments.push(RawSegment::Arc(arc)),
                _ => self.push_line(p0, p1),
            }
        }
    }

    pub fn segment_ids(&self) -> impl Iterator<Item = SegmentId> + '_ {
        (0..self.segments.len()).map(SegmentId::new)
    }

    /// True when there is nothing to machine.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.circles.is_empty()
    }

    /// Bounds of all segments and circles.
    pub fn bounding_box(&self) -> Option<Rect> {
        let segment_boxes = self.segments.iter().map(RawSegment::bounding_box);
        let circle_boxes = self.circles.iter().map(|c| {
            Rect::new(
                c.center.x - c.radius,
                c.center.y - c.radius,
                c.center.x + c.radius,
                c.center.y + c.radius,
            )
        });
        segment_boxes.chain(circle_boxes).reduce(|a, b| a.union(b))
    }

    pub fn transformed(&self, affine: Affine) -> Self {
        let scale = affine.determinant().abs().sqrt();
        Self {
            segments: self
                .segments
                .iter()
                .map(|segment| segment.transformed(affine))
                .collect(),
            circles: self
                .circles
                .iter()
                .map(|c| Circle::new(affine * c.center, c.radius * scale))
                .collect(),
            unsupported: self.unsupported,
        }
    }

    /// Convert to inches, rotate about the origin, then move the lower-left
    /// corner of the whole drawing to (0, 0).
    pub fn normalized(&self, units: Units, rotation_degrees: f64) -> PlateCutResult<Self> {
        if self.is_empty() {
            return Err(PlateCutError::invalid("drawing has no machinable geometry"));
        }
        let affine =
            Affine::rotate(rotation_degrees.to_radians()) * Affine::scale(units.to_inches());
        let placed = self.transformed(affine);
        let bounds = placed
            .bounding_box()
            .ok_or_else(|| PlateCutError::invalid("drawing has no machinable geometry"))?;
        let shift = Affine::translate(Vec2::new(-bounds.min_x(), -bounds.min_y()));
        debug!(
            min_x = bounds.min_x(),
            min_y = bounds.min_y(),
            width = bounds.width(),
            height = bounds.height(),
            "Normalized drawing to lower-left origin"
        );
        Ok(placed.transformed(shift))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxf::entities::{Entity, LwPolyline};
    use dxf::enums::AcadVersion;
    use dxf::LwPolylineVertex;

    fn save(drawing: &dxf::Drawing) -> Vec<u8> {
        let mut buffer = Vec::new();
        drawing.save(&mut buffer).expect("save dxf");
        buffer
    }

    fn new_dxf() -> dxf::Drawing {
        let mut drawing = dxf::Drawing::new();
        drawing.header.version = AcadVersion::R2000;
        drawing
    }

    #[test]
    fn test_load_lines_and_circles() {
        let mut source = new_dxf();
        source.add_entity(Entity::new(EntityType::Line(dxf::entities::Line::new(
            dxf::Point::new(0.0, 0.0, 0.0),
            dxf::Point::new(2.0, 0.0, 0.0),
        ))));
        source.add_entity(Entity::new(EntityType::Circle(dxf::entities::Circle::new(
            dxf::Point::new(1.0, 1.0, 0.0),
            0.095,
        ))));
        source.add_entity(Entity::new(EntityType::Line(dxf::entities::Line::new(
            dxf::Point::new(3.0, 3.0, 0.0),
            dxf::Point::new(3.0, 3.0, 0.0),
        ))));

        let drawing = Drawing::from_bytes(&save(&source)).expect("load");
        assert_eq!(drawing.segments.len(), 1);
        assert_eq!(drawing.circles.len(), 1);
        assert!((drawing.circles[0].radius - 0.095).abs() < 1e-12);
    }

    #[test]
    fn test_closed_lwpolyline_with_bulge_explodes() {
        let mut polyline = LwPolyline::default();
        for (x, y, bulge) in [(0.0, 0.0, 0.0), (2.0, 0.0, 1.0), (2.0, 2.0, 0.0), (0.0, 2.0, 0.0)] {
            polyline.vertices.push(LwPolylineVertex {
                x,
                y,
                bulge,
                ..Default::default()
            });
        }
        polyline.set_is_closed(true);
        let mut source = new_dxf();
        source.add_entity(Entity::new(EntityType::LwPolyline(polyline)));

        let drawing = Drawing::from_bytes(&save(&source)).expect("load");
        assert_eq!(drawing.segments.len(), 4);
        assert_eq!(drawing.segments[1].kind_name(), "arc");
        // The closing pair ends where the polyline began.
        assert!((drawing.segments[3].end() - Point::ZERO).hypot() < 1e-12);
    }

    #[test]
    fn test_malformed_dxf_is_input_error() {
        let err = Drawing::from_bytes(b"this is not\na dxf file\n").unwrap_err();
        assert!(matches!(err, PlateCutError::InputValidation(_)));
    }

    #[test]
    fn test_normalize_scales_and_moves_to_origin() {
        let drawing = Drawing::from_parts(
            vec![RawSegment::Line(Line::new((10.0, 20.0), (35.4, 20.0)))],
            vec![Circle::new((22.7, 45.4), 12.7)],
        );
        let normalized = drawing.normalized(Units::Millimeter, 0.0).expect("normalize");
        let bounds = normalized.bounding_box().expect("bounds");
        assert!(bounds.min_x().abs() < 1e-12);
        assert!(bounds.min_y().abs() < 1e-12);
        assert!((normalized.circles[0].radius - 0.5).abs() < 1e-12);
        assert!((bounds.width() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_rotation_keeps_lower_left_origin() {
        let drawing = Drawing::from_parts(
            vec![
                RawSegment::Line(Line::new((0.0, 0.0), (4.0, 0.0))),
                RawSegment::Line(Line::new((4.0, 0.0), (4.0, 1.0))),
            ],
            vec![],
        );
        let rotated = drawing.normalized(Units::Inch, 90.0).expect("normalize");
        let bounds = rotated.bounding_box().expect("bounds");
        assert!(bounds.min_x().abs() < 1e-9 && bounds.min_y().abs() < 1e-9);
        assert!((bounds.width() - 1.0).abs() < 1e-9);
        assert!((bounds.height() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_drawing_rejected() {
        let err = Drawing::new().normalized(Units::Inch, 0.0).unwrap_err();
        assert!(err.to_string().contains("no machinable geometry"));
    }
}
