use crate::config::HoleBands;
use crate::error::Warning;
use crate::geometry::{ClosedPath, FeatureId};
use crate::reconstruct::{Reconstruction, Strategy};
use kurbo::Circle;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tracing::{debug, info};

/// Loops smaller than this are slivers left by reconstruction, not pockets.
const MIN_PATH_AREA: f64 = 1e-6;

/// Standard hardware a round hole is sized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HoleKind {
    Screw,
    Bearing,
    Custom,
}

impl fmt::Display for HoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoleKind::Screw => write!(f, "screw"),
            HoleKind::Bearing => write!(f, "bearing"),
            HoleKind::Custom => write!(f, "custom"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    Perimeter,
    Pocket,
    Hole(HoleKind),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureGeometry {
    Path {
        path: ClosedPath,
        strategy: Strategy,
    },
    Circle {
        center: (f64, f64),
        radius: f64,
    },
}

/// A machinable feature of the plate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub kind: FeatureKind,
    pub geometry: FeatureGeometry,
    /// The perimeter this feature sits inside, looked up by id.
    pub parent: Option<FeatureId>,
    /// Human-readable name used in warnings and G-code comments.
    pub label: String,
}

impl Feature {
    pub fn path(&self) -> Option<&ClosedPath> {
        match &self.geometry {
            FeatureGeometry::Path { path, .. } => Some(path),
            FeatureGeometry::Circle { .. } => None,
        }
    }

    pub fn circle(&self) -> Option<((f64, f64), f64)> {
        match self.geometry {
            FeatureGeometry::Circle { center, radius } => Some((center, radius)),
            FeatureGeometry::Path { .. } => None,
        }
    }
}

/// Classified features in machining order: perimeter, holes, pockets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub features: Vec<Feature>,
    pub warnings: Vec<Warning>,
}

impl FeatureSet {
    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(id.index())
    }

    pub fn perimeter(&self) -> Option<&Feature> {
        self.features
            .iter()
            .find(|f| f.kind == FeatureKind::Perimeter)
    }

    pub fn holes(&self) -> impl Iterator<Item = &Feature> {
        self.features
            .iter()
            .filter(|f| matches!(f.kind, FeatureKind::Hole(_)))
    }

    pub fn pockets(&self) -> impl Iterator<Item = &Feature> {
        self.features
            .iter()
            .filter(|f| f.kind == FeatureKind::Pocket)
    }

    pub fn hole_count(&self, kind: HoleKind) -> usize {
        self.holes()
            .filter(|f| f.kind == FeatureKind::Hole(kind))
            .count()
    }
}

/// Size a hole against the configured hardware bands.
pub fn classify_hole(diameter: f64, bands: &HoleBands) -> HoleKind {
    if (diameter - bands.screw_diameter).abs() <= bands.band + 1e-9 {
        HoleKind::Screw
    } else if (diameter - bands.bearing_diameter).abs() <= bands.band + 1e-9 {
        HoleKind::Bearing
    } else {
        HoleKind::Custom
    }
}

/// Assign every closed path and circle a role.
///
/// The path enclosing the largest area is the perimeter; everything else
/// must sit inside it.
pub fn classify(
    reconstruction: &Reconstruction,
    circles: &[Circle],
    bands: &HoleBands,
) -> FeatureSet {
    let mut set = FeatureSet::default();

    let mut paths: Vec<(&ClosedPath, Strategy)> = Vec::new();
    for candidate in &reconstruction.paths {
        if candidate.path.area() < MIN_PATH_AREA {
            debug!(area = candidate.path.area(), "Dropping degenerate closed path");
            continue;
        }
        paths.push((&candidate.path, candidate.strategy));
    }

    let perimeter_index = paths
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.0.area().total_cmp(&b.0.area()))
        .map(|(index, _)| index);

    let perimeter_id = perimeter_index.map(|index| {
        let (path, strategy) = paths[index];
        let id = FeatureId::new(set.features.len());
        set.features.push(Feature {
            id,
            kind: FeatureKind::Perimeter,
            geometry: FeatureGeometry::Path {
                path: path.clone(),
                strategy,
            },
            parent: None,
            label: "perimeter".to_string(),
        });
        id
    });
    let perimeter_path = perimeter_index.map(|index| paths[index].0);

    let mut holes: Vec<&Circle> = circles.iter().collect();
    holes.sort_by(|a, b| by_y_then_x((a.center.x, a.center.y), (b.center.x, b.center.y)));
    for circle in holes {
        let center = (circle.center.x, circle.center.y);
        let label = format!("hole at ({:.4}, {:.4})", center.0, center.1);
        if let Some(perimeter) = perimeter_path {
            if !perimeter.contains_point(center) {
                set.warnings.push(Warning::OutsidePerimeter { feature: label });
                continue;
            }
        }
        let kind = classify_hole(circle.radius * 2.0, bands);
        let id = FeatureId::new(set.features.len());
        set.features.push(Feature {
            id,
            kind: FeatureKind::Hole(kind),
            geometry: FeatureGeometry::Circle {
                center,
                radius: circle.radius,
            },
            parent: perimeter_id,
            label: format!("{kind} {label}"),
        });
    }

    let mut pockets: Vec<(&ClosedPath, Strategy)> = paths
        .iter()
        .enumerate()
        .filter(|(index, _)| Some(*index) != perimeter_index)
        .map(|(_, entry)| *entry)
        .collect();
    pockets.sort_by(|a, b| {
        let (ra, rb) = (a.0.bounding_box(), b.0.bounding_box());
        by_y_then_x((ra.min_x(), ra.min_y()), (rb.min_x(), rb.min_y()))
    });
    for (path, strategy) in pockets {
        let corner = path.bounding_box().origin();
        let label = format!("pocket at ({:.4}, {:.4})", corner.x, corner.y);
        let inside = match (perimeter_path, path.centroid()) {
            (Some(perimeter), Some(centroid)) => perimeter.contains_point(centroid),
            _ => false,
        };
        if !inside {
            set.warnings.push(Warning::OutsidePerimeter { feature: label });
            continue;
        }
        let id = FeatureId::new(set.features.len());
        set.features.push(Feature {
            id,
            kind: FeatureKind::Pocket,
            geometry: FeatureGeometry::Path {
                path: path.clone(),
                strategy,
            },
            parent: perimeter_id,
            label,
        });
    }

    info!(
        perimeter = perimeter_id.is_some(),
        holes = set.holes().count(),
        pockets = set.pockets().count(),
        skipped = set.warnings.len(),
        "Classified features"
    );
    set
}

fn by_y_then_x(a: (f64, f64), b: (f64, f64)) -> Ordering {
    a.1.total_cmp(&b.1).then(a.0.total_cmp(&b.0))
}
