//! Rebuilding closed boundaries from loose drawing fragments.
//!
//! CAD exports often split a single outline into LINE, ARC and SPLINE pieces
//! in arbitrary order and direction. Graph stitching joins pieces whose
//! endpoints coincide; when it cannot close the outer boundary, an approximate
//! merge and finally a convex hull are tried, each recorded with a warning.

use crate::config::ReconstructionSettings;
use crate::error::{PlateCutError, PlateCutResult, Warning};
use crate::geometry::polygon::{convex_hull, distance, ClosedPath};
use crate::geometry::{Drawing, SegmentId};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Which strategy produced a closed path, in decreasing order of confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Strategy {
    GraphStitch,
    LineMerge,
    ConvexHull,
}

impl Strategy {
    pub fn label(self) -> &'static str {
        match self {
            Strategy::GraphStitch => "graph stitch",
            Strategy::LineMerge => "approximate merge",
            Strategy::ConvexHull => "convex hull",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructedPath {
    pub path: ClosedPath,
    pub strategy: Strategy,
    /// Source segments, each used by exactly one path.
    pub segments: Vec<SegmentId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reconstruction {
    pub paths: Vec<ReconstructedPath>,
    /// Segments that ended up in no closed path.
    pub open_segments: Vec<SegmentId>,
    pub warnings: Vec<Warning>,
}

impl Reconstruction {
    /// Strategies that contributed at least one path, best first.
    pub fn strategies_used(&self) -> Vec<Strategy> {
        self.paths
            .iter()
            .map(|p| p.strategy)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// True when any path came from the convex-hull fallback.
    pub fn is_approximate(&self) -> bool {
        self.paths
            .iter()
            .any(|p| p.strategy == Strategy::ConvexHull)
    }
}

/// A segment flattened to points, start to end.
#[derive(Debug, Clone)]
struct SampledSegment {
    id: SegmentId,
    points: Vec<Point>,
}

impl SampledSegment {
    fn start(&self) -> Point {
        self.points[0]
    }

    fn end(&self) -> Point {
        self.points[self.points.len() - 1]
    }
}

/// Endpoint adjacency over coordinates rounded to the join tolerance.
#[derive(Debug, Clone)]
pub struct ConnectivityGraph {
    tolerance: f64,
    nodes: BTreeMap<(i64, i64), Vec<SegmentId>>,
}

impl ConnectivityGraph {
    fn build(segments: &[SampledSegment], tolerance: f64) -> Self {
        let mut graph = Self {
            tolerance,
            nodes: BTreeMap::new(),
        };
        for segment in segments {
            let start = graph.key(segment.start());
            let end = graph.key(segment.end());
            graph.nodes.entry(start).or_default().push(segment.id);
            if end != start {
                graph.nodes.entry(end).or_default().push(segment.id);
            }
        }
        graph
    }

    /// Grid cell of a point.
    pub fn key(&self, point: Point) -> (i64, i64) {
        (
            (point.x / self.tolerance).round() as i64,
            (point.y / self.tolerance).round() as i64,
        )
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Segments touching the cell of `point` or a neighbouring cell, ascending.
    ///
    /// Neighbours are included so two points within tolerance that round to
    /// adjacent cells still meet.
    fn candidates(&self, point: Point) -> Vec<SegmentId> {
        let (kx, ky) = self.key(point);
        let mut found = BTreeSet::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(ids) = self.nodes.get(&(kx + dx, ky + dy)) {
                    found.extend(ids.iter().copied());
                }
            }
        }
        found.into_iter().collect()
    }
}

/// Rebuild closed paths from the drawing's segments.
///
/// Circles are not involved; they never form part of a boundary.
pub fn reconstruct(
    drawing: &Drawing,
    settings: &ReconstructionSettings,
) -> PlateCutResult<Reconstruction> {
    let sampled: Vec<SampledSegment> = drawing
        .segment_ids()
        .zip(&drawing.segments)
        .map(|(id, segment)| SampledSegment {
            id,
            points: segment.sample(settings.arc_segments, settings.spline_segments),
        })
        .filter(|s| s.points.len() >= 2)
        .collect();

    let mut result = Reconstruction::default();
    if sampled.is_empty() {
        return Ok(result);
    }

    let stitched = stitch(&sampled, settings);
    info!(
        closed = stitched.paths.len(),
        open = stitched.leftover.len(),
        "Graph stitching finished"
    );
    result.paths.extend(stitched.paths);
    let mut open = stitched.leftover;

    if open.is_empty() {
        return Ok(result);
    }

    let open_sampled: Vec<SampledSegment> = sampled
        .iter()
        .filter(|s| open.contains(&s.id))
        .cloned()
        .collect();

    if !boundary_needed(&result.paths, &open_sampled, settings) {
        recover_pockets(&open_sampled, settings, &mut result);
        return Ok(result);
    }

    let recovered = match run_fallbacks(&open_sampled, settings, "perimeter") {
        Some(outcome) => {
            result.warnings.extend(outcome.warnings);
            result.paths.extend(outcome.paths);
            open = outcome.leftover;
            true
        }
        None => false,
    };

    if !recovered {
        let reason = if result.paths.is_empty() {
            "no closed path after stitching, merging or hulling".to_string()
        } else {
            "outer boundary is open and its points do not span an area".to_string()
        };
        return Err(PlateCutError::GeometryReconstruction {
            boundary: "perimeter".to_string(),
            reason,
        });
    }

    if !open.is_empty() {
        result.warnings.push(Warning::OpenChains {
            segments: open.len(),
        });
    }
    result.open_segments = open;
    Ok(result)
}

struct StrategyOutcome {
    paths: Vec<ReconstructedPath>,
    leftover: Vec<SegmentId>,
    warnings: Vec<Warning>,
}

type StrategyFn = fn(&[SampledSegment], &ReconstructionSettings) -> Option<StrategyOutcome>;

const FALLBACKS: [(Strategy, StrategyFn); 2] = [
    (Strategy::LineMerge, line_merge),
    (Strategy::ConvexHull, hull),
];

/// First fallback that closes at least one path, with hull warnings naming `boundary`.
fn run_fallbacks(
    segments: &[SampledSegment],
    settings: &ReconstructionSettings,
    boundary: &str,
) -> Option<StrategyOutcome> {
    for (strategy, attempt) in FALLBACKS {
        debug!(strategy = strategy.label(), segments = segments.len(), "Trying fallback");
        let Some(mut outcome) = attempt(segments, settings) else {
            continue;
        };
        if outcome.paths.is_empty() {
            continue;
        }
        warn!(
            strategy = strategy.label(),
            boundary,
            paths = outcome.paths.len(),
            "Fallback recovered boundary"
        );
        for warning in &mut outcome.warnings {
            if let Warning::Approximation { boundary: name, .. } = warning {
                *name = boundary.to_string();
            }
        }
        return Some(outcome);
    }
    None
}

/// Open chains inside a closed perimeter are pocket candidates. Each cluster
/// of chains gets the fallback list on its own; a cluster nothing can close
/// is skipped as a pocket.
fn recover_pockets(
    open: &[SampledSegment],
    settings: &ReconstructionSettings,
    result: &mut Reconstruction,
) {
    let mut leftover = Vec::new();
    for cluster in clusters(open, settings.merge_gap) {
        match run_fallbacks(&cluster, settings, "pocket") {
            Some(outcome) => {
                result.warnings.extend(outcome.warnings);
                result.paths.extend(outcome.paths);
                leftover.extend(outcome.leftover);
            }
            None => {
                let corner = cluster
                    .iter()
                    .flat_map(|s| s.points.iter())
                    .fold(Point::new(f64::MAX, f64::MAX), |acc, p| {
                        Point::new(acc.x.min(p.x), acc.y.min(p.y))
                    });
                let feature = format!("pocket at ({:.4}, {:.4})", corner.x, corner.y);
                warn!(%feature, segments = cluster.len(), "No closed path for pocket candidate");
                result.warnings.push(Warning::FeatureSkipped {
                    feature,
                    reason: "no closed path after stitching, merging or hulling".to_string(),
                });
                leftover.extend(cluster.iter().map(|s| s.id));
            }
        }
    }
    leftover.sort();
    if !leftover.is_empty() {
        result.warnings.push(Warning::OpenChains {
            segments: leftover.len(),
        });
    }
    result.open_segments = leftover;
}

/// Group segments whose endpoints come within `gap` of each other, in
/// ascending order of their lowest segment id.
fn clusters(segments: &[SampledSegment], gap: f64) -> Vec<Vec<SampledSegment>> {
    let mut parent: Vec<usize> = (0..segments.len()).collect();
    fn root(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }
    for i in 0..segments.len() {
        for j in (i + 1)..segments.len() {
            let (a, b) = (&segments[i], &segments[j]);
            let touching = [a.start(), a.end()]
                .iter()
                .any(|p| distance_pt(*p, b.start()) <= gap || distance_pt(*p, b.end()) <= gap);
            if touching {
                let (ri, rj) = (root(&mut parent, i), root(&mut parent, j));
                parent[ri.max(rj)] = ri.min(rj);
            }
        }
    }
    let mut groups: BTreeMap<usize, Vec<SampledSegment>> = BTreeMap::new();
    for (i, segment) in segments.iter().enumerate() {
        let r = root(&mut parent, i);
        groups.entry(r).or_default().push(segment.clone());
    }
    groups.into_values().collect()
}

/// Open chains matter when nothing closed at all, or when they reach outside
/// the largest closed path, meaning the outer boundary itself is broken.
fn boundary_needed(
    closed: &[ReconstructedPath],
    open: &[SampledSegment],
    settings: &ReconstructionSettings,
) -> bool {
    let Some(largest) = closed
        .iter()
        .max_by(|a, b| a.path.area().total_cmp(&b.path.area()))
    else {
        return true;
    };
    let limit = largest.path.bounding_box().inflate(
        settings.closure_tolerance,
        settings.closure_tolerance,
    );
    open.iter()
        .flat_map(|s| s.points.iter())
        .any(|p| !rect_contains(limit, *p))
}

fn rect_contains(rect: Rect, p: Point) -> bool {
    p.x >= rect.x0 && p.x <= rect.x1 && p.y >= rect.y0 && p.y <= rect.y1
}

/// Strategy 1: walk the connectivity graph from the lowest unvisited segment.
fn stitch(segments: &[SampledSegment], settings: &ReconstructionSettings) -> StrategyOutcome {
    let graph = ConnectivityGraph::build(segments, settings.join_tolerance);
    debug!(nodes = graph.node_count(), "Built connectivity graph");

    let by_id: BTreeMap<SegmentId, &SampledSegment> =
        segments.iter().map(|s| (s.id, s)).collect();
    let mut visited: BTreeSet<SegmentId> = BTreeSet::new();
    let mut outcome = StrategyOutcome {
        paths: Vec::new(),
        leftover: Vec::new(),
        warnings: Vec::new(),
    };

    for segment in segments {
        if !visited.insert(segment.id) {
            continue;
        }
        let mut chain: Vec<Point> = segment.points.clone();
        let mut members = vec![segment.id];

        let mut closed = false;
        for forward in [true, false] {
            if !closed {
                closed = walk(
                    &graph,
                    &by_id,
                    &mut visited,
                    &mut chain,
                    &mut members,
                    settings,
                    forward,
                );
            }
        }
        if !closed {
            closed = distance_closed(&chain, settings.closure_tolerance);
        }

        match closed.then(|| close_chain(chain, settings.closure_tolerance)).flatten() {
            Some(path) => outcome.paths.push(ReconstructedPath {
                path,
                strategy: Strategy::GraphStitch,
                segments: members,
            }),
            None => {
                debug!(segments = members.len(), "Discarding open chain");
                outcome.leftover.extend(members);
            }
        }
    }
    outcome.leftover.sort();
    outcome
}

/// Extend one end of the chain until it closes or dead-ends. Returns true on closure.
fn walk(
    graph: &ConnectivityGraph,
    by_id: &BTreeMap<SegmentId, &SampledSegment>,
    visited: &mut BTreeSet<SegmentId>,
    chain: &mut Vec<Point>,
    members: &mut Vec<SegmentId>,
    settings: &ReconstructionSettings,
    forward: bool,
) -> bool {
    let tolerance = settings.join_tolerance;
    loop {
        let (head, anchor) = if forward {
            (chain[chain.len() - 1], chain[0])
        } else {
            (chain[0], chain[chain.len() - 1])
        };
        if chain.len() > 2 && joins(graph, head, anchor, tolerance) {
            return true;
        }

        let next = graph.candidates(head).into_iter().find_map(|id| {
            if visited.contains(&id) {
                return None;
            }
            let candidate = by_id.get(&id)?;
            let to_start = distance_pt(candidate.start(), head);
            let to_end = distance_pt(candidate.end(), head);
            if to_start.min(to_end) > tolerance {
                return None;
            }
            Some((id, to_start <= to_end))
        });

        let Some((id, starts_at_head)) = next else {
            return false;
        };
        visited.insert(id);
        members.push(id);

        let Some(candidate) = by_id.get(&id) else {
            return false;
        };
        let mut points = candidate.points.clone();
        if forward {
            if !starts_at_head {
                points.reverse();
            }
            chain.extend(points.into_iter().skip(1));
        } else {
            if starts_at_head {
                points.reverse();
            }
            points.pop();
            points.extend(chain.drain(..));
            *chain = points;
        }
    }
}

fn joins(graph: &ConnectivityGraph, a: Point, b: Point, tolerance: f64) -> bool {
    graph.key(a) == graph.key(b) || distance_pt(a, b) <= tolerance
}

fn distance_closed(chain: &[Point], closure_tolerance: f64) -> bool {
    chain.len() > 2 && distance_pt(chain[0], chain[chain.len() - 1]) <= closure_tolerance
}

/// Drop the near-duplicate closing point and build the loop.
fn close_chain(mut chain: Vec<Point>, closure_tolerance: f64) -> Option<ClosedPath> {
    if chain.len() > 1 && distance_pt(chain[0], chain[chain.len() - 1]) <= closure_tolerance {
        chain.pop();
    }
    ClosedPath::new(chain.into_iter().map(|p| (p.x, p.y)).collect())
}

fn distance_pt(a: Point, b: Point) -> f64 {
    distance((a.x, a.y), (b.x, b.y))
}

/// Strategy 2: greedily chain pieces whose ends lie within `merge_gap`,
/// bridging each gap with a straight line.
fn line_merge(
    segments: &[SampledSegment],
    settings: &ReconstructionSettings,
) -> Option<StrategyOutcome> {
    let gap = settings.merge_gap;
    let mut used = vec![false; segments.len()];
    let mut outcome = StrategyOutcome {
        paths: Vec::new(),
        leftover: Vec::new(),
        warnings: Vec::new(),
    };
    let mut merged_segments = 0;

    for first in 0..segments.len() {
        if used[first] {
            continue;
        }
        used[first] = true;
        let mut chain = segments[first].points.clone();
        let mut members = vec![first];

        let closed = loop {
            let tail = chain[chain.len() - 1];
            let closing = distance_pt(tail, chain[0]);

            let best = (0..segments.len())
                .filter(|&j| !used[j])
                .flat_map(|j| {
                    [
                        (distance_pt(segments[j].start(), tail), j, false),
                        (distance_pt(segments[j].end(), tail), j, true),
                    ]
                })
                .filter(|(d, _, _)| *d <= gap)
                .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            let can_close = closing <= gap && chain.len() > 2;
            match best {
                Some((d, j, reversed)) if !can_close || d < closing => {
                    used[j] = true;
                    members.push(j);
                    let mut points = segments[j].points.clone();
                    if reversed {
                        points.reverse();
                    }
                    let skip = usize::from(d <= settings.join_tolerance);
                    chain.extend(points.into_iter().skip(skip));
                }
                _ => break can_close,
            }
        };

        let ring = if closed {
            close_chain(chain, settings.join_tolerance)
        } else {
            None
        };
        match ring {
            Some(path) => {
                merged_segments += members.len();
                outcome.paths.push(ReconstructedPath {
                    path,
                    strategy: Strategy::LineMerge,
                    segments: members.iter().map(|&i| segments[i].id).collect(),
                });
            }
            None => outcome
                .leftover
                .extend(members.iter().map(|&i| segments[i].id)),
        }
    }

    if outcome.paths.is_empty() {
        return None;
    }
    outcome.leftover.sort();
    outcome.warnings.push(Warning::ApproximateMerge {
        rings: outcome.paths.len(),
        segments: merged_segments,
    });
    Some(outcome)
}

/// Strategy 3: the convex hull of every point of the open segments.
fn hull(
    segments: &[SampledSegment],
    _settings: &ReconstructionSettings,
) -> Option<StrategyOutcome> {
    let points: Vec<(f64, f64)> = segments
        .iter()
        .flat_map(|s| s.points.iter().map(|p| (p.x, p.y)))
        .collect();
    let path = convex_hull(&points)?;
    let warning = Warning::Approximation {
        boundary: "perimeter".to_string(),
        points: path.vertices().len(),
    };
    Some(StrategyOutcome {
        paths: vec![ReconstructedPath {
            path,
            strategy: Strategy::ConvexHull,
            segments: segments.iter().map(|s| s.id).collect(),
        }],
        leftover: Vec::new(),
        warnings: vec![warning],
    })
}
