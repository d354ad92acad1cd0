//! Tab placement along the compensated perimeter.
//!
//! Tabs only go on straight runs. Positions are arc-length offsets measured
//! from the perimeter toolpath's start point in its cutting direction.

use crate::config::{TabMode, TabSettings};
use crate::error::Warning;
use crate::geometry::ClosedPath;
use crate::types::Tab;
use tracing::{debug, warn};

/// Maximum direction change between segments of one straight run, in degrees.
const RUN_ANGLE_TOLERANCE_DEG: f64 = 0.5;

/// A maximal chain of nearly collinear edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StraightRun {
    /// Arc length at which the run starts.
    pub start: f64,
    pub length: f64,
}

impl StraightRun {
    pub fn end(&self) -> f64 {
        self.start + self.length
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabPlan {
    pub tabs: Vec<Tab>,
    pub warnings: Vec<Warning>,
}

/// Split a loop into straight runs, following its point order.
pub fn straight_runs(path: &ClosedPath) -> Vec<StraightRun> {
    let tolerance = RUN_ANGLE_TOLERANCE_DEG.to_radians();
    let mut runs: Vec<StraightRun> = Vec::new();
    let mut current: Option<(StraightRun, f64)> = None;
    let mut travelled = 0.0;

    for edge in path.points().windows(2) {
        let (dx, dy) = (edge[1].0 - edge[0].0, edge[1].1 - edge[0].1);
        let length = dx.hypot(dy);
        if length < 1e-12 {
            continue;
        }
        let direction = dy.atan2(dx);
        current = match current {
            Some((mut run, heading)) if angle_between(heading, direction) <= tolerance => {
                run.length += length;
                Some((run, heading))
            }
            previous => {
                if let Some((run, _)) = previous {
                    runs.push(run);
                }
                Some((
                    StraightRun {
                        start: travelled,
                        length,
                    },
                    direction,
                ))
            }
        };
        travelled += length;
    }
    if let Some((run, _)) = current {
        runs.push(run);
    }
    runs
}

fn angle_between(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(std::f64::consts::TAU);
    diff.min(std::f64::consts::TAU - diff)
}

/// Place tabs on the straight runs of `path` that leave one tool diameter of
/// clearance on either side of the tab.
pub fn place_tabs(path: &ClosedPath, settings: &TabSettings, tool_diameter: f64) -> TabPlan {
    let mut plan = TabPlan::default();
    if !settings.enabled() {
        return plan;
    }

    let perimeter = path.length();
    let width = settings.width;
    // Tabs closer than their own width would overlap anyway.
    let nominal = match settings.mode {
        TabMode::Count(_) => Vec::new(),
        TabMode::Spacing(spacing) => nominal_spacing_positions(perimeter, spacing.max(width)),
    };
    let requested = match settings.mode {
        TabMode::Count(count) => count,
        TabMode::Spacing(_) => nominal.len(),
    };

    let usable: Vec<(f64, f64)> = straight_runs(path)
        .into_iter()
        .filter(|run| run.length >= width + 2.0 * tool_diameter - 1e-9)
        .map(|run| {
            let margin = tool_diameter + width / 2.0;
            let lo = run.start + margin;
            (lo, (run.end() - margin).max(lo))
        })
        .collect();
    debug!(runs = usable.len(), perimeter, "Found straight runs for tabs");

    if usable.is_empty() {
        warn!(requested, "No straight run is long enough for a tab");
        plan.warnings.push(Warning::NoTabRuns { requested });
        return plan;
    }

    let centres = match settings.mode {
        TabMode::Count(count) => count_positions(&usable, count),
        TabMode::Spacing(_) => nominal
            .into_iter()
            .map(|nominal| nearest_usable(&usable, nominal))
            .collect(),
    };

    for centre in centres {
        let tab = Tab {
            offset: centre,
            width,
            height: settings.height,
        };
        let overlaps = plan
            .tabs
            .iter()
            .any(|placed| tab.start() < placed.end() && placed.start() < tab.end());
        if !overlaps {
            plan.tabs.push(tab);
        }
    }
    plan.tabs.sort_by(|a, b| a.offset.total_cmp(&b.offset));

    if plan.tabs.len() < requested {
        warn!(requested, placed = plan.tabs.len(), "Dropped overlapping tabs");
        plan.warnings.push(Warning::TabsDropped {
            requested,
            placed: plan.tabs.len(),
        });
    }
    plan
}

/// Centres at (k + 1/2) * L / n over the combined usable length L.
fn count_positions(usable: &[(f64, f64)], count: usize) -> Vec<f64> {
    let total: f64 = usable.iter().map(|(lo, hi)| hi - lo).sum();
    (0..count)
        .map(|k| {
            let mut remaining = (k as f64 + 0.5) * total / count as f64;
            for &(lo, hi) in usable {
                let span = hi - lo;
                if remaining <= span {
                    return lo + remaining;
                }
                remaining -= span;
            }
            usable.last().map_or(0.0, |&(_, hi)| hi)
        })
        .collect()
}

fn nominal_spacing_positions(perimeter: f64, spacing: f64) -> Vec<f64> {
    if !(spacing > 0.0 && perimeter.is_finite()) {
        return Vec::new();
    }
    let count = (perimeter / spacing - 0.5).ceil().max(0.0) as usize;
    (0..count)
        .map(|k| (k as f64 + 0.5) * spacing)
        .filter(|&position| position < perimeter)
        .collect()
}

/// Clamp a nominal position into the closest usable interval. Ties go to the
/// earlier interval.
fn nearest_usable(usable: &[(f64, f64)], nominal: f64) -> f64 {
    let mut best = (f64::INFINITY, nominal);
    for &(lo, hi) in usable {
        let clamped = nominal.clamp(lo, hi);
        let gap = (clamped - nominal).abs();
        if gap < best.0 - 1e-12 {
            best = (gap, clamped);
        }
    }
    best.1
}
