use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// How the machine travels to a move's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveKind {
    Rapid,
    Linear,
    /// Clockwise arc (G2).
    ArcCw,
    /// Counter-clockwise arc (G3).
    ArcCcw,
}

impl MoveKind {
    pub fn is_arc(self) -> bool {
        matches!(self, MoveKind::ArcCw | MoveKind::ArcCcw)
    }
}

/// A single machine motion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Move {
    pub kind: MoveKind,
    /// Absolute (X, Y, Z) target.
    pub target: (f64, f64, f64),
    /// Feed rate for cutting moves; rapids carry none.
    pub feed: Option<f64>,
    /// Arc centre relative to the move's start point (I, J).
    pub center_offset: Option<(f64, f64)>,
}

/// Represents a complete, continuous 3D tool movement path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Toolpath {
    pub moves: Vec<Move>,
}

impl Toolpath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// XY extent of every cutting move, arcs included.
    ///
    /// Rapids are skipped so the result describes material actually removed.
    pub fn cut_bounds(&self) -> Option<Rect> {
        let mut bounds: Option<Rect> = None;
        let mut include = |x: f64, y: f64| {
            bounds = Some(match bounds {
                Some(rect) => rect.union_pt(Point::new(x, y)),
                None => Rect::from_points((x, y), (x, y)),
            });
        };

        let mut position: Option<(f64, f64, f64)> = None;
        for mv in &self.moves {
            let (x, y, _) = mv.target;
            match (mv.kind, position, mv.center_offset) {
                (MoveKind::Rapid, _, _) => {}
                (MoveKind::Linear, Some(from), _) => {
                    include(from.0, from.1);
                    include(x, y);
                }
                (kind, Some(from), Some((i, j))) if kind.is_arc() => {
                    let (cx, cy) = (from.0 + i, from.1 + j);
                    let radius = i.hypot(j);
                    include(from.0, from.1);
                    include(x, y);
                    let start = (from.1 - cy).atan2(from.0 - cx);
                    let end = (y - cy).atan2(x - cx);
                    let sweep = arc_sweep(start, end, kind == MoveKind::ArcCcw);
                    for quadrant in 0..4 {
                        let angle = quadrant as f64 * TAU / 4.0;
                        if angle_within_sweep(start, sweep, angle) {
                            include(cx + radius * angle.cos(), cy + radius * angle.sin());
                        }
                    }
                }
                _ => include(x, y),
            }
            position = Some(mv.target);
        }
        bounds
    }

    /// Lowest Z reached by any move.
    pub fn min_z(&self) -> Option<f64> {
        self.moves
            .iter()
            .map(|mv| mv.target.2)
            .min_by(|a, b| a.total_cmp(b))
    }
}

/// Signed sweep from `start` to `end`; a coincident start and end is a full turn.
pub(crate) fn arc_sweep(start: f64, end: f64, ccw: bool) -> f64 {
    let mut sweep = end - start;
    if ccw {
        while sweep <= 1e-12 {
            sweep += TAU;
        }
        while sweep > TAU + 1e-12 {
            sweep -= TAU;
        }
    } else {
        while sweep >= -1e-12 {
            sweep -= TAU;
        }
        while sweep < -TAU - 1e-12 {
            sweep += TAU;
        }
    }
    sweep
}

pub(crate) fn angle_within_sweep(start: f64, sweep: f64, angle: f64) -> bool {
    let delta = if sweep >= 0.0 {
        (angle - start).rem_euclid(TAU)
    } else {
        (start - angle).rem_euclid(TAU)
    };
    delta <= sweep.abs() + 1e-12
}

/// Accumulates moves while tracking the tool position and choosing feeds.
///
/// Pure Z descents use the plunge rate; everything else cuts at the feed rate.
#[derive(Debug, Clone)]
pub struct ToolpathBuilder {
    moves: Vec<Move>,
    position: Option<(f64, f64, f64)>,
    feed_rate: f64,
    plunge_rate: f64,
}

impl ToolpathBuilder {
    pub fn new(feed_rate: f64, plunge_rate: f64) -> Self {
        Self {
            moves: Vec::new(),
            position: None,
            feed_rate,
            plunge_rate,
        }
    }

    pub fn position(&self) -> Option<(f64, f64, f64)> {
        self.position
    }

    pub fn rapid_to(&mut self, x: f64, y: f64, z: f64) {
        if self.position == Some((x, y, z)) {
            return;
        }
        self.push(Move {
            kind: MoveKind::Rapid,
            target: (x, y, z),
            feed: None,
            center_offset: None,
        });
    }

    /// Rapid along Z only, keeping the current XY.
    pub fn rapid_z(&mut self, z: f64) {
        if let Some((x, y, _)) = self.position {
            self.rapid_to(x, y, z);
        }
    }

    pub fn line_to(&mut self, x: f64, y: f64, z: f64) {
        let Some(from) = self.position else {
            self.rapid_to(x, y, z);
            return;
        };
        if from == (x, y, z) {
            return;
        }
        let plunging = (from.0 - x).abs() < 1e-9 && (from.1 - y).abs() < 1e-9 && z < from.2;
        let feed = if plunging {
            self.plunge_rate
        } else {
            self.feed_rate
        };
        self.push(Move {
            kind: MoveKind::Linear,
            target: (x, y, z),
            feed: Some(feed),
            center_offset: None,
        });
    }

    /// Feed along Z only, keeping the current XY.
    pub fn line_z(&mut self, z: f64) {
        if let Some((x, y, _)) = self.position {
            self.line_to(x, y, z);
        }
    }

    /// Arc from the current position to the target around `center`.
    ///
    /// A target equal to the start in XY is a full circle; a Z change makes it helical.
    pub fn arc_to(&mut self, clockwise: bool, x: f64, y: f64, z: f64, center: (f64, f64)) {
        let Some(from) = self.position else {
            self.rapid_to(x, y, z);
            return;
        };
        let kind = if clockwise {
            MoveKind::ArcCw
        } else {
            MoveKind::ArcCcw
        };
        let feed = if z < from.2 {
            // Helical descents are limited by how fast the cutter can enter.
            self.plunge_rate
        } else {
            self.feed_rate
        };
        self.push(Move {
            kind,
            target: (x, y, z),
            feed: Some(feed),
            center_offset: Some((center.0 - from.0, center.1 - from.1)),
        });
    }

    /// Full circle around `center` that ends back at the current XY, at depth `z`.
    pub fn full_circle(&mut self, clockwise: bool, center: (f64, f64), z: f64) {
        if let Some((x, y, _)) = self.position {
            self.arc_to(clockwise, x, y, z, center);
        }
    }

    pub fn finish(self) -> Toolpath {
        Toolpath { moves: self.moves }
    }

    fn push(&mut self, mv: Move) {
        self.position = Some(mv.target);
        self.moves.push(mv);
    }
}

/// Represents the final, machine-specific G-code output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GCode {
    /// A list of G-code command strings.
    pub lines: Vec<String>,
}

impl GCode {
    /// The program as newline-terminated text.
    pub fn to_text(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

/// A bridge of material left under the perimeter cut to hold the part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tab {
    /// Arc-length position of the tab centre along the compensated perimeter.
    pub offset: f64,
    pub width: f64,
    pub height: f64,
}

impl Tab {
    pub fn start(&self) -> f64 {
        self.offset - self.width / 2.0
    }

    pub fn end(&self) -> f64 {
        self.offset + self.width / 2.0
    }
}

/// Z heights for a job. Z = 0 is the top of the sacrifice board.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZModel {
    /// Stock top.
    pub top: f64,
    /// Final cutting depth, slightly into the sacrifice board.
    pub cut: f64,
    /// Height for rapid moves.
    pub safe: f64,
    /// Height of the cutter while crossing a tab.
    pub tab: f64,
}

impl ZModel {
    pub fn new(thickness: f64, overcut: f64, safe_clearance: f64, tab_height: f64) -> Self {
        let cut = 0.0 - overcut;
        Self {
            top: thickness,
            cut,
            safe: thickness + safe_clearance,
            tab: cut + tab_height,
        }
    }

    /// Evenly spaced cutting levels from just below the top down to `cut`.
    ///
    /// No two consecutive levels are further apart than `stepdown`, and the
    /// last level is exactly `cut`.
    pub fn depth_levels(&self, stepdown: f64) -> Vec<f64> {
        let total = self.top - self.cut;
        if total <= 0.0 || stepdown <= 0.0 {
            return vec![self.cut];
        }
        let passes = ((total / stepdown) - 1e-9).ceil().max(1.0) as usize;
        let step = total / passes as f64;
        let mut levels: Vec<f64> = (1..passes).map(|k| self.top - step * k as f64).collect();
        levels.push(self.cut);
        levels
    }
}
