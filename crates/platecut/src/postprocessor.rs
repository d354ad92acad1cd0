use crate::config::JobConfig;
use crate::types::{GCode, Move, MoveKind, Toolpath};
use serde::{Deserialize, Serialize};

/// A feature's toolpath together with the comment emitted before it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramSection {
    pub label: String,
    pub toolpath: Toolpath,
}

impl ProgramSection {
    pub fn new(label: impl Into<String>, toolpath: Toolpath) -> Self {
        Self {
            label: label.into(),
            toolpath,
        }
    }
}

/// Feature totals written to the program header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureCounts {
    pub screw: usize,
    pub bearing: usize,
    pub custom: usize,
    pub pockets: usize,
    pub perimeter: bool,
}

/// Convert toolpaths to G-code for a router running in inches.
///
/// Output is modal: an axis word is written only when its value changes and
/// `F` only when the feed changes. Sections are emitted in the order given.
pub fn post_process(config: &JobConfig, counts: &FeatureCounts, sections: &[ProgramSection]) -> GCode {
    let z = config.z_model();
    let mut lines = Vec::new();

    // Header
    lines.push(comment(&config.program_name));
    lines.push(comment(&format!("Material: {}", config.preset.name)));
    lines.push(comment(&format!("Thickness: {} in", coord(config.material.thickness))));
    lines.push(comment(&format!("Tool diameter: {} in", coord(config.tool.diameter))));
    lines.push(comment(&format!(
        "Compensation: {} outside perimeter, inside pockets and holes",
        coord(config.tool.radius())
    )));
    lines.push(comment(&format!(
        "Z: cut {} top {} safe {} tab {}",
        coord(z.cut),
        coord(z.top),
        coord(z.safe),
        coord(z.tab)
    )));
    lines.push(comment(&format!(
        "Features: {} screw, {} bearing, {} custom holes, {} pockets, {} perimeter",
        counts.screw,
        counts.bearing,
        counts.custom,
        counts.pockets,
        usize::from(counts.perimeter)
    )));

    lines.push("G90 G94 G91.1 G40 G49 G17".to_string()); // Absolute, feed/min, incremental arcs, XY plane
    lines.push("G20".to_string()); // Inches
    lines.push("G54".to_string());
    lines.push(format!("M3 S{}", config.preset.spindle_rpm));
    lines.push(format!("G0 Z{}", coord(z.safe)));

    let mut state = ModalState {
        position: [None, None, Some(z.safe)],
        feed: None,
    };
    for section in sections {
        if section.toolpath.is_empty() {
            continue;
        }
        lines.push(comment(&section.label));
        for mv in &section.toolpath.moves {
            if let Some(line) = state.emit(mv) {
                lines.push(line);
            }
        }
    }

    // Footer
    lines.push("M5".to_string());
    lines.push(format!("G0 Z{}", coord(z.safe)));
    lines.push("G0 X0 Y0".to_string());
    lines.push("M30".to_string());

    GCode { lines }
}

/// What the controller currently holds for each modal word.
struct ModalState {
    position: [Option<f64>; 3],
    feed: Option<f64>,
}

impl ModalState {
    fn emit(&mut self, mv: &Move) -> Option<String> {
        let word = match mv.kind {
            MoveKind::Rapid => "G0",
            MoveKind::Linear => "G1",
            MoveKind::ArcCw => "G2",
            MoveKind::ArcCcw => "G3",
        };
        let mut line = word.to_string();

        let (x, y, z) = mv.target;
        for (axis, (letter, value)) in [('X', x), ('Y', y), ('Z', z)].into_iter().enumerate() {
            let text = coord(value);
            if self.position[axis].map(coord).as_deref() != Some(text.as_str()) {
                line.push_str(&format!(" {letter}{text}"));
            }
            self.position[axis] = Some(value);
        }

        if let (true, Some((i, j))) = (mv.kind.is_arc(), mv.center_offset) {
            line.push_str(&format!(" I{} J{}", coord(i), coord(j)));
        }

        if line == word {
            return None;
        }

        if let Some(feed) = mv.feed {
            if self.feed != Some(feed) {
                line.push_str(&format!(" F{feed:.1}"));
                self.feed = Some(feed);
            }
        }
        Some(line)
    }
}

/// Four decimals, never negative zero.
fn coord(value: f64) -> String {
    let text = format!("{value:.4}");
    if text == "-0.0000" {
        "0.0000".to_string()
    } else {
        text
    }
}

/// Parentheses close a comment early, so labels swap them for brackets.
fn comment(text: &str) -> String {
    format!("({})", text.replace('(', "[").replace(')', "]"))
}
