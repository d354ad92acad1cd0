use crate::classify::{classify, Feature, FeatureKind, HoleKind};
use crate::config::JobConfig;
use crate::error::{PlateCutError, PlateCutResult, Warning};
use crate::geometry::Drawing;
use crate::hole::generate_hole_toolpath;
use crate::pocket::generate_pocket_toolpath;
use crate::postprocessor::{post_process, FeatureCounts, ProgramSection};
use crate::profile::generate_perimeter_toolpath;
use crate::reconstruct::{reconstruct, Strategy};
use crate::types::{GCode, Toolpath};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// What happened to one classified feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeatureStatus {
    Generated { moves: usize },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureReport {
    pub label: String,
    pub kind: FeatureKind,
    pub status: FeatureStatus,
}

/// Counts and warnings reported back to whoever submitted the job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub screw_holes: usize,
    pub bearing_holes: usize,
    pub custom_holes: usize,
    pub pockets: usize,
    /// Features detected but not machined.
    pub skipped: usize,
    pub line_count: usize,
    pub warnings: Vec<Warning>,
    /// Set when any boundary came from the convex-hull fallback.
    pub approximate: bool,
    pub strategies: Vec<Strategy>,
    pub features: Vec<FeatureReport>,
}

impl JobSummary {
    /// Human-readable summary, one fact per line.
    pub fn console_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Screw holes: {}", self.screw_holes),
            format!("Bearing holes: {}", self.bearing_holes),
            format!("Custom holes: {}", self.custom_holes),
            format!("Pockets: {}", self.pockets),
            format!("Skipped features: {}", self.skipped),
            format!("G-code lines: {}", self.line_count),
        ];
        if !self.strategies.is_empty() {
            let used: Vec<&str> = self.strategies.iter().map(|s| s.label()).collect();
            lines.push(format!("Reconstruction: {}", used.join(", ")));
        }
        if self.approximate {
            lines.push("APPROXIMATE: the perimeter is a convex hull of the drawing".to_string());
        }
        lines.extend(self.warnings.iter().map(|w| format!("Warning: {w}")));
        lines
    }
}

/// Result of a successful job.
#[derive(Debug, Clone)]
pub struct JobOutput {
    pub gcode: GCode,
    pub summary: JobSummary,
    /// Cutter centre along the perimeter in cutting order. Empty without a perimeter.
    pub perimeter_points: Vec<(f64, f64)>,
}

/// Turn DXF bytes into G-code.
///
/// Parameters are validated before the file is parsed. Only a bad input, an
/// unrecoverable perimeter or a failed perimeter compensation abort the job;
/// holes and pockets that cannot be machined are skipped with a warning.
pub fn generate(input: &[u8], config: &JobConfig) -> PlateCutResult<JobOutput> {
    config.validate()?;
    let drawing = Drawing::from_bytes(input)?;
    run(&drawing, config)
}

pub fn generate_from_path<P: AsRef<Path>>(path: P, config: &JobConfig) -> PlateCutResult<JobOutput> {
    config.validate()?;
    let drawing = Drawing::from_path(path)?;
    run(&drawing, config)
}

pub fn generate_from_drawing(drawing: &Drawing, config: &JobConfig) -> PlateCutResult<JobOutput> {
    config.validate()?;
    run(drawing, config)
}

fn run(drawing: &Drawing, config: &JobConfig) -> PlateCutResult<JobOutput> {
    let drawing = drawing.normalized(config.units, config.rotation_degrees)?;
    let mut warnings = Vec::new();
    if drawing.unsupported > 0 {
        warnings.push(Warning::UnsupportedEntities {
            count: drawing.unsupported,
        });
    }

    let reconstruction = reconstruct(&drawing, &config.reconstruction)?;
    warnings.extend(reconstruction.warnings.iter().cloned());

    let features = classify(&reconstruction, &drawing.circles, &config.hole_bands);
    warnings.extend(features.warnings.iter().cloned());

    // The perimeter is the only fatal stage, so it runs before anything else.
    let perimeter = match features.perimeter() {
        Some(feature) => match feature.path() {
            Some(path) => Some((feature, generate_perimeter_toolpath(path, config)?)),
            None => None,
        },
        None => None,
    };

    let mut sections = Vec::new();
    let mut reports = Vec::new();
    for hole in features.holes() {
        let Some((center, radius)) = hole.circle() else {
            continue;
        };
        let outcome = generate_hole_toolpath(center, radius, &hole.label, config);
        record(hole, outcome, &mut sections, &mut reports, &mut warnings);
    }
    for pocket in features.pockets() {
        let Some(path) = pocket.path() else {
            continue;
        };
        let outcome = generate_pocket_toolpath(path, &pocket.label, config);
        record(pocket, outcome, &mut sections, &mut reports, &mut warnings);
    }

    let mut perimeter_points = Vec::new();
    if let Some((feature, cut)) = perimeter {
        warnings.extend(cut.warnings);
        perimeter_points = cut.compensated.points().to_vec();
        record(feature, Ok(cut.toolpath), &mut sections, &mut reports, &mut warnings);
    }

    let counts = FeatureCounts {
        screw: features.hole_count(HoleKind::Screw),
        bearing: features.hole_count(HoleKind::Bearing),
        custom: features.hole_count(HoleKind::Custom),
        pockets: features.pockets().count(),
        perimeter: features.perimeter().is_some(),
    };
    let gcode = post_process(config, &counts, &sections);

    let skipped = warnings
        .iter()
        .filter(|w| matches!(w, Warning::FeatureSkipped { .. } | Warning::OutsidePerimeter { .. }))
        .count();
    let summary = JobSummary {
        screw_holes: counts.screw,
        bearing_holes: counts.bearing,
        custom_holes: counts.custom,
        pockets: counts.pockets,
        skipped,
        line_count: gcode.lines.len(),
        warnings,
        approximate: reconstruction.is_approximate(),
        strategies: reconstruction.strategies_used(),
        features: reports,
    };
    info!(
        lines = summary.line_count,
        sections = sections.len(),
        skipped = summary.skipped,
        warnings = summary.warnings.len(),
        "Job finished"
    );

    Ok(JobOutput {
        gcode,
        summary,
        perimeter_points,
    })
}

fn record(
    feature: &Feature,
    outcome: PlateCutResult<Toolpath>,
    sections: &mut Vec<ProgramSection>,
    reports: &mut Vec<FeatureReport>,
    warnings: &mut Vec<Warning>,
) {
    let status = match outcome {
        Ok(toolpath) => {
            let moves = toolpath.len();
            sections.push(ProgramSection::new(feature.label.clone(), toolpath));
            FeatureStatus::Generated { moves }
        }
        Err(err) => {
            let reason = match err {
                PlateCutError::ToolTooLarge { reason, .. } => reason,
                other => other.to_string(),
            };
            warn!(feature = %feature.label, %reason, "Skipping feature");
            warnings.push(Warning::FeatureSkipped {
                feature: feature.label.clone(),
                reason: reason.clone(),
            });
            FeatureStatus::Skipped { reason }
        }
    };
    reports.push(FeatureReport {
        label: feature.label.clone(),
        kind: feature.kind,
        status,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RawSegment;
    use kurbo::{Circle, Line};

    fn plate(size: f64, circles: Vec<Circle>) -> Drawing {
        let corners = [(0.0, 0.0), (size, 0.0), (size, size), (0.0, size)];
        let segments = (0..4)
            .map(|i| RawSegment::Line(Line::new(corners[i], corners[(i + 1) % 4])))
            .collect();
        Drawing::from_parts(segments, circles)
    }

    #[test]
    fn test_summary_counts_holes() {
        let drawing = plate(
            6.0,
            vec![
                Circle::new((1.0, 1.0), 0.095),
                Circle::new((5.0, 1.0), 0.095),
                Circle::new((3.0, 3.0), 0.5625),
            ],
        );
        let output = generate_from_drawing(&drawing, &JobConfig::default()).expect("job");
        assert_eq!(output.summary.screw_holes, 2);
        assert_eq!(output.summary.bearing_holes, 1);
        assert_eq!(output.summary.skipped, 0);
        assert_eq!(output.summary.line_count, output.gcode.lines.len());
        assert_eq!(output.summary.strategies, vec![Strategy::GraphStitch]);
        assert!(!output.perimeter_points.is_empty());
        assert_eq!(output.summary.features.len(), 4);
    }

    #[test]
    fn test_sections_in_machining_order() {
        let drawing = plate(6.0, vec![Circle::new((1.0, 1.0), 0.095)]);
        let output = generate_from_drawing(&drawing, &JobConfig::default()).expect("job");
        let hole = output
            .gcode
            .lines
            .iter()
            .position(|l| l.starts_with("(screw hole"))
            .expect("hole section");
        let perimeter = output
            .gcode
            .lines
            .iter()
            .position(|l| l == "(perimeter)")
            .expect("perimeter section");
        assert!(hole < perimeter);
    }

    #[test]
    fn test_invalid_config_rejected_before_parsing() {
        let config = JobConfig::default().with_thickness(0.0);
        let err = generate(b"not a dxf", &config).unwrap_err();
        assert!(err.to_string().contains("thickness"));
    }

    #[test]
    fn test_console_lines_include_warnings() {
        let summary = JobSummary {
            warnings: vec![Warning::NoTabRuns { requested: 4 }],
            ..Default::default()
        };
        let lines = summary.console_lines();
        assert_eq!(lines[0], "Screw holes: 0");
        assert!(lines.last().unwrap().starts_with("Warning:"));
    }
}
