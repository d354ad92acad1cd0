use crate::error::{PlateCutError, PlateCutResult};
use crate::material_library::MaterialPreset;
use crate::types::ZModel;
use serde::{Deserialize, Serialize};

/// Units the drawing was authored in. Output is always inches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Units {
    #[default]
    Inch,
    Millimeter,
}

impl Units {
    /// Factor that converts drawing units to inches.
    pub fn to_inches(self) -> f64 {
        match self {
            Units::Inch => 1.0,
            Units::Millimeter => 1.0 / 25.4,
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "in" | "inch" | "inches" => Some(Units::Inch),
            "mm" | "millimeter" | "millimeters" | "millimetre" | "millimetres" => {
                Some(Units::Millimeter)
            }
            _ => None,
        }
    }
}

/// The cutter in the spindle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameters {
    pub diameter: f64,
    /// Clearance kept between the cutter and walls it must not touch.
    pub clearance_tolerance: f64,
}

impl ToolParameters {
    pub fn new(diameter: f64) -> Self {
        Self {
            diameter,
            clearance_tolerance: 0.001,
        }
    }

    pub fn radius(&self) -> f64 {
        self.diameter / 2.0
    }
}

/// Stock and fixture dimensions that drive the Z model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialParameters {
    pub thickness: f64,
    /// How far below the stock the cutter reaches into the sacrifice board.
    pub overcut: f64,
    /// Height above the stock top used for rapid moves.
    pub safe_clearance: f64,
}

impl MaterialParameters {
    pub fn new(thickness: f64) -> Self {
        Self {
            thickness,
            overcut: 0.02,
            safe_clearance: 0.5,
        }
    }
}

/// How tab positions along the perimeter are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TabMode {
    /// Place this many tabs evenly over the straight runs.
    Count(usize),
    /// Place a tab every given distance along the perimeter.
    Spacing(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabSettings {
    pub mode: TabMode,
    pub width: f64,
    /// Material left standing under each tab.
    pub height: f64,
}

impl TabSettings {
    pub fn enabled(&self) -> bool {
        match self.mode {
            TabMode::Count(count) => count > 0,
            TabMode::Spacing(_) => true,
        }
    }
}

impl Default for TabSettings {
    fn default() -> Self {
        Self {
            mode: TabMode::Count(4),
            width: 0.25,
            height: 0.06,
        }
    }
}

/// Nominal hole diameters recognised as standard hardware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoleBands {
    pub screw_diameter: f64,
    pub bearing_diameter: f64,
    /// Allowed deviation from a nominal diameter.
    pub band: f64,
}

impl Default for HoleBands {
    fn default() -> Self {
        Self {
            screw_diameter: 0.19,
            bearing_diameter: 1.125,
            band: 0.02,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HoleStrategy {
    /// Helical entry followed by spiral clearing out to the hole wall.
    #[default]
    Helical,
    /// Plunge at the centre only.
    Drill,
}

/// Tolerances and sampling densities used to rebuild closed boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionSettings {
    /// Grid size endpoints are rounded to when matching segments.
    pub join_tolerance: f64,
    /// Maximum distance between the ends of a walk for it to count as closed.
    pub closure_tolerance: f64,
    /// Maximum gap bridged by the approximate merge fallback.
    pub merge_gap: f64,
    pub arc_segments: usize,
    pub spline_segments: usize,
}

impl Default for ReconstructionSettings {
    fn default() -> Self {
        Self {
            join_tolerance: 0.001,
            closure_tolerance: 0.01,
            merge_gap: 0.05,
            arc_segments: 20,
            spline_segments: 30,
        }
    }
}

/// Everything one job needs, fixed for the duration of the job.
///
/// Every pipeline stage takes this by reference; nothing reads ambient defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub program_name: String,
    pub tool: ToolParameters,
    pub material: MaterialParameters,
    pub preset: MaterialPreset,
    pub tabs: TabSettings,
    pub hole_bands: HoleBands,
    pub hole_strategy: HoleStrategy,
    pub reconstruction: ReconstructionSettings,
    pub units: Units,
    /// Rotation applied to the drawing about the origin, counter-clockwise.
    pub rotation_degrees: f64,
    /// Maximum deviation when offset arcs are turned into chords.
    pub chord_tolerance: f64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            program_name: "platecut".to_string(),
            tool: ToolParameters::new(0.157),
            material: MaterialParameters::new(0.25),
            preset: MaterialPreset::plywood(),
            tabs: TabSettings::default(),
            hole_bands: HoleBands::default(),
            hole_strategy: HoleStrategy::Helical,
            reconstruction: ReconstructionSettings::default(),
            units: Units::Inch,
            rotation_degrees: 0.0,
            chord_tolerance: 0.002,
        }
    }
}

impl JobConfig {
    pub fn with_tool_diameter(mut self, diameter: f64) -> Self {
        self.tool.diameter = diameter;
        self
    }

    pub fn with_thickness(mut self, thickness: f64) -> Self {
        self.material.thickness = thickness;
        self
    }

    pub fn with_overcut(mut self, overcut: f64) -> Self {
        self.material.overcut = overcut;
        self
    }

    pub fn with_material(mut self, preset: MaterialPreset) -> Self {
        self.preset = preset;
        self
    }

    pub fn with_tabs(mut self, mode: TabMode) -> Self {
        self.tabs.mode = mode;
        self
    }

    pub fn with_hole_strategy(mut self, strategy: HoleStrategy) -> Self {
        self.hole_strategy = strategy;
        self
    }

    pub fn with_units(mut self, units: Units) -> Self {
        self.units = units;
        self
    }

    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation_degrees = degrees;
        self
    }

    /// Z coordinates for this job, referenced to the sacrifice board.
    pub fn z_model(&self) -> ZModel {
        ZModel::new(
            self.material.thickness,
            self.material.overcut,
            self.material.safe_clearance,
            self.tabs.height,
        )
    }

    /// Distance between clearing rings.
    pub fn stepover_distance(&self) -> f64 {
        self.tool.diameter * self.preset.stepover
    }

    /// Reject parameter sets the pipeline cannot honour.
    pub fn validate(&self) -> PlateCutResult<()> {
        require_positive("material thickness", self.material.thickness)?;
        require_positive("tool diameter", self.tool.diameter)?;
        require_non_negative("sacrifice overcut", self.material.overcut)?;
        require_positive("safe clearance", self.material.safe_clearance)?;
        require_non_negative("tool clearance tolerance", self.tool.clearance_tolerance)?;

        require_positive("feed rate", self.preset.feed_rate)?;
        require_positive("plunge rate", self.preset.plunge_rate)?;
        require_positive("stepdown", self.preset.stepdown)?;
        if !(self.preset.stepover > 0.0 && self.preset.stepover <= 1.0) {
            return Err(PlateCutError::invalid(format!(
                "stepover must be in (0, 1], got {}",
                self.preset.stepover
            )));
        }

        if self.tabs.enabled() {
            require_positive("tab width", self.tabs.width)?;
            require_positive("tab height", self.tabs.height)?;
            if let TabMode::Spacing(spacing) = self.tabs.mode {
                require_positive("tab spacing", spacing)?;
                if spacing < self.tabs.width {
                    return Err(PlateCutError::invalid(format!(
                        "tab spacing {spacing:.4} is shorter than the tab width {:.4}",
                        self.tabs.width
                    )));
                }
            }
            let z = self.z_model();
            if z.tab >= z.top {
                return Err(PlateCutError::invalid(format!(
                    "tab height {:.4} leaves no tab: tab Z {:.4} must stay below the stock top {:.4}",
                    self.tabs.height, z.tab, z.top
                )));
            }
        }

        let bands = &self.hole_bands;
        require_positive("screw diameter", bands.screw_diameter)?;
        require_positive("bearing diameter", bands.bearing_diameter)?;
        require_non_negative("hole band", bands.band)?;

        let rec = &self.reconstruction;
        require_positive("join tolerance", rec.join_tolerance)?;
        if rec.closure_tolerance < rec.join_tolerance {
            return Err(PlateCutError::invalid(
                "closure tolerance must not be smaller than the join tolerance",
            ));
        }
        require_positive("merge gap", rec.merge_gap)?;
        if rec.arc_segments < 2 || rec.spline_segments < 2 {
            return Err(PlateCutError::invalid(
                "arc and spline sampling need at least 2 segments",
            ));
        }

        if !self.rotation_degrees.is_finite() {
            return Err(PlateCutError::invalid("rotation must be a finite angle"));
        }
        require_positive("chord tolerance", self.chord_tolerance)?;
        Ok(())
    }
}

fn require_positive(name: &str, value: f64) -> PlateCutResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PlateCutError::invalid(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

fn require_non_negative(name: &str, value: f64) -> PlateCutResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PlateCutError::invalid(format!(
            "{name} must not be negative, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        JobConfig::default().validate().expect("defaults validate");
    }

    #[test]
    fn test_rejects_non_positive_thickness_and_diameter() {
        let err = JobConfig::default().with_thickness(0.0).validate().unwrap_err();
        assert!(err.to_string().contains("thickness"));

        let err = JobConfig::default()
            .with_tool_diameter(-0.1)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("tool diameter"));

        let err = JobConfig::default()
            .with_thickness(f64::NAN)
            .validate()
            .unwrap_err();
        assert!(matches!(err, PlateCutError::InputValidation(_)));
    }

    #[test]
    fn test_rejects_tab_taller_than_stock() {
        let mut config = JobConfig::default();
        config.tabs.height = 0.3;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tab"));

        // Disabled tabs are not checked.
        config.tabs.mode = TabMode::Count(0);
        config.validate().expect("tabs disabled");
    }

    #[test]
    fn test_units_parse() {
        assert_eq!(Units::parse("MM"), Some(Units::Millimeter));
        assert_eq!(Units::parse("in"), Some(Units::Inch));
        assert_eq!(Units::parse("furlong"), None);
        assert!((Units::Millimeter.to_inches() * 25.4 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_z_model_follows_material() {
        let config = JobConfig::default().with_thickness(0.5).with_overcut(0.03);
        let z = config.z_model();
        assert_eq!(z.top, 0.5);
        assert_eq!(z.cut, -0.03);
        assert_eq!(z.safe, 1.0);
        assert!((z.tab - 0.03).abs() < 1e-12);
    }
}
