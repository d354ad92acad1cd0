use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Cutting data for one stock material. Rates are inches per minute.
///
/// The material only changes how fast and how deep each pass goes; it never
/// changes the geometry that gets cut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialPreset {
    pub name: String,
    /// Horizontal cutting feed.
    pub feed_rate: f64,
    /// Vertical plunge feed.
    pub plunge_rate: f64,
    pub spindle_rpm: u32,
    /// The maximum Z-depth to cut in a single pass.
    pub stepdown: f64,
    /// Fraction of the tool diameter to step over when clearing, e.g. 0.4 for 40%.
    pub stepover: f64,
}

impl MaterialPreset {
    pub fn new(
        name: impl Into<String>,
        feed_rate: f64,
        plunge_rate: f64,
        spindle_rpm: u32,
        stepdown: f64,
        stepover: f64,
    ) -> Self {
        Self {
            name: name.into(),
            feed_rate,
            plunge_rate,
            spindle_rpm,
            stepdown,
            stepover,
        }
    }

    /// Baseline preset used when nothing else is configured.
    pub fn plywood() -> Self {
        Self::new("plywood", 60.0, 20.0, 18000, 0.125, 0.4)
    }
}

/// Represents a persisted collection of material presets stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MaterialLibrary {
    pub materials: Vec<MaterialPreset>,
}

impl MaterialLibrary {
    /// Create an empty library.
    pub fn new() -> Self {
        Self {
            materials: Vec::new(),
        }
    }

    /// Library seeded with the stock materials the router is normally fed.
    pub fn builtin() -> Self {
        Self {
            materials: vec![
                MaterialPreset::plywood(),
                MaterialPreset::new("mdf", 70.0, 25.0, 18000, 0.15, 0.4),
                MaterialPreset::new("hdpe", 50.0, 15.0, 16000, 0.1, 0.4),
                MaterialPreset::new("polycarbonate", 40.0, 12.0, 16000, 0.08, 0.4),
                MaterialPreset::new("aluminum", 20.0, 5.0, 18000, 0.02, 0.3),
            ],
        }
    }

    /// Load a library from the provided path. Missing files yield the built-in library.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::builtin());
        }

        let data =
            fs::read(path).with_context(|| format!("read material library {}", path.display()))?;
        let library: MaterialLibrary =
            serde_json::from_slice(&data).context("deserialize material library")?;
        Ok(library)
    }

    /// Persist the library to the provided path, ensuring the directory exists.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("create material library directory {}", parent.display())
            })?;
        }

        let data =
            serde_json::to_vec_pretty(self).context("serialize material library to JSON bytes")?;
        fs::write(path, data).with_context(|| format!("write material library {}", path.display()))
    }

    /// Add a preset, replacing any existing preset with the same name.
    pub fn add_material(&mut self, preset: MaterialPreset) {
        match self
            .materials
            .iter_mut()
            .find(|m| m.name.eq_ignore_ascii_case(&preset.name))
        {
            Some(slot) => *slot = preset,
            None => self.materials.push(preset),
        }
    }

    /// Look up a preset by name, ignoring case.
    pub fn find(&self, name: &str) -> Option<&MaterialPreset> {
        self.materials
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Look up a preset by name or fail with the list of known names.
    pub fn resolve(&self, name: &str) -> Result<MaterialPreset> {
        self.find(name).cloned().ok_or_else(|| {
            let known: Vec<&str> = self.materials.iter().map(|m| m.name.as_str()).collect();
            anyhow!("unknown material '{name}' (known: {})", known.join(", "))
        })
    }

    /// Resolve the default library path (`~/.platecut/materials.json`).
    pub fn default_library_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
        Ok(home.join(".platecut").join("materials.json"))
    }
}
