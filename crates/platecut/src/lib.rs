//! Flat plate machining: DXF outlines in, tabbed and depth-staged G-code out.
//!
//! The pipeline runs strictly in order: load and normalise the drawing,
//! reconstruct closed boundaries, classify features, then generate and post
//! process one toolpath per feature. [`generate`] runs the whole job.

pub mod classify;
pub mod config;
pub mod error;
pub mod geometry;
pub mod hole;
pub mod material_library;
pub mod pocket;
pub mod postprocessor;
pub mod profile;
pub mod reconstruct;
pub mod tabs;
pub mod toolpath_generation;
pub mod types;

pub use classify::{classify, classify_hole, Feature, FeatureKind, FeatureSet, HoleKind};
pub use config::{
    HoleBands, HoleStrategy, JobConfig, MaterialParameters, ReconstructionSettings, TabMode,
    TabSettings, ToolParameters, Units,
};
pub use error::{PlateCutError, PlateCutResult, Warning};
pub use geometry::{ClosedPath, Drawing, FeatureId, RawSegment, SegmentId};
pub use hole::generate_hole_toolpath;
pub use material_library::{MaterialLibrary, MaterialPreset};
pub use pocket::generate_pocket_toolpath;
pub use postprocessor::{post_process, FeatureCounts, ProgramSection};
pub use profile::{generate_perimeter_toolpath, PerimeterToolpath};
pub use reconstruct::{reconstruct, Reconstruction, Strategy};
pub use tabs::place_tabs;
pub use toolpath_generation::{
    generate, generate_from_drawing, generate_from_path, FeatureReport, FeatureStatus, JobOutput,
    JobSummary,
};
pub use types::{GCode, Move, MoveKind, Tab, Toolpath, ToolpathBuilder, ZModel};

/// Initialize logging to stderr, filtered by `RUST_LOG` (default `info`).
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))
}
