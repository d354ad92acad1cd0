//! Error and warning types for the plate machining pipeline.
//!
//! Errors abort a stage: `InputValidation` is raised before any geometry is
//! touched, `GeometryReconstruction` and `ToolTooLarge` are raised per
//! feature and only become fatal when the feature is the perimeter.
//! Warnings never abort anything; they travel with the job summary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Errors that can occur while turning a drawing into G-code.
#[derive(Error, Debug)]
pub enum PlateCutError {
    /// Parameters or the input file were rejected before processing started.
    #[error("Invalid input: {0}")]
    InputValidation(String),

    /// No closed path could be built for a boundary after every strategy.
    #[error("Could not reconstruct {boundary}: {reason}")]
    GeometryReconstruction { boundary: String, reason: String },

    /// The tool cannot mill the feature without gouging or inverting it.
    #[error("Tool too large for {feature}: {reason}")]
    ToolTooLarge { feature: String, reason: String },

    /// I/O error while reading input or writing output.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PlateCutError {
    /// Shorthand for an [`PlateCutError::InputValidation`] error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InputValidation(message.into())
    }
}

/// Result type alias for pipeline operations.
pub type PlateCutResult<T> = Result<T, PlateCutError>;

/// A non-fatal condition recorded while processing a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The convex-hull fallback produced a boundary; concavity was discarded.
    Approximation { boundary: String, points: usize },
    /// The line-merge fallback bridged gaps wider than the join tolerance.
    ApproximateMerge { rings: usize, segments: usize },
    /// Segments that never closed into a loop and were ignored.
    OpenChains { segments: usize },
    /// A feature was detected but no toolpath was generated for it.
    FeatureSkipped { feature: String, reason: String },
    /// A closed path or circle lies outside the perimeter.
    OutsidePerimeter { feature: String },
    /// Tabs were requested but the perimeter has no straight run long enough.
    NoTabRuns { requested: usize },
    /// Fewer tabs were placed than requested because they would overlap.
    TabsDropped { requested: usize, placed: usize },
    /// DXF entities of unsupported kinds were ignored.
    UnsupportedEntities { count: usize },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::Approximation { boundary, points } => write!(
                f,
                "APPROXIMATE: {boundary} replaced by the convex hull of {points} points; concave detail was lost"
            ),
            Warning::ApproximateMerge { rings, segments } => write!(
                f,
                "approximate merge joined {segments} segment(s) into {rings} ring(s) across gaps wider than the join tolerance"
            ),
            Warning::OpenChains { segments } => {
                write!(f, "{segments} segment(s) did not form a closed loop and were ignored")
            }
            Warning::FeatureSkipped { feature, reason } => write!(f, "skipped {feature}: {reason}"),
            Warning::OutsidePerimeter { feature } => {
                write!(f, "{feature} lies outside the perimeter and was skipped")
            }
            Warning::NoTabRuns { requested } => write!(
                f,
                "{requested} tab(s) requested but no straight run of the perimeter is long enough"
            ),
            Warning::TabsDropped { requested, placed } => {
                write!(f, "placed {placed} of {requested} tab(s); the rest would overlap")
            }
            Warning::UnsupportedEntities { count } => {
                write!(f, "{count} unsupported DXF entit(ies) ignored")
            }
        }
    }
}
