//! karyoscope-report: serializers for batch results.
//!
//! Converts the engine's [`BatchResult`](karyoscope_assay::BatchResult)
//! into the three shapes people actually consume:
//!
//! - [`summary`]: the terminal summary block (totals, indices, audit),
//! - [`json`]: a machine-readable report for downstream analysis,
//! - [`overlay`]: source images with detected elements outlined.
//!
//! Rendering never recomputes anything; the engine's counts and records
//! are the single source of numbers here.

pub mod json;
pub mod overlay;
pub mod summary;

pub use json::{BatchReport, to_json_string, write_json_file};
pub use overlay::{OverlayLayers, render_overlay};
pub use summary::render_summary;

/// Errors from report serialization.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// JSON serialization failed.
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Filesystem failure while writing a report.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}
