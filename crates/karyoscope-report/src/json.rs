//! Machine-readable JSON report.
//!
//! The report flattens the engine's result tree into serde-friendly
//! rows: per-cell entries carry ids rather than pixel sets, failures
//! carry their error text, and undefined indices are `null` with a
//! `note` saying why, never NaN.

use std::path::Path;

use karyoscope_assay::{AssayCounts, BatchResult, CellClass, GenotoxicityIndex, ImageAudit};
use serde::{Deserialize, Serialize};

use crate::ReportError;

/// Top-level report for one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Per-image breakdowns, in batch order.
    pub images: Vec<ImageReport>,
    /// Images the batch skipped, with reasons.
    pub failures: Vec<FailureReport>,
    /// Summed tallies over all scored images.
    pub counts: AssayCounts,
    /// Summed dropped-element audit.
    pub audit: ImageAudit,
    /// Population indices, with `null` for undefined values.
    pub indices: IndicesReport,
}

/// One scored image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageReport {
    /// Image identifier.
    pub id: String,
    /// Tallies for this image.
    pub counts: AssayCounts,
    /// Dropped-element audit for this image.
    pub audit: ImageAudit,
    /// One row per cell record.
    pub cells: Vec<CellReport>,
}

/// One cell record, reduced to ids and geometry highlights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellReport {
    /// Cytoplasm label id.
    pub cytoplasm: u32,
    /// Classification.
    pub class: CellClass,
    /// Cytoplasm area in pixels.
    pub area: u32,
    /// Cytoplasm centroid, (x, y).
    pub centroid: (f64, f64),
    /// Label ids of the owned nuclei.
    pub nuclei: Vec<u32>,
    /// Label ids of the owned micronuclei.
    pub micronuclei: Vec<u32>,
}

/// A skipped image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    /// Image identifier.
    pub id: String,
    /// Rendered error message.
    pub error: String,
}

/// Population indices in JSON form.
///
/// `None` serializes to `null`; `note` explains any missing value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicesReport {
    /// Cytotoxicity index, absent when the population was empty.
    pub cytotoxicity: Option<f64>,
    /// Genotoxicity index, absent when undefined.
    pub genotoxicity: Option<f64>,
    /// Why a value is absent, when one is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl BatchReport {
    /// Build the report from a batch result.
    #[must_use]
    pub fn from_batch(batch: &BatchResult) -> Self {
        let images = batch
            .images
            .iter()
            .map(|image| ImageReport {
                id: image.id.clone(),
                counts: image.counts,
                audit: image.audit,
                cells: image
                    .records
                    .iter()
                    .map(|record| CellReport {
                        cytoplasm: record.cytoplasm.id(),
                        class: record.class,
                        area: record.cytoplasm.area(),
                        centroid: record.cytoplasm.centroid(),
                        nuclei: record.nuclei.iter().map(|n| n.id()).collect(),
                        micronuclei: record.micronuclei.iter().map(|m| m.id()).collect(),
                    })
                    .collect(),
            })
            .collect();

        let failures = batch
            .failures
            .iter()
            .map(|failure| FailureReport {
                id: failure.id.clone(),
                error: failure.error.to_string(),
            })
            .collect();

        let indices = match &batch.indices {
            Ok(indices) => {
                let (genotoxicity, note) = match indices.genotoxicity {
                    GenotoxicityIndex::Defined(value) => (Some(value), None),
                    GenotoxicityIndex::Undefined => {
                        (None, Some(GenotoxicityIndex::Undefined.to_string()))
                    }
                };
                IndicesReport {
                    cytotoxicity: Some(indices.cytotoxicity),
                    genotoxicity,
                    note,
                }
            }
            Err(error) => IndicesReport {
                cytotoxicity: None,
                genotoxicity: None,
                note: Some(error.to_string()),
            },
        };

        Self {
            images,
            failures,
            counts: batch.counts,
            audit: batch.audit,
            indices,
        }
    }
}

/// Serialize a report to pretty-printed JSON.
///
/// # Errors
///
/// Returns [`ReportError::Serialize`] on serialization failure.
pub fn to_json_string(report: &BatchReport) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Write a report to `path` as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`ReportError::Serialize`] or [`ReportError::Io`].
pub fn write_json_file(path: &Path, report: &BatchReport) -> Result<(), ReportError> {
    let json = to_json_string(report)?;
    std::fs::write(path, json)?;
    Ok(())
}
