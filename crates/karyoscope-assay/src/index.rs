//! Population-level cytotoxicity and genotoxicity indices.
//!
//! Pure aggregation over summed counts: no per-image state, no iteration
//! over raw elements, so the result is identical whatever order images
//! were scored in. Degenerate denominators surface as explicit variants
//! rather than NaN or a crash.

use serde::{Deserialize, Serialize};

use crate::types::{AssayConfig, AssayCounts};

/// Micronuclei per binucleated cell, or an explicit statement that the
/// denominator was empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GenotoxicityIndex {
    /// `total micronuclei / total binucleated cells`.
    Defined(f64),
    /// The batch contained no binucleated cells; the standard metric has
    /// no value. Reported as-is unless `undefined_as_zero` is configured.
    Undefined,
}

impl GenotoxicityIndex {
    /// The value, if defined.
    #[must_use]
    pub const fn value(&self) -> Option<f64> {
        match self {
            Self::Defined(v) => Some(*v),
            Self::Undefined => None,
        }
    }
}

impl std::fmt::Display for GenotoxicityIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Defined(v) => write!(f, "{v:.4}"),
            Self::Undefined => f.write_str("undefined (no binucleated cells)"),
        }
    }
}

/// The two population-level scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulationIndices {
    /// Weighted nuclear-multiplicity index `(M1 + 2*M2 + 3*M3) / N`,
    /// divided by the configured control baseline when one is set.
    pub cytotoxicity: f64,
    /// Micronuclei per binucleated cell.
    pub genotoxicity: GenotoxicityIndex,
}

/// Index computation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// No mono-, bi-, or trinucleated cells in the whole batch: both
    /// indices are undefined and there is nothing to report.
    #[error("population contains no classified cells; indices are undefined")]
    EmptyPopulation,
}

/// Compute both indices from the summed batch counts.
///
/// Deterministic and side-effect free: equal counts and config always
/// produce bit-identical results.
///
/// # Errors
///
/// Returns [`IndexError::EmptyPopulation`] when the batch holds no
/// classified (mono/bi/tri) cells. A batch with classified cells but no
/// binucleated ones is *not* an error; its genotoxicity is reported as
/// [`GenotoxicityIndex::Undefined`].
#[allow(clippy::cast_precision_loss)]
pub fn compute_indices(
    counts: &AssayCounts,
    config: &AssayConfig,
) -> Result<PopulationIndices, IndexError> {
    let classified = counts.classified();
    if classified == 0 {
        return Err(IndexError::EmptyPopulation);
    }

    let weighted =
        counts.mononucleate + 2 * counts.binucleate + 3 * counts.trinucleate;
    let raw = weighted as f64 / classified as f64;
    let cytotoxicity = config.control_index.map_or(raw, |control| raw / control);

    let genotoxicity = if counts.binucleate == 0 {
        if config.undefined_as_zero {
            GenotoxicityIndex::Defined(0.0)
        } else {
            GenotoxicityIndex::Undefined
        }
    } else {
        GenotoxicityIndex::Defined(counts.micronuclei as f64 / counts.binucleate as f64)
    };

    Ok(PopulationIndices {
        cytotoxicity,
        genotoxicity,
    })
}
