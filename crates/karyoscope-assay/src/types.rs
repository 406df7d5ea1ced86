//! Shared types for the karyoscope scoring engine.

use serde::{Deserialize, Serialize};

/// The biological category an instance mask (and its elements) belongs to.
///
/// Each image is segmented three times, once per category, and the three
/// label maps are associated back into cells by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Cell body. The parent every nucleus and micronucleus is assigned to.
    Cytoplasm,
    /// Main nucleus (one or more per cell).
    Nucleus,
    /// Small satellite nucleus formed from lagging chromosome fragments.
    Micronucleus,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Cytoplasm => "cytoplasm",
            Self::Nucleus => "nucleus",
            Self::Micronucleus => "micronucleus",
        };
        f.write_str(name)
    }
}

/// Classification of a cell by the number of accepted nuclei it owns.
///
/// Only mono-, bi-, and trinucleated cells are informative under the CBMN
/// scoring convention; anything else is `Invalid` and excluded from the
/// index formulas while still counting toward the total-cytoplasm tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellClass {
    /// Exactly one accepted nucleus.
    Mononucleate,
    /// Exactly two accepted nuclei.
    Binucleate,
    /// Exactly three accepted nuclei.
    Trinucleate,
    /// Zero nuclei, or more than the configured multiplicity limit.
    Invalid,
}

impl std::fmt::Display for CellClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Mononucleate => "mononucleate",
            Self::Binucleate => "binucleate",
            Self::Trinucleate => "trinucleate",
            Self::Invalid => "invalid",
        };
        f.write_str(name)
    }
}

/// Axis-aligned bounding box in pixel coordinates, inclusive on all sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Leftmost column.
    pub min_x: u32,
    /// Topmost row.
    pub min_y: u32,
    /// Rightmost column (inclusive).
    pub max_x: u32,
    /// Bottom row (inclusive).
    pub max_y: u32,
}

impl BoundingBox {
    /// A degenerate box covering the single pixel `(x, y)`.
    #[must_use]
    pub const fn at(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    /// Grow the box to include `(x, y)`.
    pub const fn include(&mut self, x: u32, y: u32) {
        if x < self.min_x {
            self.min_x = x;
        }
        if x > self.max_x {
            self.max_x = x;
        }
        if y < self.min_y {
            self.min_y = y;
        }
        if y > self.max_y {
            self.max_y = y;
        }
    }

    /// Whether the box touches any edge of a `width` x `height` image.
    #[must_use]
    pub const fn touches_border(&self, width: u32, height: u32) -> bool {
        self.min_x == 0
            || self.min_y == 0
            || self.max_x + 1 >= width
            || self.max_y + 1 >= height
    }
}

/// Inclusive pixel-area acceptance band for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaBand {
    /// Smallest accepted area in pixels.
    pub min: u32,
    /// Largest accepted area in pixels.
    pub max: u32,
}

impl AreaBand {
    /// Whether `area` falls inside the band.
    #[must_use]
    pub const fn contains(&self, area: u32) -> bool {
        area >= self.min && area <= self.max
    }
}

/// Configuration for the scoring engine.
///
/// Defaults match the standard CBMN scoring conventions. Area bands are
/// in pixels and therefore depend on magnification; retune them per
/// acquisition setup rather than trusting the defaults blindly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssayConfig {
    /// Minimum fraction of a nucleus/micronucleus's pixels that must lie
    /// inside a cytoplasm for assignment. Inclusive: a fraction exactly
    /// equal to the threshold qualifies.
    pub min_overlap: f64,

    /// Accepted pixel-area band for cytoplasms.
    pub cytoplasm_area: AreaBand,

    /// Accepted pixel-area band for nuclei.
    pub nucleus_area: AreaBand,

    /// Accepted pixel-area band for micronuclei. Typically far below the
    /// nucleus band.
    pub micronucleus_area: AreaBand,

    /// Reject cytoplasms whose bounding box touches the image border.
    /// A cell cut off by the field of view is not a reliable sample.
    pub reject_border: bool,

    /// Largest nucleus count still classified (1..=3). Cells with more
    /// accepted nuclei are classified `Invalid`.
    pub max_multiplicity: u8,

    /// A micronucleus whose area exceeds this fraction of the largest
    /// accepted nucleus in its cell is treated as a segmentation error.
    pub max_nucleus_fraction: f64,

    /// Cytotoxicity index of the untreated control population. When set,
    /// the reported cytotoxicity is the ratio of the raw weighted index
    /// to this baseline.
    pub control_index: Option<f64>,

    /// Report a degenerate genotoxicity denominator (no binucleated
    /// cells) as `0.0` instead of an explicit undefined value.
    pub undefined_as_zero: bool,
}

impl Default for AssayConfig {
    fn default() -> Self {
        Self {
            min_overlap: 0.5,
            cytoplasm_area: AreaBand {
                min: 200,
                max: 50_000,
            },
            nucleus_area: AreaBand {
                min: 50,
                max: 10_000,
            },
            micronucleus_area: AreaBand { min: 4, max: 500 },
            reject_border: true,
            max_multiplicity: 3,
            max_nucleus_fraction: 0.5,
            control_index: None,
            undefined_as_zero: false,
        }
    }
}

impl AssayConfig {
    /// Check the configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AssayError::InvalidConfig`] if `min_overlap` is outside
    /// `(0, 1]`, an area band is inverted, `max_multiplicity` is outside
    /// `1..=3`, `max_nucleus_fraction` is not positive, or
    /// `control_index` is present but not a positive finite number.
    pub fn validate(&self) -> Result<(), AssayError> {
        if !(self.min_overlap > 0.0 && self.min_overlap <= 1.0) {
            return Err(AssayError::InvalidConfig(format!(
                "min_overlap must be in (0, 1], got {}",
                self.min_overlap
            )));
        }
        for (name, band) in [
            ("cytoplasm_area", self.cytoplasm_area),
            ("nucleus_area", self.nucleus_area),
            ("micronucleus_area", self.micronucleus_area),
        ] {
            if band.min > band.max {
                return Err(AssayError::InvalidConfig(format!(
                    "{name} band is inverted: min {} > max {}",
                    band.min, band.max
                )));
            }
        }
        if !(1..=3).contains(&self.max_multiplicity) {
            return Err(AssayError::InvalidConfig(format!(
                "max_multiplicity must be 1..=3, got {}",
                self.max_multiplicity
            )));
        }
        if !(self.max_nucleus_fraction > 0.0) {
            return Err(AssayError::InvalidConfig(format!(
                "max_nucleus_fraction must be positive, got {}",
                self.max_nucleus_fraction
            )));
        }
        if let Some(control) = self.control_index {
            if !(control.is_finite() && control > 0.0) {
                return Err(AssayError::InvalidConfig(format!(
                    "control_index must be a positive finite number, got {control}"
                )));
            }
        }
        Ok(())
    }
}

/// Errors produced by the scoring engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssayError {
    /// A label mask fails its structural contract (dimension or length
    /// mismatch). Fatal for the affected image only.
    #[error("invalid label mask: {0}")]
    InvalidMask(String),

    /// The configuration violates an invariant.
    #[error("invalid assay configuration: {0}")]
    InvalidConfig(String),

    /// The batch was cancelled before all images were scored.
    #[error("batch cancelled before completion")]
    Cancelled,
}

/// Per-image or population-wide cell and element tallies.
///
/// All fields are plain counts, so summing tallies is commutative and
/// associative; the population tally is the field-wise sum of the image
/// tallies in any order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssayCounts {
    /// Cytoplasms that survived pre-association filtering (one record
    /// each, whatever their classification).
    pub cytoplasms: u64,
    /// Accepted nuclei owned by a record.
    pub nuclei: u64,
    /// Cells with exactly one accepted nucleus.
    pub mononucleate: u64,
    /// Cells with exactly two accepted nuclei.
    pub binucleate: u64,
    /// Cells with exactly three accepted nuclei.
    pub trinucleate: u64,
    /// Cells with zero nuclei or more than the multiplicity limit.
    pub invalid: u64,
    /// Accepted micronuclei owned by a record.
    pub micronuclei: u64,
}

impl AssayCounts {
    /// Field-wise accumulation.
    pub const fn add(&mut self, other: &Self) {
        self.cytoplasms += other.cytoplasms;
        self.nuclei += other.nuclei;
        self.mononucleate += other.mononucleate;
        self.binucleate += other.binucleate;
        self.trinucleate += other.trinucleate;
        self.invalid += other.invalid;
        self.micronuclei += other.micronuclei;
    }

    /// Cells that carry a usable classification (mono + bi + tri).
    #[must_use]
    pub const fn classified(&self) -> u64 {
        self.mononucleate + self.binucleate + self.trinucleate
    }
}

/// Why elements were dropped on the way to record construction.
///
/// Every rejection increments exactly one counter, so dropped elements are
/// auditable instead of silently vanishing from the totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAudit {
    /// Cytoplasms rejected for touching the image border.
    pub border_cytoplasms: u64,
    /// Cytoplasms rejected by the area band.
    pub area_cytoplasms: u64,
    /// Nuclei rejected by the area band.
    pub area_nuclei: u64,
    /// Micronuclei rejected by the area band.
    pub area_micronuclei: u64,
    /// Nuclei with no qualifying cytoplasm.
    pub unassigned_nuclei: u64,
    /// Micronuclei with no qualifying cytoplasm.
    pub unassigned_micronuclei: u64,
    /// Nuclei whose centroid fell outside the assigned cytoplasm on the
    /// post-association re-check.
    pub containment_nuclei: u64,
    /// Micronuclei larger than the configured fraction of their cell's
    /// main nucleus, or in a cell with no accepted nucleus.
    pub oversize_micronuclei: u64,
}

impl ImageAudit {
    /// Field-wise accumulation.
    pub const fn add(&mut self, other: &Self) {
        self.border_cytoplasms += other.border_cytoplasms;
        self.area_cytoplasms += other.area_cytoplasms;
        self.area_nuclei += other.area_nuclei;
        self.area_micronuclei += other.area_micronuclei;
        self.unassigned_nuclei += other.unassigned_nuclei;
        self.unassigned_micronuclei += other.unassigned_micronuclei;
        self.containment_nuclei += other.containment_nuclei;
        self.oversize_micronuclei += other.oversize_micronuclei;
    }

    /// Total dropped elements across all reasons.
    #[must_use]
    pub const fn total_dropped(&self) -> u64 {
        self.border_cytoplasms
            + self.area_cytoplasms
            + self.area_nuclei
            + self.area_micronuclei
            + self.unassigned_nuclei
            + self.unassigned_micronuclei
            + self.containment_nuclei
            + self.oversize_micronuclei
    }
}
