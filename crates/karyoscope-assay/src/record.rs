//! Per-cell aggregation: one record per accepted cytoplasm.
//!
//! A [`CellRecord`] owns its cytoplasm element and the nuclei and
//! micronuclei resolved to it. Ownership is disjoint by construction:
//! the association step maps every child to at most one cytoplasm, and
//! children that map nowhere are audited and dropped before records are
//! built, so no element can appear under two cells.

use std::collections::BTreeMap;

use log::warn;

use crate::element::CellElement;
use crate::filter::ValidationFilter;
use crate::mask::LabelMask;
use crate::types::{AssayConfig, CellClass, ImageAudit};

/// One scored cell: cytoplasm, its nuclei and micronuclei, and the
/// nuclear-multiplicity classification.
#[derive(Debug, Clone, PartialEq)]
pub struct CellRecord {
    /// The cell body.
    pub cytoplasm: CellElement,
    /// Accepted nuclei, ordered by label id.
    pub nuclei: Vec<CellElement>,
    /// Accepted micronuclei, ordered by label id.
    pub micronuclei: Vec<CellElement>,
    /// Classification derived from `nuclei.len()`.
    pub class: CellClass,
}

/// Map an accepted-nucleus count to a classification.
///
/// Counts above `max_multiplicity` (and zero) are `Invalid`: such cells
/// cannot be scored for multinucleation but still occupy a record so the
/// total-cytoplasm tally stays complete.
#[must_use]
pub fn classify(nucleus_count: usize, max_multiplicity: u8) -> CellClass {
    if nucleus_count == 0 || nucleus_count > usize::from(max_multiplicity) {
        return CellClass::Invalid;
    }
    match nucleus_count {
        1 => CellClass::Mononucleate,
        2 => CellClass::Binucleate,
        _ => CellClass::Trinucleate,
    }
}

/// Group associated children under their cytoplasms, run the
/// post-association rules, and classify each cell.
///
/// `nucleus_parents` / `micronucleus_parents` are the association results,
/// aligned with the child slices. Cytoplasms arrive sorted by id from the
/// decode step and records are emitted in that order.
#[allow(clippy::too_many_arguments)]
pub(crate) fn build_records(
    cytoplasms: Vec<CellElement>,
    nuclei: Vec<CellElement>,
    nucleus_parents: &[Option<u32>],
    micronuclei: Vec<CellElement>,
    micronucleus_parents: &[Option<u32>],
    cytoplasm_mask: &LabelMask,
    config: &AssayConfig,
    audit: &mut ImageAudit,
) -> Vec<CellRecord> {
    let filter = ValidationFilter::new(config);

    // Nuclei: drop unassigned, re-check containment, then group.
    let mut nuclei_by_cell: BTreeMap<u32, Vec<CellElement>> = BTreeMap::new();
    for (nucleus, parent) in nuclei.into_iter().zip(nucleus_parents) {
        let Some(parent_id) = *parent else {
            audit.unassigned_nuclei += 1;
            continue;
        };
        if !ValidationFilter::nucleus_contained(&nucleus, cytoplasm_mask, parent_id) {
            warn!(
                "nucleus {} rejected: centroid outside cytoplasm {parent_id}",
                nucleus.id(),
            );
            audit.containment_nuclei += 1;
            continue;
        }
        nuclei_by_cell.entry(parent_id).or_default().push(nucleus);
    }

    // Micronuclei: drop unassigned, group; the size-ratio rule needs the
    // cell's main nucleus and runs below.
    let mut micronuclei_by_cell: BTreeMap<u32, Vec<CellElement>> = BTreeMap::new();
    for (micronucleus, parent) in micronuclei.into_iter().zip(micronucleus_parents) {
        let Some(parent_id) = *parent else {
            audit.unassigned_micronuclei += 1;
            continue;
        };
        micronuclei_by_cell
            .entry(parent_id)
            .or_default()
            .push(micronucleus);
    }

    cytoplasms
        .into_iter()
        .map(|cytoplasm| {
            let nuclei = nuclei_by_cell.remove(&cytoplasm.id()).unwrap_or_default();
            let main_nucleus_area = nuclei.iter().map(CellElement::area).max();

            let micronuclei = micronuclei_by_cell
                .remove(&cytoplasm.id())
                .unwrap_or_default()
                .into_iter()
                .filter(|mn| {
                    let keep = filter.micronucleus_fits(mn, main_nucleus_area);
                    if !keep {
                        warn!(
                            "micronucleus {} rejected: larger than {} of main nucleus",
                            mn.id(),
                            config.max_nucleus_fraction,
                        );
                        audit.oversize_micronuclei += 1;
                    }
                    keep
                })
                .collect();

            let class = classify(nuclei.len(), config.max_multiplicity);
            CellRecord {
                cytoplasm,
                nuclei,
                micronuclei,
                class,
            }
        })
        .collect()
}
