//! Plain-text batch summary for terminal output.

use std::fmt::Write;

use karyoscope_assay::{BatchResult, IndexError};

/// Render the human-readable summary block.
///
/// Skipped images and dropped-element counts are always included so a
/// reader can audit what the indices were computed from.
#[must_use]
pub fn render_summary(batch: &BatchResult) -> String {
    let mut out = String::new();
    let counts = &batch.counts;

    let _ = writeln!(out, "=== RESULTS ===");
    let _ = writeln!(
        out,
        "Images scored:         {} ({} skipped)",
        batch.images.len(),
        batch.failures.len(),
    );
    let _ = writeln!(out, "Cytoplasms:            {}", counts.cytoplasms);
    let _ = writeln!(out, "Nuclei:                {}", counts.nuclei);
    let _ = writeln!(out, "  mononucleate cells:  {}", counts.mononucleate);
    let _ = writeln!(out, "  binucleate cells:    {}", counts.binucleate);
    let _ = writeln!(out, "  trinucleate cells:   {}", counts.trinucleate);
    let _ = writeln!(out, "  invalid cells:       {}", counts.invalid);
    let _ = writeln!(out, "Micronuclei:           {}", counts.micronuclei);

    let dropped = batch.audit.total_dropped();
    let _ = writeln!(out, "Dropped elements:      {dropped}");
    if dropped > 0 {
        let audit = &batch.audit;
        for (label, count) in [
            ("border cytoplasms", audit.border_cytoplasms),
            ("area-rejected cytoplasms", audit.area_cytoplasms),
            ("area-rejected nuclei", audit.area_nuclei),
            ("area-rejected micronuclei", audit.area_micronuclei),
            ("unassigned nuclei", audit.unassigned_nuclei),
            ("unassigned micronuclei", audit.unassigned_micronuclei),
            ("containment-failed nuclei", audit.containment_nuclei),
            ("oversized micronuclei", audit.oversize_micronuclei),
        ] {
            if count > 0 {
                let _ = writeln!(out, "  {label}: {count}");
            }
        }
    }

    for failure in &batch.failures {
        let _ = writeln!(out, "Skipped {}: {}", failure.id, failure.error);
    }

    match &batch.indices {
        Ok(indices) => {
            let _ = writeln!(out, "\nCytotoxicity index:    {:.4}", indices.cytotoxicity);
            let _ = writeln!(out, "Genotoxicity index:    {}", indices.genotoxicity);
        }
        Err(IndexError::EmptyPopulation) => {
            let _ = writeln!(out, "\nIndices: undefined ({})", IndexError::EmptyPopulation);
        }
    }

    out
}
