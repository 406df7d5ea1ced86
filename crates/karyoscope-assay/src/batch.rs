//! Per-image sequencing and batch orchestration.
//!
//! One image's analysis is the fixed sequence decode -> pre-filter ->
//! associate -> post-filter -> classify, with no state shared between
//! images. Batches therefore score images on a rayon worker pool and
//! reduce the results with a commutative count sum, so the output is
//! bit-identical whatever order the pool finishes in. Index computation
//! waits for the whole batch: the formulas need the complete population.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};
use rayon::prelude::*;

use crate::associate::associate;
use crate::filter::ValidationFilter;
use crate::index::{IndexError, PopulationIndices, compute_indices};
use crate::mask::ImageMasks;
use crate::record::{CellRecord, build_records};
use crate::types::{AssayConfig, AssayCounts, AssayError, Category, CellClass, ImageAudit};

/// Everything derived from one image: its records, tallies, and the
/// audit of dropped elements. Recomputed each run; the label masks stay
/// the source of truth.
#[derive(Debug, Clone)]
pub struct ImageResult {
    /// Identifier from [`ImageMasks::id`].
    pub id: String,
    /// One record per accepted cytoplasm, ordered by label id.
    pub records: Vec<CellRecord>,
    /// Tallies over `records`.
    pub counts: AssayCounts,
    /// Dropped-element accounting for this image.
    pub audit: ImageAudit,
}

/// An image the batch had to skip, with the reason.
#[derive(Debug, Clone)]
pub struct ImageFailure {
    /// Identifier of the failed image.
    pub id: String,
    /// Why it was skipped.
    pub error: AssayError,
}

/// Output of a whole batch: per-image results, skipped images, summed
/// tallies, and the population indices.
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Successfully scored images, in input order.
    pub images: Vec<ImageResult>,
    /// Skipped images, in input order.
    pub failures: Vec<ImageFailure>,
    /// Field-wise sum of the per-image tallies.
    pub counts: AssayCounts,
    /// Field-wise sum of the per-image audits.
    pub audit: ImageAudit,
    /// Population indices, or why they are undefined.
    pub indices: Result<PopulationIndices, IndexError>,
}

/// Score a single image's three masks into an [`ImageResult`].
///
/// # Errors
///
/// Returns [`AssayError::InvalidConfig`] for a bad configuration and
/// [`AssayError::InvalidMask`] when the three masks disagree on
/// dimensions.
pub fn score_image(
    masks: &ImageMasks,
    config: &AssayConfig,
) -> Result<ImageResult, AssayError> {
    config.validate()?;
    masks.validate()?;

    let (width, height) = masks.dimensions();
    let mut audit = ImageAudit::default();
    let filter = ValidationFilter::new(config);

    // The three decodes are independent; association needs all of them.
    let (cytoplasm_candidates, (nucleus_candidates, micronucleus_candidates)) = rayon::join(
        || masks.cytoplasm.decode_elements(Category::Cytoplasm),
        || {
            rayon::join(
                || masks.nucleus.decode_elements(Category::Nucleus),
                || masks.micronucleus.decode_elements(Category::Micronucleus),
            )
        },
    );

    let cytoplasms =
        filter.accept_cytoplasms(cytoplasm_candidates, width, height, &mut audit);
    let nuclei = filter.accept_nuclei(nucleus_candidates, &mut audit);
    let micronuclei = filter.accept_micronuclei(micronucleus_candidates, &mut audit);

    let nucleus_parents =
        associate(&nuclei, &cytoplasms, &masks.cytoplasm, config.min_overlap);
    let micronucleus_parents =
        associate(&micronuclei, &cytoplasms, &masks.cytoplasm, config.min_overlap);

    let records = build_records(
        cytoplasms,
        nuclei,
        &nucleus_parents,
        micronuclei,
        &micronucleus_parents,
        &masks.cytoplasm,
        config,
        &mut audit,
    );

    let counts = tally(&records);
    Ok(ImageResult {
        id: masks.id.clone(),
        records,
        counts,
        audit,
    })
}

/// Tally records into counts. Invalid cells stay in the cytoplasm total,
/// keeping `mono + bi + tri + invalid == cytoplasms`.
fn tally(records: &[CellRecord]) -> AssayCounts {
    let mut counts = AssayCounts::default();
    for record in records {
        counts.cytoplasms += 1;
        counts.nuclei += record.nuclei.len() as u64;
        counts.micronuclei += record.micronuclei.len() as u64;
        match record.class {
            CellClass::Mononucleate => counts.mononucleate += 1,
            CellClass::Binucleate => counts.binucleate += 1,
            CellClass::Trinucleate => counts.trinucleate += 1,
            CellClass::Invalid => counts.invalid += 1,
        }
    }
    counts
}

/// Score a batch of images.
///
/// Images are scored in parallel; a failing image is recorded in
/// [`BatchResult::failures`] and never aborts the rest.
///
/// # Errors
///
/// Returns [`AssayError::InvalidConfig`] if the configuration is
/// rejected before any image is scored.
pub fn score_batch(
    images: &[ImageMasks],
    config: &AssayConfig,
) -> Result<BatchResult, AssayError> {
    let cancel = AtomicBool::new(false);
    score_batch_with_cancel(images, config, &cancel)
}

/// [`score_batch`] with cooperative cancellation.
///
/// The flag is checked before each image task: once set, no further
/// images are scheduled, partial results are discarded, and no
/// population indices are emitted.
///
/// # Errors
///
/// Returns [`AssayError::InvalidConfig`] for a bad configuration and
/// [`AssayError::Cancelled`] when the flag was raised before the batch
/// finished.
pub fn score_batch_with_cancel(
    images: &[ImageMasks],
    config: &AssayConfig,
    cancel: &AtomicBool,
) -> Result<BatchResult, AssayError> {
    config.validate()?;

    let outcomes: Vec<Option<Result<ImageResult, ImageFailure>>> = images
        .par_iter()
        .map(|masks| {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            Some(score_image(masks, config).map_err(|error| ImageFailure {
                id: masks.id.clone(),
                error,
            }))
        })
        .collect();

    if cancel.load(Ordering::Relaxed) {
        warn!("batch cancelled; partial results discarded");
        return Err(AssayError::Cancelled);
    }

    let mut scored = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes.into_iter().flatten() {
        match outcome {
            Ok(result) => scored.push(result),
            Err(failure) => {
                warn!("image {} skipped: {}", failure.id, failure.error);
                failures.push(failure);
            }
        }
    }

    let mut counts = AssayCounts::default();
    let mut audit = ImageAudit::default();
    for result in &scored {
        counts.add(&result.counts);
        audit.add(&result.audit);
    }

    let indices = compute_indices(&counts, config);
    info!(
        "batch scored: {} images ({} skipped), {} cells, {} dropped elements",
        scored.len(),
        failures.len(),
        counts.cytoplasms,
        audit.total_dropped(),
    );

    Ok(BatchResult {
        images: scored,
        failures,
        counts,
        audit,
        indices,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mask::LabelMask;
    use crate::types::AreaBand;

    fn mask(rows: &[&[u32]]) -> LabelMask {
        let height = u32::try_from(rows.len()).unwrap();
        let width = u32::try_from(rows[0].len()).unwrap();
        let labels = rows.iter().flat_map(|row| row.iter().copied()).collect();
        LabelMask::from_raw(width, height, labels).unwrap()
    }

    fn permissive_config() -> AssayConfig {
        AssayConfig {
            cytoplasm_area: AreaBand { min: 1, max: 10_000 },
            nucleus_area: AreaBand { min: 1, max: 10_000 },
            micronucleus_area: AreaBand { min: 1, max: 10_000 },
            ..AssayConfig::default()
        }
    }

    /// 8x8 image: one interior cytoplasm with two nuclei inside.
    fn binucleate_masks(id: &str) -> ImageMasks {
        let cytoplasm = mask(&[
            &[0, 0, 0, 0, 0, 0, 0, 0],
            &[0, 1, 1, 1, 1, 1, 1, 0],
            &[0, 1, 1, 1, 1, 1, 1, 0],
            &[0, 1, 1, 1, 1, 1, 1, 0],
            &[0, 1, 1, 1, 1, 1, 1, 0],
            &[0, 1, 1, 1, 1, 1, 1, 0],
            &[0, 1, 1, 1, 1, 1, 1, 0],
            &[0, 0, 0, 0, 0, 0, 0, 0],
        ]);
        let nucleus = mask(&[
            &[0, 0, 0, 0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0, 0, 0, 0],
            &[0, 0, 3, 3, 0, 0, 0, 0],
            &[0, 0, 3, 3, 0, 4, 4, 0],
            &[0, 0, 0, 0, 0, 4, 4, 0],
            &[0, 0, 0, 0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0, 0, 0, 0],
        ]);
        let micronucleus = LabelMask::empty(8, 8).unwrap();
        ImageMasks {
            id: id.to_owned(),
            cytoplasm,
            nucleus,
            micronucleus,
        }
    }

    #[test]
    fn single_binucleate_cell_end_to_end() {
        let result = score_image(&binucleate_masks("img"), &permissive_config()).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].class, CellClass::Binucleate);
        assert!(result.records[0].micronuclei.is_empty());
        assert_eq!(result.counts.binucleate, 1);
        assert_eq!(result.counts.nuclei, 2);
        assert_eq!(result.counts.micronuclei, 0);
    }

    #[test]
    fn class_totals_partition_the_cytoplasm_total() {
        let result = score_image(&binucleate_masks("img"), &permissive_config()).unwrap();
        let counts = result.counts;
        assert_eq!(
            counts.mononucleate + counts.binucleate + counts.trinucleate + counts.invalid,
            counts.cytoplasms,
        );
    }

    #[test]
    fn score_image_rejects_mismatched_masks() {
        let mut masks = binucleate_masks("img");
        masks.nucleus = LabelMask::empty(4, 4).unwrap();
        let result = score_image(&masks, &permissive_config());
        assert!(matches!(result, Err(AssayError::InvalidMask(_))));
    }

    #[test]
    fn bad_image_is_isolated_from_the_batch() {
        let mut broken = binucleate_masks("broken");
        broken.micronucleus = LabelMask::empty(3, 3).unwrap();
        let images = vec![binucleate_masks("good"), broken];

        let batch = score_batch(&images, &permissive_config()).unwrap();
        assert_eq!(batch.images.len(), 1);
        assert_eq!(batch.images[0].id, "good");
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].id, "broken");
        assert!(matches!(
            batch.failures[0].error,
            AssayError::InvalidMask(_),
        ));
        assert_eq!(batch.counts.binucleate, 1);
    }

    #[test]
    fn batch_counts_sum_across_images() {
        let images = vec![binucleate_masks("a"), binucleate_masks("b")];
        let batch = score_batch(&images, &permissive_config()).unwrap();
        assert_eq!(batch.counts.binucleate, 2);
        assert_eq!(batch.counts.nuclei, 4);
        let indices = batch.indices.unwrap();
        assert!((indices.cytotoxicity - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cancelled_batch_emits_no_indices() {
        let cancel = AtomicBool::new(true);
        let images = vec![binucleate_masks("a")];
        let result = score_batch_with_cancel(&images, &permissive_config(), &cancel);
        assert!(matches!(result, Err(AssayError::Cancelled)));
    }

    #[test]
    fn invalid_config_fails_before_scoring() {
        let config = AssayConfig {
            min_overlap: 2.0,
            ..permissive_config()
        };
        let result = score_batch(&[binucleate_masks("a")], &config);
        assert!(matches!(result, Err(AssayError::InvalidConfig(_))));
    }

    #[test]
    fn rescoring_is_bit_identical() {
        let images = vec![binucleate_masks("a"), binucleate_masks("b")];
        let config = permissive_config();
        let first = score_batch(&images, &config).unwrap();
        let second = score_batch(&images, &config).unwrap();

        assert_eq!(first.counts, second.counts);
        let (a, b) = (first.indices.unwrap(), second.indices.unwrap());
        assert_eq!(a.cytotoxicity.to_bits(), b.cytotoxicity.to_bits());
        assert_eq!(a.genotoxicity, b.genotoxicity);
        let classes = |batch: &BatchResult| {
            batch
                .images
                .iter()
                .flat_map(|image| image.records.iter().map(|r| r.class))
                .collect::<Vec<_>>()
        };
        assert_eq!(classes(&first), classes(&second));
    }
}
