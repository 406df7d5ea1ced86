//! Per-category acceptance rules that reject segmentation artifacts.
//!
//! Rules whose outcome does not depend on association (area bands, border
//! contact) run before the association step; rules that need a resolved
//! parent (nucleus containment re-check, micronucleus size ratio) run
//! after it. Filtering never mutates a mask. Every rejection increments
//! one [`ImageAudit`] counter so dropped elements stay visible in the
//! batch summary.

use log::warn;

use crate::element::CellElement;
use crate::mask::LabelMask;
use crate::types::{AssayConfig, ImageAudit};

/// Applies the configured acceptance rules.
pub(crate) struct ValidationFilter<'a> {
    config: &'a AssayConfig,
}

impl<'a> ValidationFilter<'a> {
    pub(crate) const fn new(config: &'a AssayConfig) -> Self {
        Self { config }
    }

    /// Border and area screening for cytoplasm candidates.
    pub(crate) fn accept_cytoplasms(
        &self,
        candidates: Vec<CellElement>,
        width: u32,
        height: u32,
        audit: &mut ImageAudit,
    ) -> Vec<CellElement> {
        candidates
            .into_iter()
            .filter(|element| {
                if self.config.reject_border && element.touches_border(width, height) {
                    warn!("cytoplasm {} rejected: touches image border", element.id());
                    audit.border_cytoplasms += 1;
                    return false;
                }
                if !self.config.cytoplasm_area.contains(element.area()) {
                    warn!(
                        "cytoplasm {} rejected: area {} outside band",
                        element.id(),
                        element.area(),
                    );
                    audit.area_cytoplasms += 1;
                    return false;
                }
                true
            })
            .collect()
    }

    /// Area screening for nucleus candidates.
    pub(crate) fn accept_nuclei(
        &self,
        candidates: Vec<CellElement>,
        audit: &mut ImageAudit,
    ) -> Vec<CellElement> {
        candidates
            .into_iter()
            .filter(|element| {
                let keep = self.config.nucleus_area.contains(element.area());
                if !keep {
                    warn!(
                        "nucleus {} rejected: area {} outside band",
                        element.id(),
                        element.area(),
                    );
                    audit.area_nuclei += 1;
                }
                keep
            })
            .collect()
    }

    /// Area screening for micronucleus candidates.
    pub(crate) fn accept_micronuclei(
        &self,
        candidates: Vec<CellElement>,
        audit: &mut ImageAudit,
    ) -> Vec<CellElement> {
        candidates
            .into_iter()
            .filter(|element| {
                let keep = self.config.micronucleus_area.contains(element.area());
                if !keep {
                    warn!(
                        "micronucleus {} rejected: area {} outside band",
                        element.id(),
                        element.area(),
                    );
                    audit.area_micronuclei += 1;
                }
                keep
            })
            .collect()
    }

    /// Post-association re-check: the nucleus centroid must carry the
    /// assigned cytoplasm's label. Catches overlap-qualified nuclei whose
    /// bulk sits in a concavity outside the cell.
    pub(crate) fn nucleus_contained(
        nucleus: &CellElement,
        cytoplasm_mask: &LabelMask,
        parent_id: u32,
    ) -> bool {
        let (x, y) = nucleus.centroid_pixel();
        if x >= cytoplasm_mask.width() || y >= cytoplasm_mask.height() {
            return false;
        }
        cytoplasm_mask.label_at(x, y) == parent_id
    }

    /// Post-association size sanity: a micronucleus larger than the
    /// configured fraction of its cell's main (largest) nucleus is a
    /// segmentation error, not biology. A cell without any accepted
    /// nucleus cannot validate the ratio, so its micronuclei are rejected.
    pub(crate) fn micronucleus_fits(
        &self,
        micronucleus: &CellElement,
        main_nucleus_area: Option<u32>,
    ) -> bool {
        main_nucleus_area.is_some_and(|area| {
            f64::from(micronucleus.area())
                <= self.config.max_nucleus_fraction * f64::from(area)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{AreaBand, Category};

    fn mask(rows: &[&[u32]]) -> LabelMask {
        let height = u32::try_from(rows.len()).unwrap();
        let width = u32::try_from(rows[0].len()).unwrap();
        let labels = rows.iter().flat_map(|row| row.iter().copied()).collect();
        LabelMask::from_raw(width, height, labels).unwrap()
    }

    fn permissive_config() -> AssayConfig {
        AssayConfig {
            cytoplasm_area: AreaBand { min: 1, max: 1_000 },
            nucleus_area: AreaBand { min: 1, max: 1_000 },
            micronucleus_area: AreaBand { min: 1, max: 1_000 },
            ..AssayConfig::default()
        }
    }

    #[test]
    fn border_cytoplasm_rejected_when_enabled() {
        let cyto_mask = mask(&[
            &[1, 1, 0, 0],
            &[1, 1, 0, 0],
            &[0, 0, 0, 0],
            &[0, 0, 0, 0],
        ]);
        let config = permissive_config();
        let filter = ValidationFilter::new(&config);
        let mut audit = ImageAudit::default();
        let accepted = filter.accept_cytoplasms(
            cyto_mask.decode_elements(Category::Cytoplasm),
            4,
            4,
            &mut audit,
        );
        assert!(accepted.is_empty());
        assert_eq!(audit.border_cytoplasms, 1);
    }

    #[test]
    fn border_cytoplasm_kept_when_disabled() {
        let cyto_mask = mask(&[
            &[1, 1, 0, 0],
            &[1, 1, 0, 0],
            &[0, 0, 0, 0],
            &[0, 0, 0, 0],
        ]);
        let config = AssayConfig {
            reject_border: false,
            ..permissive_config()
        };
        let filter = ValidationFilter::new(&config);
        let mut audit = ImageAudit::default();
        let accepted = filter.accept_cytoplasms(
            cyto_mask.decode_elements(Category::Cytoplasm),
            4,
            4,
            &mut audit,
        );
        assert_eq!(accepted.len(), 1);
        assert_eq!(audit.border_cytoplasms, 0);
    }

    #[test]
    fn border_disabled_still_applies_area_band() {
        let cyto_mask = mask(&[
            &[1, 1, 0, 0],
            &[1, 1, 0, 0],
            &[0, 0, 0, 0],
            &[0, 0, 0, 0],
        ]);
        let config = AssayConfig {
            reject_border: false,
            cytoplasm_area: AreaBand { min: 10, max: 1_000 },
            ..permissive_config()
        };
        let filter = ValidationFilter::new(&config);
        let mut audit = ImageAudit::default();
        let accepted = filter.accept_cytoplasms(
            cyto_mask.decode_elements(Category::Cytoplasm),
            4,
            4,
            &mut audit,
        );
        assert!(accepted.is_empty());
        assert_eq!(audit.area_cytoplasms, 1);
    }

    #[test]
    fn nucleus_area_band_applies() {
        let nucleus_mask = mask(&[
            &[0, 0, 0, 0],
            &[0, 1, 0, 0],
            &[0, 0, 2, 2],
            &[0, 0, 2, 2],
        ]);
        let config = AssayConfig {
            nucleus_area: AreaBand { min: 2, max: 1_000 },
            ..permissive_config()
        };
        let filter = ValidationFilter::new(&config);
        let mut audit = ImageAudit::default();
        let accepted =
            filter.accept_nuclei(nucleus_mask.decode_elements(Category::Nucleus), &mut audit);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].id(), 2);
        assert_eq!(audit.area_nuclei, 1);
    }

    #[test]
    fn containment_recheck_uses_centroid_label() {
        let cyto_mask = mask(&[
            &[1, 1, 0, 0],
            &[1, 1, 0, 0],
            &[0, 0, 0, 0],
            &[0, 0, 0, 0],
        ]);
        let inside = mask(&[
            &[0, 5, 0, 0],
            &[0, 5, 0, 0],
            &[0, 0, 0, 0],
            &[0, 0, 0, 0],
        ]);
        let nucleus = &inside.decode_elements(Category::Nucleus)[0];
        assert!(ValidationFilter::nucleus_contained(
            nucleus, &cyto_mask, 1
        ));
        assert!(!ValidationFilter::nucleus_contained(
            nucleus, &cyto_mask, 2
        ));
    }

    #[test]
    fn micronucleus_ratio_against_main_nucleus() {
        let mn_mask = mask(&[
            &[0, 0, 0, 0],
            &[0, 3, 3, 0],
            &[0, 3, 3, 0],
            &[0, 0, 0, 0],
        ]);
        let micronucleus = &mn_mask.decode_elements(Category::Micronucleus)[0];
        let config = permissive_config();
        let filter = ValidationFilter::new(&config);

        // Area 4 vs main nucleus 8: exactly the 0.5 limit, accepted.
        assert!(filter.micronucleus_fits(micronucleus, Some(8)));
        // Main nucleus 6: 4 > 3, a segmentation artifact.
        assert!(!filter.micronucleus_fits(micronucleus, Some(6)));
        // No accepted nucleus in the cell: nothing to validate against.
        assert!(!filter.micronucleus_fits(micronucleus, None));
    }
}
