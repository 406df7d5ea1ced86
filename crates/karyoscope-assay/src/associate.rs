//! Spatial association of nuclei and micronuclei to cytoplasms.
//!
//! For each child element the engine measures, exactly, the fraction of
//! its pixels carrying each accepted cytoplasm's label in the cytoplasm
//! mask. This is a per-pixel histogram, not a bounding-box or centroid
//! approximation, so partial overlaps at cell boundaries are resolved by
//! actual membership.
//!
//! # Determinism
//!
//! Each child is assigned independently of every other child, so the
//! result does not depend on iteration order. Ties on the maximal overlap
//! fraction go to the cytoplasm with the larger area; a tie on area too
//! falls back to the smaller cytoplasm id. Both steps are exercised by
//! tests below because biological ambiguity at shared boundaries is
//! unavoidable and the choice must at least be reproducible.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::element::CellElement;
use crate::mask::LabelMask;

/// Assign each child to at most one accepted cytoplasm.
///
/// Returns one entry per child, aligned with `children`: the id of the
/// owning cytoplasm, or `None` when no cytoplasm reaches `min_overlap`
/// (the child is then dropped by the caller and audited, never silently
/// re-assigned).
pub(crate) fn associate(
    children: &[CellElement],
    cytoplasms: &[CellElement],
    cytoplasm_mask: &LabelMask,
    min_overlap: f64,
) -> Vec<Option<u32>> {
    // Accepted parents only: labels that survived filtering. Pixels
    // belonging to rejected cytoplasms count as background here.
    let parent_areas: BTreeMap<u32, u32> = cytoplasms
        .iter()
        .map(|c| (c.id(), c.area()))
        .collect();

    children
        .iter()
        .map(|child| assign_one(child, &parent_areas, cytoplasm_mask, min_overlap))
        .collect()
}

fn assign_one(
    child: &CellElement,
    parent_areas: &BTreeMap<u32, u32>,
    cytoplasm_mask: &LabelMask,
    min_overlap: f64,
) -> Option<u32> {
    let mut histogram: BTreeMap<u32, u32> = BTreeMap::new();
    for &(x, y) in child.pixels() {
        let label = cytoplasm_mask.label_at(x, y);
        if label != 0 && parent_areas.contains_key(&label) {
            *histogram.entry(label).or_insert(0) += 1;
        }
    }

    // Ascending-id iteration plus strictly-greater comparisons makes the
    // smaller id win the final tie by construction.
    let mut best: Option<(u32, u32)> = None;
    for (&id, &count) in &histogram {
        let replace = match best {
            None => true,
            Some((best_id, best_count)) => {
                count > best_count
                    || (count == best_count && parent_areas[&id] > parent_areas[&best_id])
            }
        };
        if replace {
            best = Some((id, count));
        }
    }

    let (id, count) = best?;
    let fraction = f64::from(count) / f64::from(child.area());
    if fraction >= min_overlap {
        debug!(
            "{} {} -> cytoplasm {id} (overlap {fraction:.3})",
            child.category(),
            child.id(),
        );
        Some(id)
    } else {
        warn!(
            "{} {} unassigned: best overlap {fraction:.3} below threshold {min_overlap}",
            child.category(),
            child.id(),
        );
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Category;

    fn mask(rows: &[&[u32]]) -> LabelMask {
        let height = u32::try_from(rows.len()).unwrap();
        let width = u32::try_from(rows[0].len()).unwrap();
        let labels = rows.iter().flat_map(|row| row.iter().copied()).collect();
        LabelMask::from_raw(width, height, labels).unwrap()
    }

    fn decode(mask: &LabelMask, category: Category) -> Vec<CellElement> {
        mask.decode_elements(category)
    }

    #[test]
    fn child_fully_inside_is_assigned() {
        let cyto_mask = mask(&[
            &[1, 1, 1, 1],
            &[1, 1, 1, 1],
            &[1, 1, 1, 1],
            &[0, 0, 0, 0],
        ]);
        let nucleus_mask = mask(&[
            &[0, 0, 0, 0],
            &[0, 5, 5, 0],
            &[0, 0, 0, 0],
            &[0, 0, 0, 0],
        ]);
        let cytoplasms = decode(&cyto_mask, Category::Cytoplasm);
        let nuclei = decode(&nucleus_mask, Category::Nucleus);
        let assigned = associate(&nuclei, &cytoplasms, &cyto_mask, 0.5);
        assert_eq!(assigned, vec![Some(1)]);
    }

    #[test]
    fn child_outside_every_cytoplasm_is_unassigned() {
        let cyto_mask = mask(&[
            &[1, 1, 0, 0],
            &[1, 1, 0, 0],
            &[0, 0, 0, 0],
            &[0, 0, 0, 0],
        ]);
        let nucleus_mask = mask(&[
            &[0, 0, 0, 0],
            &[0, 0, 0, 0],
            &[0, 0, 0, 5],
            &[0, 0, 5, 5],
        ]);
        let cytoplasms = decode(&cyto_mask, Category::Cytoplasm);
        let nuclei = decode(&nucleus_mask, Category::Nucleus);
        let assigned = associate(&nuclei, &cytoplasms, &cyto_mask, 0.5);
        assert_eq!(assigned, vec![None]);
    }

    #[test]
    fn overlap_exactly_at_threshold_qualifies() {
        // Nucleus covers 2 pixels, one inside cytoplasm 1 and one on
        // background: fraction 0.5 against a 0.5 threshold.
        let cyto_mask = mask(&[
            &[1, 0],
            &[1, 0],
        ]);
        let nucleus_mask = mask(&[
            &[5, 5],
            &[0, 0],
        ]);
        let cytoplasms = decode(&cyto_mask, Category::Cytoplasm);
        let nuclei = decode(&nucleus_mask, Category::Nucleus);
        let assigned = associate(&nuclei, &cytoplasms, &cyto_mask, 0.5);
        assert_eq!(assigned, vec![Some(1)]);
    }

    #[test]
    fn below_threshold_is_unassigned() {
        // One of three pixels inside: fraction 0.33.
        let cyto_mask = mask(&[
            &[1, 0, 0],
            &[0, 0, 0],
        ]);
        let nucleus_mask = mask(&[
            &[5, 5, 5],
            &[0, 0, 0],
        ]);
        let cytoplasms = decode(&cyto_mask, Category::Cytoplasm);
        let nuclei = decode(&nucleus_mask, Category::Nucleus);
        let assigned = associate(&nuclei, &cytoplasms, &cyto_mask, 0.5);
        assert_eq!(assigned, vec![None]);
    }

    #[test]
    fn maximal_overlap_wins() {
        // Nucleus straddles cytoplasms 1 and 2 with 1 and 3 pixels.
        let cyto_mask = mask(&[
            &[1, 2, 2, 2],
            &[1, 2, 2, 2],
        ]);
        let nucleus_mask = mask(&[
            &[5, 5, 5, 5],
            &[0, 0, 0, 0],
        ]);
        let cytoplasms = decode(&cyto_mask, Category::Cytoplasm);
        let nuclei = decode(&nucleus_mask, Category::Nucleus);
        let assigned = associate(&nuclei, &cytoplasms, &cyto_mask, 0.5);
        assert_eq!(assigned, vec![Some(2)]);
    }

    #[test]
    fn equal_overlap_ties_to_larger_cytoplasm() {
        // Two pixels in each cytoplasm; cytoplasm 2 is larger overall.
        let cyto_mask = mask(&[
            &[1, 1, 2, 2],
            &[0, 0, 2, 2],
            &[0, 0, 2, 2],
        ]);
        let nucleus_mask = mask(&[
            &[5, 5, 5, 5],
            &[0, 0, 0, 0],
            &[0, 0, 0, 0],
        ]);
        let cytoplasms = decode(&cyto_mask, Category::Cytoplasm);
        let nuclei = decode(&nucleus_mask, Category::Nucleus);
        let assigned = associate(&nuclei, &cytoplasms, &cyto_mask, 0.5);
        assert_eq!(assigned, vec![Some(2)]);
    }

    #[test]
    fn equal_overlap_and_area_ties_to_smaller_id() {
        let cyto_mask = mask(&[
            &[1, 1, 2, 2],
            &[1, 1, 2, 2],
        ]);
        let nucleus_mask = mask(&[
            &[0, 5, 5, 0],
            &[0, 5, 5, 0],
        ]);
        let cytoplasms = decode(&cyto_mask, Category::Cytoplasm);
        let nuclei = decode(&nucleus_mask, Category::Nucleus);
        let assigned = associate(&nuclei, &cytoplasms, &cyto_mask, 0.5);
        assert_eq!(assigned, vec![Some(1)]);
    }

    #[test]
    fn rejected_cytoplasm_labels_count_as_background() {
        // The mask still carries label 1, but only cytoplasm 2 survived
        // filtering; a nucleus inside label 1 must end up unassigned.
        let cyto_mask = mask(&[
            &[1, 1, 2, 2],
            &[1, 1, 2, 2],
        ]);
        let nucleus_mask = mask(&[
            &[5, 5, 0, 0],
            &[0, 0, 0, 0],
        ]);
        let accepted: Vec<CellElement> = decode(&cyto_mask, Category::Cytoplasm)
            .into_iter()
            .filter(|c| c.id() == 2)
            .collect();
        let nuclei = decode(&nucleus_mask, Category::Nucleus);
        let assigned = associate(&nuclei, &accepted, &cyto_mask, 0.5);
        assert_eq!(assigned, vec![None]);
    }

    #[test]
    fn assignment_is_independent_of_child_order() {
        let cyto_mask = mask(&[
            &[1, 1, 0, 2, 2],
            &[1, 1, 0, 2, 2],
            &[1, 1, 0, 2, 2],
        ]);
        let nucleus_mask = mask(&[
            &[3, 0, 0, 4, 0],
            &[0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0],
        ]);
        let cytoplasms = decode(&cyto_mask, Category::Cytoplasm);
        let mut nuclei = decode(&nucleus_mask, Category::Nucleus);

        let forward = associate(&nuclei, &cytoplasms, &cyto_mask, 0.5);
        nuclei.reverse();
        let mut reversed = associate(&nuclei, &cytoplasms, &cyto_mask, 0.5);
        reversed.reverse();
        assert_eq!(forward, reversed);
        assert_eq!(forward, vec![Some(1), Some(2)]);
    }
}
