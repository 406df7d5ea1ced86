//! Instance-segmentation label masks and their decoding into elements.
//!
//! A [`LabelMask`] is the engine's only input contract with the
//! segmentation stage: a row-major grid of non-negative integers at the
//! source image's resolution, where `0` is background and every positive
//! value identifies one candidate object instance. Masks are immutable
//! once constructed; decoding produces [`CellElement`]s and never writes
//! back.

use std::collections::BTreeMap;

use crate::element::CellElement;
use crate::types::{AssayError, BoundingBox, Category};

/// One instance-segmentation result for one image and one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMask {
    width: u32,
    height: u32,
    labels: Vec<u32>,
}

impl LabelMask {
    /// Wrap a row-major label grid.
    ///
    /// # Errors
    ///
    /// Returns [`AssayError::InvalidMask`] when either dimension is zero
    /// or `labels.len()` differs from `width * height`.
    pub fn from_raw(width: u32, height: u32, labels: Vec<u32>) -> Result<Self, AssayError> {
        if width == 0 || height == 0 {
            return Err(AssayError::InvalidMask(format!(
                "dimensions must be non-zero, got {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize;
        if labels.len() != expected {
            return Err(AssayError::InvalidMask(format!(
                "label buffer holds {} values but {width}x{height} needs {expected}",
                labels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            labels,
        })
    }

    /// An all-background mask, for images where a category detected
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`AssayError::InvalidMask`] when either dimension is zero.
    pub fn empty(width: u32, height: u32) -> Result<Self, AssayError> {
        let len = width as usize * height as usize;
        Self::from_raw(width, height, vec![0; len])
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// The label at `(x, y)`. Coordinates must be in bounds.
    #[must_use]
    pub fn label_at(&self, x: u32, y: u32) -> u32 {
        debug_assert!(x < self.width && y < self.height);
        self.labels[y as usize * self.width as usize + x as usize]
    }

    /// Decode every labeled instance into a [`CellElement`].
    ///
    /// Single pass over the grid, accumulating per-label area, centroid
    /// sums, bounding box, and the sparse pixel set. Elements are returned
    /// sorted by label id, so downstream iteration order is deterministic
    /// whatever order the segmentation stage numbered its instances in.
    #[must_use]
    pub fn decode_elements(&self, category: Category) -> Vec<CellElement> {
        struct Accum {
            sum_x: u64,
            sum_y: u64,
            bbox: BoundingBox,
            pixels: Vec<(u32, u32)>,
        }

        let mut found: BTreeMap<u32, Accum> = BTreeMap::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let label = self.label_at(x, y);
                if label == 0 {
                    continue;
                }
                found
                    .entry(label)
                    .and_modify(|accum| {
                        accum.sum_x += u64::from(x);
                        accum.sum_y += u64::from(y);
                        accum.bbox.include(x, y);
                        accum.pixels.push((x, y));
                    })
                    .or_insert_with(|| Accum {
                        sum_x: u64::from(x),
                        sum_y: u64::from(y),
                        bbox: BoundingBox::at(x, y),
                        pixels: vec![(x, y)],
                    });
            }
        }

        found
            .into_iter()
            .map(|(id, accum)| {
                #[allow(clippy::cast_precision_loss)]
                let count = accum.pixels.len() as f64;
                #[allow(clippy::cast_precision_loss)]
                let centroid = (accum.sum_x as f64 / count, accum.sum_y as f64 / count);
                CellElement::new(id, category, centroid, accum.bbox, accum.pixels)
            })
            .collect()
    }
}

/// The three label masks for one image.
///
/// Masks arrive from the segmentation stage in whatever channel order the
/// caller assembled; the engine validates their structural contract at
/// scoring time, so a malformed bundle fails that image alone rather than
/// the whole batch.
#[derive(Debug, Clone)]
pub struct ImageMasks {
    /// Identifier carried through to results, typically the image filename.
    pub id: String,
    /// Cytoplasm instances (the parents).
    pub cytoplasm: LabelMask,
    /// Nucleus instances.
    pub nucleus: LabelMask,
    /// Micronucleus instances.
    pub micronucleus: LabelMask,
}

impl ImageMasks {
    /// Check that the three masks share one resolution.
    ///
    /// # Errors
    ///
    /// Returns [`AssayError::InvalidMask`] when the nucleus or
    /// micronucleus mask differs in size from the cytoplasm mask.
    pub fn validate(&self) -> Result<(), AssayError> {
        let reference = self.dimensions();
        for (category, mask) in [
            (Category::Nucleus, &self.nucleus),
            (Category::Micronucleus, &self.micronucleus),
        ] {
            if (mask.width(), mask.height()) != reference {
                return Err(AssayError::InvalidMask(format!(
                    "{category} mask is {}x{} but the cytoplasm mask is {}x{}",
                    mask.width(),
                    mask.height(),
                    reference.0,
                    reference.1
                )));
            }
        }
        Ok(())
    }

    /// Pixel dimensions of the cytoplasm mask, which the other two must
    /// match.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.cytoplasm.width(), self.cytoplasm.height())
    }
}
