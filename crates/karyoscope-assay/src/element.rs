//! Biological object instances decoded from a label mask.

use crate::types::{BoundingBox, Category};

/// One detected object instance: a cytoplasm, a nucleus, or a micronucleus.
///
/// Carries the sparse pixel-membership set plus geometry derived from it in
/// a single decode pass. Elements are immutable once decoded; associations
/// are recorded externally as id maps, never as links between elements, so
/// the owning [`CellRecord`](crate::CellRecord) stays the single authority
/// for parent/child relationships.
#[derive(Debug, Clone, PartialEq)]
pub struct CellElement {
    id: u32,
    category: Category,
    area: u32,
    centroid: (f64, f64),
    bbox: BoundingBox,
    pixels: Vec<(u32, u32)>,
}

impl CellElement {
    pub(crate) fn new(
        id: u32,
        category: Category,
        centroid: (f64, f64),
        bbox: BoundingBox,
        pixels: Vec<(u32, u32)>,
    ) -> Self {
        // Area is the membership count by definition. u32 is ample: a
        // label cannot cover more pixels than a u32-indexed image holds.
        #[allow(clippy::cast_possible_truncation)]
        let area = pixels.len() as u32;
        Self {
            id,
            category,
            area,
            centroid,
            bbox,
            pixels,
        }
    }

    /// Label value in the source mask, unique within its category.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Which mask this element was decoded from.
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    /// Pixel count.
    #[must_use]
    pub const fn area(&self) -> u32 {
        self.area
    }

    /// Mean pixel coordinate, in (x, y) order.
    #[must_use]
    pub const fn centroid(&self) -> (f64, f64) {
        self.centroid
    }

    /// The centroid rounded to the nearest pixel, for label-map lookups.
    #[must_use]
    pub fn centroid_pixel(&self) -> (u32, u32) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let pixel = (
            self.centroid.0.round().max(0.0) as u32,
            self.centroid.1.round().max(0.0) as u32,
        );
        pixel
    }

    /// Bounding box over the membership set.
    #[must_use]
    pub const fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// The sparse pixel-membership set, in row-major order.
    #[must_use]
    pub fn pixels(&self) -> &[(u32, u32)] {
        &self.pixels
    }

    /// Whether the element's bounding box touches the edge of a
    /// `width` x `height` image.
    #[must_use]
    pub const fn touches_border(&self, width: u32, height: u32) -> bool {
        self.bbox.touches_border(width, height)
    }
}
