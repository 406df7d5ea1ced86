//! Overlay rendering: detected elements outlined on the source image.
//!
//! Each element's outline is traced from its own pixel membership via
//! border following on a small local patch, so overlays show the actual
//! segmented boundary rather than a bounding box. Layers can be toggled
//! per category to reproduce any subset of the classic
//! cytoplasm/nuclei/micronuclei/centroid composite.

use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::contours::Contour;
use imageproc::drawing::{draw_cross_mut, draw_line_segment_mut};
use karyoscope_assay::{CellElement, ImageResult};
use log::debug;

const CYTOPLASM_COLOR: Rgba<u8> = Rgba([64, 200, 64, 255]);
const NUCLEUS_COLOR: Rgba<u8> = Rgba([80, 120, 255, 255]);
const MICRONUCLEUS_COLOR: Rgba<u8> = Rgba([255, 80, 80, 255]);
const CENTROID_COLOR: Rgba<u8> = Rgba([255, 220, 40, 255]);

/// Which overlay layers to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayLayers {
    /// Cytoplasm outlines.
    pub cytoplasm: bool,
    /// Nucleus outlines.
    pub nuclei: bool,
    /// Micronucleus outlines.
    pub micronuclei: bool,
    /// Centroid crosses on nuclei and micronuclei.
    pub centroids: bool,
}

impl Default for OverlayLayers {
    fn default() -> Self {
        Self::all()
    }
}

impl OverlayLayers {
    /// Every layer enabled.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            cytoplasm: true,
            nuclei: true,
            micronuclei: true,
            centroids: true,
        }
    }

    /// Decode a 4-bit layer mask: bit 0 cytoplasm, bit 1 nuclei,
    /// bit 2 micronuclei, bit 3 centroids (so `0b1111` is everything).
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self {
            cytoplasm: bits & 0b0001 != 0,
            nuclei: bits & 0b0010 != 0,
            micronuclei: bits & 0b0100 != 0,
            centroids: bits & 0b1000 != 0,
        }
    }
}

/// Draw the requested layers for every record onto a copy of `base`.
///
/// Elements outside the base image's bounds (possible when the caller
/// pairs a result with the wrong photo) are clipped, not an error.
#[must_use]
pub fn render_overlay(
    base: &RgbaImage,
    result: &ImageResult,
    layers: OverlayLayers,
) -> RgbaImage {
    let mut canvas = base.clone();
    debug!(
        "rendering overlay for {} ({} records)",
        result.id,
        result.records.len(),
    );

    for record in &result.records {
        if layers.cytoplasm {
            draw_outline(&mut canvas, &record.cytoplasm, CYTOPLASM_COLOR);
        }
        if layers.nuclei {
            for nucleus in &record.nuclei {
                draw_outline(&mut canvas, nucleus, NUCLEUS_COLOR);
            }
        }
        if layers.micronuclei {
            for micronucleus in &record.micronuclei {
                draw_outline(&mut canvas, micronucleus, MICRONUCLEUS_COLOR);
            }
        }
        if layers.centroids {
            for element in record.nuclei.iter().chain(&record.micronuclei) {
                let (x, y) = element.centroid_pixel();
                if x < canvas.width() && y < canvas.height() {
                    #[allow(clippy::cast_possible_wrap)]
                    draw_cross_mut(&mut canvas, CENTROID_COLOR, x as i32, y as i32);
                }
            }
        }
    }

    canvas
}

/// Trace and stroke one element's boundary.
///
/// The element's pixels are stamped onto a bbox-sized patch with a one
/// pixel margin, border-followed there, and the contour segments drawn
/// back in image coordinates.
fn draw_outline(canvas: &mut RgbaImage, element: &CellElement, color: Rgba<u8>) {
    let bbox = element.bbox();
    let patch_width = bbox.max_x - bbox.min_x + 3;
    let patch_height = bbox.max_y - bbox.min_y + 3;
    let mut patch = GrayImage::new(patch_width, patch_height);
    for &(x, y) in element.pixels() {
        patch.put_pixel(x - bbox.min_x + 1, y - bbox.min_y + 1, Luma([255]));
    }

    #[allow(clippy::cast_precision_loss)]
    let offset = (bbox.min_x as f32 - 1.0, bbox.min_y as f32 - 1.0);
    let contours: Vec<Contour<u32>> = imageproc::contours::find_contours(&patch);
    for contour in contours {
        let points = contour.points;
        if points.len() < 2 {
            continue;
        }
        #[allow(clippy::cast_precision_loss)]
        let to_canvas =
            |p: &imageproc::point::Point<u32>| (p.x as f32 + offset.0, p.y as f32 + offset.1);
        for pair in points.windows(2) {
            draw_line_segment_mut(canvas, to_canvas(&pair[0]), to_canvas(&pair[1]), color);
        }
        // Close the loop.
        if let (Some(first), Some(last)) = (points.first(), points.last()) {
            draw_line_segment_mut(canvas, to_canvas(last), to_canvas(first), color);
        }
    }
}
