//! The segmentation provider seam.
//!
//! Segmentation models are external and their APIs drift: the Python
//! tooling this replaces had to branch on how many values the model call
//! returned. Everything behind [`SegmentationProvider`] absorbs that
//! instability and hands the engine one fixed result shape, stamped with
//! a version number so downstream tooling can detect contract changes.

use std::path::{Path, PathBuf};

use karyoscope_assay::{Category, ImageMasks, LabelMask};
use log::debug;

use crate::IoError;
use crate::load::load_label_mask;

/// Version of the [`SegmentationOutput`] shape. Bump on any field change.
pub const SEGMENTATION_SHAPE_VERSION: u32 = 1;

/// The fixed bundle every provider returns: exactly one mask per
/// category, at the source image's resolution.
#[derive(Debug, Clone)]
pub struct SegmentationOutput {
    /// Shape version, [`SEGMENTATION_SHAPE_VERSION`] for this crate.
    pub version: u32,
    /// Cytoplasm instances.
    pub cytoplasm: LabelMask,
    /// Nucleus instances.
    pub nucleus: LabelMask,
    /// Micronucleus instances.
    pub micronucleus: LabelMask,
}

/// Source of segmentation results for one image.
///
/// Implementations may call a model, read precomputed files, or fabricate
/// masks in tests; the engine never sees the difference.
pub trait SegmentationProvider {
    /// Produce the three masks for the image at `image_path`.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError`] when the masks cannot be produced.
    fn segment(&self, image_path: &Path) -> Result<SegmentationOutput, IoError>;
}

/// Provider that reads masks the segmentation stage already wrote to
/// disk, using the `<image stem>_<category>.npy` convention (with a
/// `.png` fallback per file).
#[derive(Debug, Clone)]
pub struct PrecomputedMasks {
    masks_dir: PathBuf,
}

impl PrecomputedMasks {
    /// A provider reading from `masks_dir`.
    #[must_use]
    pub fn new(masks_dir: impl Into<PathBuf>) -> Self {
        Self {
            masks_dir: masks_dir.into(),
        }
    }

    fn find_mask(&self, stem: &str, category: Category) -> Result<LabelMask, IoError> {
        for extension in ["npy", "png"] {
            let candidate = self.masks_dir.join(format!("{stem}_{category}.{extension}"));
            if candidate.is_file() {
                debug!("using {} for {stem}/{category}", candidate.display());
                return load_label_mask(&candidate);
            }
        }
        Err(IoError::MissingMask {
            stem: stem.to_owned(),
            category,
        })
    }
}

impl SegmentationProvider for PrecomputedMasks {
    fn segment(&self, image_path: &Path) -> Result<SegmentationOutput, IoError> {
        let stem = image_stem(image_path);
        Ok(SegmentationOutput {
            version: SEGMENTATION_SHAPE_VERSION,
            cytoplasm: self.find_mask(&stem, Category::Cytoplasm)?,
            nucleus: self.find_mask(&stem, Category::Nucleus)?,
            micronucleus: self.find_mask(&stem, Category::Micronucleus)?,
        })
    }
}

/// Run a provider for one image and bundle the result into the engine's
/// input type, using the image filename as the result identifier.
///
/// # Errors
///
/// Propagates the provider's [`IoError`].
pub fn load_image_masks(
    provider: &dyn SegmentationProvider,
    image_path: &Path,
) -> Result<ImageMasks, IoError> {
    let output = provider.segment(image_path)?;
    let id = image_path
        .file_name()
        .map_or_else(|| image_path.display().to_string(), |name| {
            name.to_string_lossy().into_owned()
        });
    Ok(ImageMasks {
        id,
        cytoplasm: output.cytoplasm,
        nucleus: output.nucleus,
        micronucleus: output.micronucleus,
    })
}

fn image_stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(String::new, |stem| stem.to_string_lossy().into_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn stem_strips_directory_and_extension() {
        assert_eq!(image_stem(Path::new("/data/run1/field_03.tif")), "field_03");
        assert_eq!(image_stem(Path::new("plain.png")), "plain");
    }

    #[test]
    fn missing_mask_reports_stem_and_category() {
        let provider = PrecomputedMasks::new("/definitely/not/here");
        let result = provider.segment(Path::new("/data/field_03.tif"));
        assert!(matches!(
            result,
            Err(IoError::MissingMask {
                ref stem,
                category: Category::Cytoplasm,
            }) if stem == "field_03",
        ));
    }
}
