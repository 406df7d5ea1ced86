//! karyoscope-io: filesystem plumbing around the scoring engine.
//!
//! Three concerns live here, all kept out of `karyoscope-assay` so the
//! engine stays sans-IO:
//!
//! - [`folder`]: discover the microscopy images of a batch directory.
//! - [`load`]: read label masks (`.npy` arrays or PNG label maps) and
//!   source images into memory.
//! - [`provider`]: the [`SegmentationProvider`] seam. External
//!   segmentation models change their return shapes between versions;
//!   everything behind this trait hands the engine one fixed, versioned
//!   bundle of three masks per image.

pub mod folder;
pub mod load;
pub mod provider;

pub use folder::discover_images;
pub use load::{load_label_mask, load_source_image};
pub use provider::{
    PrecomputedMasks, SEGMENTATION_SHAPE_VERSION, SegmentationOutput, SegmentationProvider,
    load_image_masks,
};

/// Errors from discovery, loading, and mask assembly.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Filesystem failure.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// The file exists but is not a decodable image.
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    /// The file exists but is not a readable `.npy` array.
    #[error("failed to read npy mask: {0}")]
    Npy(#[from] ndarray_npy::ReadNpyError),

    /// The mask's pixel type cannot represent instance labels.
    #[error("unsupported mask format for {path}: {reason}")]
    UnsupportedFormat {
        /// Offending file.
        path: std::path::PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// No mask file found for an image under the expected names.
    #[error("no {category} mask found for image '{stem}' (tried .npy and .png)")]
    MissingMask {
        /// Image filename stem the mask was searched for.
        stem: String,
        /// Which of the three masks is missing.
        category: karyoscope_assay::Category,
    },

    /// The loaded data violates the engine's mask contract.
    #[error(transparent)]
    Assay(#[from] karyoscope_assay::AssayError),
}
