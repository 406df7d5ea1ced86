//! Label-mask and source-image loading.
//!
//! The segmentation stage writes one 2-D integer array per category per
//! image. Two on-disk forms are accepted:
//!
//! - `.npy`: a plain NumPy array of unsigned integers (the native output
//!   of the Python segmentation tooling),
//! - grayscale PNG/TIFF label maps, 8- or 16-bit, where the pixel value
//!   is the instance label.
//!
//! Whatever the source, the result is the engine's [`LabelMask`]: a
//! row-major `u32` grid with background `0`.

use std::io::Cursor;
use std::path::Path;

use image::DynamicImage;
use karyoscope_assay::LabelMask;
use log::debug;
use ndarray::Array2;
use ndarray_npy::ReadNpyExt;

use crate::IoError;

/// Load a label mask, dispatching on the file extension.
///
/// # Errors
///
/// Returns [`IoError::Io`] when the file cannot be read,
/// [`IoError::UnsupportedFormat`] when its element type cannot hold
/// instance labels, and [`IoError::Image`] / [`IoError::Assay`] for
/// decode and contract failures.
pub fn load_label_mask(path: &Path) -> Result<LabelMask, IoError> {
    let is_npy = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("npy"));
    if is_npy {
        load_npy_mask(path)
    } else {
        load_image_mask(path)
    }
}

/// Read a `.npy` label array, widening u8/u16 and narrowing u64 labels
/// to the engine's `u32` space.
fn load_npy_mask(path: &Path) -> Result<LabelMask, IoError> {
    let bytes = std::fs::read(path)?;

    if let Ok(array) = Array2::<u32>::read_npy(Cursor::new(&bytes)) {
        return array_to_mask(path, &array);
    }
    if let Ok(array) = Array2::<u16>::read_npy(Cursor::new(&bytes)) {
        return array_to_mask(path, &array.mapv(u32::from));
    }
    if let Ok(array) = Array2::<u8>::read_npy(Cursor::new(&bytes)) {
        return array_to_mask(path, &array.mapv(u32::from));
    }
    if let Ok(array) = Array2::<u64>::read_npy(Cursor::new(&bytes)) {
        let mut narrowed = Array2::<u32>::zeros(array.raw_dim());
        for (target, &value) in narrowed.iter_mut().zip(array.iter()) {
            *target = u32::try_from(value).map_err(|_| IoError::UnsupportedFormat {
                path: path.to_path_buf(),
                reason: format!("label {value} does not fit in 32 bits"),
            })?;
        }
        return array_to_mask(path, &narrowed);
    }

    Err(IoError::UnsupportedFormat {
        path: path.to_path_buf(),
        reason: "expected a 2-D npy array of u8, u16, u32, or u64 labels".to_owned(),
    })
}

fn array_to_mask(path: &Path, array: &Array2<u32>) -> Result<LabelMask, IoError> {
    let (height, width) = array.dim();
    let width = u32::try_from(width).map_err(|_| oversized(path, width))?;
    let height = u32::try_from(height).map_err(|_| oversized(path, height))?;
    // `iter` walks logical row-major order whatever the memory layout.
    let labels: Vec<u32> = array.iter().copied().collect();
    debug!("loaded {width}x{height} mask from {}", path.display());
    Ok(LabelMask::from_raw(width, height, labels)?)
}

fn oversized(path: &Path, dimension: usize) -> IoError {
    IoError::UnsupportedFormat {
        path: path.to_path_buf(),
        reason: format!("dimension {dimension} exceeds the supported image size"),
    }
}

/// Read an 8- or 16-bit grayscale label map.
///
/// Color images are refused: a label map must carry one integer per
/// pixel, and decoding labels from RGB triplets would silently corrupt
/// instance identities.
fn load_image_mask(path: &Path) -> Result<LabelMask, IoError> {
    let decoded = image::open(path)?;
    let (width, height) = (decoded.width(), decoded.height());
    let labels: Vec<u32> = match decoded {
        DynamicImage::ImageLuma8(img) => img.into_raw().into_iter().map(u32::from).collect(),
        DynamicImage::ImageLuma16(img) => img.into_raw().into_iter().map(u32::from).collect(),
        other => {
            return Err(IoError::UnsupportedFormat {
                path: path.to_path_buf(),
                reason: format!(
                    "label maps must be 8- or 16-bit grayscale, got {other:?}",
                    other = other.color()
                ),
            });
        }
    };
    debug!("loaded {width}x{height} mask from {}", path.display());
    Ok(LabelMask::from_raw(width, height, labels)?)
}

/// Load a source microscopy image as RGBA for overlay rendering.
///
/// # Errors
///
/// Returns [`IoError::Image`] when the file cannot be decoded.
pub fn load_source_image(path: &Path) -> Result<image::RgbaImage, IoError> {
    Ok(image::open(path)?.to_rgba8())
}
