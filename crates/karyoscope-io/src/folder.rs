//! Batch directory discovery.

use std::path::{Path, PathBuf};

use log::debug;

use crate::IoError;

/// File extensions treated as batch images, lowercase.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "tif", "tiff"];

/// List the microscopy images directly inside `dir`, sorted by filename.
///
/// Only the extensions in [`IMAGE_EXTENSIONS`] are picked up (case
/// insensitive); mask files and reports sitting next to the images are
/// ignored. Sorting makes batch order, and therefore result order,
/// deterministic across runs and filesystems.
///
/// # Errors
///
/// Returns [`IoError::Io`] when the directory cannot be read.
pub fn discover_images(dir: &Path) -> Result<Vec<PathBuf>, IoError> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_image_extension(&path) {
            images.push(path);
        }
    }
    images.sort();
    debug!("discovered {} images in {}", images.len(), dir.display());
    Ok(images)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let lower = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&lower.as_str())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_extensions() {
        assert!(has_image_extension(Path::new("a/b/cell.png")));
        assert!(has_image_extension(Path::new("cell.TIF")));
        assert!(has_image_extension(Path::new("cell.Jpeg")));
        assert!(!has_image_extension(Path::new("cell.npy")));
        assert!(!has_image_extension(Path::new("cell.txt")));
        assert!(!has_image_extension(Path::new("cell")));
    }
}
