//! Score a folder of segmented microscopy images: load the per-image
//! label masks, run the scoring engine over the batch, print the summary,
//! and optionally write a JSON report and per-image overlays.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::Parser;
use karyoscope_assay::{AssayConfig, score_batch};
use karyoscope_io::{PrecomputedMasks, discover_images, load_image_masks, load_source_image};
use karyoscope_report::{BatchReport, OverlayLayers, render_overlay, render_summary};
use log::{info, warn};

/// Score a folder of segmented microscopy images for cytotoxicity and
/// genotoxicity.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Folder containing the batch's microscopy images.
    input: PathBuf,

    /// Folder holding the precomputed label masks
    /// (`<image stem>_cytoplasm.npy` and friends).
    ///
    /// Defaults to `<input>/masks`.
    #[arg(long)]
    masks: Option<PathBuf>,

    /// Write a JSON report to this path.
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Write overlay images into this folder.
    #[arg(long)]
    overlays: Option<PathBuf>,

    /// Overlay layer mask: bit 0 cytoplasm, bit 1 nuclei,
    /// bit 2 micronuclei, bit 3 centroids.
    #[arg(long, default_value_t = 0b1111)]
    layers: u8,

    /// Load the scoring configuration from a JSON file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cytotoxicity baseline of the untreated control population.
    /// Overrides the configuration file.
    #[arg(long)]
    control: Option<f64>,

    /// Keep cells whose bounding box touches the image border.
    #[arg(long)]
    keep_border: bool,

    /// Minimum fraction of a nucleus's pixels that must fall inside a
    /// cytoplasm for assignment. Overrides the configuration file.
    #[arg(long)]
    min_overlap: Option<f64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = resolve_config(&args)?;
    let masks_dir = args
        .masks
        .clone()
        .unwrap_or_else(|| args.input.join("masks"));

    let image_paths = discover_images(&args.input)?;
    if image_paths.is_empty() {
        return Err(format!("no images found in {}", args.input.display()).into());
    }
    info!(
        "scoring {} images from {} with masks from {}",
        image_paths.len(),
        args.input.display(),
        masks_dir.display(),
    );

    // Missing or unreadable masks skip that image, mirroring how the
    // engine isolates scoring failures.
    let provider = PrecomputedMasks::new(&masks_dir);
    let mut bundles = Vec::new();
    let mut unloadable = Vec::new();
    for path in &image_paths {
        match load_image_masks(&provider, path) {
            Ok(masks) => bundles.push(masks),
            Err(error) => {
                warn!("{}: {error}", path.display());
                unloadable.push((path.clone(), error));
            }
        }
    }

    let batch = score_batch(&bundles, &config)?;

    print!("{}", render_summary(&batch));
    for (path, error) in &unloadable {
        println!("Not scored {}: {error}", path.display());
    }

    if let Some(report_path) = &args.report {
        let report = BatchReport::from_batch(&batch);
        karyoscope_report::write_json_file(report_path, &report)?;
        println!("\nJSON report written to {}", report_path.display());
    }

    if let Some(overlay_dir) = &args.overlays {
        let written = write_overlays(
            overlay_dir,
            &image_paths,
            &batch,
            OverlayLayers::from_bits(args.layers),
        )?;
        println!("{written} overlay images written to {}", overlay_dir.display());
    }

    Ok(())
}

/// Base configuration from the optional JSON file, then CLI overrides.
fn resolve_config(args: &Args) -> Result<AssayConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            serde_json::from_str(&text)
                .map_err(|e| format!("cannot parse {}: {e}", path.display()))?
        }
        None => AssayConfig::default(),
    };
    if let Some(control) = args.control {
        config.control_index = Some(control);
    }
    if args.keep_border {
        config.reject_border = false;
    }
    if let Some(min_overlap) = args.min_overlap {
        config.min_overlap = min_overlap;
    }
    config.validate()?;
    Ok(config)
}

/// Render and save one overlay per scored image. Returns how many were
/// written; images whose source photo cannot be reloaded are skipped
/// with a warning.
fn write_overlays(
    overlay_dir: &Path,
    image_paths: &[PathBuf],
    batch: &karyoscope_assay::BatchResult,
    layers: OverlayLayers,
) -> Result<usize, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(overlay_dir)?;

    let by_name: HashMap<String, &PathBuf> = image_paths
        .iter()
        .filter_map(|path| {
            path.file_name()
                .map(|name| (name.to_string_lossy().into_owned(), path))
        })
        .collect();

    let mut written = 0;
    for result in &batch.images {
        let Some(source_path) = by_name.get(&result.id) else {
            warn!("no source image for result {}", result.id);
            continue;
        };
        let base = match load_source_image(source_path) {
            Ok(base) => base,
            Err(error) => {
                warn!("cannot reload {}: {error}", source_path.display());
                continue;
            }
        };
        let overlay = render_overlay(&base, result, layers);
        let stem = source_path
            .file_stem()
            .map_or_else(|| result.id.clone(), |s| s.to_string_lossy().into_owned());
        let out_path = overlay_dir.join(format!("{stem}_overlay.png"));
        overlay.save(&out_path)?;
        written += 1;
    }
    Ok(written)
}
