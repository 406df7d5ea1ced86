//! karyoscope-assay: mask-to-cell association and CBMN scoring (sans-IO).
//!
//! Takes the three instance-segmentation label masks produced for one
//! microscopy image (cytoplasm, nucleus, micronucleus) and turns them
//! into scored cells:
//!
//! decode -> validity filters -> association -> classification -> indices
//!
//! Each nucleus and micronucleus is assigned to at most one cytoplasm by
//! exact pixel overlap, artifact candidates are rejected by per-category
//! rules, every cell is classified by nuclear multiplicity, and batches
//! aggregate into population-level cytotoxicity and genotoxicity indices.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory label
//! grids and returns structured data. Mask loading, the segmentation
//! provider seam, and report rendering live in `karyoscope-io` and
//! `karyoscope-report`.
//!
//! Determinism is a contract, not an accident: association is
//! order-independent with a documented tie-break, tallies are commutative
//! sums, and rescoring identical inputs is bit-identical however the
//! worker pool schedules images.

mod associate;
mod filter;

pub mod batch;
pub mod element;
pub mod index;
pub mod mask;
pub mod record;
pub mod types;

pub use batch::{
    BatchResult, ImageFailure, ImageResult, score_batch, score_batch_with_cancel, score_image,
};
pub use element::CellElement;
pub use index::{GenotoxicityIndex, IndexError, PopulationIndices, compute_indices};
pub use mask::{ImageMasks, LabelMask};
pub use record::{CellRecord, classify};
pub use types::{
    AreaBand, AssayConfig, AssayCounts, AssayError, BoundingBox, Category, CellClass, ImageAudit,
};
