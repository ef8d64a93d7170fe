//! High-level facade crate for the `omr-*` workspace.
//!
//! This crate provides:
//! - stable, convenient re-exports of the underlying crates
//! - (feature-gated) helpers that adapt `image` rasters and raw buffers and
//!   run the sheet pipeline on them
//! - a snapshot observer that dumps intermediate rasters as PNG files
//!
//! ## Quickstart
//!
//! ```no_run
//! use omr::detect;
//! use omr::SheetPipeline;
//! use image::ImageReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = ImageReader::open("scan.jpg")?.decode()?;
//! let result = detect::read_sheet(&img, &SheetPipeline::default());
//! println!("student {} answered {:?}", result.student_id, &result.answers[..5]);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `omr::core`: rasters, masks, geometry, preprocessing, perspective correction.
//! - `omr::fiducial`: page-corner and answer-block marker detection.
//! - `omr::grid`: bubble-grid decoding and the density judge.
//! - `omr::sheet`: region cascades, identity/answer decoding, the pipeline.
//! - `omr::detect` (feature `image`): end-to-end helpers from `image` types.

pub use omr_core as core;
pub use omr_fiducial as fiducial;
pub use omr_grid as grid;
pub use omr_sheet as sheet;

pub use omr_core::{GrayImage, RasterImage};
pub use omr_sheet::{
    AnswerKey, PipelineError, PipelineObserver, ProcessResult, ResultSink, SheetConfig,
    SheetPipeline, SheetReading,
};

#[cfg(feature = "image")]
pub mod detect;
#[cfg(feature = "image")]
mod snapshot;

#[cfg(feature = "image")]
pub use snapshot::SnapshotDirObserver;

/// Route `log` records into `tracing` and install a subscriber honouring
/// `RUST_LOG`. Returns `false` when a subscriber was already installed.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) -> bool {
    let installed = omr_core::init_tracing(json);
    // no-op when the subscriber already bridged `log`
    let _ = tracing_log::LogTracer::init();
    installed
}
