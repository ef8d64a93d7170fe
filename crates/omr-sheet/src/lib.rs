//! Bubble-sheet reading on top of `omr-core`, `omr-fiducial` and `omr-grid`.
//!
//! [`SheetPipeline`] runs one document through:
//!
//! 1. binarization and page-corner detection,
//! 2. perspective correction onto the canonical page (or the original page
//!    when a corner is missing),
//! 3. block-marker detection and the answer-region cascade
//!    (`FiducialQuad` → `BorderedRectangle` → `FixedRatio`),
//! 4. the identification-region cascade (`LineBoxes` → `TemplatePosition`),
//! 5. identity and answer decoding,
//!
//! and flattens the outcome into a [`ProcessResult`].
//!
//! ```no_run
//! use omr_sheet::{render_sheet, SheetLayout, SheetMarks, SheetPipeline};
//! use omr_core::RasterImage;
//!
//! let page = render_sheet(&SheetLayout::default(), &SheetMarks::new("0123456789", "0042", &["A"]));
//! let result = SheetPipeline::default().process(&RasterImage::from_gray(page));
//! println!("{}", serde_json::to_string_pretty(&result).unwrap());
//! ```

mod answers;
mod config;
mod identity;
mod layout;
pub mod locate;
pub mod observer;
mod pipeline;
mod render;
mod result;

pub use answers::{AnswerDecoder, AnswerReading, RowBox};
pub use config::{
    AnswerParams, AnswerRegionParams, BorderedParams, ConfigIoError, FiducialQuadParams,
    IdentityParams, IdentityRegionParams, LineBoxParams, RowRectParams, SecondaryScanParams,
    SheetConfig,
};
pub use identity::{IdentityDecoder, IdentityReading};
pub use layout::{marker_centers, SheetLayout};
pub use locate::{IdentityRegions, LocatedRegion, RegionTier};
pub use observer::{
    LogObserver, PipelineEvent, PipelineObserver, RecordingObserver, RegionKind, Stage,
};
pub use pipeline::{PipelineError, SheetPipeline};
pub use render::{render_sheet, with_margin, SheetMarks};
pub use result::{AnswerKey, JsonLinesSink, ProcessResult, ResultSink, SheetReading};
