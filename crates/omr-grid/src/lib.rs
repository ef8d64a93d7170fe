//! Bubble-grid decoding.
//!
//! [`GridDecoder`] turns an ink mask of one bubble block into symbols:
//!
//! 1. erode and label the mask, keep bubble-sized, roughly round components;
//! 2. find where the bubble area starts (label text may occupy the left margin);
//! 3. assign components to `(column, row)` cells by proportional position;
//! 4. score the contenders of each position and keep clear winners;
//! 5. sample ink density directly for positions left open;
//! 6. map winners to digits (`Reading::Digits`) or letters (`Reading::Choices`).
//!
//! The same density judge is exported for row-based answer decoding.

mod decoder;
mod density;
mod layout;
mod params;
mod symbol;

pub use decoder::GridDecoder;
pub use density::{cell_density, judge, Verdict};
pub use layout::{CellRect, GridCell, GridGeometry, GridSpec, Reading};
pub use params::{DensityParams, GridDecodeParams, OriginParams, ScoringParams};
pub use symbol::{DecodeResult, Resolution, Symbol, MULTIPLE, UNRESOLVED};
