//! Sheet calibration: every tunable of the pipeline in one serde tree.
//!
//! Defaults are derived from [`SheetLayout::default`], so a JSON file only
//! needs the fields it changes.

use std::{fs, path::Path};

use omr_core::{FracRect, PreprocessParams, RectangleFilter, TargetSize};
use omr_fiducial::FiducialParams;
use omr_grid::{DensityParams, GridDecodeParams, OriginParams};
use serde::{Deserialize, Serialize};

use crate::SheetLayout;

#[derive(thiserror::Error, Debug)]
pub enum ConfigIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Answer block from four role-tagged block markers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiducialQuadParams {
    /// Marker bounding box must span this fraction of the page width...
    pub min_spread_w_frac: f32,
    /// ... and of the page height.
    pub min_spread_h_frac: f32,
    /// Outward push of each marker center before warping.
    pub margin_px: f32,
    /// Smallest destination raster.
    pub floor: TargetSize,
}

impl Default for FiducialQuadParams {
    fn default() -> Self {
        Self {
            min_spread_w_frac: 0.5,
            min_spread_h_frac: 0.3,
            margin_px: 10.0,
            floor: TargetSize::new(400, 300),
        }
    }
}

/// Answer block from its printed border.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BorderedParams {
    pub filter: RectangleFilter,
    /// Border center must lie below this fraction of the page height.
    pub min_center_y_frac: f32,
    /// Crop inset, removes the border stroke.
    pub padding_px: usize,
}

impl Default for BorderedParams {
    fn default() -> Self {
        Self {
            filter: RectangleFilter {
                min_area_frac: 0.20,
                max_area_frac: 0.70,
                min_vertices: 4,
                max_vertices: 8,
                epsilon_frac: 0.02,
            },
            min_center_y_frac: 0.5,
            padding_px: 6,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerRegionParams {
    pub fiducial_quad: FiducialQuadParams,
    pub bordered: BorderedParams,
    /// Last-resort answer block position.
    pub fixed: FracRect,
}

impl AnswerRegionParams {
    pub fn from_layout(layout: &SheetLayout) -> Self {
        Self {
            fiducial_quad: FiducialQuadParams::default(),
            bordered: BorderedParams::default(),
            fixed: layout.answer_box,
        }
    }
}

impl Default for AnswerRegionParams {
    fn default() -> Self {
        Self::from_layout(&SheetLayout::default())
    }
}

/// Identification boxes from their ruled borders.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineBoxParams {
    /// Line element length as a fraction of the page width.
    pub line_len_frac: f32,
    pub min_area_frac: f32,
    pub max_area_frac: f32,
    pub min_side_px: usize,
    pub min_aspect: f32,
    pub max_aspect: f32,
    /// Left edge must lie in this leading fraction of the page width.
    pub max_left_frac: f32,
    /// Center must lie in this upper fraction of the page height.
    pub max_center_y_frac: f32,
}

impl Default for LineBoxParams {
    fn default() -> Self {
        Self {
            line_len_frac: 0.05,
            min_area_frac: 0.02,
            max_area_frac: 0.30,
            min_side_px: 40,
            min_aspect: 0.3,
            max_aspect: 3.0,
            max_left_frac: 0.6,
            max_center_y_frac: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityRegionParams {
    pub line_boxes: LineBoxParams,
    /// Template position of the outer student box border.
    pub student_box: FracRect,
    pub test_box: FracRect,
    /// Inset applied to template boxes to drop the border stroke.
    pub box_padding_px: usize,
}

impl IdentityRegionParams {
    pub fn from_layout(layout: &SheetLayout) -> Self {
        Self {
            line_boxes: LineBoxParams::default(),
            student_box: layout.student_box,
            test_box: layout.test_box,
            box_padding_px: layout.box_stroke,
        }
    }
}

impl Default for IdentityRegionParams {
    fn default() -> Self {
        Self::from_layout(&SheetLayout::default())
    }
}

/// Column scan over the whole identification section, independent of box
/// geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondaryScanParams {
    /// Page area holding both identification boxes.
    pub section: FracRect,
    pub min_bubble_px: usize,
    pub max_bubble_px: usize,
    pub min_aspect: f32,
    pub max_aspect: f32,
    /// `4 pi A / P^2` lower bound.
    pub min_circularity: f32,
    /// A new column starts where the x gap exceeds this many median bubble widths.
    pub column_gap_factor: f32,
    pub min_column_blobs: usize,
    /// Central density of a filled bubble.
    pub filled_density: f32,
    /// Central window side as a fraction of the bubble box.
    pub center_frac: f32,
}

impl SecondaryScanParams {
    pub fn from_layout(layout: &SheetLayout) -> Self {
        let s = layout.student_box;
        let t = layout.test_box;
        let pad = 0.02;
        Self {
            section: FracRect::new(
                (s.x0.min(t.x0) - pad).max(0.0),
                (s.y0.min(t.y0) - pad).max(0.0),
                (s.x1.max(t.x1) + pad).min(1.0),
                (s.y1.max(t.y1) + pad).min(1.0),
            ),
            ..Self::default_shape()
        }
    }

    fn default_shape() -> Self {
        Self {
            section: FracRect::FULL,
            min_bubble_px: 8,
            max_bubble_px: 30,
            min_aspect: 0.7,
            max_aspect: 1.4,
            min_circularity: 0.7,
            column_gap_factor: 1.0,
            min_column_blobs: 8,
            filled_density: 0.6,
            center_frac: 0.5,
        }
    }
}

impl Default for SecondaryScanParams {
    fn default() -> Self {
        Self::from_layout(&SheetLayout::default())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityParams {
    pub student_digits: usize,
    pub test_digits: usize,
    pub rows: usize,
    pub student_grid: GridDecodeParams,
    pub test_grid: GridDecodeParams,
    /// Run the column scan when either box decodes below this confidence.
    pub secondary_below: f32,
    pub secondary: SecondaryScanParams,
}

impl IdentityParams {
    pub fn from_layout(layout: &SheetLayout) -> Self {
        let grid = GridDecodeParams {
            row_slots: Some(layout.id_slots()),
            first_row_slot: layout.id_header_slots,
            ..GridDecodeParams::default()
        };
        Self {
            student_digits: layout.student_digits,
            test_digits: layout.test_digits,
            rows: layout.id_rows,
            student_grid: grid.clone(),
            test_grid: grid,
            secondary_below: 0.5,
            secondary: SecondaryScanParams::from_layout(layout),
        }
    }
}

impl Default for IdentityParams {
    fn default() -> Self {
        Self::from_layout(&SheetLayout::default())
    }
}

/// Shape window of a question row rectangle, relative to the answer block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowRectParams {
    pub min_aspect: f32,
    pub min_width_frac: f32,
    pub max_width_frac: f32,
    pub min_height_frac: f32,
    pub max_height_frac: f32,
    pub epsilon_frac: f32,
    pub min_vertices: usize,
    pub max_vertices: usize,
}

impl Default for RowRectParams {
    fn default() -> Self {
        Self {
            min_aspect: 3.0,
            min_width_frac: 0.10,
            max_width_frac: 0.35,
            min_height_frac: 0.012,
            max_height_frac: 0.10,
            epsilon_frac: 0.02,
            min_vertices: 4,
            max_vertices: 8,
        }
    }
}

impl RowRectParams {
    /// Contour pre-filter; the area window is the product of the size windows.
    pub fn rectangle_filter(&self) -> RectangleFilter {
        RectangleFilter {
            min_area_frac: 0.5 * self.min_width_frac * self.min_height_frac,
            max_area_frac: self.max_width_frac * self.max_height_frac,
            min_vertices: self.min_vertices,
            max_vertices: self.max_vertices,
            epsilon_frac: self.epsilon_frac,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerParams {
    pub blocks: usize,
    pub rows_per_block: usize,
    pub choices: Vec<char>,
    pub rows: RowRectParams,
    /// Row rectangles whose y lies within this distance of a group's running
    /// mean join that group.
    pub y_tolerance_px: f32,
    /// Candidate label widths as fractions of the row rectangle width.
    pub label_splits: Vec<f32>,
    /// Side of the square scored per choice when picking a label split, as a
    /// fraction of the row height. Covers a whole bubble, ring included.
    pub align_window_frac: f32,
    /// Choice sampling. Cells are squares of the row height, so
    /// `window_frac` sizes the window against the row height.
    pub density: DensityParams,
    /// Fewer detected rows than this switches to grid decoding.
    pub min_rows_found: usize,
    pub fallback_grid: GridDecodeParams,
    /// Share of each fallback column-block right of its bubble columns.
    pub block_trim_frac: f32,
    /// Border search that fixes the grid area before grid decoding.
    pub frame: RectangleFilter,
    /// Border pixels cleared inside the frame before grid decoding.
    pub frame_padding_px: usize,
}

impl AnswerParams {
    pub fn from_layout(layout: &SheetLayout) -> Self {
        let trim = layout.block_trim_frac();
        let row_h = layout.row_height.max(1) as f32;
        let interior = layout.bubble_window_px();
        Self {
            blocks: layout.blocks,
            rows_per_block: layout.rows_per_block,
            choices: layout.choices.clone(),
            rows: RowRectParams::default(),
            y_tolerance_px: 20.0,
            label_splits: vec![0.08, 0.10, 0.12, 0.14],
            align_window_frac: layout.bubble_outline_px() / row_h,
            density: DensityParams {
                window_frac: interior / row_h,
                offsets: vec![[0.0, 0.0]],
                ..DensityParams::default()
            },
            min_rows_found: layout.questions() / 2,
            fallback_grid: GridDecodeParams {
                origin: OriginParams {
                    min_label_x_frac: 0.1,
                    min_origin_area: 40,
                    default_offset_frac: layout.block_label_frac() / (1.0 - trim).max(f32::EPSILON),
                },
                // rings must stay outside the window; cells are wider than a bubble
                density: DensityParams {
                    window_frac: interior / layout.row_pitch().max(1.0),
                    offsets: vec![[0.0, 0.0]],
                    ..DensityParams::default()
                },
                ..GridDecodeParams::default()
            },
            block_trim_frac: trim,
            frame: RectangleFilter {
                min_area_frac: 0.5,
                max_area_frac: 1.0,
                min_vertices: 4,
                max_vertices: 8,
                epsilon_frac: 0.02,
            },
            frame_padding_px: layout.answer_stroke + 3,
        }
    }

    pub fn questions(&self) -> usize {
        self.blocks * self.rows_per_block
    }
}

impl Default for AnswerParams {
    fn default() -> Self {
        Self::from_layout(&SheetLayout::default())
    }
}

/// Complete pipeline configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    /// Size of the perspective-corrected page.
    pub canonical: TargetSize,
    pub preprocess: PreprocessParams,
    pub fiducials: FiducialParams,
    pub answer_region: AnswerRegionParams,
    pub identity_region: IdentityRegionParams,
    pub identity: IdentityParams,
    pub answers: AnswerParams,
    /// Per-document time budget, checked between stages.
    pub deadline_ms: Option<u64>,
}

impl SheetConfig {
    /// Calibration matching a template drawn with `layout`.
    pub fn from_layout(layout: &SheetLayout) -> Self {
        Self {
            canonical: layout.page,
            preprocess: PreprocessParams::default(),
            fiducials: FiducialParams::default(),
            answer_region: AnswerRegionParams::from_layout(layout),
            identity_region: IdentityRegionParams::from_layout(layout),
            identity: IdentityParams::from_layout(layout),
            answers: AnswerParams::from_layout(layout),
            deadline_ms: None,
        }
    }

    /// Load a JSON config from disk. Missing fields take their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self::from_layout(&SheetLayout::default())
    }
}
