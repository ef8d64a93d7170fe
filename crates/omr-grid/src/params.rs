use serde::{Deserialize, Serialize};

/// Where the bubble area starts when label text occupies the left margin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginParams {
    /// Blobs left of `min_label_x_frac * W` are treated as label text.
    pub min_label_x_frac: f32,
    /// Minimum area of a blob used as the column-0 anchor.
    pub min_origin_area: usize,
    /// Fallback origin as a fraction of the sub-image width.
    pub default_offset_frac: f32,
}

impl Default for OriginParams {
    fn default() -> Self {
        Self {
            min_label_x_frac: 0.0,
            min_origin_area: 40,
            default_offset_frac: 0.0,
        }
    }
}

/// Blob contest scoring.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringParams {
    pub area_weight: f32,
    pub center_weight: f32,
    pub distance_weight: f32,
    /// Blobs larger than `merge_area_factor * median area` are suspected merges.
    pub merge_area_factor: f32,
    pub merge_penalty: f32,
    /// Winner must beat the best competitor in another row/column by this much.
    pub min_margin: f32,
    /// Row-wise reading: a column counts as filled when its blob reaches this
    /// fraction of the row's largest blob.
    pub multiple_area_frac: f32,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            area_weight: 0.5,
            center_weight: 0.5,
            distance_weight: 0.25,
            merge_area_factor: 2.5,
            merge_penalty: 0.5,
            min_margin: 0.15,
            multiple_area_frac: 0.5,
        }
    }
}

/// Direct density sampling of candidate cells.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityParams {
    /// Sampling window side as a fraction of the cell side.
    pub window_frac: f32,
    /// Window center offsets in cell-size units; the mean over all is used.
    pub offsets: Vec<[f32; 2]>,
    /// A mark needs at least this much ink.
    pub min_density: f32,
    /// Accept when `best - runner_up >= rel_margin * best` ...
    pub rel_margin: f32,
    /// ... or `best - runner_up >= abs_margin`.
    pub abs_margin: f32,
    /// Runner-up at or above `min_density` and `multiple_ratio * best` makes a
    /// row-wise question `Multiple`.
    pub multiple_ratio: f32,
}

impl Default for DensityParams {
    fn default() -> Self {
        Self {
            window_frac: 0.3,
            offsets: vec![[0.0, 0.0], [-0.1, 0.0], [0.1, 0.0], [0.0, -0.1], [0.0, 0.1]],
            min_density: 0.5,
            rel_margin: 0.05,
            abs_margin: 0.2,
            multiple_ratio: 0.6,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridDecodeParams {
    /// Square erosion radius applied before labelling (0 disables).
    pub erosion_radius: u8,
    pub min_blob_area: usize,
    pub max_blob_area: usize,
    pub min_aspect: f32,
    pub max_aspect: f32,
    pub min_fill_ratio: f32,
    /// Vertical slots the sub-image is divided into; `None` = one per row.
    pub row_slots: Option<usize>,
    /// Slot holding row 0 (slots above it are header).
    pub first_row_slot: usize,
    pub origin: OriginParams,
    pub scoring: ScoringParams,
    pub density: DensityParams,
}

impl Default for GridDecodeParams {
    fn default() -> Self {
        Self {
            erosion_radius: 1,
            min_blob_area: 15,
            max_blob_area: 600,
            min_aspect: 0.5,
            max_aspect: 2.0,
            min_fill_ratio: 0.45,
            row_slots: None,
            first_row_slot: 0,
            origin: OriginParams::default(),
            scoring: ScoringParams::default(),
            density: DensityParams::default(),
        }
    }
}
