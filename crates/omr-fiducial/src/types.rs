use nalgebra::Point2;
use omr_core::{CornerRole, FracRect, PixelRect, Quadrilateral};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiducialKind {
    /// Page-corner mark: two perpendicular strokes meeting at an elbow.
    LShaped,
    /// Small filled square or bar around the answer block.
    Rectangular,
}

/// One detected alignment mark, in page pixel coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fiducial {
    pub kind: FiducialKind,
    pub bbox: PixelRect,
    pub role: Option<CornerRole>,
    /// Point handed to the homography: the outer elbow for L marks, the box
    /// center for rectangular ones.
    pub anchor: Point2<f32>,
    pub score: f32,
}

/// L-shaped corner search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LMarkerParams {
    /// Fraction of page width/height scanned from each corner.
    pub quadrant_frac: f32,
    /// Bounding-box sides relative to the shorter page side.
    pub min_side_frac: f32,
    pub max_side_frac: f32,
    /// Maximum of `w/h` and `h/w`.
    pub max_aspect: f32,
    /// Thickness of each arm band as a fraction of the bbox side.
    pub band_frac: f32,
    pub min_band_density: f32,
    /// Upper bound on ink in the block opposite the elbow.
    pub max_inner_density: f32,
}

impl Default for LMarkerParams {
    fn default() -> Self {
        Self {
            quadrant_frac: 0.25,
            min_side_frac: 0.015,
            max_side_frac: 0.15,
            max_aspect: 2.0,
            band_frac: 1.0 / 3.0,
            min_band_density: 0.55,
            max_inner_density: 0.2,
        }
    }
}

/// Rectangular block-marker search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectMarkerParams {
    /// Page region searched for markers.
    pub search: FracRect,
    /// Blob area over page area.
    pub min_area_frac: f32,
    pub max_area_frac: f32,
    /// Accepted `w/h`: near-square up to wider-than-tall bars.
    pub min_aspect: f32,
    pub max_aspect: f32,
    /// Minimum bbox fill; rejects round bubbles.
    pub min_fill: f32,
}

impl Default for RectMarkerParams {
    fn default() -> Self {
        Self {
            search: FracRect::new(0.0, 0.38, 1.0, 0.97),
            min_area_frac: 5e-5,
            max_area_frac: 2e-3,
            min_aspect: 0.8,
            max_aspect: 3.0,
            min_fill: 0.88,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiducialParams {
    pub corners: LMarkerParams,
    pub blocks: RectMarkerParams,
}

/// Quadrilateral from the anchors of role-tagged fiducials. The first
/// fiducial per role wins; untagged ones are ignored.
pub fn corner_quad(fiducials: &[Fiducial]) -> Quadrilateral {
    let mut q = Quadrilateral::default();
    for f in fiducials {
        if let Some(role) = f.role {
            if q.get(role).is_none() {
                q.set(role, f.anchor);
            }
        }
    }
    q
}

/// Bounding box of all fiducial boxes, `None` for an empty slice.
pub fn fiducial_bounds(fiducials: &[Fiducial]) -> Option<PixelRect> {
    let first = fiducials.first()?.bbox;
    Some(fiducials[1..].iter().fold(first, |acc, f| acc.union(&f.bbox)))
}
