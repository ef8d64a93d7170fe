//! Geometry of the printed template on the canonical page.

use omr_core::{FracRect, PixelRect, TargetSize};
use serde::{Deserialize, Serialize};

/// Template geometry in canonical page pixels.
///
/// The region locators and decoders never read this directly; it is turned
/// into calibration values by [`SheetConfig::from_layout`](crate::SheetConfig::from_layout)
/// and drawn by [`render_sheet`](crate::render_sheet).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetLayout {
    pub page: TargetSize,
    /// L markers sit flush in the page corners.
    pub corner_arm: usize,
    pub corner_thickness: usize,

    pub student_box: FracRect,
    pub test_box: FracRect,
    pub box_stroke: usize,
    /// Slots above the first digit row inside each identity box.
    pub id_header_slots: usize,
    pub student_digits: usize,
    pub test_digits: usize,
    pub id_rows: usize,

    pub answer_box: FracRect,
    pub answer_stroke: usize,
    /// Centers of the filled square block markers.
    pub block_markers: Vec<[f32; 2]>,
    pub block_marker_size: usize,
    pub blocks: usize,
    pub rows_per_block: usize,
    pub choices: Vec<char>,
    /// Row rectangles are inset this far from the block sides.
    pub row_inset_x: usize,
    /// Offset of each row rectangle below its row pitch line.
    pub row_top: usize,
    pub row_height: usize,
    pub row_stroke: usize,
    pub draw_row_boxes: bool,
    /// Share of a row rectangle reserved for the question number.
    pub label_frac: f32,

    pub bubble_radius: usize,
    pub ring_stroke: usize,
}

impl Default for SheetLayout {
    fn default() -> Self {
        let page = TargetSize::new(1000, 1400);
        let answer_box = FracRect::new(0.09, 0.44, 0.91, 0.91);
        let block_markers = marker_centers(&answer_box.to_pixels(page.width, page.height), 30.0);
        Self {
            page,
            corner_arm: 48,
            corner_thickness: 12,
            student_box: FracRect::new(0.05, 0.08, 0.50, 0.36),
            test_box: FracRect::new(0.55, 0.08, 0.77, 0.36),
            box_stroke: 3,
            id_header_slots: 1,
            student_digits: 10,
            test_digits: 4,
            id_rows: 10,
            answer_box,
            answer_stroke: 3,
            block_markers,
            block_marker_size: 18,
            blocks: 4,
            rows_per_block: 15,
            choices: vec!['A', 'B', 'C', 'D'],
            row_inset_x: 8,
            row_top: 6,
            row_height: 32,
            row_stroke: 2,
            draw_row_boxes: true,
            label_frac: 0.12,
            bubble_radius: 7,
            ring_stroke: 2,
        }
    }
}

/// Marker centers `offset` pixels diagonally outside each box corner,
/// in TL, TR, BR, BL order.
pub fn marker_centers(b: &PixelRect, offset: f32) -> Vec<[f32; 2]> {
    let (x0, y0) = (b.x as f32 - offset, b.y as f32 - offset);
    let (x1, y1) = (b.right() as f32 + offset, b.bottom() as f32 + offset);
    vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]]
}

impl SheetLayout {
    #[inline]
    fn px(&self, r: &FracRect) -> PixelRect {
        r.to_pixels(self.page.width, self.page.height)
    }

    pub fn student_box_px(&self) -> PixelRect {
        self.px(&self.student_box)
    }

    pub fn test_box_px(&self) -> PixelRect {
        self.px(&self.test_box)
    }

    pub fn answer_box_px(&self) -> PixelRect {
        self.px(&self.answer_box)
    }

    /// Inside of an identity box stroke.
    pub fn id_interior(&self, outer: &PixelRect) -> PixelRect {
        outer.inset(self.box_stroke)
    }

    /// Vertical slots of an identity box (header plus digit rows).
    pub fn id_slots(&self) -> usize {
        self.id_rows + self.id_header_slots
    }

    /// Bubble center for digit `column`/`row` in an identity box interior.
    pub fn id_bubble_center(
        &self,
        interior: &PixelRect,
        columns: usize,
        column: usize,
        row: usize,
    ) -> [f32; 2] {
        let cw = interior.width as f32 / columns.max(1) as f32;
        let sh = interior.height as f32 / self.id_slots() as f32;
        [
            interior.x as f32 + (column as f32 + 0.5) * cw,
            interior.y as f32 + (row + self.id_header_slots) as f32 * sh + 0.5 * sh,
        ]
    }

    pub fn block_width(&self) -> f32 {
        self.answer_box_px().width as f32 / self.blocks.max(1) as f32
    }

    pub fn row_pitch(&self) -> f32 {
        self.answer_box_px().height as f32 / self.rows_per_block.max(1) as f32
    }

    /// Row rectangle of `row` in column-block `block`, page pixels.
    pub fn row_rect(&self, block: usize, row: usize) -> PixelRect {
        let b = self.answer_box_px();
        let bw = self.block_width();
        let x = b.x as f32 + block as f32 * bw + self.row_inset_x as f32;
        let y = b.y as f32 + (row as f32 * self.row_pitch()).round() + self.row_top as f32;
        let w = bw - 2.0 * self.row_inset_x as f32;
        PixelRect::new(x.round() as usize, y as usize, w.round() as usize, self.row_height)
    }

    /// Center of choice bubble `k` of a row rectangle.
    pub fn choice_center(&self, rect: &PixelRect, k: usize) -> [f32; 2] {
        let label_w = self.label_frac * rect.width as f32;
        let sub = (rect.width as f32 - label_w) / self.choices.len().max(1) as f32;
        [
            rect.x as f32 + label_w + (k as f32 + 0.5) * sub,
            rect.y as f32 + 0.5 * rect.height as f32,
        ]
    }

    /// Left margin of the bubble area within one column-block, as a
    /// fraction of the block width.
    pub fn block_label_frac(&self) -> f32 {
        let rect_w = self.block_width() - 2.0 * self.row_inset_x as f32;
        (self.row_inset_x as f32 + self.label_frac * rect_w) / self.block_width()
    }

    /// Side of a square that fits inside the paper hole of an empty ring.
    pub fn bubble_window_px(&self) -> f32 {
        1.3 * self.bubble_radius.saturating_sub(self.ring_stroke) as f32
    }

    /// Side of a square covering one whole bubble.
    pub fn bubble_outline_px(&self) -> f32 {
        (2 * self.bubble_radius + 1) as f32
    }

    /// Share of a column-block right of its last bubble column.
    pub fn block_trim_frac(&self) -> f32 {
        self.row_inset_x as f32 / self.block_width()
    }

    pub fn questions(&self) -> usize {
        self.blocks * self.rows_per_block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_geometry() {
        let l = SheetLayout::default();
        assert_eq!(l.student_box_px(), PixelRect::new(50, 112, 450, 392));
        assert_eq!(l.answer_box_px(), PixelRect::new(90, 616, 820, 658));
        assert_eq!(l.block_markers[0], [60.0, 586.0]);
        assert_eq!(l.block_markers[2], [940.0, 1304.0]);
        assert_eq!(l.row_rect(1, 0), PixelRect::new(303, 622, 189, 32));
        assert_eq!(l.questions(), 60);
    }

    #[test]
    fn row_rects_are_well_separated() {
        let l = SheetLayout::default();
        for r in 1..l.rows_per_block {
            let gap = l.row_rect(0, r).y - l.row_rect(0, r - 1).y;
            assert!(gap >= 40, "row pitch {gap}");
        }
    }
}
