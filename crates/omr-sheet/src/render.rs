//! Deterministic raster of the built-in template, used to produce synthetic
//! sheets for tests and for calibrating [`SheetConfig`](crate::SheetConfig).

use ::image::Luma;
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;
use omr_core::{GrayImage, PixelRect};

use crate::SheetLayout;

const INK: Luma<u8> = Luma([0]);
const PAPER: Luma<u8> = Luma([255]);

/// What the respondent filled in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SheetMarks {
    /// One digit per column; non-digits leave the column blank.
    pub student_id: String,
    pub test_id: String,
    /// Filled letters per question, `""` for a blank question. Missing
    /// trailing entries are blank.
    pub answers: Vec<String>,
}

impl SheetMarks {
    pub fn new(student_id: &str, test_id: &str, answers: &[&str]) -> Self {
        Self {
            student_id: student_id.to_string(),
            test_id: test_id.to_string(),
            answers: answers.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Render the template with `marks` onto a white canonical page.
pub fn render_sheet(layout: &SheetLayout, marks: &SheetMarks) -> GrayImage {
    let (w, h) = (layout.page.width, layout.page.height);
    let mut canvas = ::image::GrayImage::from_pixel(w as u32, h as u32, PAPER);

    draw_corner_marks(&mut canvas, layout);
    for c in &layout.block_markers {
        let s = layout.block_marker_size as f32;
        let r = PixelRect::new(
            (c[0] - 0.5 * s).round().max(0.0) as usize,
            (c[1] - 0.5 * s).round().max(0.0) as usize,
            layout.block_marker_size,
            layout.block_marker_size,
        );
        fill(&mut canvas, &r, INK);
    }

    let id_boxes = [
        (layout.student_box_px(), layout.student_digits, &marks.student_id),
        (layout.test_box_px(), layout.test_digits, &marks.test_id),
    ];
    for (outer, columns, digits) in id_boxes {
        stroke(&mut canvas, &outer, layout.box_stroke);
        let interior = layout.id_interior(&outer);
        let filled: Vec<Option<u32>> = digits.chars().map(|c| c.to_digit(10)).collect();
        for column in 0..columns {
            let mark_row = filled
                .get(column)
                .copied()
                .flatten()
                .map(|d| if d == 0 { layout.id_rows - 1 } else { d as usize - 1 });
            for row in 0..layout.id_rows {
                let c = layout.id_bubble_center(&interior, columns, column, row);
                bubble(&mut canvas, layout, c, mark_row == Some(row));
            }
        }
    }

    stroke(&mut canvas, &layout.answer_box_px(), layout.answer_stroke);
    for block in 0..layout.blocks {
        for row in 0..layout.rows_per_block {
            let q = block * layout.rows_per_block + row;
            let chosen = marks.answers.get(q).map(String::as_str).unwrap_or("");
            let rect = layout.row_rect(block, row);
            if layout.draw_row_boxes {
                stroke(&mut canvas, &rect, layout.row_stroke);
            }
            draw_label(&mut canvas, layout, &rect, q + 1);
            for (k, label) in layout.choices.iter().enumerate() {
                let c = layout.choice_center(&rect, k);
                bubble(&mut canvas, layout, c, chosen.contains(*label));
            }
        }
    }

    GrayImage::from_luma(&canvas)
}

/// Copy of `page` centered on a larger canvas filled with `value`.
pub fn with_margin(page: &GrayImage, margin: usize, value: u8) -> GrayImage {
    let (w, h) = (page.width + 2 * margin, page.height + 2 * margin);
    let mut out = GrayImage::filled(w, h, value);
    for y in 0..page.height {
        let dst = (y + margin) * w + margin;
        out.data[dst..dst + page.width]
            .copy_from_slice(&page.data[y * page.width..(y + 1) * page.width]);
    }
    out
}

fn fill(canvas: &mut ::image::GrayImage, r: &PixelRect, color: Luma<u8>) {
    if r.is_empty() {
        return;
    }
    let rect = Rect::at(r.x as i32, r.y as i32).of_size(r.width as u32, r.height as u32);
    draw_filled_rect_mut(canvas, rect, color);
}

fn stroke(canvas: &mut ::image::GrayImage, r: &PixelRect, t: usize) {
    let t = t.min(r.width / 2).min(r.height / 2);
    fill(canvas, &PixelRect::new(r.x, r.y, r.width, t), INK);
    fill(canvas, &PixelRect::new(r.x, r.bottom() - t, r.width, t), INK);
    fill(canvas, &PixelRect::new(r.x, r.y, t, r.height), INK);
    fill(canvas, &PixelRect::new(r.right() - t, r.y, t, r.height), INK);
}

fn draw_corner_marks(canvas: &mut ::image::GrayImage, layout: &SheetLayout) {
    let (w, h) = (layout.page.width, layout.page.height);
    let (a, t) = (layout.corner_arm, layout.corner_thickness);
    for (x0, y0, right, bottom) in [
        (0, 0, false, false),
        (w - a, 0, true, false),
        (w - a, h - a, true, true),
        (0, h - a, false, true),
    ] {
        let hy = if bottom { y0 + a - t } else { y0 };
        let vx = if right { x0 + a - t } else { x0 };
        fill(canvas, &PixelRect::new(x0, hy, a, t), INK);
        fill(canvas, &PixelRect::new(vx, y0, t, a), INK);
    }
}

fn bubble(canvas: &mut ::image::GrayImage, layout: &SheetLayout, c: [f32; 2], filled: bool) {
    let center = (c[0].round() as i32, c[1].round() as i32);
    let r = layout.bubble_radius as i32;
    draw_filled_circle_mut(canvas, center, r, INK);
    if !filled {
        draw_filled_circle_mut(canvas, center, r - layout.ring_stroke as i32, PAPER);
    }
}

// Stand-in for the printed question number: one thin bar per digit.
fn draw_label(canvas: &mut ::image::GrayImage, layout: &SheetLayout, rect: &PixelRect, n: usize) {
    let label_w = (layout.label_frac * rect.width as f32) as usize;
    let digits = n.to_string().len();
    let y = rect.y + rect.height / 2 - 5;
    for i in 0..digits {
        let x = rect.x + label_w / 4 + i * 4;
        if x + 2 < rect.x + label_w {
            fill(canvas, &PixelRect::new(x, y, 2, 10), INK);
        }
    }
}
