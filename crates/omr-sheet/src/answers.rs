//! Multiple-choice answer decoding from row rectangles, with a grid fallback.

use omr_core::{find_rectangles, BinaryMask, PixelRect};
use omr_grid::{
    cell_density, judge, CellRect, DensityParams, GridDecoder, GridSpec, Symbol, Verdict,
};
use serde::Serialize;

use crate::config::AnswerParams;
use crate::locate::LocatedRegion;
use crate::observer::{PipelineEvent, PipelineObserver};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// One entry per question, in question order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnswerReading {
    pub answers: Vec<Symbol>,
    pub confidences: Vec<f32>,
    /// Row rectangles mapped to questions.
    pub rows_found: usize,
    /// Decoded by the grid fallback instead of row rectangles.
    pub fallback: bool,
}

impl AnswerReading {
    /// `"A"`..`"D"`, `"MULTIPLE"`, or `""`.
    pub fn texts(&self) -> Vec<String> {
        self.answers.iter().map(Symbol::answer_text).collect()
    }
}

/// Question row located in the answer block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowBox {
    pub block: usize,
    pub row: usize,
    pub rect: PixelRect,
}

impl RowBox {
    /// 1-based question number.
    pub fn question(&self, rows_per_block: usize) -> usize {
        self.block * rows_per_block + self.row + 1
    }
}

#[derive(Clone, Debug, Default)]
pub struct AnswerDecoder {
    params: AnswerParams,
    fallback: GridDecoder,
}

impl AnswerDecoder {
    pub fn new(params: AnswerParams) -> Self {
        Self {
            fallback: GridDecoder::new(params.fallback_grid.clone()),
            params,
        }
    }

    pub fn params(&self) -> &AnswerParams {
        &self.params
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(w = region.mask.width, h = region.mask.height))
    )]
    pub fn decode(&self, region: &LocatedRegion, observer: &dyn PipelineObserver) -> AnswerReading {
        let p = &self.params;
        let rows = self.detect_rows(&region.mask);
        if rows.len() < p.min_rows_found {
            observer.on_event(&PipelineEvent::AnswerFallback {
                rows_found: rows.len(),
            });
            return self.decode_grid(&region.mask, rows.len());
        }

        let questions = p.questions();
        let mut answers = vec![Symbol::Unresolved; questions];
        let mut confidences = vec![0.0; questions];
        for r in &rows {
            let q = r.question(p.rows_per_block) - 1;
            let (symbol, confidence) = self.read_row(&region.mask, &r.rect);
            answers[q] = symbol;
            confidences[q] = confidence;
        }
        log::debug!(
            "{} answer rows, {} answered",
            rows.len(),
            answers.iter().filter(|s| s.is_resolved()).count()
        );
        AnswerReading {
            answers,
            confidences,
            rows_found: rows.len(),
            fallback: false,
        }
    }

    /// Row rectangles assigned to `(block, row)`.
    ///
    /// Blocks come from x over the rectangles' horizontal span. Rows are
    /// y-groups across blocks: a rectangle joins the current group when its
    /// center lies within `y_tolerance_px` of the group's running mean. At
    /// most `rows_per_block` groups are kept, preferring the best populated.
    pub fn detect_rows(&self, mask: &BinaryMask) -> Vec<RowBox> {
        let p = &self.params;
        let (w, h) = (mask.width as f32, mask.height as f32);
        let shape = &p.rows;
        let mut rects: Vec<PixelRect> = find_rectangles(mask, &shape.rectangle_filter())
            .into_iter()
            .map(|c| c.bbox)
            .filter(|b| {
                let (fw, fh) = (b.width as f32 / w, b.height as f32 / h);
                b.aspect() >= shape.min_aspect
                    && fw >= shape.min_width_frac
                    && fw <= shape.max_width_frac
                    && fh >= shape.min_height_frac
                    && fh <= shape.max_height_frac
            })
            .collect();
        if rects.is_empty() || p.blocks == 0 {
            return Vec::new();
        }

        let x0 = rects.iter().map(|r| r.x).min().unwrap_or(0) as f32;
        let x1 = rects.iter().map(|r| r.right()).max().unwrap_or(0) as f32;
        let block_w = ((x1 - x0) / p.blocks as f32).max(1.0);
        let block_of = |r: &PixelRect| {
            (((r.center().x - x0) / block_w).floor().max(0.0) as usize).min(p.blocks - 1)
        };

        rects.sort_by(|a, b| {
            a.center()
                .y
                .total_cmp(&b.center().y)
                .then(a.x.cmp(&b.x))
        });
        // (running mean y, members)
        let mut groups: Vec<(f32, Vec<PixelRect>)> = Vec::new();
        for r in rects {
            let cy = r.center().y;
            match groups.last_mut() {
                Some((mean, members)) if (cy - *mean).abs() <= p.y_tolerance_px => {
                    members.push(r);
                    *mean += (cy - *mean) / members.len() as f32;
                }
                _ => groups.push((cy, vec![r])),
            }
        }
        if groups.len() > p.rows_per_block {
            groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.total_cmp(&b.0)));
            groups.truncate(p.rows_per_block);
            groups.sort_by(|a, b| a.0.total_cmp(&b.0));
        }

        let mut out = Vec::new();
        for (row, (_, members)) in groups.iter().enumerate() {
            let mut taken = vec![false; p.blocks];
            for r in members {
                let block = block_of(r);
                if !taken[block] {
                    taken[block] = true;
                    out.push(RowBox {
                        block,
                        row,
                        rect: *r,
                    });
                }
            }
        }
        out.sort_by_key(|r| (r.block, r.row));
        out
    }

    /// Read one row rectangle.
    ///
    /// The label split is chosen by alignment alone: the split whose bubble
    /// windows cover the most ink (rings and fills alike) sits on the printed
    /// bubbles. Only then are the bubble interiors sampled and judged.
    fn read_row(&self, mask: &BinaryMask, rect: &PixelRect) -> (Symbol, f32) {
        let p = &self.params;
        let n = p.choices.len();
        if n == 0 {
            return (Symbol::Unresolved, 0.0);
        }
        let align = DensityParams {
            window_frac: p.align_window_frac,
            offsets: vec![[0.0, 0.0]],
            ..p.density.clone()
        };
        let mut best: Option<(f32, Vec<CellRect>)> = None;
        for &split in &p.label_splits {
            let cells = choice_cells(rect, split, n);
            let ink: f32 = cells.iter().map(|c| cell_density(mask, c, &align)).sum();
            if best.as_ref().is_none_or(|(b, _)| ink > *b) {
                best = Some((ink, cells));
            }
        }
        let Some((_, cells)) = best else {
            return (Symbol::Unresolved, 0.0);
        };

        let densities: Vec<f32> = cells
            .iter()
            .map(|c| cell_density(mask, c, &p.density))
            .collect();
        let (top, runner) = top_two(&densities);
        match judge(&densities, &p.density, true) {
            Verdict::Single(i) => (Symbol::Choice(p.choices[i]), 1.0 - runner / top),
            Verdict::Multiple => (Symbol::Multiple, runner / top),
            Verdict::Blank | Verdict::Ambiguous => (Symbol::Unresolved, 0.0),
        }
    }

    /// Row-wise grid decoding of equal column-blocks of the printed block
    /// border, or of the whole region when no border is visible.
    fn decode_grid(&self, mask: &BinaryMask, rows_found: usize) -> AnswerReading {
        let p = &self.params;
        let area = find_rectangles(mask, &p.frame)
            .first()
            .map(|f| f.bbox)
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| mask.frame());
        // the grid spans the border; only its stroke is cleared
        let mut inner = mask.crop(&area);
        clear_border(&mut inner, p.frame_padding_px);
        let spec = GridSpec::choices(p.rows_per_block, &p.choices);

        let mut answers = Vec::with_capacity(p.questions());
        let block_w = inner.width as f32 / p.blocks.max(1) as f32;
        let keep_w = (block_w * (1.0 - p.block_trim_frac)).round().max(1.0) as usize;
        for b in 0..p.blocks {
            let x = (b as f32 * block_w).round() as usize;
            let block = inner.crop(&PixelRect::new(x, 0, keep_w, inner.height));
            answers.extend(self.fallback.decode(&block, &spec).symbols);
        }
        let confidences = answers
            .iter()
            .map(|s| if s.is_resolved() { 1.0 } else { 0.0 })
            .collect();
        log::debug!("grid fallback over {area:?}");
        AnswerReading {
            answers,
            confidences,
            rows_found,
            fallback: true,
        }
    }
}

/// Square cells of the row height centered on each choice bubble, for a
/// label taking `split` of the rectangle width.
fn choice_cells(rect: &PixelRect, split: f32, n: usize) -> Vec<CellRect> {
    let label_w = split * rect.width as f32;
    let sub = (rect.width as f32 - label_w) / n as f32;
    let side = rect.height as f32;
    let cy = rect.y as f32 + 0.5 * side;
    (0..n)
        .map(|k| {
            let cx = rect.x as f32 + label_w + (k as f32 + 0.5) * sub;
            CellRect {
                x: cx - 0.5 * side,
                y: cy - 0.5 * side,
                w: side,
                h: side,
            }
        })
        .collect()
}

fn clear_border(mask: &mut BinaryMask, t: usize) {
    let (w, h) = (mask.width, mask.height);
    for y in 0..h {
        for x in 0..w {
            if x < t || y < t || x + t >= w || y + t >= h {
                mask.set(x, y, false);
            }
        }
    }
}

fn top_two(values: &[f32]) -> (f32, f32) {
    let mut top = 0.0_f32;
    let mut runner = 0.0_f32;
    for &v in values {
        if v > top {
            runner = top;
            top = v;
        } else if v > runner {
            runner = v;
        }
    }
    (top, runner)
}
