//! Student and test identifier decoding.

use omr_core::{outer_contours, BinaryMask, PixelRect};
use omr_grid::{DecodeResult, GridDecoder, GridSpec, Resolution, Symbol};
use serde::Serialize;

use crate::config::{IdentityParams, SecondaryScanParams};
use crate::locate::IdentityRegions;
use crate::observer::{PipelineEvent, PipelineObserver};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Decoded identifiers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IdentityReading {
    pub student: DecodeResult,
    pub test: DecodeResult,
    /// The column scan filled at least one position.
    pub secondary_used: bool,
}

impl IdentityReading {
    pub fn student_id(&self) -> String {
        self.student.text()
    }

    pub fn test_id(&self) -> String {
        self.test.text()
    }
}

/// Digit columns read by the column scan, left to right.
#[derive(Clone, Debug, PartialEq)]
struct ColumnScan {
    student: Vec<Symbol>,
    test: Option<Vec<Symbol>>,
}

/// Grid decoding of both identification boxes with a geometry-free second
/// opinion for low-confidence reads.
#[derive(Clone, Debug, Default)]
pub struct IdentityDecoder {
    params: IdentityParams,
    student: GridDecoder,
    test: GridDecoder,
}

impl IdentityDecoder {
    pub fn new(params: IdentityParams) -> Self {
        Self {
            student: GridDecoder::new(params.student_grid.clone()),
            test: GridDecoder::new(params.test_grid.clone()),
            params,
        }
    }

    pub fn params(&self) -> &IdentityParams {
        &self.params
    }

    /// Decode both boxes; `page_mask` feeds the column scan.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn decode(
        &self,
        regions: &IdentityRegions,
        page_mask: &BinaryMask,
        observer: &dyn PipelineObserver,
    ) -> IdentityReading {
        let p = &self.params;
        let student = self.student.decode(
            &regions.student.mask,
            &GridSpec::digits(p.student_digits, p.rows),
        );
        let test = self
            .test
            .decode(&regions.test.mask, &GridSpec::digits(p.test_digits, p.rows));

        if student.confidence >= p.secondary_below && test.confidence >= p.secondary_below {
            return IdentityReading {
                student,
                test,
                secondary_used: false,
            };
        }

        observer.on_event(&PipelineEvent::SecondaryScan {
            student_confidence: student.confidence,
            test_confidence: test.confidence,
        });
        let Some(scan) = self.column_scan(page_mask) else {
            return IdentityReading {
                student,
                test,
                secondary_used: false,
            };
        };
        let (student, a) = merge(student, &scan.student);
        let (test, b) = match &scan.test {
            Some(t) => merge(test, t),
            None => (test, false),
        };
        log::debug!(
            "column scan: student {:?} ({:.2}), test {:?} ({:.2})",
            student.text(),
            student.confidence,
            test.text(),
            test.confidence
        );
        IdentityReading {
            student,
            test,
            secondary_used: a || b,
        }
    }

    /// Bubble columns across the identification section.
    ///
    /// Digits are read only from columns holding exactly `rows` bubbles with
    /// exactly one filled. Columns map to the student box first, then the
    /// test box; any other column count is rejected.
    fn column_scan(&self, page_mask: &BinaryMask) -> Option<ColumnScan> {
        let s = &self.params.secondary;
        let section = s.section.to_pixels(page_mask.width, page_mask.height);
        let local = page_mask.crop(&section);
        let bubbles = bubble_boxes(&local, s);
        if bubbles.is_empty() {
            log::debug!("column scan: no bubbles in {section:?}");
            return None;
        }

        let columns: Vec<Vec<PixelRect>> = cluster_columns(bubbles, s)
            .into_iter()
            .filter(|c| c.len() >= s.min_column_blobs)
            .collect();
        let digits: Vec<Symbol> = columns
            .iter()
            .map(|c| self.read_column(&local, c))
            .collect();

        let p = &self.params;
        if digits.len() == p.student_digits + p.test_digits {
            let (student, test) = digits.split_at(p.student_digits);
            Some(ColumnScan {
                student: student.to_vec(),
                test: Some(test.to_vec()),
            })
        } else if digits.len() == p.student_digits {
            Some(ColumnScan {
                student: digits,
                test: None,
            })
        } else {
            log::debug!("column scan: {} columns, cannot map to boxes", digits.len());
            None
        }
    }

    fn read_column(&self, mask: &BinaryMask, members: &[PixelRect]) -> Symbol {
        let s = &self.params.secondary;
        let rows = self.params.rows;
        if members.len() != rows {
            return Symbol::Unresolved;
        }
        let mut members = members.to_vec();
        members.sort_by_key(|r| (r.y, r.x));
        let filled: Vec<usize> = members
            .iter()
            .enumerate()
            .filter(|(_, r)| mask.density(&center_window(r, s.center_frac)) >= s.filled_density)
            .map(|(i, _)| i)
            .collect();
        match filled.as_slice() {
            [row] => GridSpec::digits(1, rows).symbol(*row),
            _ => Symbol::Unresolved,
        }
    }
}

fn bubble_boxes(mask: &BinaryMask, s: &SecondaryScanParams) -> Vec<PixelRect> {
    outer_contours(mask)
        .into_iter()
        .filter(|c| {
            let b = c.bbox;
            let aspect = b.aspect();
            b.width >= s.min_bubble_px
                && b.height >= s.min_bubble_px
                && b.width <= s.max_bubble_px
                && b.height <= s.max_bubble_px
                && aspect >= s.min_aspect
                && aspect <= s.max_aspect
                && c.circularity() >= s.min_circularity
        })
        .map(|c| c.bbox)
        .collect()
}

/// Split bubbles into columns wherever consecutive centers are further apart
/// than `column_gap_factor` median bubble widths.
fn cluster_columns(mut bubbles: Vec<PixelRect>, s: &SecondaryScanParams) -> Vec<Vec<PixelRect>> {
    let mut widths: Vec<usize> = bubbles.iter().map(|b| b.width).collect();
    widths.sort_unstable();
    let gap = s.column_gap_factor * widths[widths.len() / 2] as f32;

    bubbles.sort_by(|a, b| {
        a.center()
            .x
            .total_cmp(&b.center().x)
            .then(a.y.cmp(&b.y))
    });
    let mut columns: Vec<Vec<PixelRect>> = Vec::new();
    let mut last_x = f32::NEG_INFINITY;
    for b in bubbles {
        let cx = b.center().x;
        match columns.last_mut() {
            Some(col) if cx - last_x <= gap => col.push(b),
            _ => columns.push(vec![b]),
        }
        last_x = cx;
    }
    columns
}

fn center_window(r: &PixelRect, frac: f32) -> PixelRect {
    let c = r.center();
    let (hw, hh) = (0.5 * frac * r.width as f32, 0.5 * frac * r.height as f32);
    PixelRect::from_bounds(
        (c.x - hw).round().max(0.0) as usize,
        (c.y - hh).round().max(0.0) as usize,
        (c.x + hw).round().max(0.0) as usize,
        (c.y + hh).round().max(0.0) as usize,
    )
}

/// Fill positions the grid left open from the column scan.
fn merge(primary: DecodeResult, secondary: &[Symbol]) -> (DecodeResult, bool) {
    let mut changed = false;
    let DecodeResult {
        mut symbols,
        mut resolutions,
        ..
    } = primary;
    for (i, s) in secondary.iter().enumerate().take(symbols.len()) {
        if !symbols[i].is_resolved() && s.is_resolved() {
            symbols[i] = *s;
            resolutions[i] = Resolution::ColumnScan;
            changed = true;
        }
    }
    (DecodeResult::new(symbols, resolutions), changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::RecordingObserver;
    use crate::{render_sheet, SheetLayout, SheetMarks};
    use omr_core::Preprocessor;

    fn crippled() -> IdentityParams {
        let mut p = IdentityParams::default();
        for grid in [&mut p.student_grid, &mut p.test_grid] {
            grid.min_blob_area = 10_000;
            grid.density.min_density = 1.1;
        }
        p
    }

    #[test]
    fn merge_only_fills_open_positions() {
        let primary = DecodeResult::new(
            vec![Symbol::Digit(1), Symbol::Unresolved, Symbol::Unresolved],
            vec![Resolution::Blob, Resolution::Unresolved, Resolution::Unresolved],
        );
        let second = [Symbol::Digit(7), Symbol::Digit(2), Symbol::Unresolved];
        let (merged, changed) = merge(primary, &second);
        assert!(changed);
        assert_eq!(merged.text(), "12?");
        assert_eq!(merged.resolutions[1], Resolution::ColumnScan);
        approx::assert_relative_eq!(merged.confidence, 2.0 / 3.0);
    }

    #[test]
    fn column_scan_reads_both_boxes() {
        let layout = SheetLayout::default();
        let page = render_sheet(&layout, &SheetMarks::new("9081726354", "5555", &[]));
        let mask = Preprocessor::default().binarize(&page);
        let scan = IdentityDecoder::new(crippled())
            .column_scan(&mask)
            .expect("14 columns");
        let text: String = scan.student.iter().map(|s| s.to_string()).collect();
        assert_eq!(text, "9081726354");
        let test: String = scan.test.unwrap().iter().map(|s| s.to_string()).collect();
        assert_eq!(test, "5555");
    }

    #[test]
    fn low_confidence_runs_the_scan_even_when_it_finds_nothing() {
        let obs = RecordingObserver::new();
        let empty = BinaryMask::new(10, 10);
        let dec = IdentityDecoder::default();
        let reading = dec.decode(
            &crate::locate::IdentityRegions {
                student: region(&empty),
                test: region(&empty),
            },
            &empty,
            &obs,
        );
        // empty boxes decode to nothing and the scan finds no bubbles
        assert_eq!(reading.student_id(), "??????????");
        assert!(!reading.secondary_used);
        assert_eq!(obs.events().len(), 1);
    }

    fn region(mask: &BinaryMask) -> crate::locate::LocatedRegion {
        crate::locate::LocatedRegion {
            tier: crate::RegionTier::TemplatePosition,
            bounds: mask.frame(),
            image: mask.to_gray(),
            mask: mask.clone(),
        }
    }
}
