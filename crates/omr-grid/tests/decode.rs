use approx::assert_relative_eq;
use omr_core::BinaryMask;
use omr_grid::{
    DecodeResult, GridDecodeParams, GridDecoder, GridSpec, OriginParams, Resolution, Symbol,
};

const CELL: usize = 30;

#[derive(Clone, Copy)]
enum Mark {
    Ring,
    Filled,
    Hatched,
}

fn draw(mask: &mut BinaryMask, cx: usize, cy: usize, mark: Mark) {
    let r_out = 7.0_f32;
    let r_in = 5.0_f32;
    for y in cy - 8..=cy + 8 {
        for x in cx - 8..=cx + 8 {
            let dx = x as f32 + 0.5 - cx as f32;
            let dy = y as f32 + 0.5 - cy as f32;
            let d = (dx * dx + dy * dy).sqrt();
            let on = match mark {
                Mark::Ring => d <= r_out && d > r_in,
                Mark::Filled => d <= r_out,
                // pencil strokes: two columns on, one off
                Mark::Hatched => d <= r_out && (x + 8 - cx) % 3 != 2,
            };
            if on {
                mask.set(x, y, true);
            }
        }
    }
}

/// Digit grid, one mark per column given by `marks(column, row)`.
fn digit_sheet(columns: usize, rows: usize, marks: impl Fn(usize, usize) -> Mark) -> BinaryMask {
    let mut mask = BinaryMask::new(columns * CELL, rows * CELL);
    for c in 0..columns {
        for r in 0..rows {
            draw(&mut mask, c * CELL + CELL / 2, r * CELL + CELL / 2, marks(c, r));
        }
    }
    mask
}

fn assert_counts_consistent(r: &DecodeResult, positions: usize) {
    assert_eq!(r.positions(), positions);
    assert_eq!(r.resolutions.len(), positions);
    assert_eq!(r.resolved_count() + r.unresolved_count(), positions);
    assert_relative_eq!(r.confidence, r.resolved_count() as f32 / positions as f32);
}

#[test]
fn ten_by_ten_diagonal_reads_1234567890() {
    let mask = digit_sheet(10, 10, |c, r| if c == r { Mark::Filled } else { Mark::Ring });
    let r = GridDecoder::default().decode(&mask, &GridSpec::digits(10, 10));
    assert_eq!(r.text(), "1234567890");
    assert_eq!(r.confidence, 1.0);
    assert!(r.resolutions.iter().all(|x| *x == Resolution::Blob));
    assert_counts_consistent(&r, 10);
}

#[test]
fn empty_sub_image_is_all_unresolved() {
    let mask = BinaryMask::new(300, 300);
    let r = GridDecoder::default().decode(&mask, &GridSpec::digits(10, 10));
    assert!(r.symbols.iter().all(|s| *s == Symbol::Unresolved));
    assert_eq!(r.confidence, 0.0);
    assert_eq!(r.text(), "??????????");

    let unmarked = digit_sheet(4, 10, |_, _| Mark::Ring);
    let r = GridDecoder::default().decode(&unmarked, &GridSpec::digits(4, 10));
    assert_eq!(r.text(), "????");
    assert_counts_consistent(&r, 4);
}

#[test]
fn density_fallback_resolves_a_blobless_column() {
    // column 4 is hatched in pencil: erosion removes it, density still sees it
    let mask = digit_sheet(10, 10, |c, r| match (c, r) {
        (4, 4) => Mark::Hatched,
        (c, r) if c == r => Mark::Filled,
        _ => Mark::Ring,
    });
    let r = GridDecoder::default().decode(&mask, &GridSpec::digits(10, 10));
    assert_eq!(r.text(), "1234567890");
    assert_eq!(r.resolutions[4], Resolution::Density);
    assert_eq!(r.confidence, 1.0);
}

#[test]
fn density_fallback_rejects_a_tie() {
    let mask = digit_sheet(10, 10, |c, r| match (c, r) {
        (4, 4) | (4, 7) => Mark::Hatched,
        (c, r) if c == r => Mark::Filled,
        _ => Mark::Ring,
    });
    let r = GridDecoder::default().decode(&mask, &GridSpec::digits(10, 10));
    assert_eq!(r.text(), "1234?67890");
    assert_eq!(r.resolutions[4], Resolution::Unresolved);
    assert_relative_eq!(r.confidence, 0.9);
    assert_counts_consistent(&r, 10);
}

#[test]
fn two_filled_rows_in_one_column_stay_unresolved() {
    let mask = digit_sheet(4, 10, |c, r| {
        if r == c || (c == 2 && r == 8) {
            Mark::Filled
        } else {
            Mark::Ring
        }
    });
    let r = GridDecoder::default().decode(&mask, &GridSpec::digits(4, 10));
    assert_eq!(r.text(), "12?4");
}

#[test]
fn decoding_is_deterministic() {
    let mask = digit_sheet(10, 10, |c, r| match (c, r) {
        (3, 2) | (3, 6) => Mark::Filled,
        (7, _) => Mark::Ring,
        (c, r) if (c * 3) % 10 == r => Mark::Filled,
        _ => Mark::Ring,
    });
    let dec = GridDecoder::default();
    let spec = GridSpec::digits(10, 10);
    let first = dec.decode(&mask, &spec);
    for _ in 0..5 {
        assert_eq!(dec.decode(&mask.clone(), &spec), first);
    }
    assert_counts_consistent(&first, 10);
}

#[test]
fn choice_rows_read_letters_and_multiple() {
    const LABEL: usize = 40;
    let pattern = "ABCCCABCDBDCBCA";
    let labels = ['A', 'B', 'C', 'D'];
    let mut mask = BinaryMask::new(LABEL + 4 * CELL, 15 * CELL);
    for (row, ch) in pattern.chars().enumerate() {
        let cy = row * CELL + CELL / 2;
        // row number text in the label margin
        draw(&mut mask, 12, cy, Mark::Filled);
        for (k, l) in labels.iter().enumerate() {
            let filled = *l == ch || (row == 3 && k == 0);
            let mark = if filled { Mark::Filled } else { Mark::Ring };
            draw(&mut mask, LABEL + k * CELL + CELL / 2, cy, mark);
        }
    }

    let params = GridDecodeParams {
        origin: OriginParams {
            min_label_x_frac: 0.2,
            min_origin_area: 40,
            default_offset_frac: LABEL as f32 / (LABEL + 4 * CELL) as f32,
        },
        ..GridDecodeParams::default()
    };
    let r = GridDecoder::new(params).decode(&mask, &GridSpec::choices(15, &labels));
    let texts: Vec<String> = r.symbols.iter().map(|s| s.answer_text()).collect();
    let mut expected: Vec<String> = pattern.chars().map(|c| c.to_string()).collect();
    expected[3] = "MULTIPLE".to_string();
    assert_eq!(texts, expected);
    assert_eq!(r.confidence, 1.0);
}
