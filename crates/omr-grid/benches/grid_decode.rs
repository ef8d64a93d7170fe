use criterion::{black_box, criterion_group, criterion_main, Criterion};
use omr_core::BinaryMask;
use omr_grid::{GridDecoder, GridSpec};

fn disk(mask: &mut BinaryMask, cx: usize, cy: usize, r: usize, ring: bool) {
    let (r_out, r_in) = (r as f32, r as f32 - 2.0);
    for y in cy - r - 1..=cy + r + 1 {
        for x in cx - r - 1..=cx + r + 1 {
            let dx = x as f32 + 0.5 - cx as f32;
            let dy = y as f32 + 0.5 - cy as f32;
            let d = (dx * dx + dy * dy).sqrt();
            if d <= r_out && (!ring || d > r_in) {
                mask.set(x, y, true);
            }
        }
    }
}

fn student_block() -> BinaryMask {
    let (cw, ch) = (45, 35);
    let mut mask = BinaryMask::new(10 * cw, 11 * ch);
    for c in 0..10 {
        for r in 0..10 {
            let filled = (c * 7 + 3) % 10 == r;
            disk(&mut mask, c * cw + cw / 2, (r + 1) * ch + ch / 2, 7, !filled);
        }
    }
    mask
}

fn bench_decode(c: &mut Criterion) {
    let mask = student_block();
    let spec = GridSpec::digits(10, 10);
    let decoder = GridDecoder::new(omr_grid::GridDecodeParams {
        row_slots: Some(11),
        first_row_slot: 1,
        ..Default::default()
    });

    c.bench_function("decode_student_block_10x10", |b| {
        b.iter(|| decoder.decode(black_box(&mask), black_box(&spec)))
    });

    let empty = BinaryMask::new(mask.width, mask.height);
    c.bench_function("decode_empty_block_density_only", |b| {
        b.iter(|| decoder.decode(black_box(&empty), black_box(&spec)))
    });
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
