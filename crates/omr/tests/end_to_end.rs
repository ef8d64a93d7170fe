#![cfg(feature = "image")]

use std::sync::Arc;

use image::{DynamicImage, GrayImage as LumaImage};
use omr::detect::{read_sheet, read_sheet_default, read_sheet_from_gray_u8};
use omr::sheet::{render_sheet, with_margin, RegionTier, SheetLayout, SheetMarks};
use omr::{SheetPipeline, SnapshotDirObserver};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn marks() -> SheetMarks {
    SheetMarks::new("1234567890", "0815", &["A", "B", "C", "D", "", "AC"])
}

fn scan() -> LumaImage {
    with_margin(&render_sheet(&SheetLayout::default(), &marks()), 40, 255).to_luma()
}

#[test]
fn reads_a_decoded_rgb_scan() {
    init();
    let img = DynamicImage::ImageLuma8(scan()).to_rgb8();
    let r = read_sheet_default(&DynamicImage::ImageRgb8(img));

    assert!(r.success, "{:?}", r.error);
    assert_eq!(r.student_id, "1234567890");
    assert_eq!(r.test_id, "0815");
    assert_eq!(r.answers[..6], ["A", "B", "C", "D", "", "MULTIPLE"]);
    assert_eq!(r.answer_tier, Some(RegionTier::FiducialQuad));

    let json = serde_json::to_value(&r).unwrap();
    assert_eq!(json["student_id"], "1234567890");
    assert_eq!(json["answers"].as_array().unwrap().len(), 60);
}

#[test]
fn raw_gray_buffer_gives_the_typed_reading() {
    init();
    let img = scan();
    let reading =
        read_sheet_from_gray_u8(img.width(), img.height(), img.as_raw(), &SheetPipeline::default())
            .unwrap();
    assert_eq!(reading.identity.student_id(), "1234567890");
    assert_eq!(reading.page_markers_found, 4);
    assert_eq!(reading.to_result().answers[3], "D");
}

#[test]
fn snapshot_observer_writes_pngs() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let pipeline =
        SheetPipeline::default().with_observer(Arc::new(SnapshotDirObserver::new(dir.path())));
    let r = read_sheet(&DynamicImage::ImageLuma8(scan()), &pipeline);
    assert!(r.success);

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.first().map(String::as_str), Some("00_mask.png"));
    assert!(names.iter().any(|n| n.ends_with("_answer_region.png")));
    assert!(names.iter().any(|n| n.ends_with("_test_box.png")));
}
