use std::time::Duration;

use base64::Engine as _;

use super::*;
use crate::engine::scripted::scripted_png;
use crate::engine::{EncodedImage, ImageFormat, SurfaceInfo};
use crate::foundation::core::{Dimensions, Fps};
use crate::write::InMemorySink;

fn frame(i: u64) -> Frame {
    let png = scripted_png(i, Dimensions::new(4, 4)).unwrap();
    let url = format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    );
    Frame {
        index: FrameIndex(i),
        image: EncodedImage::data_url(url),
        captured_at: Duration::from_millis(i * 16),
        dimensions: Dimensions::new(4, 4),
    }
}

fn sink_cfg() -> SinkConfig {
    SinkConfig {
        fps: Fps::whole(60).unwrap(),
        max_frames: 10,
        surface: SurfaceInfo {
            index: 0,
            id: String::new(),
            size: Dimensions::new(4, 4),
            display_size: Dimensions::new(4, 4),
        },
    }
}

fn write_all(writer: &mut FrameWriter, n: u64) {
    writer.begin(sink_cfg()).unwrap();
    for i in 0..n {
        writer.push_frame(frame(i)).unwrap();
    }
    writer.end().unwrap();
}

fn naming() -> FrameNaming {
    FrameNaming::for_capacity("frame", "png", 0, 10, None)
}

#[test]
fn writes_gapless_decoded_files() {
    let dir = PathBuf::from("target").join("unit_writer_gapless");
    let _ = std::fs::remove_dir_all(&dir);
    let mut writer = FrameWriter::new(&dir, naming());
    write_all(&mut writer, 5);

    let report = writer.report();
    assert_eq!(report.written, 5);
    assert!(report.missing.is_empty());
    for i in 0..5 {
        let path = dir.join(format!("frame-{i:06}.png"));
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, scripted_png(i, Dimensions::new(4, 4)).unwrap());
    }
    let seq = crate::write::FrameSequence::scan(&dir, writer.naming()).unwrap();
    seq.ensure_contiguous().unwrap();
    assert_eq!(seq.len(), 5);
}

#[test]
fn rerun_with_overwrite_is_byte_identical() {
    let dir = PathBuf::from("target").join("unit_writer_rerun");
    let _ = std::fs::remove_dir_all(&dir);
    let mut first = FrameWriter::new(&dir, naming());
    write_all(&mut first, 3);
    let before: Vec<Vec<u8>> = (0..3)
        .map(|i| std::fs::read(first.path_for(FrameIndex(i))).unwrap())
        .collect();

    let mut second = FrameWriter::new(&dir, naming()).clear_stale(false);
    write_all(&mut second, 3);
    let after: Vec<Vec<u8>> = (0..3)
        .map(|i| std::fs::read(second.path_for(FrameIndex(i))).unwrap())
        .collect();
    assert_eq!(before, after);
    assert_eq!(first.report().bytes, second.report().bytes);
}

#[test]
fn without_overwrite_existing_files_are_recorded_missing() {
    let dir = PathBuf::from("target").join("unit_writer_no_overwrite");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("frame-000001.png"), b"keep").unwrap();

    let mut writer = FrameWriter::new(&dir, naming())
        .overwrite(false)
        .clear_stale(false);
    write_all(&mut writer, 3);
    assert_eq!(writer.report().written, 2);
    assert_eq!(writer.report().missing, vec![FrameIndex(1)]);
    assert_eq!(std::fs::read(dir.join("frame-000001.png")).unwrap(), b"keep");
}

#[test]
fn without_overwrite_stale_clearing_keeps_existing_frames() {
    let dir = PathBuf::from("target").join("unit_writer_no_overwrite_default_clear");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("frame-000000.png"), b"keep").unwrap();
    std::fs::write(dir.join("frame-000007.png"), b"older run").unwrap();

    let mut writer = FrameWriter::new(&dir, naming()).overwrite(false);
    write_all(&mut writer, 2);
    let report = writer.into_report();
    assert_eq!(report.cleared, 0);
    assert_eq!(report.written, 1);
    assert_eq!(report.missing, vec![FrameIndex(0)]);
    assert_eq!(std::fs::read(dir.join("frame-000000.png")).unwrap(), b"keep");
    assert!(dir.join("frame-000007.png").is_file());
}

#[test]
fn stale_frames_from_a_longer_run_are_cleared() {
    let dir = PathBuf::from("target").join("unit_writer_stale");
    let _ = std::fs::remove_dir_all(&dir);
    let mut long = FrameWriter::new(&dir, naming());
    write_all(&mut long, 6);

    let mut short = FrameWriter::new(&dir, naming());
    write_all(&mut short, 2);
    assert_eq!(short.report().cleared, 6);
    let seq = crate::write::FrameSequence::scan(&dir, short.naming()).unwrap();
    assert_eq!(seq.len(), 2);
}

#[test]
fn undecodable_frames_are_recorded_not_raised() {
    let dir = PathBuf::from("target").join("unit_writer_bad_payload");
    let _ = std::fs::remove_dir_all(&dir);
    let mut writer = FrameWriter::new(&dir, naming());
    writer.begin(sink_cfg()).unwrap();
    writer.push_frame(frame(0)).unwrap();
    let mut bad = frame(1);
    bad.image = EncodedImage::data_url("data:image/png;base64,");
    writer.push_frame(bad).unwrap();
    writer.push_frame(frame(2)).unwrap();
    writer.end().unwrap();

    let report = writer.into_report();
    assert_eq!(report.written, 2);
    assert_eq!(report.missing, vec![FrameIndex(1)]);
}

#[test]
fn out_of_order_push_is_a_hard_error() {
    let dir = PathBuf::from("target").join("unit_writer_order");
    let mut writer = FrameWriter::new(&dir, naming());
    writer.begin(sink_cfg()).unwrap();
    writer.push_frame(frame(1)).unwrap();
    assert!(writer.push_frame(frame(1)).is_err());
    assert!(writer.push_frame(frame(0)).is_err());

    let mut mem = InMemorySink::new();
    mem.begin(sink_cfg()).unwrap();
    mem.push_frame(frame(0)).unwrap();
    mem.push_frame(frame(2)).unwrap();
    assert!(mem.push_frame(frame(2)).is_err());
    assert_eq!(mem.frames().len(), 2);
}

#[test]
fn payloads_that_are_not_images_are_recorded_missing() {
    let dir = PathBuf::from("target").join("unit_writer_not_an_image");
    let _ = std::fs::remove_dir_all(&dir);
    let mut writer = FrameWriter::new(&dir, naming());
    writer.begin(sink_cfg()).unwrap();
    let mut bad = frame(0);
    bad.image = EncodedImage::raw(ImageFormat::Png, b"plain text".to_vec());
    writer.push_frame(bad).unwrap();
    writer.push_frame(frame(1)).unwrap();
    writer.end().unwrap();

    let report = writer.into_report();
    assert_eq!(report.written, 1);
    assert_eq!(report.missing, vec![FrameIndex(0)]);
    assert!(!dir.join("frame-000000.png").exists());
}
