use std::time::Duration;

use chrono::TimeZone as _;

use super::*;
use crate::foundation::core::{Dimensions, FrameIndex};

fn summary(frames: u64, first_ms: u64, last_ms: u64) -> CaptureSummary {
    CaptureSummary {
        frames_captured: frames,
        stop_reason: StopReason::Stalled,
        elapsed: Duration::from_millis(last_ms + 500),
        first_frame_at: Some(Duration::from_millis(first_ms)),
        last_frame_at: Some(Duration::from_millis(last_ms)),
        failures_total: 0,
        ignored_ticks: 0,
        dimensions: Some(Dimensions::new(1280, 720)),
    }
}

fn metadata(frames: u64, first_ms: u64, last_ms: u64) -> CaptureMetadata {
    let report = WriteReport {
        written: frames - 1,
        missing: vec![FrameIndex(3)],
        bytes: 1234,
        cleared: 0,
    };
    let surface = SurfaceInfo {
        index: 2,
        id: "stage".into(),
        size: Dimensions::new(1280, 720),
        display_size: Dimensions::new(640, 360),
    };
    let naming = FrameNaming::for_capacity("frame", "png", 0, 900, None);
    let at = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
    CaptureMetadata::from_capture(
        &summary(frames, first_ms, last_ms),
        &report,
        &surface,
        60,
        Path::new("frames"),
        &naming,
        at,
    )
}

#[test]
fn measured_rate_and_duration_come_from_frame_timestamps() {
    let m = metadata(91, 1000, 4000);
    assert_eq!(m.total_duration_ms, 3000);
    let fps = m.actual_fps.unwrap();
    assert!((fps - 30.333).abs() < 0.01, "{fps}");
    assert_eq!(m.total_frames, 90);
    assert_eq!(m.missing_indices, vec![3]);
    assert_eq!(m.capture_date, "2024-05-01T12:30:00.000Z");
}

#[test]
fn encode_fps_prefers_measured_only_when_asked() {
    let m = metadata(91, 1000, 4000);
    assert_eq!(m.encode_fps(false).unwrap(), Fps::whole(60).unwrap());
    assert_eq!(m.encode_fps(true).unwrap(), Fps::whole(30).unwrap());

    let flat = CaptureMetadata {
        actual_fps: None,
        ..m
    };
    assert_eq!(flat.encode_fps(true).unwrap(), Fps::whole(60).unwrap());
}

#[test]
fn written_file_reads_back() {
    let path = PathBuf::from("target")
        .join("unit_metadata")
        .join("capture_metadata.json");
    let m = metadata(10, 0, 150);
    m.write(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"stop_reason\": \"stalled\""), "{text}");
    assert_eq!(CaptureMetadata::read(&path).unwrap(), m);
}

#[test]
fn malformed_metadata_is_a_serde_error() {
    let path = PathBuf::from("target").join("unit_metadata_bad.json");
    std::fs::create_dir_all("target").unwrap();
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        CaptureMetadata::read(&path),
        Err(ReelError::Serde(_))
    ));
}
