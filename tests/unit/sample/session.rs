use std::time::Duration;

use super::*;
use crate::engine::{EncodedImage, ImageFormat};

fn limits() -> SessionLimits {
    SessionLimits {
        max_frames: 3,
        max_duration: Duration::from_secs(60),
        stall_window: 2,
        max_consecutive_failures: 2,
    }
}

fn ok(at_ms: Option<u64>) -> Tick {
    Tick::Captured {
        image: EncodedImage::raw(ImageFormat::Png, vec![1, 2, 3]),
        size: Dimensions::new(8, 6),
        at: at_ms.map(Duration::from_millis),
    }
}

fn fail() -> Tick {
    Tick::Failed {
        error: "tainted canvas".into(),
    }
}

#[test]
fn ticks_before_arming_are_ignored() {
    let mut s = CaptureSession::new(limits());
    s.on_tick(ok(None));
    assert_eq!(s.state(), SamplerState::Idle);
    assert_eq!(s.frames_captured(), 0);
    assert_eq!(s.ignored_ticks(), 1);
}

#[test]
fn first_capture_moves_armed_to_sampling() {
    let mut s = CaptureSession::new(limits());
    s.arm();
    assert_eq!(s.state(), SamplerState::Armed);
    assert!(s.is_active());
    s.on_tick(ok(Some(5)));
    assert_eq!(s.state(), SamplerState::Sampling);
    assert!(s.last_progress_at().is_some());
    assert_eq!(s.dimensions(), Some(Dimensions::new(8, 6)));
}

#[test]
fn failures_do_not_advance_the_index() {
    let mut s = CaptureSession::new(limits());
    s.arm();
    s.on_tick(ok(None));
    s.on_tick(fail());
    s.on_tick(fail());
    s.on_tick(ok(None));
    let frames = s.take_buffered();
    let indices: Vec<u64> = frames.iter().map(|f| f.index.0).collect();
    assert_eq!(indices, vec![0, 1]);
    assert_eq!(s.failures_total(), 2);
    assert_eq!(s.consecutive_failures(), 0);
    assert!(s.is_active());
}

#[test]
fn failure_threshold_is_exceeded_not_reached() {
    let mut s = CaptureSession::new(limits());
    s.arm();
    s.on_tick(fail());
    s.on_tick(fail());
    assert!(s.is_active());
    s.on_tick(fail());
    assert!(!s.is_active());
    assert_eq!(s.stop_reason(), Some(StopReason::Failures));
    assert_eq!(s.last_error(), Some("tainted canvas"));
}

#[test]
fn ticks_past_the_cap_are_ignored() {
    let mut s = CaptureSession::new(limits());
    s.arm();
    for _ in 0..5 {
        s.on_tick(ok(None));
    }
    assert_eq!(s.frames_captured(), 3);
    assert_eq!(s.ignored_ticks(), 2);
    assert_eq!(s.stop_reason(), Some(StopReason::MaxFrames));
    assert_eq!(s.state(), SamplerState::Draining);
    assert_eq!(s.take_buffered().len(), 3);
}

#[test]
fn engine_timestamps_are_kept_monotonic() {
    let mut s = CaptureSession::new(limits());
    s.arm();
    s.on_tick(ok(Some(40)));
    s.on_tick(ok(Some(30)));
    let times: Vec<Duration> = s.take_buffered().iter().map(|f| f.captured_at).collect();
    assert_eq!(times, vec![Duration::from_millis(40), Duration::from_millis(40)]);
    assert_eq!(s.first_frame_at(), Some(Duration::from_millis(40)));
}

#[test]
fn stall_window_counts_consecutive_empty_polls() {
    let mut s = CaptureSession::new(limits());
    s.arm();
    s.end_poll(0);
    assert_eq!(s.stalled_polls(), 1);
    s.end_poll(1);
    assert_eq!(s.stalled_polls(), 0);
    s.end_poll(0);
    s.end_poll(0);
    assert_eq!(s.stop_reason(), Some(StopReason::Stalled));
}

#[test]
fn first_stop_reason_wins_and_states_only_move_forward() {
    let mut s = CaptureSession::new(limits());
    s.arm();
    s.stop(StopReason::MaxDuration);
    s.stop(StopReason::Stalled);
    assert_eq!(s.stop_reason(), Some(StopReason::MaxDuration));
    s.finish();
    assert_eq!(s.state(), SamplerState::Stopped);
    s.arm();
    assert_eq!(s.state(), SamplerState::Stopped);
    assert!(!s.is_active());
}

#[test]
fn duration_cap_stops_at_end_of_poll() {
    let mut s = CaptureSession::new(SessionLimits {
        max_duration: Duration::from_millis(1),
        ..limits()
    });
    s.arm();
    std::thread::sleep(Duration::from_millis(5));
    assert_eq!(s.remaining(), Duration::ZERO);
    s.end_poll(1);
    assert_eq!(s.stop_reason(), Some(StopReason::MaxDuration));
}

#[test]
fn frames_at_or_past_the_duration_cap_are_rejected() {
    let mut s = CaptureSession::new(SessionLimits {
        max_duration: Duration::from_millis(100),
        ..limits()
    });
    s.arm();
    s.on_tick(ok(Some(40)));
    s.on_tick(ok(Some(100)));
    s.on_tick(ok(Some(120)));
    assert_eq!(s.frames_captured(), 1);
    assert_eq!(s.ignored_ticks(), 2);
    assert_eq!(s.stop_reason(), Some(StopReason::MaxDuration));
    assert_eq!(s.take_buffered().len(), 1);
}

#[test]
fn deadline_check_stops_an_expired_session() {
    let mut s = CaptureSession::new(SessionLimits {
        max_duration: Duration::from_millis(1),
        ..limits()
    });
    s.check_deadline();
    assert_eq!(s.stop_reason(), None);
    s.arm();
    std::thread::sleep(Duration::from_millis(5));
    s.check_deadline();
    assert!(!s.is_active());
    assert_eq!(s.stop_reason(), Some(StopReason::MaxDuration));
}
