use std::time::{Duration, Instant};

use crate::engine::Tick;
use crate::foundation::core::{Dimensions, FrameIndex};
use crate::sample::Frame;

/// Lifecycle of one capture session. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SamplerState {
    Idle,
    Armed,
    Sampling,
    Draining,
    Stopped,
}

/// Why sampling ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxFrames,
    MaxDuration,
    Stalled,
    Failures,
}

impl StopReason {
    pub fn describe(self) -> &'static str {
        match self {
            Self::MaxFrames => "the frame cap was reached",
            Self::MaxDuration => "the duration cap elapsed",
            Self::Stalled => "the source stopped producing frames",
            Self::Failures => "too many consecutive capture failures",
        }
    }
}

/// Thresholds a session enforces on itself.
#[derive(Clone, Copy, Debug)]
pub struct SessionLimits {
    pub max_frames: u64,
    pub max_duration: Duration,
    pub stall_window: u32,
    pub max_consecutive_failures: u32,
}

/// Mutable state of one capture.
///
/// Owned by the sampler and lent by `&mut` to the tick observer; nothing here is shared.
#[derive(Debug)]
pub struct CaptureSession {
    limits: SessionLimits,
    state: SamplerState,
    started_at: Instant,
    frames_captured: u64,
    last_progress_at: Option<Instant>,
    consecutive_failures: u32,
    failures_total: u64,
    stalled_polls: u32,
    is_active: bool,
    stop_reason: Option<StopReason>,
    last_error: Option<String>,
    ignored_ticks: u64,
    next_index: FrameIndex,
    first_frame_at: Option<Duration>,
    last_frame_at: Option<Duration>,
    dimensions: Option<Dimensions>,
    buffer: Vec<Frame>,
}

impl CaptureSession {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            limits,
            state: SamplerState::Idle,
            started_at: Instant::now(),
            frames_captured: 0,
            last_progress_at: None,
            consecutive_failures: 0,
            failures_total: 0,
            stalled_polls: 0,
            is_active: false,
            stop_reason: None,
            last_error: None,
            ignored_ticks: 0,
            next_index: FrameIndex(0),
            first_frame_at: None,
            last_frame_at: None,
            dimensions: None,
            buffer: Vec::new(),
        }
    }

    /// IDLE -> ARMED. Starts the session clock.
    pub fn arm(&mut self) {
        if self.advance(SamplerState::Armed) {
            self.started_at = Instant::now();
            self.is_active = true;
        }
    }

    fn advance(&mut self, to: SamplerState) -> bool {
        if to > self.state {
            self.state = to;
            true
        } else {
            false
        }
    }

    /// Fold one engine tick into the session.
    pub fn on_tick(&mut self, tick: Tick) {
        if !self.is_active {
            self.ignored_ticks += 1;
            return;
        }
        match tick {
            Tick::Captured { image, size, at } => {
                let elapsed = self.elapsed();
                // Engine clocks can jitter; keep capture times monotonic.
                let captured_at = at
                    .unwrap_or(elapsed)
                    .max(self.last_frame_at.unwrap_or_default());
                if captured_at >= self.limits.max_duration {
                    self.ignored_ticks += 1;
                    self.stop(StopReason::MaxDuration);
                    return;
                }
                let index = self.next_index;
                self.buffer.push(Frame {
                    index,
                    image,
                    captured_at,
                    dimensions: size,
                });
                self.next_index = index.next();
                self.frames_captured += 1;
                self.consecutive_failures = 0;
                self.last_progress_at = Some(Instant::now());
                self.first_frame_at.get_or_insert(captured_at);
                self.last_frame_at = Some(captured_at);
                self.dimensions.get_or_insert(size);
                self.advance(SamplerState::Sampling);

                if self.frames_captured >= self.limits.max_frames {
                    self.stop(StopReason::MaxFrames);
                }
            }
            Tick::Failed { error } => {
                self.consecutive_failures += 1;
                self.failures_total += 1;
                self.last_error = Some(error);
                if self.consecutive_failures > self.limits.max_consecutive_failures {
                    self.stop(StopReason::Failures);
                }
            }
        }
    }

    /// Stop with [`StopReason::MaxDuration`] once the session clock reaches the cap.
    pub fn check_deadline(&mut self) {
        if self.is_active && self.elapsed() >= self.limits.max_duration {
            self.stop(StopReason::MaxDuration);
        }
    }

    /// Close out one poll that produced `fresh` frames and check the time-based conditions.
    pub fn end_poll(&mut self, fresh: u64) {
        if !self.is_active {
            return;
        }
        if fresh == 0 {
            self.stalled_polls += 1;
        } else {
            self.stalled_polls = 0;
        }
        if self.stalled_polls >= self.limits.stall_window {
            self.stop(StopReason::Stalled);
        } else if self.elapsed() >= self.limits.max_duration {
            self.stop(StopReason::MaxDuration);
        }
    }

    /// Leave SAMPLING for DRAINING. The first reason wins; later calls are no-ops.
    pub fn stop(&mut self, reason: StopReason) {
        if !self.is_active {
            return;
        }
        self.is_active = false;
        self.stop_reason = Some(reason);
        self.advance(SamplerState::Draining);
    }

    /// DRAINING -> STOPPED.
    pub fn finish(&mut self) {
        self.is_active = false;
        self.advance(SamplerState::Stopped);
    }

    /// Hand over frames captured since the last call.
    pub fn take_buffered(&mut self) -> Vec<Frame> {
        std::mem::take(&mut self.buffer)
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Time left before the duration cap.
    pub fn remaining(&self) -> Duration {
        self.limits.max_duration.saturating_sub(self.elapsed())
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    pub fn last_progress_at(&self) -> Option<Instant> {
        self.last_progress_at
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn failures_total(&self) -> u64 {
        self.failures_total
    }

    pub fn stalled_polls(&self) -> u32 {
        self.stalled_polls
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn ignored_ticks(&self) -> u64 {
        self.ignored_ticks
    }

    pub fn first_frame_at(&self) -> Option<Duration> {
        self.first_frame_at
    }

    pub fn last_frame_at(&self) -> Option<Duration> {
        self.last_frame_at
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sample/session.rs"]
mod tests;
