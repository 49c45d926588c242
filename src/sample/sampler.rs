use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::{RenderingEngine, SurfaceInfo, Tick, TickHook};
use crate::foundation::core::{Dimensions, Fps};
use crate::foundation::error::{ReelError, ReelResult};
use crate::sample::session::{CaptureSession, SessionLimits, StopReason};
use crate::write::{FrameSink, SinkConfig};

const PROGRESS_EVERY: u64 = 60;

/// Where ticks come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStrategy {
    /// Snapshot after each animation-frame callback of the page.
    #[default]
    AnimationFrame,
    /// Snapshot on a page-side timer at the target rate.
    Interval,
    /// Host-driven clipped screenshot on every poll.
    Screenshot,
}

#[derive(Clone, Debug)]
pub struct SamplerConfig {
    pub strategy: CaptureStrategy,
    pub fps: Fps,
    pub max_frames: u64,
    pub max_duration: Duration,
    pub poll_interval: Duration,
    pub stall_window: u32,
    pub max_consecutive_failures: u32,
}

impl SamplerConfig {
    pub fn validate(&self) -> ReelResult<()> {
        if self.max_frames == 0 {
            return Err(ReelError::validation("max_frames must be non-zero"));
        }
        if self.max_duration.is_zero() {
            return Err(ReelError::validation("max_duration must be non-zero"));
        }
        if self.poll_interval.is_zero() {
            return Err(ReelError::validation("poll_interval must be non-zero"));
        }
        if self.stall_window == 0 {
            return Err(ReelError::validation("stall_window must be non-zero"));
        }
        Ok(())
    }

    fn hook(&self) -> Option<TickHook> {
        match self.strategy {
            CaptureStrategy::AnimationFrame => Some(TickHook::AnimationFrame),
            CaptureStrategy::Interval => Some(TickHook::Interval(self.fps.frame_duration())),
            CaptureStrategy::Screenshot => None,
        }
    }

    fn limits(&self) -> SessionLimits {
        SessionLimits {
            max_frames: self.max_frames,
            max_duration: self.max_duration,
            stall_window: self.stall_window,
            max_consecutive_failures: self.max_consecutive_failures,
        }
    }
}

/// Result of a completed session.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureSummary {
    pub frames_captured: u64,
    pub stop_reason: StopReason,
    pub elapsed: Duration,
    pub first_frame_at: Option<Duration>,
    pub last_frame_at: Option<Duration>,
    pub failures_total: u64,
    pub ignored_ticks: u64,
    pub dimensions: Option<Dimensions>,
}

impl CaptureSummary {
    /// Span between the first and last captured frame.
    pub fn span(&self) -> Duration {
        match (self.first_frame_at, self.last_frame_at) {
            (Some(first), Some(last)) => last.saturating_sub(first),
            _ => Duration::ZERO,
        }
    }

    /// Frames per second over the captured span, `frames * 1000 / span_ms`.
    ///
    /// `None` when fewer than two frames were captured or they share a timestamp.
    pub fn measured_fps(&self) -> Option<f64> {
        let span_ms = self.span().as_secs_f64() * 1000.0;
        if self.frames_captured < 2 || span_ms <= 0.0 {
            return None;
        }
        Some(self.frames_captured as f64 * 1000.0 / span_ms)
    }
}

/// Polls a rendering engine for ticks and feeds frames to a sink.
#[derive(Clone, Debug)]
pub struct FrameSampler {
    cfg: SamplerConfig,
}

impl FrameSampler {
    pub fn new(cfg: SamplerConfig) -> ReelResult<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.cfg
    }

    /// Run one capture session on `surface` to completion.
    ///
    /// Frames are flushed to `sink` after every poll. The tick hook is removed and the sink
    /// ended on every path that got past arming.
    pub fn run(
        &self,
        engine: &mut dyn RenderingEngine,
        surface: &SurfaceInfo,
        sink: &mut dyn FrameSink,
    ) -> ReelResult<CaptureSummary> {
        self.run_with(engine, surface, sink, |_| Ok(()))
    }

    /// Like [`FrameSampler::run`], with `prelude` executed between arming and the first poll.
    ///
    /// Ticks produced while the prelude runs queue inside the engine and count towards the
    /// session.
    #[tracing::instrument(skip_all, fields(surface = surface.index, strategy = ?self.cfg.strategy))]
    pub fn run_with<F>(
        &self,
        engine: &mut dyn RenderingEngine,
        surface: &SurfaceInfo,
        sink: &mut dyn FrameSink,
        prelude: F,
    ) -> ReelResult<CaptureSummary>
    where
        F: FnOnce(&mut dyn RenderingEngine) -> ReelResult<()>,
    {
        let mut session = CaptureSession::new(self.cfg.limits());
        sink.begin(SinkConfig {
            fps: self.cfg.fps,
            max_frames: self.cfg.max_frames,
            surface: surface.clone(),
        })?;

        let hook = self.cfg.hook();
        if let Some(hook) = hook {
            engine.install_tick_hook(surface, hook)?;
        }
        session.arm();
        info!(
            max_frames = self.cfg.max_frames,
            max_duration = ?self.cfg.max_duration,
            poll = ?self.cfg.poll_interval,
            "sampler armed"
        );

        let sampled = prelude(&mut *engine)
            .and_then(|()| self.poll_until_stopped(engine, surface, &mut session, sink));

        // DRAINING
        if hook.is_some()
            && let Err(e) = engine.remove_tick_hook()
        {
            warn!(error = %e, "failed to remove tick hook");
        }
        sampled?;
        flush(&mut session, sink)?;
        sink.end()?;
        session.finish();

        let stop_reason = session.stop_reason().unwrap_or(StopReason::MaxDuration);
        let summary = CaptureSummary {
            frames_captured: session.frames_captured(),
            stop_reason,
            elapsed: session.elapsed(),
            first_frame_at: session.first_frame_at(),
            last_frame_at: session.last_frame_at(),
            failures_total: session.failures_total(),
            ignored_ticks: session.ignored_ticks(),
            dimensions: session.dimensions(),
        };
        info!(
            frames = summary.frames_captured,
            reason = ?summary.stop_reason,
            elapsed = ?summary.elapsed,
            failures = summary.failures_total,
            "sampler stopped"
        );

        if stop_reason == StopReason::Failures {
            return Err(ReelError::CaptureFailure {
                consecutive: session.consecutive_failures(),
                last_error: session.last_error().unwrap_or("unknown").to_owned(),
            });
        }
        if summary.frames_captured == 0 {
            return Err(ReelError::EmptyCapture(stop_reason.describe().to_owned()));
        }
        Ok(summary)
    }

    fn poll_until_stopped(
        &self,
        engine: &mut dyn RenderingEngine,
        surface: &SurfaceInfo,
        session: &mut CaptureSession,
        sink: &mut dyn FrameSink,
    ) -> ReelResult<()> {
        let mut next_progress = PROGRESS_EVERY;
        loop {
            // A long prelude can use up the whole budget before the first drain.
            session.check_deadline();
            if !session.is_active() {
                break;
            }
            let before = session.frames_captured();
            match self.cfg.strategy {
                CaptureStrategy::Screenshot => match engine.snapshot_surface(surface) {
                    Ok(image) => session.on_tick(Tick::Captured {
                        image,
                        size: surface.size,
                        at: None,
                    }),
                    Err(e) => session.on_tick(Tick::Failed {
                        error: e.to_string(),
                    }),
                },
                CaptureStrategy::AnimationFrame | CaptureStrategy::Interval => {
                    let drained = engine.drain_ticks(&mut |tick: Tick| session.on_tick(tick));
                    match drained {
                        Ok(n) => debug!(ticks = n, "drained"),
                        Err(e) => {
                            warn!(error = %e, "tick drain failed");
                            session.on_tick(Tick::Failed {
                                error: e.to_string(),
                            });
                        }
                    }
                }
            }

            let fresh = session.frames_captured() - before;
            flush(session, sink)?;
            session.end_poll(fresh);

            if session.frames_captured() >= next_progress {
                info!(
                    frames = session.frames_captured(),
                    elapsed = ?session.elapsed(),
                    "capture progress"
                );
                next_progress = (session.frames_captured() / PROGRESS_EVERY + 1) * PROGRESS_EVERY;
            }

            if session.is_active() {
                std::thread::sleep(self.cfg.poll_interval.min(session.remaining()));
            }
        }
        Ok(())
    }
}

fn flush(session: &mut CaptureSession, sink: &mut dyn FrameSink) -> ReelResult<()> {
    for frame in session.take_buffered() {
        sink.push_frame(frame)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/sample/sampler.rs"]
mod tests;
