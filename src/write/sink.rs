use crate::engine::SurfaceInfo;
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{ReelError, ReelResult};
use crate::sample::Frame;

/// Configuration handed to a [`FrameSink`] when a capture session starts.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Target capture rate.
    pub fps: Fps,
    /// Upper bound on the number of frames that will be pushed.
    pub max_frames: u64,
    /// Surface the frames are taken from.
    pub surface: SurfaceInfo,
}

/// Consumer of captured frames.
///
/// Ordering contract: `push_frame` is called in strictly increasing [`FrameIndex`] order; a
/// sink rejects anything else.
pub trait FrameSink {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> ReelResult<()>;
    /// Take ownership of one frame.
    fn push_frame(&mut self, frame: Frame) -> ReelResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> ReelResult<()>;
}

/// Enforce the strictly increasing index contract.
pub(crate) fn check_order(last: &mut Option<FrameIndex>, idx: FrameIndex) -> ReelResult<()> {
    if let Some(prev) = *last
        && idx <= prev
    {
        return Err(ReelError::validation(format!(
            "sink received out-of-order frame index {idx} after {prev}"
        )));
    }
    *last = Some(idx);
    Ok(())
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<Frame>,
    last_idx: Option<FrameIndex>,
    ended: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> ReelResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.last_idx = None;
        self.ended = false;
        Ok(())
    }

    fn push_frame(&mut self, frame: Frame) -> ReelResult<()> {
        check_order(&mut self.last_idx, frame.index)?;
        self.frames.push(frame);
        Ok(())
    }

    fn end(&mut self) -> ReelResult<()> {
        self.ended = true;
        Ok(())
    }
}
