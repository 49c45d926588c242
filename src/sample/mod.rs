//! Frame Sampler.
//!
//! Drives one capture session through `IDLE -> ARMED -> SAMPLING -> DRAINING -> STOPPED`,
//! turning engine ticks into densely indexed [`Frame`]s and handing them to a
//! [`FrameSink`](crate::write::FrameSink) one poll batch at a time.

/// Poll loop and stop-condition wiring.
pub mod sampler;
/// Session state and counters.
pub mod session;

use std::time::Duration;

use crate::engine::EncodedImage;
use crate::foundation::core::{Dimensions, FrameIndex};

pub use sampler::{CaptureStrategy, CaptureSummary, FrameSampler, SamplerConfig};
pub use session::{CaptureSession, SamplerState, SessionLimits, StopReason};

/// One successful snapshot of the surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Dense index from 0 in capture order.
    pub index: FrameIndex,
    pub image: EncodedImage,
    /// Offset from session start; non-decreasing across a session.
    pub captured_at: Duration,
    pub dimensions: Dimensions,
}
