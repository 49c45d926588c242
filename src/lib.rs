//! canvas-reel records an animated `<canvas>` from a live web page.
//!
//! A run drives a rendering engine (headless Chromium) to a page, reveals the animation,
//! samples the canvas frame by frame and hands an image sequence to `ffmpeg`:
//!
//! - [`navigate`] loads the page and runs the interaction script
//! - [`locate`] picks one drawable surface
//! - [`sample`] runs the capture state machine and streams frames into a [`FrameSink`]
//! - [`write`] persists frames as a gapless numbered sequence
//! - [`encode`] assembles the sequence into an MP4
//!
//! [`pipeline`] wires the stages together; [`RunConfig`] carries every threshold.
#![forbid(unsafe_code)]

mod foundation;

pub mod config;
pub mod encode;
pub mod engine;
pub mod locate;
pub mod metadata;
pub mod navigate;
pub mod pipeline;
pub mod sample;
pub mod write;

pub use crate::foundation::core::{Dimensions, Fps, FrameIndex};
pub use crate::foundation::error::{ReelError, ReelResult};

pub use crate::config::{
    ArmAfter, BrowserConfig, CaptureConfig, EncodeConfig, NavigationConfig, OutputConfig,
    RunConfig,
};
pub use crate::encode::{AssembleConfig, AssembleReport, EncoderStrategy, assemble};
pub use crate::engine::chrome::ChromeEngine;
pub use crate::engine::scripted::{ScriptedEngine, TickScript};
pub use crate::engine::{EncodedImage, ImageFormat, RenderingEngine, SurfaceInfo, Tick};
pub use crate::locate::SurfacePolicy;
pub use crate::metadata::CaptureMetadata;
pub use crate::navigate::{Diagnostics, Interaction, NavigationPlan};
pub use crate::pipeline::{CaptureReport, RunReport};
pub use crate::sample::{CaptureStrategy, CaptureSummary, Frame, FrameSampler, StopReason};
pub use crate::write::{FrameNaming, FrameSequence, FrameSink, FrameWriter, InMemorySink};
