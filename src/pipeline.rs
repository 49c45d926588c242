//! Stage wiring: Navigator -> Locator -> Sampler -> Writer -> Metadata -> Assembler.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::{ArmAfter, RunConfig};
use crate::encode::{self, AssembleConfig, AssembleReport};
use crate::engine::{RenderingEngine, SurfaceInfo};
use crate::foundation::error::ReelResult;
use crate::locate;
use crate::metadata::CaptureMetadata;
use crate::navigate::{self, Checkpoint, Diagnostics};
use crate::sample::{CaptureSummary, FrameSampler};
use crate::write::{FrameWriter, WriteReport};

/// Everything the capture half of a run produced.
#[derive(Clone, Debug)]
pub struct CaptureReport {
    pub surface: SurfaceInfo,
    pub summary: CaptureSummary,
    pub write: WriteReport,
    pub metadata: CaptureMetadata,
    pub metadata_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct RunReport {
    pub capture: CaptureReport,
    pub video: AssembleReport,
}

/// Navigate, locate, sample and write frames plus metadata.
///
/// The engine is left open; closing it is the caller's job.
#[tracing::instrument(skip_all, fields(url = %cfg.navigation.url))]
pub fn capture(engine: &mut dyn RenderingEngine, cfg: &RunConfig) -> ReelResult<CaptureReport> {
    cfg.validate()?;
    let diagnostics = Diagnostics::new(cfg.navigation.diagnostics_dir.clone());
    let plan = cfg.navigation_plan();
    let sampler = FrameSampler::new(cfg.capture.sampler()?)?;
    let naming = cfg.frame_naming();
    let mut writer = FrameWriter::new(&cfg.output.frames_dir, naming.clone())
        .overwrite(cfg.output.overwrite)
        .clear_stale(cfg.output.clear_stale);

    navigate::open(engine, &plan, &diagnostics)?;

    let (surface, summary) = match cfg.capture.arm_after {
        ArmAfter::Interactions => {
            navigate::interact(engine, &plan.steps, &diagnostics)?;
            let surface = locate::locate(engine, &cfg.capture.surface)?;
            diagnostics.checkpoint(engine, Checkpoint::BeforeCapture);
            let summary = sampler.run(engine, &surface, &mut writer)?;
            (surface, summary)
        }
        ArmAfter::Navigation => {
            let surface = locate::locate(engine, &cfg.capture.surface)?;
            diagnostics.checkpoint(engine, Checkpoint::BeforeCapture);
            let summary = sampler.run_with(engine, &surface, &mut writer, |engine| {
                navigate::interact(engine, &plan.steps, &Diagnostics::disabled())
            })?;
            (surface, summary)
        }
    };
    diagnostics.checkpoint(engine, Checkpoint::AfterCapture);

    let write = writer.into_report();
    if !write.missing.is_empty() {
        warn!(
            missing = write.missing.len(),
            "some frames could not be written; the sequence has gaps"
        );
    }
    let metadata = CaptureMetadata::from_capture(
        &summary,
        &write,
        &surface,
        cfg.capture.target_fps,
        &cfg.output.frames_dir,
        &naming,
        chrono::Utc::now(),
    );
    metadata.write(&cfg.output.metadata_path)?;

    Ok(CaptureReport {
        surface,
        summary,
        write,
        metadata,
        metadata_path: cfg.output.metadata_path.clone(),
    })
}

/// Assemble a video from frames on disk.
///
/// With `metadata`, frames are located through the naming recorded at capture time; without
/// it, through the naming `cfg` describes.
#[tracing::instrument(skip_all)]
pub fn encode(cfg: &RunConfig, metadata: Option<&CaptureMetadata>) -> ReelResult<AssembleReport> {
    cfg.encode.validate()?;
    let (frames_dir, naming, fps) = match metadata {
        Some(m) => (
            m.frames_dir.clone(),
            m.naming.clone(),
            m.encode_fps(cfg.encode.fps_from_metadata)?,
        ),
        None => (
            cfg.output.frames_dir.clone(),
            cfg.frame_naming(),
            cfg.capture.fps()?,
        ),
    };
    let assemble_cfg = AssembleConfig {
        frames_dir,
        naming,
        fps,
        out_path: cfg.output.resolved_video_path(chrono::Utc::now()),
        overwrite: cfg.output.overwrite,
        strategies: cfg.encode.strategies.clone(),
        scale: cfg.encode.scale,
        timeout: cfg.encode.timeout,
    };
    let report = encode::assemble(&assemble_cfg)?;

    if cfg.output.cleanup_frames {
        encode::cleanup_frames(&assemble_cfg.frames_dir, &assemble_cfg.naming)?;
    }
    Ok(report)
}

/// [`encode`] using the metadata file named by `cfg` when it exists.
pub fn encode_from_disk(cfg: &RunConfig) -> ReelResult<AssembleReport> {
    let path = &cfg.output.metadata_path;
    let metadata = if path.is_file() {
        Some(CaptureMetadata::read(path)?)
    } else {
        warn!(path = %path.display(), "no capture metadata; using configured naming and rate");
        None
    };
    encode(cfg, metadata.as_ref())
}

/// Capture then encode.
pub fn run(engine: &mut dyn RenderingEngine, cfg: &RunConfig) -> ReelResult<RunReport> {
    let capture = capture(engine, cfg)?;
    info!(
        frames = capture.write.written,
        actual_fps = ?capture.metadata.actual_fps,
        "capture complete"
    );
    let video = encode(cfg, Some(&capture.metadata))?;
    Ok(RunReport { capture, video })
}
