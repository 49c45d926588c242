//! Video Assembler: turn a frame sequence on disk into an MP4 with an external encoder.

/// `ffmpeg` invocation: strategies, argument template, process supervision.
pub mod ffmpeg;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::foundation::core::{Dimensions, Fps};
use crate::foundation::error::{ReelError, ReelResult};
use crate::write::{FrameNaming, FrameSequence};

pub use ffmpeg::{EncoderStrategy, build_args, is_ffmpeg_on_path, scale_filter};

#[derive(Clone, Debug)]
pub struct AssembleConfig {
    pub frames_dir: PathBuf,
    pub naming: FrameNaming,
    pub fps: Fps,
    pub out_path: PathBuf,
    pub overwrite: bool,
    /// Tried in order; the first one that yields a non-empty file wins.
    pub strategies: Vec<EncoderStrategy>,
    pub scale: Option<Dimensions>,
    /// Per-strategy bound on encoder runtime.
    pub timeout: Duration,
}

impl AssembleConfig {
    pub fn validate(&self) -> ReelResult<()> {
        if self.strategies.is_empty() {
            return Err(ReelError::validation("at least one encoder strategy is required"));
        }
        if let Some(scale) = self.scale
            && (scale.is_empty() || !scale.is_even())
        {
            return Err(ReelError::validation(format!(
                "scale {scale} must be non-zero and even (required for yuv420p output)"
            )));
        }
        if self.timeout.is_zero() {
            return Err(ReelError::validation("encoder timeout must be non-zero"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssembleReport {
    pub out_path: PathBuf,
    pub strategy: EncoderStrategy,
    pub bytes: u64,
    pub frames: usize,
    pub fps: Fps,
}

/// Encode the sequence described by `cfg`, falling back through the strategy chain.
///
/// The sequence must be contiguous from the naming's start offset; a gap is refused before any
/// encoder runs.
#[tracing::instrument(skip(cfg), fields(dir = %cfg.frames_dir.display(), out = %cfg.out_path.display()))]
pub fn assemble(cfg: &AssembleConfig) -> ReelResult<AssembleReport> {
    cfg.validate()?;
    let sequence = FrameSequence::scan(&cfg.frames_dir, &cfg.naming)?;
    sequence.ensure_contiguous()?;
    let source = source_dimensions(&sequence)?;

    ffmpeg::ensure_parent_dir(&cfg.out_path)?;
    if !cfg.overwrite && cfg.out_path.exists() {
        return Err(ReelError::validation(format!(
            "output file '{}' already exists",
            cfg.out_path.display()
        )));
    }
    info!(
        frames = sequence.len(),
        fps = %cfg.fps,
        source = %source,
        "assembling video"
    );

    let mut attempts = Vec::new();
    for strategy in &cfg.strategies {
        let args = build_args(cfg, strategy, source);
        match ffmpeg::run_strategy(cfg, strategy, &args) {
            Ok(bytes) => {
                info!(strategy = %strategy.label(), bytes, "video written");
                return Ok(AssembleReport {
                    out_path: cfg.out_path.clone(),
                    strategy: strategy.clone(),
                    bytes,
                    frames: sequence.len(),
                    fps: cfg.fps,
                });
            }
            Err(e) => {
                warn!(strategy = %strategy.label(), error = %e, "encoder strategy failed");
                // Leftovers of a failed attempt would block `-n` on the next one.
                if matches!(e, ffmpeg::AttemptError::Failed(_)) && cfg.out_path.exists() {
                    let _ = std::fs::remove_file(&cfg.out_path);
                }
                attempts.push(format!("{}: {e}", strategy.label()));
            }
        }
    }
    Err(ReelError::encoding(format!(
        "all {} strategies failed [{}]",
        attempts.len(),
        attempts.join("; ")
    )))
}

fn source_dimensions(sequence: &FrameSequence) -> ReelResult<Dimensions> {
    let paths = sequence.paths();
    let first = paths
        .first()
        .ok_or_else(|| ReelError::validation("frame sequence is empty"))?;
    let (width, height) = image::image_dimensions(first).map_err(|e| {
        ReelError::validation(format!("unreadable frame '{}': {e}", first.display()))
    })?;
    let dims = Dimensions::new(width, height);
    if dims.even_floor().is_empty() {
        return Err(ReelError::validation(format!(
            "frames of {dims} are too small to encode"
        )));
    }
    Ok(dims)
}

/// Delete the frame files of a sequence. Returns how many were removed.
pub fn cleanup_frames(dir: &Path, naming: &FrameNaming) -> ReelResult<usize> {
    use anyhow::Context as _;

    let sequence = FrameSequence::scan(dir, naming)?;
    for path in sequence.paths() {
        std::fs::remove_file(&path)
            .with_context(|| format!("failed to remove frame '{}'", path.display()))?;
    }
    info!(removed = sequence.len(), dir = %dir.display(), "frames cleaned up");
    Ok(sequence.len())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/assemble.rs"]
mod tests;
