//! `capture_metadata.json`: what was captured, how fast, and how to find the frames again.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::engine::SurfaceInfo;
use crate::foundation::core::Fps;
use crate::foundation::error::{ReelError, ReelResult};
use crate::sample::{CaptureSummary, StopReason};
use crate::write::{FrameNaming, WriteReport};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CaptureMetadata {
    pub total_frames: u64,
    /// Frames per second over the first-to-last frame span; absent below two frames.
    pub actual_fps: Option<f64>,
    pub total_duration_ms: u64,
    /// RFC 3339, UTC.
    pub capture_date: String,
    pub target_fps: u32,
    pub surface: SurfaceInfo,
    pub stop_reason: StopReason,
    #[serde(default)]
    pub missing_indices: Vec<u64>,
    pub frames_dir: PathBuf,
    pub naming: FrameNaming,
}

impl CaptureMetadata {
    pub fn from_capture(
        summary: &CaptureSummary,
        report: &WriteReport,
        surface: &SurfaceInfo,
        target_fps: u32,
        frames_dir: &Path,
        naming: &FrameNaming,
        captured_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            total_frames: report.written,
            actual_fps: summary.measured_fps(),
            total_duration_ms: summary.span().as_millis() as u64,
            capture_date: captured_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            target_fps,
            surface: surface.clone(),
            stop_reason: summary.stop_reason,
            missing_indices: report.missing.iter().map(|i| i.0).collect(),
            frames_dir: frames_dir.to_path_buf(),
            naming: naming.clone(),
        }
    }

    /// Rate to encode at: the rounded measured rate when asked for and available, else the
    /// target rate.
    pub fn encode_fps(&self, prefer_measured: bool) -> ReelResult<Fps> {
        if prefer_measured {
            match self.actual_fps.map(Fps::from_measured) {
                Some(Ok(fps)) => return Ok(fps),
                Some(Err(e)) => warn!(error = %e, "ignoring measured frame rate"),
                None => warn!("no measured frame rate in metadata; using target rate"),
            }
        }
        Fps::whole(self.target_fps)
    }

    pub fn write(&self, path: &Path) -> ReelResult<()> {
        use anyhow::Context as _;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create '{}'", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ReelError::serde(format!("failed to serialize metadata: {e}")))?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write metadata '{}'", path.display()))?;
        info!(
            path = %path.display(),
            frames = self.total_frames,
            actual_fps = ?self.actual_fps,
            "metadata written"
        );
        Ok(())
    }

    pub fn read(path: &Path) -> ReelResult<Self> {
        use anyhow::Context as _;

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read metadata '{}'", path.display()))?;
        serde_json::from_str(&text)
            .map_err(|e| ReelError::serde(format!("invalid metadata '{}': {e}", path.display())))
    }
}

#[cfg(test)]
#[path = "../tests/unit/metadata.rs"]
mod tests;
