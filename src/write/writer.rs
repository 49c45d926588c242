use std::io::Write as _;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::foundation::core::FrameIndex;
use crate::foundation::error::{ReelError, ReelResult};
use crate::sample::Frame;
use crate::write::sequence::FrameNaming;
use crate::write::sink::{FrameSink, SinkConfig, check_order};

/// Outcome of writing one capture to disk.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WriteReport {
    pub written: u64,
    /// Frames that could not be written, in index order.
    pub missing: Vec<FrameIndex>,
    pub bytes: u64,
    /// Stale files removed by `begin`.
    pub cleared: u64,
}

/// Sink that decodes each frame and writes it as `<dir>/<prefix>-<index>.<ext>`.
///
/// Per-frame failures are recorded in the [`WriteReport`] and never abort the capture.
#[derive(Debug)]
pub struct FrameWriter {
    dir: PathBuf,
    naming: FrameNaming,
    overwrite: bool,
    clear_stale: bool,
    last_idx: Option<FrameIndex>,
    report: WriteReport,
}

impl FrameWriter {
    pub fn new(dir: impl Into<PathBuf>, naming: FrameNaming) -> Self {
        Self {
            dir: dir.into(),
            naming,
            overwrite: true,
            clear_stale: true,
            last_idx: None,
            report: WriteReport::default(),
        }
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Remove matching files of an older run in `begin`. Ignored when overwrite is off.
    pub fn clear_stale(mut self, clear_stale: bool) -> Self {
        self.clear_stale = clear_stale;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn naming(&self) -> &FrameNaming {
        &self.naming
    }

    pub fn report(&self) -> &WriteReport {
        &self.report
    }

    pub fn into_report(self) -> WriteReport {
        self.report
    }

    pub fn path_for(&self, idx: FrameIndex) -> PathBuf {
        self.dir.join(self.naming.file_name(idx))
    }

    fn remove_stale(&self) -> ReelResult<u64> {
        use anyhow::Context as _;

        let mut removed = 0;
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("failed to read '{}'", self.dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to list '{}'", self.dir.display()))?;
            let is_frame = entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.naming.matches_loosely(name));
            if is_frame && entry.file_type().is_ok_and(|t| t.is_file()) {
                std::fs::remove_file(entry.path()).with_context(|| {
                    format!("failed to remove stale frame '{}'", entry.path().display())
                })?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn write_one(&self, frame: &Frame) -> ReelResult<u64> {
        let failure = |reason: String| ReelError::WriteFailure {
            index: frame.index.0,
            reason,
        };
        let bytes = frame.image.decode().map_err(|e| failure(e.to_string()))?;
        if bytes.is_empty() {
            return Err(failure("decoded image is empty".to_owned()));
        }
        image::guess_format(&bytes).map_err(|e| failure(format!("not an image: {e}")))?;
        let path = self.path_for(frame.index);
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .create_new(!self.overwrite)
            .open(&path)
            .map_err(|e| failure(format!("{}: {e}", path.display())))?;
        file.write_all(&bytes)
            .map_err(|e| failure(format!("{}: {e}", path.display())))?;
        Ok(bytes.len() as u64)
    }
}

impl FrameSink for FrameWriter {
    fn begin(&mut self, cfg: SinkConfig) -> ReelResult<()> {
        use anyhow::Context as _;

        std::fs::create_dir_all(&self.dir).with_context(|| {
            format!("failed to create frames directory '{}'", self.dir.display())
        })?;
        self.report = WriteReport::default();
        self.last_idx = None;
        if self.clear_stale && !self.overwrite {
            debug!(dir = %self.dir.display(), "overwrite disabled; existing frames kept");
        } else if self.clear_stale {
            self.report.cleared = self.remove_stale()?;
            if self.report.cleared > 0 {
                info!(removed = self.report.cleared, dir = %self.dir.display(), "cleared stale frames");
            }
        }
        debug!(
            dir = %self.dir.display(),
            pattern = %self.naming.pattern(),
            max_frames = cfg.max_frames,
            "frame writer ready"
        );
        Ok(())
    }

    fn push_frame(&mut self, frame: Frame) -> ReelResult<()> {
        check_order(&mut self.last_idx, frame.index)?;
        match self.write_one(&frame) {
            Ok(bytes) => {
                self.report.written += 1;
                self.report.bytes += bytes;
            }
            Err(e) => {
                warn!(index = frame.index.0, error = %e, "frame not written");
                self.report.missing.push(frame.index);
            }
        }
        Ok(())
    }

    fn end(&mut self) -> ReelResult<()> {
        info!(
            written = self.report.written,
            missing = self.report.missing.len(),
            bytes = self.report.bytes,
            "frames written"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/write/writer.rs"]
mod tests;
