use std::path::{Path, PathBuf};

use crate::foundation::core::FrameIndex;
use crate::foundation::error::{ReelError, ReelResult};

const MIN_INDEX_WIDTH: usize = 6;

/// File naming scheme of a frame sequence: `<prefix>-<index>.<ext>`.
///
/// The on-disk number is the frame index plus `start`, zero-padded to `width` digits.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameNaming {
    pub prefix: String,
    pub extension: String,
    pub start: u64,
    pub width: usize,
}

fn digits(n: u64) -> usize {
    n.checked_ilog10().map_or(1, |d| d as usize + 1)
}

impl FrameNaming {
    /// Naming wide enough for `max_frames` frames, unless `width` pins it.
    pub fn for_capacity(
        prefix: &str,
        extension: &str,
        start: u64,
        max_frames: u64,
        width: Option<usize>,
    ) -> Self {
        let last = max_frames.saturating_sub(1) + start;
        Self {
            prefix: prefix.to_owned(),
            extension: extension.to_owned(),
            start,
            width: width.unwrap_or_else(|| digits(last).max(MIN_INDEX_WIDTH)),
        }
    }

    /// On-disk number of `idx`.
    pub fn number(&self, idx: FrameIndex) -> u64 {
        idx.0 + self.start
    }

    pub fn file_name(&self, idx: FrameIndex) -> String {
        self.name_for_number(self.number(idx))
    }

    fn name_for_number(&self, n: u64) -> String {
        format!(
            "{}-{:0width$}.{}",
            self.prefix,
            n,
            self.extension,
            width = self.width
        )
    }

    /// printf-style input pattern understood by the encoder, e.g. `frame-%06d.png`.
    pub fn pattern(&self) -> String {
        format!("{}-%0{}d.{}", self.prefix, self.width, self.extension)
    }

    /// On-disk number of a file name that follows this scheme exactly.
    pub fn parse(&self, name: &str) -> Option<u64> {
        let digits = self.digits_of(name)?;
        if digits.len() != self.width {
            return None;
        }
        digits.parse().ok()
    }

    /// True for any `<prefix>-<digits>.<ext>` name, whatever its padding.
    pub fn matches_loosely(&self, name: &str) -> bool {
        self.digits_of(name).is_some()
    }

    fn digits_of<'a>(&self, name: &'a str) -> Option<&'a str> {
        let rest = name.strip_prefix(self.prefix.as_str())?.strip_prefix('-')?;
        let digits = rest
            .strip_suffix(self.extension.as_str())?
            .strip_suffix('.')?;
        (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())).then_some(digits)
    }
}

/// Frame files found on disk for one naming scheme.
#[derive(Clone, Debug)]
pub struct FrameSequence {
    dir: PathBuf,
    naming: FrameNaming,
    numbers: Vec<u64>,
}

impl FrameSequence {
    /// List the files in `dir` that follow `naming`, sorted by number.
    pub fn scan(dir: &Path, naming: &FrameNaming) -> ReelResult<Self> {
        use anyhow::Context as _;

        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("failed to read frames directory '{}'", dir.display()))?;
        let mut numbers = Vec::new();
        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed to list '{}'", dir.display()))?;
            if !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            if let Some(n) = entry.file_name().to_str().and_then(|name| naming.parse(name))
                && n >= naming.start
            {
                numbers.push(n);
            }
        }
        numbers.sort_unstable();
        Ok(Self {
            dir: dir.to_path_buf(),
            naming: naming.clone(),
            numbers,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn naming(&self) -> &FrameNaming {
        &self.naming
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    /// On-disk numbers missing between the start offset and the last file.
    pub fn gaps(&self) -> Vec<u64> {
        let Some(&last) = self.numbers.last() else {
            return Vec::new();
        };
        let mut present = self.numbers.iter().copied().peekable();
        let mut gaps = Vec::new();
        for n in self.naming.start..=last {
            if present.peek() == Some(&n) {
                present.next();
            } else {
                gaps.push(n);
            }
        }
        gaps
    }

    /// Fail unless the sequence is non-empty and gapless from the start offset.
    ///
    /// A gap is reported as a [`ReelError::WriteFailure`] of its first missing index; an empty
    /// sequence leaves nothing to encode.
    pub fn ensure_contiguous(&self) -> ReelResult<()> {
        if self.is_empty() {
            return Err(ReelError::encoding(format!(
                "nothing to encode: no frames matching '{}' in '{}'",
                self.naming.pattern(),
                self.dir.display()
            )));
        }
        let gaps = self.gaps();
        if let Some(&first) = gaps.first() {
            let shown: Vec<String> = gaps.iter().take(10).map(u64::to_string).collect();
            return Err(ReelError::WriteFailure {
                index: first,
                reason: format!(
                    "frame sequence in '{}' has {} gap(s) at [{}{}]",
                    self.dir.display(),
                    gaps.len(),
                    shown.join(", "),
                    if gaps.len() > shown.len() { ", ..." } else { "" }
                ),
            });
        }
        Ok(())
    }

    /// Full paths of all files, in order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.numbers
            .iter()
            .map(|&n| self.dir.join(self.naming.name_for_number(n)))
            .collect()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/write/sequence.rs"]
mod tests;
