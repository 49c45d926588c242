use std::ffi::OsString;
use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::encode::AssembleConfig;
use crate::foundation::core::Dimensions;
use crate::foundation::error::ReelResult;

const WAIT_TICK: Duration = Duration::from_millis(50);
const STDERR_TAIL_LINES: usize = 6;

/// One way of invoking an external encoder.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EncoderStrategy {
    pub program: String,
    pub codec: String,
    pub preset: String,
    pub crf: u8,
    pub pix_fmt: String,
}

impl EncoderStrategy {
    pub fn new(program: &str, codec: &str, preset: &str, crf: u8) -> Self {
        Self {
            program: program.to_owned(),
            codec: codec.to_owned(),
            preset: preset.to_owned(),
            crf,
            pix_fmt: "yuv420p".to_owned(),
        }
    }

    pub fn x264() -> Self {
        Self::new("ffmpeg", "libx264", "slow", 18)
    }

    pub fn x265() -> Self {
        Self::new("ffmpeg", "libx265", "medium", 18)
    }

    /// H.264 first, H.265 as fallback.
    pub fn default_chain() -> Vec<Self> {
        vec![Self::x264(), Self::x265()]
    }

    pub fn label(&self) -> String {
        format!(
            "{} {} preset={} crf={}",
            self.program, self.codec, self.preset, self.crf
        )
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> ReelResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Scale filter for the output: the configured size, else an even-rounded source size when the
/// source has an odd side.
pub fn scale_filter(scale: Option<Dimensions>, source: Dimensions) -> Option<String> {
    let target = match scale {
        Some(size) => size,
        None if !source.is_even() => source.even_floor(),
        None => return None,
    };
    Some(format!(
        "scale={}:{}:flags=lanczos",
        target.width, target.height
    ))
}

/// Full argument list for one strategy over an image sequence.
pub fn build_args(
    cfg: &AssembleConfig,
    strategy: &EncoderStrategy,
    source: Dimensions,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    args.push(OsString::from(if cfg.overwrite { "-y" } else { "-n" }));
    args.extend(
        [
            "-loglevel".to_owned(),
            "error".to_owned(),
            "-framerate".to_owned(),
            cfg.fps.to_string(),
            "-start_number".to_owned(),
            cfg.naming.start.to_string(),
            "-i".to_owned(),
        ]
        .map(OsString::from),
    );
    args.push(cfg.frames_dir.join(cfg.naming.pattern()).into_os_string());
    args.extend(
        [
            "-c:v".to_owned(),
            strategy.codec.clone(),
            "-preset".to_owned(),
            strategy.preset.clone(),
            "-crf".to_owned(),
            strategy.crf.to_string(),
            "-pix_fmt".to_owned(),
            strategy.pix_fmt.clone(),
            "-movflags".to_owned(),
            "+faststart".to_owned(),
        ]
        .map(OsString::from),
    );
    if let Some(filter) = scale_filter(cfg.scale, source) {
        args.push("-vf".into());
        args.push(filter.into());
    }
    args.push(cfg.out_path.clone().into_os_string());
    args
}

/// Why a single strategy did not produce a video.
#[derive(Debug)]
pub(crate) enum AttemptError {
    /// The program could not be started at all.
    Missing(String),
    Failed(String),
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(msg) | Self::Failed(msg) => f.write_str(msg),
        }
    }
}

/// Run one strategy to completion or timeout. Success means exit 0 and a non-empty output file.
pub(crate) fn run_strategy(
    cfg: &AssembleConfig,
    strategy: &EncoderStrategy,
    args: &[OsString],
) -> Result<u64, AttemptError> {
    debug!(program = %strategy.program, ?args, "spawning encoder");
    let mut child = Command::new(&strategy.program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                AttemptError::Missing(format!("'{}' not found", strategy.program))
            }
            _ => AttemptError::Failed(format!("failed to spawn '{}': {e}", strategy.program)),
        })?;

    let stderr_drain = child.stderr.take().map(|mut stderr| {
        std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok::<_, std::io::Error>(bytes)
        })
    });

    let status = wait_with_timeout(&mut child, cfg.timeout);
    let stderr_bytes = match stderr_drain {
        Some(handle) => match handle.join() {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                warn!(error = %e, "encoder stderr read failed");
                Vec::new()
            }
            Err(_) => {
                warn!("encoder stderr drain thread panicked");
                Vec::new()
            }
        },
        None => Vec::new(),
    };
    let stderr = tail(&String::from_utf8_lossy(&stderr_bytes), STDERR_TAIL_LINES);

    let status = status.map_err(AttemptError::Failed)?;
    if !status.success() {
        return Err(AttemptError::Failed(format!(
            "exited with {status}: {stderr}"
        )));
    }
    match std::fs::metadata(&cfg.out_path) {
        Ok(meta) if meta.len() > 0 => Ok(meta.len()),
        Ok(_) => Err(AttemptError::Failed(format!(
            "exited successfully but '{}' is empty",
            cfg.out_path.display()
        ))),
        Err(e) => Err(AttemptError::Failed(format!(
            "exited successfully but '{}' is missing: {e}",
            cfg.out_path.display()
        ))),
    }
}

fn wait_with_timeout(
    child: &mut std::process::Child,
    timeout: Duration,
) -> Result<ExitStatus, String> {
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if started.elapsed() >= timeout => {
                if let Err(e) = child.kill() {
                    warn!(error = %e, "failed to kill encoder");
                }
                let _ = child.wait();
                return Err(format!("timed out after {timeout:?}"));
            }
            Ok(None) => std::thread::sleep(WAIT_TICK),
            Err(e) => return Err(format!("failed to wait for encoder: {e}")),
        }
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join(" | ")
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
