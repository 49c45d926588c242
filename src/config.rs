//! Run configuration.
//!
//! Every field has a default so a JSON config file only needs the values it changes; CLI flags
//! are applied on top of the file. Durations are milliseconds in JSON.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::encode::ffmpeg::EncoderStrategy;
use crate::engine::{ImageFormat, ReadyCondition};
use crate::foundation::core::{Dimensions, Fps};
use crate::foundation::error::{ReelError, ReelResult};
use crate::locate::SurfacePolicy;
use crate::navigate::{DEFAULT_NAVIGATION_TIMEOUT, Interaction, NavigationPlan};
use crate::sample::{CaptureStrategy, SamplerConfig};
use crate::write::FrameNaming;

/// Promotional page the capture scripts were written for.
pub const DEFAULT_URL: &str = "https://wutheringwaves-event1.kurogames-global.com/?packageId=A1730&language=en&isInternalBrowser=0&platform=PC";

/// Serde adapter storing a [`Duration`] as whole milliseconds.
pub mod duration_ms {
    use std::time::Duration;

    pub fn serialize<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis().min(u128::from(u64::MAX)) as u64)
    }

    pub fn deserialize<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms: u64 = serde::Deserialize::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}

/// Top-level configuration for one run.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub browser: BrowserConfig,
    pub navigation: NavigationConfig,
    pub capture: CaptureConfig,
    pub output: OutputConfig,
    pub encode: EncodeConfig,
}

impl RunConfig {
    /// Load a JSON config file.
    pub fn from_path(path: &Path) -> ReelResult<Self> {
        use anyhow::Context as _;

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        serde_json::from_str(&text).map_err(|e| {
            ReelError::serde(format!("invalid config '{}': {e}", path.display()))
        })
    }

    pub fn validate(&self) -> ReelResult<()> {
        if self.navigation.url.trim().is_empty() {
            return Err(ReelError::validation("navigation.url must be non-empty"));
        }
        if self.browser.viewport.is_empty() {
            return Err(ReelError::validation(
                "browser.viewport width/height must be non-zero",
            ));
        }
        self.capture.validate()?;
        self.output.validate()?;
        self.encode.validate()?;
        Ok(())
    }

    pub fn navigation_plan(&self) -> NavigationPlan {
        NavigationPlan {
            url: self.navigation.url.clone(),
            ready: self.navigation.ready,
            timeout: self.navigation.timeout,
            settle: self.navigation.settle,
            steps: self.navigation.steps.clone(),
        }
    }

    pub fn frame_naming(&self) -> FrameNaming {
        // Host-driven screenshots always come back as PNG.
        let format = match self.capture.strategy {
            CaptureStrategy::Screenshot => ImageFormat::Png,
            _ => self.browser.image_format,
        };
        FrameNaming::for_capacity(
            &self.output.prefix,
            format.extension(),
            self.output.start_index,
            self.capture.max_frames(),
            self.output.index_width,
        )
    }
}

/// Chromium launch settings.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Explicit Chromium binary; falls back to `CANVAS_REEL_CHROME`,
    /// `PUPPETEER_EXECUTABLE_PATH`, then auto-detection.
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    pub sandbox: bool,
    pub viewport: Dimensions,
    /// Extra command-line switches.
    pub args: Vec<String>,
    #[serde(with = "duration_ms")]
    pub idle_timeout: Duration,
    /// Default bound for individual DevTools commands.
    #[serde(with = "duration_ms")]
    pub command_timeout: Duration,
    /// Encoding requested from `canvas.toDataURL`.
    pub image_format: ImageFormat,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            sandbox: false,
            viewport: Dimensions::new(1920, 1080),
            args: vec![
                "--disable-dev-shm-usage".to_owned(),
                "--disable-gpu".to_owned(),
                "--force-device-scale-factor=1".to_owned(),
                "--no-first-run".to_owned(),
            ],
            idle_timeout: Duration::from_secs(300),
            command_timeout: Duration::from_secs(30),
            image_format: ImageFormat::Png,
        }
    }
}

impl BrowserConfig {
    pub fn resolve_chrome_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.chrome_path {
            return Some(path.clone());
        }
        ["CANVAS_REEL_CHROME", "PUPPETEER_EXECUTABLE_PATH"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .find(|path| path.is_file())
    }
}

/// Target page and the interaction script that reveals the animation.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub url: String,
    pub ready: ReadyCondition,
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    #[serde(with = "duration_ms")]
    pub settle: Duration,
    pub steps: Vec<Interaction>,
    /// Where diagnostic page snapshots go; disabled when unset.
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_owned(),
            ready: ReadyCondition::NetworkIdle,
            timeout: DEFAULT_NAVIGATION_TIMEOUT,
            settle: Duration::from_secs(5),
            steps: Vec::new(),
            diagnostics_dir: None,
        }
    }
}

/// When the sampling clock starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmAfter {
    /// Hook installed right after the page is ready; interactions happen while sampling.
    Navigation,
    /// Hook installed once the interaction script has finished.
    #[default]
    Interactions,
}

/// Sampling parameters.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub target_fps: u32,
    #[serde(with = "duration_ms")]
    pub max_duration: Duration,
    /// Hard frame cap; `target_fps * max_duration` when unset.
    #[serde(rename = "max_frames")]
    pub max_frames_override: Option<u64>,
    pub surface: SurfacePolicy,
    pub strategy: CaptureStrategy,
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
    pub stall_window: u32,
    pub max_consecutive_failures: u32,
    pub arm_after: ArmAfter,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            max_duration: Duration::from_secs(15),
            max_frames_override: None,
            surface: SurfacePolicy::default(),
            strategy: CaptureStrategy::AnimationFrame,
            poll_interval: Duration::from_millis(100),
            stall_window: 50,
            max_consecutive_failures: 30,
            arm_after: ArmAfter::Interactions,
        }
    }
}

impl CaptureConfig {
    pub fn fps(&self) -> ReelResult<Fps> {
        Fps::whole(self.target_fps)
    }

    pub fn max_frames(&self) -> u64 {
        self.max_frames_override.unwrap_or_else(|| {
            let fps = f64::from(self.target_fps.max(1));
            ((fps * self.max_duration.as_secs_f64()).floor() as u64).max(1)
        })
    }

    pub fn validate(&self) -> ReelResult<()> {
        self.fps()?;
        if self.max_duration.is_zero() {
            return Err(ReelError::validation("capture.max_duration must be non-zero"));
        }
        if self.max_frames_override == Some(0) {
            return Err(ReelError::validation("capture.max_frames must be non-zero"));
        }
        if self.poll_interval.is_zero() {
            return Err(ReelError::validation(
                "capture.poll_interval must be non-zero",
            ));
        }
        if self.stall_window == 0 {
            return Err(ReelError::validation("capture.stall_window must be non-zero"));
        }
        Ok(())
    }

    /// Sampler thresholds derived from this config.
    pub fn sampler(&self) -> ReelResult<SamplerConfig> {
        let fps = self.fps()?;
        // Host-driven screenshots are paced by the poll loop itself.
        let poll_interval = match self.strategy {
            CaptureStrategy::Screenshot => fps.frame_duration(),
            _ => self.poll_interval,
        };
        Ok(SamplerConfig {
            strategy: self.strategy,
            fps,
            max_frames: self.max_frames(),
            max_duration: self.max_duration,
            poll_interval,
            stall_window: self.stall_window,
            max_consecutive_failures: self.max_consecutive_failures,
        })
    }
}

/// Where frames, metadata and the video go.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub frames_dir: PathBuf,
    pub prefix: String,
    /// First index on disk: 0 or 1.
    pub start_index: u64,
    /// Zero-pad width; derived from the frame cap when unset.
    pub index_width: Option<usize>,
    pub overwrite: bool,
    /// Remove files of an older run that match the naming scheme before writing.
    /// Has no effect while `overwrite` is off.
    pub clear_stale: bool,
    pub metadata_path: PathBuf,
    pub video_path: PathBuf,
    /// Append a UTC timestamp to the video file stem.
    pub timestamped_output: bool,
    /// Delete frame files after a successful encode.
    pub cleanup_frames: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from("frames"),
            prefix: "frame".to_owned(),
            start_index: 0,
            index_width: None,
            overwrite: true,
            clear_stale: true,
            metadata_path: PathBuf::from("capture_metadata.json"),
            video_path: PathBuf::from("output").join("animation.mp4"),
            timestamped_output: false,
            cleanup_frames: false,
        }
    }
}

impl OutputConfig {
    pub fn validate(&self) -> ReelResult<()> {
        if self.prefix.is_empty()
            || self
                .prefix
                .contains(|c: char| c == '/' || c == '\\' || c == '%')
        {
            return Err(ReelError::validation(format!(
                "output.prefix '{}' must be a non-empty plain file name fragment",
                self.prefix
            )));
        }
        if self.start_index > 1 {
            return Err(ReelError::validation(
                "output.start_index must be 0 or 1",
            ));
        }
        if let Some(width) = self.index_width
            && !(1..=12).contains(&width)
        {
            return Err(ReelError::validation(
                "output.index_width must be between 1 and 12",
            ));
        }
        Ok(())
    }

    /// Final video path, with a timestamp suffix when requested.
    pub fn resolved_video_path(&self, now: chrono::DateTime<chrono::Utc>) -> PathBuf {
        if !self.timestamped_output {
            return self.video_path.clone();
        }
        let stem = self
            .video_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "animation".to_owned());
        let ext = self
            .video_path
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mp4".to_owned());
        self.video_path
            .with_file_name(format!("{stem}_{}.{ext}", now.format("%Y%m%dT%H%M%SZ")))
    }
}

/// Encoder settings.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    /// Tried in order until one produces the video.
    pub strategies: Vec<EncoderStrategy>,
    /// Optional output scaling (lanczos).
    pub scale: Option<Dimensions>,
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    /// Use the measured capture rate from metadata instead of the target rate.
    pub fps_from_metadata: bool,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            strategies: EncoderStrategy::default_chain(),
            scale: None,
            timeout: Duration::from_secs(600),
            fps_from_metadata: false,
        }
    }
}

impl EncodeConfig {
    pub fn validate(&self) -> ReelResult<()> {
        if self.strategies.is_empty() {
            return Err(ReelError::validation(
                "encode.strategies must list at least one encoder",
            ));
        }
        if let Some(scale) = self.scale
            && (scale.is_empty() || !scale.is_even())
        {
            return Err(ReelError::validation(format!(
                "encode.scale {scale} must be non-zero and even (yuv420p)"
            )));
        }
        if self.timeout.is_zero() {
            return Err(ReelError::validation("encode.timeout must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
