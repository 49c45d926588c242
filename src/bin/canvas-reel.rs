use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use canvas_reel::config::RunConfig;
use canvas_reel::engine::scripted::{ScriptedEngine, TickScript};
use canvas_reel::navigate::Interaction;
use canvas_reel::{
    ArmAfter, CaptureStrategy, ChromeEngine, Dimensions, ImageFormat, ReelError, RenderingEngine,
    SurfacePolicy, pipeline,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "canvas-reel", version, about)]
struct Cli {
    /// JSON config file; flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture frames and assemble the video.
    Run {
        #[command(flatten)]
        capture: CaptureArgs,
        #[command(flatten)]
        encode: EncodeArgs,
    },
    /// Capture frames and metadata only.
    Capture {
        #[command(flatten)]
        capture: CaptureArgs,
    },
    /// Assemble a video from previously captured frames (requires `ffmpeg` on PATH).
    Encode {
        #[command(flatten)]
        encode: EncodeArgs,
        /// Frames directory, when not taken from metadata.
        #[arg(long)]
        frames_dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct CaptureArgs {
    /// Page to capture.
    #[arg(long)]
    url: Option<String>,

    /// Target frames per second.
    #[arg(long)]
    fps: Option<u32>,

    /// Wait after the page is ready, in milliseconds.
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Stop after this many seconds.
    #[arg(long, value_parser = parse_seconds)]
    max_duration: Option<Duration>,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// Minimum canvas area (px²) for the largest-canvas heuristic.
    #[arg(long)]
    min_area: Option<u64>,

    /// Consecutive empty polls that end the capture.
    #[arg(long)]
    stall_window: Option<u32>,

    /// Milliseconds between polls.
    #[arg(long)]
    poll_ms: Option<u64>,

    #[arg(long, value_enum)]
    strategy: Option<StrategyChoice>,

    /// CSS selector of the canvas (or of an element containing it).
    #[arg(long, conflicts_with_all = ["xpath", "canvas_id"])]
    selector: Option<String>,

    /// XPath of the canvas (or of an element containing it).
    #[arg(long, conflicts_with = "canvas_id")]
    xpath: Option<String>,

    /// `id` attribute of the canvas.
    #[arg(long)]
    canvas_id: Option<String>,

    /// Click at `X,Y` before capturing; repeatable.
    #[arg(long, value_parser = parse_point)]
    click: Vec<(f64, f64)>,

    /// Scroll vertically by this many pixels before capturing.
    #[arg(long, allow_negative_numbers = true)]
    scroll: Option<f64>,

    /// How many times to repeat `--scroll`.
    #[arg(long, default_value_t = 1)]
    scroll_repeat: u32,

    /// Start the capture clock after navigation instead of after the interactions.
    #[arg(long, value_enum)]
    arm_after: Option<ArmChoice>,

    /// Viewport width.
    #[arg(long)]
    width: Option<u32>,

    /// Viewport height.
    #[arg(long)]
    height: Option<u32>,

    #[arg(long)]
    frames_dir: Option<PathBuf>,

    #[arg(long)]
    prefix: Option<String>,

    /// Index of the first frame file (0 or 1).
    #[arg(long)]
    start_index: Option<u64>,

    #[arg(long, value_enum)]
    image_format: Option<FormatChoice>,

    /// Where to write diagnostic page snapshots.
    #[arg(long)]
    diagnostics_dir: Option<PathBuf>,

    /// Chromium executable.
    #[arg(long)]
    chrome: Option<PathBuf>,

    /// Show the browser window.
    #[arg(long)]
    headful: bool,

    /// Replay a synthetic animation instead of launching a browser.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Output video path.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Capture metadata file.
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Encode at the measured capture rate from metadata.
    #[arg(long)]
    fps_from_metadata: bool,

    /// Delete frame files after a successful encode.
    #[arg(long)]
    cleanup_frames: bool,

    /// Append a UTC timestamp to the output file name.
    #[arg(long)]
    timestamped_output: bool,

    /// Output size as `WxH` (both even).
    #[arg(long, value_parser = parse_size)]
    scale: Option<Dimensions>,

    /// Per-encoder timeout in seconds.
    #[arg(long)]
    encoder_timeout: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyChoice {
    Raf,
    Interval,
    Screenshot,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ArmChoice {
    Navigation,
    Interactions,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Png,
    Jpeg,
    Webp,
}

fn parse_point(s: &str) -> Result<(f64, f64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{s}'"))?;
    let x = x.trim().parse().map_err(|e| format!("bad X in '{s}': {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("bad Y in '{s}': {e}"))?;
    Ok((x, y))
}

fn parse_size(s: &str) -> Result<Dimensions, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{s}'"))?;
    let w = w.trim().parse().map_err(|e| format!("bad width in '{s}': {e}"))?;
    let h = h.trim().parse().map_err(|e| format!("bad height in '{s}': {e}"))?;
    Ok(Dimensions::new(w, h))
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("bad seconds '{s}': {e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("'{s}' is not a usable duration: {e}"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = match &cli.config {
        Some(path) => RunConfig::from_path(path).map_err(staged)?,
        None => RunConfig::default(),
    };

    match cli.cmd {
        Command::Run { capture, encode } => {
            capture.apply(&mut cfg);
            encode.apply(&mut cfg);
            cfg.validate().map_err(staged)?;
            let mut engine = open_engine(&cfg, capture.dry_run)?;
            let result = pipeline::run(engine.as_mut(), &cfg);
            close_engine(engine.as_mut());
            let report = result.map_err(staged)?;
            eprintln!(
                "captured {} frames, wrote {}",
                report.capture.write.written,
                report.video.out_path.display()
            );
        }
        Command::Capture { capture } => {
            capture.apply(&mut cfg);
            cfg.validate().map_err(staged)?;
            let mut engine = open_engine(&cfg, capture.dry_run)?;
            let result = pipeline::capture(engine.as_mut(), &cfg);
            close_engine(engine.as_mut());
            let report = result.map_err(staged)?;
            eprintln!(
                "captured {} frames into {} ({})",
                report.write.written,
                cfg.output.frames_dir.display(),
                report.metadata_path.display()
            );
        }
        Command::Encode { encode, frames_dir } => {
            encode.apply(&mut cfg);
            if let Some(dir) = frames_dir {
                cfg.output.frames_dir = dir;
            }
            let report = pipeline::encode_from_disk(&cfg).map_err(staged)?;
            eprintln!(
                "wrote {} ({} frames at {} fps)",
                report.out_path.display(),
                report.frames,
                report.fps
            );
        }
    }
    Ok(())
}

/// Attach the failing stage to the error chain.
fn staged(e: ReelError) -> anyhow::Error {
    let stage = e.stage();
    anyhow::Error::new(e).context(format!("{stage} stage failed"))
}

fn open_engine(cfg: &RunConfig, dry_run: bool) -> anyhow::Result<Box<dyn RenderingEngine>> {
    if dry_run {
        return Ok(Box::new(dry_run_engine(cfg)));
    }
    let engine = ChromeEngine::launch(&cfg.browser)
        .map_err(staged)
        .context("failed to launch Chromium (set --chrome or CANVAS_REEL_CHROME)")?;
    Ok(Box::new(engine))
}

fn close_engine(engine: &mut dyn RenderingEngine) {
    if let Err(e) = engine.close() {
        tracing::warn!(error = %e, "failed to close rendering engine");
    }
}

/// Scripted engine shaped after the configured page: one viewport-sized canvas producing
/// `max_frames` ticks at the target rate.
fn dry_run_engine(cfg: &RunConfig) -> ScriptedEngine {
    let viewport = cfg.browser.viewport;
    let per_poll = (f64::from(cfg.capture.target_fps) * cfg.capture.poll_interval.as_secs_f64())
        .ceil()
        .max(1.0) as usize;
    let mut engine = ScriptedEngine::with_canvas_sizes(&[(viewport.width, viewport.height)])
        .ticks(TickScript::Finite {
            total: cfg.capture.max_frames(),
            per_drain: per_poll,
        });
    for step in &cfg.navigation.steps {
        if let Interaction::WaitForSelector { selector, .. } = step {
            engine = engine.element(selector.clone());
        }
    }
    match &cfg.capture.surface {
        SurfacePolicy::Css(sel) | SurfacePolicy::XPath(sel) => {
            engine = engine.selector(sel.clone(), vec![0]);
        }
        SurfacePolicy::Id(_) | SurfacePolicy::LargestArea { .. } => {}
    }
    engine
}

impl CaptureArgs {
    fn apply(&self, cfg: &mut RunConfig) {
        if let Some(url) = &self.url {
            cfg.navigation.url = url.clone();
        }
        if let Some(ms) = self.settle_ms {
            cfg.navigation.settle = Duration::from_millis(ms);
        }
        if let Some(fps) = self.fps {
            cfg.capture.target_fps = fps;
        }
        if let Some(max) = self.max_duration {
            cfg.capture.max_duration = max;
        }
        if let Some(n) = self.max_frames {
            cfg.capture.max_frames_override = Some(n);
        }
        if let Some(min_area) = self.min_area {
            cfg.capture.surface = SurfacePolicy::LargestArea { min_area };
        }
        if let Some(sel) = &self.selector {
            cfg.capture.surface = SurfacePolicy::Css(sel.clone());
        }
        if let Some(xpath) = &self.xpath {
            cfg.capture.surface = SurfacePolicy::XPath(xpath.clone());
        }
        if let Some(id) = &self.canvas_id {
            cfg.capture.surface = SurfacePolicy::Id(id.clone());
        }
        if let Some(n) = self.stall_window {
            cfg.capture.stall_window = n;
        }
        if let Some(ms) = self.poll_ms {
            cfg.capture.poll_interval = Duration::from_millis(ms);
        }
        if let Some(strategy) = self.strategy {
            cfg.capture.strategy = match strategy {
                StrategyChoice::Raf => CaptureStrategy::AnimationFrame,
                StrategyChoice::Interval => CaptureStrategy::Interval,
                StrategyChoice::Screenshot => CaptureStrategy::Screenshot,
            };
        }
        if let Some(arm) = self.arm_after {
            cfg.capture.arm_after = match arm {
                ArmChoice::Navigation => ArmAfter::Navigation,
                ArmChoice::Interactions => ArmAfter::Interactions,
            };
        }
        for &(x, y) in &self.click {
            cfg.navigation.steps.push(Interaction::Click {
                x,
                y,
                repeat: 1,
                delay: Duration::ZERO,
            });
        }
        if let Some(dy) = self.scroll {
            cfg.navigation.steps.push(Interaction::Scroll {
                dx: 0.0,
                dy,
                repeat: self.scroll_repeat,
                delay: Duration::from_millis(500),
            });
        }
        if let Some(w) = self.width {
            cfg.browser.viewport.width = w;
        }
        if let Some(h) = self.height {
            cfg.browser.viewport.height = h;
        }
        if let Some(dir) = &self.frames_dir {
            cfg.output.frames_dir = dir.clone();
        }
        if let Some(prefix) = &self.prefix {
            cfg.output.prefix = prefix.clone();
        }
        if let Some(start) = self.start_index {
            cfg.output.start_index = start;
        }
        if let Some(format) = self.image_format {
            cfg.browser.image_format = match format {
                FormatChoice::Png => ImageFormat::Png,
                FormatChoice::Jpeg => ImageFormat::Jpeg,
                FormatChoice::Webp => ImageFormat::Webp,
            };
        }
        if let Some(dir) = &self.diagnostics_dir {
            cfg.navigation.diagnostics_dir = Some(dir.clone());
        }
        if let Some(path) = &self.chrome {
            cfg.browser.chrome_path = Some(path.clone());
        }
        if self.headful {
            cfg.browser.headless = false;
        }
    }
}

impl EncodeArgs {
    fn apply(&self, cfg: &mut RunConfig) {
        if let Some(out) = &self.out {
            cfg.output.video_path = out.clone();
        }
        if let Some(path) = &self.metadata {
            cfg.output.metadata_path = path.clone();
        }
        if self.fps_from_metadata {
            cfg.encode.fps_from_metadata = true;
        }
        if self.cleanup_frames {
            cfg.output.cleanup_frames = true;
        }
        if self.timestamped_output {
            cfg.output.timestamped_output = true;
        }
        if let Some(scale) = self.scale {
            cfg.encode.scale = Some(scale);
        }
        if let Some(secs) = self.encoder_timeout {
            cfg.encode.timeout = Duration::from_secs(secs);
        }
    }
}
