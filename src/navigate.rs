//! Page Navigator: load the page, wait for readiness, reveal the animated section.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::config::duration_ms;
use crate::engine::{ReadyCondition, RenderingEngine};
use crate::foundation::error::{ReelError, ReelResult};

pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SELECTOR_TIMEOUT: Duration = Duration::from_secs(30);

/// One scripted interaction, run in order after the page is ready.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interaction {
    /// Click at viewport coordinates, `repeat` times, `delay` apart.
    Click {
        x: f64,
        y: f64,
        #[serde(default = "one")]
        repeat: u32,
        #[serde(default, with = "duration_ms")]
        delay: Duration,
    },
    /// Scroll by a delta, `repeat` times, `delay` apart.
    Scroll {
        #[serde(default)]
        dx: f64,
        dy: f64,
        #[serde(default = "one")]
        repeat: u32,
        #[serde(default, with = "duration_ms")]
        delay: Duration,
    },
    /// Block until a selector matches.
    WaitForSelector {
        selector: String,
        #[serde(default = "default_selector_timeout", with = "duration_ms")]
        timeout: Duration,
    },
    /// Plain wait.
    Pause {
        #[serde(with = "duration_ms")]
        duration: Duration,
    },
}

fn one() -> u32 {
    1
}

fn default_selector_timeout() -> Duration {
    DEFAULT_SELECTOR_TIMEOUT
}

/// Everything needed to bring the page to the state where capture can begin.
#[derive(Clone, Debug)]
pub struct NavigationPlan {
    pub url: String,
    pub ready: ReadyCondition,
    pub timeout: Duration,
    /// Wait after readiness so intro animations can start.
    pub settle: Duration,
    pub steps: Vec<Interaction>,
}

/// Fixed points at which a diagnostic full-page snapshot may be taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Checkpoint {
    AfterNavigation,
    AfterInteractions,
    BeforeCapture,
    AfterCapture,
}

impl Checkpoint {
    fn label(self) -> &'static str {
        match self {
            Self::AfterNavigation => "01-after-navigation",
            Self::AfterInteractions => "02-after-interactions",
            Self::BeforeCapture => "03-before-capture",
            Self::AfterCapture => "04-after-capture",
        }
    }
}

/// Writes diagnostic page snapshots. Never fails the run.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    dir: Option<PathBuf>,
}

impl Diagnostics {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// Snapshot the page into `<dir>/<checkpoint>.<ext>`; failures are logged and swallowed.
    pub fn checkpoint(&self, engine: &mut dyn RenderingEngine, at: Checkpoint) {
        let Some(dir) = self.dir.as_deref() else {
            return;
        };
        match write_snapshot(engine, dir, at) {
            Ok(path) => info!(path = %path.display(), "diagnostic snapshot written"),
            Err(e) => warn!(checkpoint = at.label(), error = %e, "diagnostic snapshot failed"),
        }
    }
}

fn write_snapshot(
    engine: &mut dyn RenderingEngine,
    dir: &Path,
    at: Checkpoint,
) -> ReelResult<PathBuf> {
    use anyhow::Context as _;

    let image = engine.page_snapshot()?;
    let bytes = image.decode()?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create diagnostics directory '{}'", dir.display()))?;
    let path = dir.join(format!("{}.{}", at.label(), image.format.extension()));
    std::fs::write(&path, bytes)
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    Ok(path)
}

/// Navigate and wait for readiness, then settle.
#[tracing::instrument(skip(engine, plan, diagnostics), fields(url = %plan.url))]
pub fn open(
    engine: &mut dyn RenderingEngine,
    plan: &NavigationPlan,
    diagnostics: &Diagnostics,
) -> ReelResult<()> {
    if plan.url.trim().is_empty() {
        return Err(ReelError::validation("navigation url must be non-empty"));
    }
    info!(ready = ?plan.ready, timeout = ?plan.timeout, "navigating");
    engine.navigate(&plan.url, plan.ready, plan.timeout)?;
    if !plan.settle.is_zero() {
        info!(settle = ?plan.settle, "waiting for page to settle");
        std::thread::sleep(plan.settle);
    }
    diagnostics.checkpoint(engine, Checkpoint::AfterNavigation);
    Ok(())
}

/// Run the interaction steps in order.
#[tracing::instrument(skip_all, fields(steps = steps.len()))]
pub fn interact(
    engine: &mut dyn RenderingEngine,
    steps: &[Interaction],
    diagnostics: &Diagnostics,
) -> ReelResult<()> {
    for (i, step) in steps.iter().enumerate() {
        info!(step = i, ?step, "interaction");
        run_step(engine, step)?;
    }
    diagnostics.checkpoint(engine, Checkpoint::AfterInteractions);
    Ok(())
}

fn run_step(engine: &mut dyn RenderingEngine, step: &Interaction) -> ReelResult<()> {
    match step {
        Interaction::Click {
            x,
            y,
            repeat,
            delay,
        } => repeated(*repeat, *delay, || engine.dispatch_click(*x, *y)),
        Interaction::Scroll {
            dx,
            dy,
            repeat,
            delay,
        } => repeated(*repeat, *delay, || engine.dispatch_scroll(*dx, *dy)),
        Interaction::WaitForSelector { selector, timeout } => {
            engine.wait_for_selector(selector, *timeout)
        }
        Interaction::Pause { duration } => {
            std::thread::sleep(*duration);
            Ok(())
        }
    }
}

fn repeated(
    repeat: u32,
    delay: Duration,
    mut action: impl FnMut() -> ReelResult<()>,
) -> ReelResult<()> {
    for n in 0..repeat {
        if n > 0 && !delay.is_zero() {
            std::thread::sleep(delay);
        }
        action()?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../tests/unit/navigate.rs"]
mod tests;
