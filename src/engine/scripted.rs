use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::time::Duration;

use base64::Engine as _;

use crate::engine::{
    EncodedImage, ImageFormat, ReadyCondition, RenderingEngine, SurfaceInfo, SurfaceQuery, Tick,
    TickHook,
};
use crate::foundation::core::Dimensions;
use crate::foundation::error::{ReelError, ReelResult};

/// What a [`ScriptedEngine`] emits on each drain once a hook is installed.
#[derive(Clone, Debug)]
pub enum TickScript {
    /// `total` successful ticks, `per_drain` at a time, then silence.
    Finite { total: u64, per_drain: usize },
    /// Successful ticks forever.
    Endless { per_drain: usize },
    /// Every tick fails with `error`.
    Failing { per_drain: usize, error: String },
    /// One explicit batch per drain, then silence.
    Batches(VecDeque<Vec<ScriptedTick>>),
}

/// Single entry of [`TickScript::Batches`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptedTick {
    Ok,
    Fail,
}

/// Commands the engine received, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineCall {
    Navigate(String),
    WaitForSelector(String),
    Click(f64, f64),
    Scroll(f64, f64),
    QuerySurfaces,
    InstallHook(usize),
    RemoveHook,
    SnapshotSurface(usize),
    PageSnapshot,
    Close,
}

/// Deterministic [`RenderingEngine`] that replays a script.
///
/// Successful ticks carry small real PNGs (as data URLs) whose pixels encode the tick number, so
/// written frames can be told apart and compared byte for byte.
#[derive(Debug)]
pub struct ScriptedEngine {
    surfaces: Vec<SurfaceInfo>,
    selectors: HashMap<String, Vec<usize>>,
    present_selectors: Vec<String>,
    script: TickScript,
    frame_size: Dimensions,
    fail_navigation: bool,
    fail_page_snapshots: bool,
    hooked: Option<usize>,
    emitted: u64,
    snapshots: u64,
    calls: Vec<EngineCall>,
}

impl ScriptedEngine {
    /// Engine exposing `surfaces` and emitting nothing until a script is set.
    pub fn new(surfaces: Vec<SurfaceInfo>) -> Self {
        Self {
            surfaces,
            selectors: HashMap::new(),
            present_selectors: Vec::new(),
            script: TickScript::Batches(VecDeque::new()),
            frame_size: Dimensions::new(4, 4),
            fail_navigation: false,
            fail_page_snapshots: false,
            hooked: None,
            emitted: 0,
            snapshots: 0,
            calls: Vec::new(),
        }
    }

    /// Convenience for a list of canvases given as `(width, height)` in document order.
    pub fn with_canvas_sizes(sizes: &[(u32, u32)]) -> Self {
        let surfaces = sizes
            .iter()
            .enumerate()
            .map(|(index, &(w, h))| SurfaceInfo {
                index,
                id: format!("canvas-{index}"),
                size: Dimensions::new(w, h),
                display_size: Dimensions::new(w, h),
            })
            .collect();
        Self::new(surfaces)
    }

    pub fn ticks(mut self, script: TickScript) -> Self {
        self.script = script;
        self
    }

    /// Map a CSS selector or XPath expression to surface indices.
    pub fn selector(mut self, selector: impl Into<String>, indices: Vec<usize>) -> Self {
        self.selectors.insert(selector.into(), indices);
        self
    }

    /// Mark a selector as present for `wait_for_selector`.
    pub fn element(mut self, selector: impl Into<String>) -> Self {
        self.present_selectors.push(selector.into());
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    pub fn failing_page_snapshots(mut self) -> Self {
        self.fail_page_snapshots = true;
        self
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    pub fn is_hooked(&self) -> bool {
        self.hooked.is_some()
    }

    fn next_frame(&mut self) -> ReelResult<Tick> {
        let n = self.emitted;
        self.emitted += 1;
        let png = scripted_png(n, self.frame_size)?;
        let url = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png)
        );
        Ok(Tick::Captured {
            image: EncodedImage::data_url(url),
            size: self.frame_size,
            at: None,
        })
    }
}

/// Tiny PNG whose pixels are derived from `n`.
pub fn scripted_png(n: u64, size: Dimensions) -> ReelResult<Vec<u8>> {
    let bytes = n.to_le_bytes();
    let img = image::RgbaImage::from_pixel(
        size.width.max(1),
        size.height.max(1),
        image::Rgba([bytes[0], bytes[1], bytes[2], 255]),
    );
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| ReelError::engine(format!("failed to encode scripted frame: {e}")))?;
    Ok(out.into_inner())
}

impl RenderingEngine for ScriptedEngine {
    fn navigate(
        &mut self,
        url: &str,
        _ready: ReadyCondition,
        timeout: Duration,
    ) -> ReelResult<()> {
        self.calls.push(EngineCall::Navigate(url.to_owned()));
        if self.fail_navigation {
            return Err(ReelError::navigation_timeout(format!(
                "'{url}' not ready within {timeout:?}"
            )));
        }
        Ok(())
    }

    fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> ReelResult<()> {
        self.calls
            .push(EngineCall::WaitForSelector(selector.to_owned()));
        if self.present_selectors.iter().any(|s| s == selector) {
            Ok(())
        } else {
            Err(ReelError::interaction_timeout(format!(
                "'{selector}' did not appear within {timeout:?}"
            )))
        }
    }

    fn dispatch_click(&mut self, x: f64, y: f64) -> ReelResult<()> {
        self.calls.push(EngineCall::Click(x, y));
        Ok(())
    }

    fn dispatch_scroll(&mut self, dx: f64, dy: f64) -> ReelResult<()> {
        self.calls.push(EngineCall::Scroll(dx, dy));
        Ok(())
    }

    fn query_surfaces(&mut self, query: &SurfaceQuery) -> ReelResult<Vec<SurfaceInfo>> {
        self.calls.push(EngineCall::QuerySurfaces);
        let picked = match query {
            SurfaceQuery::AllCanvases => self.surfaces.clone(),
            SurfaceQuery::Id(id) => self
                .surfaces
                .iter()
                .filter(|s| &s.id == id)
                .cloned()
                .collect(),
            SurfaceQuery::Css(sel) | SurfaceQuery::XPath(sel) => self
                .selectors
                .get(sel)
                .map(|indices| {
                    indices
                        .iter()
                        .filter_map(|&i| self.surfaces.iter().find(|s| s.index == i).cloned())
                        .collect()
                })
                .unwrap_or_default(),
        };
        Ok(picked)
    }

    fn install_tick_hook(&mut self, surface: &SurfaceInfo, _hook: TickHook) -> ReelResult<()> {
        self.calls.push(EngineCall::InstallHook(surface.index));
        self.hooked = Some(surface.index);
        self.frame_size = if surface.size.is_empty() {
            Dimensions::new(4, 4)
        } else {
            Dimensions::new(surface.size.width.min(16), surface.size.height.min(16))
        };
        Ok(())
    }

    fn drain_ticks(&mut self, observer: &mut dyn FnMut(Tick)) -> ReelResult<usize> {
        if self.hooked.is_none() {
            return Ok(0);
        }
        let mut batch = Vec::new();
        match &mut self.script {
            TickScript::Finite { total, per_drain } => {
                let remaining = total.saturating_sub(self.emitted);
                let n = remaining.min(*per_drain as u64);
                for _ in 0..n {
                    batch.push(ScriptedTick::Ok);
                }
            }
            TickScript::Endless { per_drain } => {
                batch.extend(std::iter::repeat_n(ScriptedTick::Ok, *per_drain));
            }
            TickScript::Failing { per_drain, .. } => {
                batch.extend(std::iter::repeat_n(ScriptedTick::Fail, *per_drain));
            }
            TickScript::Batches(queue) => {
                if let Some(next) = queue.pop_front() {
                    batch = next;
                }
            }
        }

        let error = match &self.script {
            TickScript::Failing { error, .. } => error.clone(),
            _ => "scripted tick failure".to_owned(),
        };
        let delivered = batch.len();
        for t in batch {
            let tick = match t {
                ScriptedTick::Ok => self.next_frame()?,
                ScriptedTick::Fail => Tick::Failed {
                    error: error.clone(),
                },
            };
            observer(tick);
        }
        Ok(delivered)
    }

    fn remove_tick_hook(&mut self) -> ReelResult<()> {
        self.calls.push(EngineCall::RemoveHook);
        self.hooked = None;
        Ok(())
    }

    fn snapshot_surface(&mut self, surface: &SurfaceInfo) -> ReelResult<EncodedImage> {
        self.calls.push(EngineCall::SnapshotSurface(surface.index));
        let n = self.snapshots;
        self.snapshots += 1;
        let png = scripted_png(n, Dimensions::new(4, 4))?;
        Ok(EncodedImage::raw(ImageFormat::Png, png))
    }

    fn page_snapshot(&mut self) -> ReelResult<EncodedImage> {
        self.calls.push(EngineCall::PageSnapshot);
        if self.fail_page_snapshots {
            return Err(ReelError::engine("scripted page snapshot failure"));
        }
        Ok(EncodedImage::raw(
            ImageFormat::Png,
            scripted_png(u64::MAX, Dimensions::new(8, 8))?,
        ))
    }

    fn close(&mut self) -> ReelResult<()> {
        self.calls.push(EngineCall::Close);
        self.hooked = None;
        Ok(())
    }
}
