use std::ffi::OsString;
use std::sync::Arc;
use std::time::{Duration, Instant};

use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::engine::{
    EncodedImage, ImageFormat, ReadyCondition, RenderingEngine, SurfaceInfo, SurfaceQuery, Tick,
    TickHook,
};
use crate::foundation::core::Dimensions;
use crate::foundation::error::{ReelError, ReelResult};

const READY_POLL: Duration = Duration::from_millis(100);
const NETWORK_QUIET: Duration = Duration::from_millis(500);

const READY_STATE_JS: &str = r#"
JSON.stringify({
  state: document.readyState,
  resources: performance.getEntriesByType('resource').length
})
"#;

/// Wraps the page's animation-frame callback (or starts a timer) and queues one snapshot of the
/// target canvas per tick in `window.__canvasReel.queue`. `__CFG__` is replaced with a JSON
/// object `{ index, mode, period_ms, mime }`.
const INSTALL_HOOK_JS: &str = r#"
(() => {
  const cfg = __CFG__;
  const prev = window.__canvasReel;
  if (prev && prev.stop) prev.stop();
  const target = document.querySelectorAll('canvas')[cfg.index];
  if (!target) return false;
  const state = { queue: [], active: true, base: performance.now(), lastTs: null };
  const capture = () => {
    if (!state.active) return;
    const t = performance.now() - state.base;
    try {
      const data = target.toDataURL(cfg.mime);
      if (data.length < 32) {
        state.queue.push({ ok: false, error: 'surface not renderable (' + target.width + 'x' + target.height + ')', t });
        return;
      }
      state.queue.push({ ok: true, data, w: target.width, h: target.height, t });
    } catch (e) {
      state.queue.push({ ok: false, error: String(e), t });
    }
  };
  if (cfg.mode === 'raf') {
    const original = window.requestAnimationFrame;
    window.requestAnimationFrame = function (callback) {
      return original.call(window, function (ts) {
        const result = callback(ts);
        if (state.lastTs !== ts) {
          state.lastTs = ts;
          capture();
        }
        return result;
      });
    };
    state.stop = () => {
      state.active = false;
      window.requestAnimationFrame = original;
    };
  } else {
    const timer = setInterval(capture, cfg.period_ms);
    state.stop = () => {
      state.active = false;
      clearInterval(timer);
    };
  }
  window.__canvasReel = state;
  return true;
})()
"#;

const DRAIN_JS: &str =
    "JSON.stringify(window.__canvasReel ? window.__canvasReel.queue.splice(0) : [])";

const REMOVE_HOOK_JS: &str = r#"
(() => {
  const s = window.__canvasReel;
  if (s) {
    if (s.stop) s.stop();
    s.queue = [];
  }
  return true;
})()
"#;

/// `__KIND__` is one of `all|id|css|xpath`, `__ARG__` a JSON string.
const QUERY_SURFACES_JS: &str = r#"
(() => {
  const all = Array.from(document.querySelectorAll('canvas'));
  const kind = '__KIND__';
  const arg = __ARG__;
  const asCanvas = (el) => (el instanceof HTMLCanvasElement ? el : (el && el.querySelector ? el.querySelector('canvas') : null));
  let picked = [];
  if (kind === 'all') {
    picked = all;
  } else if (kind === 'id') {
    picked = all.filter((c) => c.id === arg);
  } else if (kind === 'css') {
    picked = Array.from(document.querySelectorAll(arg)).map(asCanvas);
  } else {
    const snap = document.evaluate(arg, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
    for (let i = 0; i < snap.snapshotLength; i++) picked.push(asCanvas(snap.snapshotItem(i)));
  }
  const seen = new Set();
  const out = [];
  for (const c of picked) {
    if (!c || seen.has(c)) continue;
    seen.add(c);
    out.push({
      index: all.indexOf(c),
      id: c.id || '',
      size: { width: c.width, height: c.height },
      display_size: { width: c.offsetWidth, height: c.offsetHeight }
    });
  }
  return JSON.stringify(out);
})()
"#;

const SURFACE_RECT_JS: &str = r#"
(() => {
  const c = document.querySelectorAll('canvas')[__INDEX__];
  if (!c) return null;
  const r = c.getBoundingClientRect();
  return JSON.stringify({ x: r.left + window.scrollX, y: r.top + window.scrollY, width: r.width, height: r.height });
})()
"#;

/// Pointer + mouse + click events at viewport coordinates on whatever element is there.
const CLICK_JS: &str = r#"
(() => {
  const x = __X__, y = __Y__;
  const el = document.elementFromPoint(x, y) || document.body;
  const opts = { bubbles: true, cancelable: true, view: window, clientX: x, clientY: y, button: 0 };
  el.dispatchEvent(new PointerEvent('pointerdown', opts));
  el.dispatchEvent(new MouseEvent('mousedown', opts));
  el.dispatchEvent(new PointerEvent('pointerup', opts));
  el.dispatchEvent(new MouseEvent('mouseup', opts));
  el.dispatchEvent(new MouseEvent('click', opts));
  return el.tagName;
})()
"#;

/// Wheel event at the viewport centre (for scroll-hijacking pages) plus a plain `scrollBy`.
const SCROLL_JS: &str = r#"
(() => {
  const dx = __DX__, dy = __DY__;
  const cx = window.innerWidth / 2, cy = window.innerHeight / 2;
  const el = document.elementFromPoint(cx, cy) || document.body;
  el.dispatchEvent(new WheelEvent('wheel', { bubbles: true, cancelable: true, clientX: cx, clientY: cy, deltaX: dx, deltaY: dy }));
  window.scrollBy(dx, dy);
  return window.scrollY;
})()
"#;

#[derive(serde::Deserialize)]
struct ReadyProbe {
    state: String,
    resources: u64,
}

#[derive(serde::Deserialize)]
struct RawTick {
    ok: bool,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    w: u32,
    #[serde(default)]
    h: u32,
    #[serde(default)]
    t: f64,
    #[serde(default)]
    error: Option<String>,
}

#[derive(serde::Deserialize)]
struct Rect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// [`RenderingEngine`] backed by a headless Chromium over the DevTools protocol.
pub struct ChromeEngine {
    // Dropping the browser kills the Chromium process.
    _browser: Browser,
    tab: Arc<Tab>,
    format: ImageFormat,
    command_timeout: Duration,
    hooked: bool,
}

impl ChromeEngine {
    /// Launch Chromium and open one tab sized to the configured viewport.
    pub fn launch(cfg: &BrowserConfig) -> ReelResult<Self> {
        let extra: Vec<OsString> = cfg.args.iter().map(OsString::from).collect();
        let options = LaunchOptions {
            headless: cfg.headless,
            sandbox: cfg.sandbox,
            window_size: Some((cfg.viewport.width, cfg.viewport.height)),
            path: cfg.resolve_chrome_path(),
            args: extra.iter().map(|s| s.as_os_str()).collect(),
            idle_browser_timeout: cfg.idle_timeout,
            ..LaunchOptions::default()
        };

        info!(
            viewport = %cfg.viewport,
            headless = cfg.headless,
            "launching chromium"
        );
        let browser = Browser::new(options)
            .map_err(|e| ReelError::engine(format!("failed to launch chromium: {e}")))?;
        let tab = browser
            .new_tab()
            .map_err(|e| ReelError::engine(format!("failed to open tab: {e}")))?;
        tab.set_default_timeout(cfg.command_timeout);

        Ok(Self {
            _browser: browser,
            tab,
            format: cfg.image_format,
            command_timeout: cfg.command_timeout,
            hooked: false,
        })
    }

    fn eval_json<T: serde::de::DeserializeOwned>(&self, js: &str, what: &str) -> ReelResult<T> {
        let obj = self
            .tab
            .evaluate(js, false)
            .map_err(|e| ReelError::engine(format!("{what}: {e}")))?;
        let text = obj
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| ReelError::engine(format!("{what}: script returned no JSON")))?;
        serde_json::from_str(text).map_err(|e| ReelError::serde(format!("{what}: {e}")))
    }

    fn eval_unit(&self, js: &str, what: &str) -> ReelResult<serde_json::Value> {
        let obj = self
            .tab
            .evaluate(js, false)
            .map_err(|e| ReelError::engine(format!("{what}: {e}")))?;
        Ok(obj.value.unwrap_or(serde_json::Value::Null))
    }

    fn is_ready(&self, ready: ReadyCondition, last: &mut Option<(u64, Instant)>) -> bool {
        let probe: ReadyProbe = match self.eval_json(READY_STATE_JS, "ready probe") {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "ready probe failed, retrying");
                return false;
            }
        };
        match ready {
            ReadyCondition::DomContentLoaded => probe.state != "loading",
            ReadyCondition::Load => probe.state == "complete",
            ReadyCondition::NetworkIdle => {
                if probe.state != "complete" {
                    return false;
                }
                match last {
                    Some((count, since)) if *count == probe.resources => {
                        since.elapsed() >= NETWORK_QUIET
                    }
                    _ => {
                        *last = Some((probe.resources, Instant::now()));
                        false
                    }
                }
            }
        }
    }
}

impl RenderingEngine for ChromeEngine {
    #[tracing::instrument(skip(self))]
    fn navigate(
        &mut self,
        url: &str,
        ready: ReadyCondition,
        timeout: Duration,
    ) -> ReelResult<()> {
        let deadline = Instant::now() + timeout;
        self.tab.set_default_timeout(timeout);
        let navigated = self
            .tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated());
        self.tab.set_default_timeout(self.command_timeout);
        navigated.map_err(|e| ReelError::navigation_timeout(format!("'{url}': {e}")))?;

        let mut network = None;
        while !self.is_ready(ready, &mut network) {
            if Instant::now() >= deadline {
                return Err(ReelError::navigation_timeout(format!(
                    "'{url}' did not reach {ready:?} within {timeout:?}"
                )));
            }
            std::thread::sleep(READY_POLL);
        }
        info!(url, ?ready, "page ready");
        Ok(())
    }

    fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> ReelResult<()> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map(|_| ())
            .map_err(|e| {
                ReelError::interaction_timeout(format!(
                    "'{selector}' did not appear within {timeout:?}: {e}"
                ))
            })
    }

    fn dispatch_click(&mut self, x: f64, y: f64) -> ReelResult<()> {
        let js = CLICK_JS
            .replace("__X__", &x.to_string())
            .replace("__Y__", &y.to_string());
        let target = self.eval_unit(&js, "click")?;
        debug!(x, y, %target, "clicked");
        Ok(())
    }

    fn dispatch_scroll(&mut self, dx: f64, dy: f64) -> ReelResult<()> {
        let js = SCROLL_JS
            .replace("__DX__", &dx.to_string())
            .replace("__DY__", &dy.to_string());
        let scroll_y = self.eval_unit(&js, "scroll")?;
        debug!(dx, dy, %scroll_y, "scrolled");
        Ok(())
    }

    fn query_surfaces(&mut self, query: &SurfaceQuery) -> ReelResult<Vec<SurfaceInfo>> {
        let (kind, arg) = match query {
            SurfaceQuery::AllCanvases => ("all", ""),
            SurfaceQuery::Id(id) => ("id", id.as_str()),
            SurfaceQuery::Css(sel) => ("css", sel.as_str()),
            SurfaceQuery::XPath(xp) => ("xpath", xp.as_str()),
        };
        let arg = serde_json::to_string(arg).map_err(|e| ReelError::serde(e.to_string()))?;
        let js = QUERY_SURFACES_JS
            .replace("__KIND__", kind)
            .replace("__ARG__", &arg);
        self.eval_json(&js, "query surfaces")
    }

    fn install_tick_hook(&mut self, surface: &SurfaceInfo, hook: TickHook) -> ReelResult<()> {
        let (mode, period_ms) = match hook {
            TickHook::AnimationFrame => ("raf", 0u128),
            TickHook::Interval(period) => ("interval", period.as_millis().max(1)),
        };
        let cfg = serde_json::json!({
            "index": surface.index,
            "mode": mode,
            "period_ms": period_ms as u64,
            "mime": self.format.mime(),
        });
        let js = INSTALL_HOOK_JS.replace("__CFG__", &cfg.to_string());
        let installed = self.eval_unit(&js, "install tick hook")?;
        if installed.as_bool() != Some(true) {
            return Err(ReelError::no_suitable_surface(format!(
                "canvas #{} disappeared before the hook was installed",
                surface.index
            )));
        }
        self.hooked = true;
        info!(surface = surface.index, mode, "tick hook installed");
        Ok(())
    }

    fn drain_ticks(&mut self, observer: &mut dyn FnMut(Tick)) -> ReelResult<usize> {
        if !self.hooked {
            return Ok(0);
        }
        let raw: Vec<RawTick> = self.eval_json(DRAIN_JS, "drain ticks")?;
        let n = raw.len();
        for t in raw {
            let at = Some(Duration::from_secs_f64((t.t / 1000.0).max(0.0)));
            let tick = match (t.ok, t.data) {
                (true, Some(data)) => Tick::Captured {
                    image: EncodedImage::data_url(data),
                    size: Dimensions::new(t.w, t.h),
                    at,
                },
                _ => Tick::Failed {
                    error: t.error.unwrap_or_else(|| "capture returned no data".to_owned()),
                },
            };
            observer(tick);
        }
        Ok(n)
    }

    fn remove_tick_hook(&mut self) -> ReelResult<()> {
        self.hooked = false;
        self.eval_unit(REMOVE_HOOK_JS, "remove tick hook")?;
        Ok(())
    }

    fn snapshot_surface(&mut self, surface: &SurfaceInfo) -> ReelResult<EncodedImage> {
        let js = SURFACE_RECT_JS.replace("__INDEX__", &surface.index.to_string());
        let rect: Rect = self.eval_json(&js, "surface bounds")?;
        if rect.width <= 0.0 || rect.height <= 0.0 {
            return Err(ReelError::engine(format!(
                "canvas #{} has an empty layout box",
                surface.index
            )));
        }
        let clip = Page::Viewport {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            scale: 1.0,
        };
        let png = self
            .tab
            .capture_screenshot(
                Page::CaptureScreenshotFormatOption::Png,
                None,
                Some(clip),
                true,
            )
            .map_err(|e| ReelError::engine(format!("surface screenshot failed: {e}")))?;
        Ok(EncodedImage::raw(ImageFormat::Png, png))
    }

    fn page_snapshot(&mut self) -> ReelResult<EncodedImage> {
        let png = self
            .tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| ReelError::engine(format!("page screenshot failed: {e}")))?;
        Ok(EncodedImage::raw(ImageFormat::Png, png))
    }

    fn close(&mut self) -> ReelResult<()> {
        if self.hooked
            && let Err(e) = self.remove_tick_hook()
        {
            warn!(error = %e, "failed to remove tick hook while closing");
        }
        self.tab
            .close(true)
            .map_err(|e| ReelError::engine(format!("failed to close tab: {e}")))?;
        Ok(())
    }
}
