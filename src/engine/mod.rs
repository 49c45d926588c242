//! Capability interface over the rendering engine (the browser).
//!
//! Everything the pipeline needs from a page goes through [`RenderingEngine`]. The Chromium
//! implementation lives in [`chrome`]; [`scripted`] replays a fixed script and is used by tests
//! and dry runs.

/// Headless Chromium engine driven over the DevTools protocol.
pub mod chrome;
/// Deterministic engine that replays scripted surfaces and ticks.
pub mod scripted;

use std::time::Duration;

use base64::Engine as _;

use crate::foundation::core::Dimensions;
use crate::foundation::error::{ReelError, ReelResult};

/// When a freshly navigated page counts as ready.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyCondition {
    /// `DOMContentLoaded` fired.
    DomContentLoaded,
    /// The `load` event fired.
    Load,
    /// `load` fired and no new network resources appeared for a quiet period.
    #[default]
    NetworkIdle,
}

/// Query used to enumerate candidate drawable surfaces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceQuery {
    /// Every `<canvas>` in document order.
    AllCanvases,
    /// The canvas with this `id` attribute.
    Id(String),
    /// Canvases matched by a CSS selector (or the first canvas inside each match).
    Css(String),
    /// Canvases matched by an XPath expression.
    XPath(String),
}

/// A drawable surface found on the page.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SurfaceInfo {
    /// Position among all canvases in document order. Stable handle used to re-resolve the
    /// surface inside the page.
    pub index: usize,
    /// `id` attribute, empty when absent.
    #[serde(default)]
    pub id: String,
    /// Backing-store size (`canvas.width` x `canvas.height`).
    pub size: Dimensions,
    /// Layout size on screen (`offsetWidth` x `offsetHeight`).
    #[serde(default)]
    pub display_size: Dimensions,
}

impl SurfaceInfo {
    pub fn area(&self) -> u64 {
        self.size.area()
    }
}

/// How the engine produces ticks once a hook is installed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickHook {
    /// Capture after every animation-frame callback (at most once per frame timestamp).
    AnimationFrame,
    /// Capture on a fixed page-side timer.
    Interval(Duration),
}

/// Encoded image format of a snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }
}

/// Transport encoding of snapshot bytes as handed over by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// `data:<mime>;base64,<data>` as returned by `canvas.toDataURL`.
    DataUrl(String),
    /// Bare standard base64.
    Base64(String),
    /// Already decoded bytes.
    Raw(Vec<u8>),
}

/// One encoded still image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    pub format: ImageFormat,
    pub payload: Payload,
}

impl EncodedImage {
    pub fn raw(format: ImageFormat, bytes: Vec<u8>) -> Self {
        Self {
            format,
            payload: Payload::Raw(bytes),
        }
    }

    pub fn data_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let format = match url.split(';').next() {
            Some("data:image/jpeg") => ImageFormat::Jpeg,
            Some("data:image/webp") => ImageFormat::Webp,
            _ => ImageFormat::Png,
        };
        Self {
            format,
            payload: Payload::DataUrl(url),
        }
    }

    /// Decode the transport encoding into raw image bytes.
    pub fn decode(&self) -> ReelResult<Vec<u8>> {
        let b64 = match &self.payload {
            Payload::Raw(bytes) => return Ok(bytes.clone()),
            Payload::Base64(data) => data.as_str(),
            Payload::DataUrl(url) => {
                let (header, data) = url
                    .split_once(',')
                    .ok_or_else(|| ReelError::serde("data URL has no ',' separator"))?;
                if !header.starts_with("data:") || !header.ends_with(";base64") {
                    return Err(ReelError::serde(format!(
                        "unsupported data URL header '{header}'"
                    )));
                }
                data
            }
        };
        if b64.is_empty() {
            return Err(ReelError::serde("empty image payload"));
        }
        base64::engine::general_purpose::STANDARD
            .decode(b64.trim())
            .map_err(|e| ReelError::serde(format!("invalid base64 image payload: {e}")))
    }
}

/// Outcome of one engine tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tick {
    /// The surface was snapshotted.
    Captured {
        image: EncodedImage,
        size: Dimensions,
        /// Engine-side time since the hook was installed, when the engine reports one.
        at: Option<Duration>,
    },
    /// The snapshot attempt threw (tainted canvas, lost context, ...).
    Failed { error: String },
}

/// Capabilities the capture pipeline needs from a rendering engine.
///
/// Calls are synchronous: each returns once the engine has acknowledged the command or its own
/// timeout has elapsed.
pub trait RenderingEngine {
    /// Load `url` and block until `ready` holds or `timeout` elapses
    /// ([`ReelError::NavigationTimeout`]).
    fn navigate(&mut self, url: &str, ready: ReadyCondition, timeout: Duration)
    -> ReelResult<()>;

    /// Block until `selector` matches an element ([`ReelError::InteractionTimeout`] otherwise).
    fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> ReelResult<()>;

    /// Click at viewport coordinates.
    fn dispatch_click(&mut self, x: f64, y: f64) -> ReelResult<()>;

    /// Scroll the page (and wheel-listening content) by a delta in CSS pixels.
    fn dispatch_scroll(&mut self, dx: f64, dy: f64) -> ReelResult<()>;

    /// Enumerate candidate surfaces in document order.
    fn query_surfaces(&mut self, query: &SurfaceQuery) -> ReelResult<Vec<SurfaceInfo>>;

    /// Register a tick observer point on `surface`. Ticks queue inside the engine until
    /// [`RenderingEngine::drain_ticks`] delivers them.
    fn install_tick_hook(&mut self, surface: &SurfaceInfo, hook: TickHook) -> ReelResult<()>;

    /// Deliver queued ticks, oldest first, to `observer`. Returns how many were delivered.
    fn drain_ticks(&mut self, observer: &mut dyn FnMut(Tick)) -> ReelResult<usize>;

    /// Stop producing ticks. Queued ticks are discarded.
    fn remove_tick_hook(&mut self) -> ReelResult<()>;

    /// Host-driven snapshot of the surface's current pixels.
    fn snapshot_surface(&mut self, surface: &SurfaceInfo) -> ReelResult<EncodedImage>;

    /// Snapshot of the whole viewport, used for diagnostics.
    fn page_snapshot(&mut self) -> ReelResult<EncodedImage>;

    /// Release the page and browser.
    fn close(&mut self) -> ReelResult<()>;
}

#[cfg(test)]
#[path = "../../tests/unit/engine/payload.rs"]
mod tests;
