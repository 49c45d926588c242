//! Element Locator: resolve exactly one drawable surface.

use tracing::{debug, info};

use crate::engine::{RenderingEngine, SurfaceInfo, SurfaceQuery};
use crate::foundation::error::{ReelError, ReelResult};

/// Default lower bound (exclusive) for the largest-area heuristic, in px².
pub const DEFAULT_MIN_AREA: u64 = 10_000;

/// How the target surface is chosen.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfacePolicy {
    /// Canvas with this `id` attribute.
    Id(String),
    /// CSS selector; a non-canvas match resolves to its first canvas descendant.
    Css(String),
    /// XPath expression, resolved like [`SurfacePolicy::Css`].
    XPath(String),
    /// Largest canvas whose area exceeds `min_area`; ties go to document order.
    LargestArea { min_area: u64 },
}

impl Default for SurfacePolicy {
    fn default() -> Self {
        Self::LargestArea {
            min_area: DEFAULT_MIN_AREA,
        }
    }
}

impl SurfacePolicy {
    fn query(&self) -> SurfaceQuery {
        match self {
            Self::Id(id) => SurfaceQuery::Id(id.clone()),
            Self::Css(sel) => SurfaceQuery::Css(sel.clone()),
            Self::XPath(xp) => SurfaceQuery::XPath(xp.clone()),
            Self::LargestArea { .. } => SurfaceQuery::AllCanvases,
        }
    }
}

/// Pick the candidate with the largest area strictly above `min_area`.
///
/// Ties keep the earliest candidate.
pub fn select_largest(candidates: &[SurfaceInfo], min_area: u64) -> Option<&SurfaceInfo> {
    let mut best: Option<&SurfaceInfo> = None;
    for c in candidates {
        if c.area() <= min_area {
            continue;
        }
        if best.is_none_or(|b| c.area() > b.area()) {
            best = Some(c);
        }
    }
    best
}

/// Apply `policy` to an already-enumerated candidate list.
pub fn select(candidates: &[SurfaceInfo], policy: &SurfacePolicy) -> ReelResult<SurfaceInfo> {
    let picked = match policy {
        SurfacePolicy::LargestArea { min_area } => select_largest(candidates, *min_area),
        _ => candidates.first(),
    };
    picked.cloned().ok_or_else(|| {
        let seen: Vec<String> = candidates
            .iter()
            .map(|c| format!("#{} {}", c.index, c.size))
            .collect();
        ReelError::no_suitable_surface(format!(
            "{policy:?} matched nothing among {} candidate(s) [{}]",
            candidates.len(),
            seen.join(", ")
        ))
    })
}

/// Query the engine and resolve `policy` to one surface.
#[tracing::instrument(skip(engine))]
pub fn locate(engine: &mut dyn RenderingEngine, policy: &SurfacePolicy) -> ReelResult<SurfaceInfo> {
    let candidates = engine.query_surfaces(&policy.query())?;
    for c in &candidates {
        debug!(
            index = c.index,
            id = %c.id,
            size = %c.size,
            display = %c.display_size,
            "surface candidate"
        );
    }
    let surface = select(&candidates, policy)?;
    info!(
        index = surface.index,
        size = %surface.size,
        candidates = candidates.len(),
        "surface located"
    );
    Ok(surface)
}

#[cfg(test)]
#[path = "../tests/unit/locate.rs"]
mod tests;
