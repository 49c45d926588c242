use super::*;
use crate::engine::scripted::ScriptedEngine;
use crate::foundation::core::Dimensions;

fn surface(index: usize, w: u32, h: u32) -> SurfaceInfo {
    SurfaceInfo {
        index,
        id: String::new(),
        size: Dimensions::new(w, h),
        display_size: Dimensions::new(w, h),
    }
}

#[test]
fn largest_area_above_threshold_wins() {
    // 5,000 / 50,000 / 20,000 px²
    let candidates = vec![surface(0, 100, 50), surface(1, 250, 200), surface(2, 200, 100)];
    let picked = select_largest(&candidates, 10_000).unwrap();
    assert_eq!(picked.index, 1);
    assert_eq!(picked.area(), 50_000);
}

#[test]
fn only_small_candidate_is_rejected() {
    let candidates = vec![surface(0, 100, 50)];
    assert!(select_largest(&candidates, 10_000).is_none());
    let err = select(&candidates, &SurfacePolicy::default()).unwrap_err();
    assert!(matches!(err, ReelError::NoSuitableSurface(_)));
}

#[test]
fn threshold_is_exclusive() {
    let candidates = vec![surface(0, 100, 100)];
    assert!(select_largest(&candidates, 10_000).is_none());
    assert!(select_largest(&candidates, 9_999).is_some());
}

#[test]
fn ties_go_to_first_in_document_order() {
    let candidates = vec![surface(0, 10, 10), surface(3, 200, 100), surface(5, 100, 200)];
    assert_eq!(select_largest(&candidates, 0).unwrap().index, 3);
}

#[test]
fn exact_policies_take_first_match() {
    let mut engine = ScriptedEngine::with_canvas_sizes(&[(300, 150), (1920, 1080), (640, 480)])
        .selector("#stage canvas", vec![2, 1]);
    let picked = locate(&mut engine, &SurfacePolicy::Css("#stage canvas".into())).unwrap();
    assert_eq!(picked.index, 2);

    let by_id = locate(&mut engine, &SurfacePolicy::Id("canvas-1".into())).unwrap();
    assert_eq!(by_id.size, Dimensions::new(1920, 1080));
}

#[test]
fn unmatched_selector_fails_with_no_suitable_surface() {
    let mut engine = ScriptedEngine::with_canvas_sizes(&[(1920, 1080)]);
    let err = locate(&mut engine, &SurfacePolicy::XPath("//div[@id='nope']".into())).unwrap_err();
    assert!(matches!(err, ReelError::NoSuitableSurface(_)));
}

#[test]
fn page_without_canvases_fails() {
    let mut engine = ScriptedEngine::new(Vec::new());
    assert!(locate(&mut engine, &SurfacePolicy::default()).is_err());
}
