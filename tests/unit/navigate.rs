use super::*;
use crate::engine::scripted::{EngineCall, ScriptedEngine};

fn plan(url: &str, steps: Vec<Interaction>) -> NavigationPlan {
    NavigationPlan {
        url: url.to_owned(),
        ready: ReadyCondition::NetworkIdle,
        timeout: DEFAULT_NAVIGATION_TIMEOUT,
        settle: Duration::ZERO,
        steps,
    }
}

#[test]
fn steps_run_in_order_with_repeats() {
    let mut engine = ScriptedEngine::with_canvas_sizes(&[(640, 480)]).element("#hero");
    let steps = vec![
        Interaction::Click {
            x: 960.0,
            y: 540.0,
            repeat: 1,
            delay: Duration::ZERO,
        },
        Interaction::Scroll {
            dx: 0.0,
            dy: 1080.0,
            repeat: 3,
            delay: Duration::from_millis(1),
        },
        Interaction::WaitForSelector {
            selector: "#hero".into(),
            timeout: Duration::from_millis(10),
        },
    ];
    let p = plan("https://example.test/", steps);
    open(&mut engine, &p, &Diagnostics::disabled()).unwrap();
    interact(&mut engine, &p.steps, &Diagnostics::disabled()).unwrap();

    assert_eq!(
        engine.calls(),
        &[
            EngineCall::Navigate("https://example.test/".into()),
            EngineCall::Click(960.0, 540.0),
            EngineCall::Scroll(0.0, 1080.0),
            EngineCall::Scroll(0.0, 1080.0),
            EngineCall::Scroll(0.0, 1080.0),
            EngineCall::WaitForSelector("#hero".into()),
        ]
    );
}

#[test]
fn navigation_failure_is_a_navigation_timeout() {
    let mut engine = ScriptedEngine::new(Vec::new()).failing_navigation();
    let err = open(&mut engine, &plan("https://slow.test/", vec![]), &Diagnostics::disabled())
        .unwrap_err();
    assert!(matches!(err, ReelError::NavigationTimeout(_)));
}

#[test]
fn missing_selector_is_an_interaction_timeout_and_stops_the_sequence() {
    let mut engine = ScriptedEngine::new(Vec::new());
    let steps = vec![
        Interaction::WaitForSelector {
            selector: "#never".into(),
            timeout: Duration::from_millis(5),
        },
        Interaction::Click {
            x: 1.0,
            y: 1.0,
            repeat: 1,
            delay: Duration::ZERO,
        },
    ];
    let err = interact(&mut engine, &steps, &Diagnostics::disabled()).unwrap_err();
    assert!(matches!(err, ReelError::InteractionTimeout(_)));
    assert!(!engine.calls().contains(&EngineCall::Click(1.0, 1.0)));
}

#[test]
fn empty_url_is_rejected_before_touching_the_engine() {
    let mut engine = ScriptedEngine::new(Vec::new());
    assert!(open(&mut engine, &plan("  ", vec![]), &Diagnostics::disabled()).is_err());
    assert!(engine.calls().is_empty());
}

#[test]
fn diagnostics_write_checkpoint_files() {
    let dir = PathBuf::from("target").join("unit_navigate_diagnostics");
    let _ = std::fs::remove_dir_all(&dir);
    let mut engine = ScriptedEngine::new(Vec::new());
    let diagnostics = Diagnostics::new(Some(dir.clone()));

    open(&mut engine, &plan("https://example.test/", vec![]), &diagnostics).unwrap();
    assert!(dir.join("01-after-navigation.png").is_file());
}

#[test]
fn diagnostics_failures_do_not_change_the_outcome() {
    let dir = PathBuf::from("target").join("unit_navigate_diagnostics_failing");
    let mut engine = ScriptedEngine::new(Vec::new()).failing_page_snapshots();
    let diagnostics = Diagnostics::new(Some(dir));

    open(&mut engine, &plan("https://example.test/", vec![]), &diagnostics).unwrap();
    interact(&mut engine, &[], &diagnostics).unwrap();
}

#[test]
fn interactions_deserialize_from_tagged_json() {
    let json = r##"[
        { "kind": "click", "x": 10, "y": 20 },
        { "kind": "scroll", "dy": 800, "repeat": 4, "delay": 250 },
        { "kind": "wait_for_selector", "selector": "canvas" },
        { "kind": "pause", "duration": 1500 }
    ]"##;
    let steps: Vec<Interaction> = serde_json::from_str(json).unwrap();
    assert_eq!(
        steps[0],
        Interaction::Click {
            x: 10.0,
            y: 20.0,
            repeat: 1,
            delay: Duration::ZERO
        }
    );
    assert_eq!(
        steps[1],
        Interaction::Scroll {
            dx: 0.0,
            dy: 800.0,
            repeat: 4,
            delay: Duration::from_millis(250)
        }
    );
    assert_eq!(
        steps[2],
        Interaction::WaitForSelector {
            selector: "canvas".into(),
            timeout: DEFAULT_SELECTOR_TIMEOUT
        }
    );
    assert_eq!(
        steps[3],
        Interaction::Pause {
            duration: Duration::from_millis(1500)
        }
    );
}
