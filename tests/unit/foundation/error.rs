use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        ReelError::navigation_timeout("x")
            .to_string()
            .contains("navigation timeout:")
    );
    assert!(
        ReelError::interaction_timeout("x")
            .to_string()
            .contains("interaction timeout:")
    );
    assert!(
        ReelError::no_suitable_surface("x")
            .to_string()
            .contains("no suitable surface:")
    );
    assert!(
        ReelError::encoding("x")
            .to_string()
            .contains("encoding failure:")
    );
    assert!(
        ReelError::validation("x")
            .to_string()
            .contains("validation error:")
    );
}

#[test]
fn capture_failure_mentions_streak() {
    let err = ReelError::CaptureFailure {
        consecutive: 31,
        last_error: "SecurityError: tainted canvas".to_owned(),
    };
    let msg = err.to_string();
    assert!(msg.contains("31 consecutive"));
    assert!(msg.contains("tainted canvas"));
    assert_eq!(err.stage(), "sample");
}

#[test]
fn stages_identify_the_failing_component() {
    assert_eq!(ReelError::navigation_timeout("x").stage(), "navigate");
    assert_eq!(ReelError::no_suitable_surface("x").stage(), "locate");
    assert_eq!(ReelError::EmptyCapture("stall".into()).stage(), "sample");
    assert_eq!(
        ReelError::WriteFailure {
            index: 3,
            reason: "disk full".into()
        }
        .stage(),
        "write"
    );
    assert_eq!(ReelError::encoding("x").stage(), "encode");
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = ReelError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
