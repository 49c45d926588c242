use super::*;

fn naming(start: u64) -> FrameNaming {
    FrameNaming::for_capacity("frame", "png", start, 900, None)
}

fn touch(dir: &Path, names: &[&str]) {
    let _ = std::fs::remove_dir_all(dir);
    std::fs::create_dir_all(dir).unwrap();
    for name in names {
        std::fs::write(dir.join(name), b"x").unwrap();
    }
}

#[test]
fn width_is_at_least_six_and_grows_with_capacity() {
    assert_eq!(naming(0).width, 6);
    assert_eq!(FrameNaming::for_capacity("f", "png", 0, 1_000_000, None).width, 6);
    assert_eq!(FrameNaming::for_capacity("f", "png", 1, 1_000_000, None).width, 7);
    assert_eq!(FrameNaming::for_capacity("f", "png", 0, 10, Some(3)).width, 3);
}

#[test]
fn names_patterns_and_parsing_agree() {
    let n = naming(1);
    assert_eq!(n.file_name(FrameIndex(0)), "frame-000001.png");
    assert_eq!(n.file_name(FrameIndex(41)), "frame-000042.png");
    assert_eq!(n.pattern(), "frame-%06d.png");
    assert_eq!(n.parse("frame-000042.png"), Some(42));
    assert_eq!(n.parse("frame-42.png"), None);
    assert_eq!(n.parse("frame-000042.jpg"), None);
    assert_eq!(n.parse("other-000042.png"), None);
    assert!(n.matches_loosely("frame-42.png"));
    assert!(!n.matches_loosely("frame-.png"));
    assert!(!n.matches_loosely("frame-4a.png"));
}

#[test]
fn scan_reports_gaps_between_start_and_last() {
    let dir = PathBuf::from("target").join("unit_sequence_gaps");
    touch(
        &dir,
        &[
            "frame-000000.png",
            "frame-000001.png",
            "frame-000003.png",
            "frame-000006.png",
            "notes.txt",
        ],
    );
    let seq = FrameSequence::scan(&dir, &naming(0)).unwrap();
    assert_eq!(seq.len(), 4);
    assert_eq!(seq.gaps(), vec![2, 4, 5]);
    let err = seq.ensure_contiguous().unwrap_err();
    assert!(err.to_string().contains("3 gap(s)"), "{err}");
    assert!(matches!(err, ReelError::WriteFailure { index: 2, .. }), "{err}");
    assert_eq!(err.stage(), "write");
}

#[test]
fn missing_leading_frames_count_as_gaps() {
    let dir = PathBuf::from("target").join("unit_sequence_leading");
    touch(&dir, &["frame-000002.png", "frame-000003.png"]);
    let seq = FrameSequence::scan(&dir, &naming(1)).unwrap();
    assert_eq!(seq.gaps(), vec![1]);
    assert!(seq.ensure_contiguous().is_err());
}

#[test]
fn contiguous_sequence_lists_paths_in_order() {
    let dir = PathBuf::from("target").join("unit_sequence_ok");
    touch(&dir, &["frame-000003.png", "frame-000001.png", "frame-000002.png"]);
    let seq = FrameSequence::scan(&dir, &naming(1)).unwrap();
    seq.ensure_contiguous().unwrap();
    let names: Vec<String> = seq
        .paths()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["frame-000001.png", "frame-000002.png", "frame-000003.png"]
    );
}

#[test]
fn empty_directory_is_not_a_sequence() {
    let dir = PathBuf::from("target").join("unit_sequence_empty");
    touch(&dir, &[]);
    let seq = FrameSequence::scan(&dir, &naming(0)).unwrap();
    assert!(seq.is_empty());
    let err = seq.ensure_contiguous().unwrap_err();
    assert!(matches!(err, ReelError::EncodingFailure(_)), "{err}");
}
