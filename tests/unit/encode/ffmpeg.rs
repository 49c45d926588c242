use std::path::PathBuf;

use super::*;
use crate::foundation::core::Fps;
use crate::write::FrameNaming;

fn cfg() -> AssembleConfig {
    AssembleConfig {
        frames_dir: PathBuf::from("frames"),
        naming: FrameNaming::for_capacity("frame", "png", 1, 900, None),
        fps: Fps::whole(60).unwrap(),
        out_path: PathBuf::from("output").join("animation.mp4"),
        overwrite: true,
        strategies: EncoderStrategy::default_chain(),
        scale: None,
        timeout: Duration::from_secs(5),
    }
}

fn strings(args: &[OsString]) -> Vec<String> {
    args.iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

#[test]
fn argument_template_for_even_source() {
    let args = strings(&build_args(&cfg(), &EncoderStrategy::x264(), Dimensions::new(1920, 1080)));
    let input = PathBuf::from("frames").join("frame-%06d.png");
    let out = PathBuf::from("output").join("animation.mp4");
    assert_eq!(
        args,
        vec![
            "-y".to_owned(),
            "-loglevel".into(),
            "error".into(),
            "-framerate".into(),
            "60".into(),
            "-start_number".into(),
            "1".into(),
            "-i".into(),
            input.to_string_lossy().into_owned(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "slow".into(),
            "-crf".into(),
            "18".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-movflags".into(),
            "+faststart".into(),
            out.to_string_lossy().into_owned(),
        ]
    );
}

#[test]
fn no_overwrite_and_fractional_rate() {
    let cfg = AssembleConfig {
        overwrite: false,
        fps: Fps::new(30_000, 1001).unwrap(),
        ..cfg()
    };
    let args = strings(&build_args(&cfg, &EncoderStrategy::x265(), Dimensions::new(8, 8)));
    assert_eq!(args[0], "-n");
    assert_eq!(args[4], "30000/1001");
    assert!(args.contains(&"libx265".to_owned()));
    assert!(args.contains(&"medium".to_owned()));
}

#[test]
fn odd_sources_get_an_even_scale_filter() {
    assert_eq!(scale_filter(None, Dimensions::new(1920, 1080)), None);
    assert_eq!(
        scale_filter(None, Dimensions::new(1279, 721)).as_deref(),
        Some("scale=1278:720:flags=lanczos")
    );
    assert_eq!(
        scale_filter(Some(Dimensions::new(1280, 720)), Dimensions::new(1920, 1080)).as_deref(),
        Some("scale=1280:720:flags=lanczos")
    );

    let args = strings(&build_args(&cfg(), &EncoderStrategy::x264(), Dimensions::new(801, 600)));
    let vf = args.iter().position(|a| a == "-vf").unwrap();
    assert_eq!(args[vf + 1], "scale=800:600:flags=lanczos");
    assert_eq!(vf + 3, args.len());
}

#[test]
fn default_chain_is_x264_then_x265() {
    let chain = EncoderStrategy::default_chain();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].label(), "ffmpeg libx264 preset=slow crf=18");
    assert_eq!(chain[1].label(), "ffmpeg libx265 preset=medium crf=18");
}

#[test]
fn stderr_tail_keeps_last_non_empty_lines() {
    let text = "a\n\nb\nc\n  \nd\n";
    assert_eq!(tail(text, 2), "c | d");
    assert_eq!(tail(text, 10), "a | b | c | d");
}
