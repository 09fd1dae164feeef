//! End-to-end planning tests: raw job in, filter graph and argument vector out.
//! The engine is never launched; durations come from injected probe strategies.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use vidoverlay_core::ffmpeg::{
    DurationProber, FFmpegError, FFmpegResult, ProbeStrategy, ProbeStrategyKind,
};
use vidoverlay_core::overlay::RawOverlaySpec;
use vidoverlay_core::render::{CompositionRequest, OverlayComposer};
use vidoverlay_core::settings::ComposerSettings;
use vidoverlay_core::{CoreError, Dimensions};

struct FixedProbe(f64);

#[async_trait]
impl ProbeStrategy for FixedProbe {
    fn kind(&self) -> ProbeStrategyKind {
        ProbeStrategyKind::StreamInfoParse
    }

    async fn probe(&self, _asset: &Path) -> FFmpegResult<f64> {
        Ok(self.0)
    }
}

struct FailingProbe;

#[async_trait]
impl ProbeStrategy for FailingProbe {
    fn kind(&self) -> ProbeStrategyKind {
        ProbeStrategyKind::DirectProbe
    }

    async fn probe(&self, _asset: &Path) -> FFmpegResult<f64> {
        Err(FFmpegError::ProbeError("no ffprobe".to_string()))
    }
}

fn composer(strategies: Vec<Box<dyn ProbeStrategy>>) -> OverlayComposer {
    OverlayComposer::new(
        ComposerSettings::default(),
        DurationProber::with_strategies(strategies, Duration::from_secs(1)),
    )
}

fn touch(dir: &TempDir, name: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, b"").unwrap();
    path.to_string_lossy().to_string()
}

fn request(dir: &TempDir) -> CompositionRequest {
    let base = touch(dir, "base.mp4");
    CompositionRequest::new(PathBuf::from(base), dir.path().join("out.mp4"))
}

#[tokio::test]
async fn green_screen_overlay_with_auto_hide() {
    let dir = TempDir::new().unwrap();
    let mut request = request(&dir);
    let raw: RawOverlaySpec = serde_json::from_value(serde_json::json!({
        "assetPath": touch(&dir, "presenter.mp4"),
        "startTime": 2,
        "autoHide": true,
        "position": "top-right",
        "sizePercent": 25,
        "chromaKey": true,
        "chromaColor": "green"
    }))
    .unwrap();
    request.overlays.push(raw);

    let composer = composer(vec![Box::new(FailingProbe), Box::new(FixedProbe(8.0))]);
    let plan = composer.plan(&request).await.unwrap().unwrap();

    let overlay = &plan.overlays[0];
    assert_eq!(overlay.probed_duration, Some(8.0));
    assert_eq!(overlay.probe_attempts.len(), 2);
    assert!(!overlay.probe_attempts[0].succeeded);
    assert_eq!(overlay.overlay.window.start, 2.0);
    assert_eq!(overlay.overlay.window.end, Some(10.0));

    let chroma = overlay.overlay.spec.chroma.as_ref().unwrap();
    assert_eq!((chroma.similarity, chroma.blend), (0.2, 0.15));

    assert_eq!(
        plan.filter_graph(),
        "[1:v]setpts=PTS-STARTPTS+2.000/TB[aligned0];\
         [aligned0][0:v]scale2ref=w=trunc(oh*mdar/2)*2:h=trunc(ih*0.2500/2)*2[scaled0][ref0];\
         [scaled0]chromakey=0x00ff00:0.2000:0.1500[keyed0];\
         [ref0][keyed0]overlay=main_w-overlay_w-10:10:enable='between(t,2.000,10.000)'"
    );
    assert_eq!(plan.args.first().map(String::as_str), Some("-i"));
    assert_eq!(plan.args.last().map(PathBuf::from), Some(dir.path().join("out.mp4")));
}

#[tokio::test]
async fn requested_duration_capped_by_probe() {
    let dir = TempDir::new().unwrap();
    let mut request = request(&dir);
    let mut raw = RawOverlaySpec::new(touch(&dir, "clip.mp4"));
    raw.duration = Some(30.0);
    request.overlays.push(raw);

    let plan = composer(vec![Box::new(FixedProbe(8.0))])
        .plan(&request)
        .await
        .unwrap()
        .unwrap();
    assert!(plan.filter_graph().ends_with("enable='between(t,0.000,8.000)'"));
}

#[tokio::test]
async fn unknown_duration_leaves_window_open() {
    let dir = TempDir::new().unwrap();
    let mut request = request(&dir);
    let mut raw = RawOverlaySpec::new(touch(&dir, "clip.mp4"));
    raw.start_time = Some(3.0);
    request.overlays.push(raw);

    let plan = composer(vec![Box::new(FailingProbe)])
        .plan(&request)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(plan.overlays[0].probed_duration, None);
    assert!(plan.filter_graph().ends_with("enable='gte(t,3.000)'"));
}

#[tokio::test]
async fn three_overlays_thread_sequentially() {
    let dir = TempDir::new().unwrap();
    let mut request = request(&dir);
    request.base_dimensions = Some(Dimensions::new(1920, 1080));

    let mut video = RawOverlaySpec::new(touch(&dir, "a.mp4"));
    video.auto_hide = Some(false);
    video.duration = Some(5.0);
    request.overlays.push(video);

    let mut logo = RawOverlaySpec::new(touch(&dir, "logo.png"));
    logo.position = Some("bottom-left".to_string());
    logo.animation = Some("fade_in_out".to_string());
    logo.start_time = Some(1.0);
    logo.duration = Some(4.0);
    request.overlays.push(logo);

    let mut badge = RawOverlaySpec::new(touch(&dir, "badge.webp"));
    badge.position = Some("custom".to_string());
    badge.custom_x = Some(serde_json::json!(100));
    badge.custom_y = Some(serde_json::json!(50));
    badge.size_mode = Some("pixels".to_string());
    badge.custom_width = Some(serde_json::json!(200));
    badge.custom_height = Some(serde_json::json!(100));
    request.overlays.push(badge);

    let plan = composer(vec![Box::new(FixedProbe(99.0))])
        .plan(&request)
        .await
        .unwrap()
        .unwrap();

    let statements: Vec<&str> = plan.filter_graph().split(';').collect();
    assert_eq!(
        statements,
        vec![
            "[1:v]scale=-2:324[scaled0]",
            "[0:v][scaled0]overlay=(main_w-overlay_w)/2:(main_h-overlay_h)/2:enable='between(t,0.000,5.000)'[tmp0]",
            "[2:v]scale=-2:216[scaled1]",
            "[scaled1]format=yuva420p,fade=t=in:st=1.000:d=1.000:alpha=1,fade=t=out:st=4.000:d=1.000:alpha=1[anim1]",
            "[tmp0][anim1]overlay=10:main_h-overlay_h-10:enable='between(t,1.000,5.000)':shortest=1[tmp1]",
            "[3:v]scale=200:100:force_original_aspect_ratio=decrease[scaled2]",
            "[tmp1][scaled2]overlay=100:50:enable='gte(t,0.000)'",
        ]
    );

    // Only the animated still is looped
    let loops: Vec<bool> = plan.command.inputs.iter().map(|i| i.loop_still).collect();
    assert_eq!(loops, vec![false, false, true, false]);
    // Non-auto-hide overlays are never probed
    assert!(plan.overlays.iter().all(|o| o.probe_attempts.is_empty()));
}

#[tokio::test]
async fn planning_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let mut request = request(&dir);
    let mut raw = RawOverlaySpec::new(touch(&dir, "clip.mp4"));
    raw.animation = Some("slide_right".to_string());
    raw.chroma_key = Some(true);
    raw.chroma_color = Some("blue".to_string());
    request.overlays.push(raw);
    request.overlays.push(RawOverlaySpec::new(touch(&dir, "logo.png")));

    let composer = composer(vec![Box::new(FixedProbe(6.0))]);
    let first = composer.plan(&request).await.unwrap().unwrap();
    let second = composer.plan(&request).await.unwrap().unwrap();
    assert_eq!(first.filter_graph(), second.filter_graph());
    assert_eq!(first.args, second.args);
}

#[tokio::test]
async fn subtitles_are_burned_in_first() {
    let dir = TempDir::new().unwrap();
    let mut request = request(&dir);
    request.subtitles = Some(PathBuf::from(touch(&dir, "captions.srt")));
    request.overlays.push(RawOverlaySpec::new(touch(&dir, "logo.png")));

    let plan = composer(Vec::new()).plan(&request).await.unwrap().unwrap();
    let graph = plan.filter_graph();
    assert!(graph.starts_with("[0:v]subtitles='"));
    assert!(graph.contains(":force_style='FontName=Arial,FontSize=12,"));
    assert!(graph.contains("[1:v][sub]scale2ref="));
    assert!(graph.contains("[ref0][scaled0]overlay="));
}

#[tokio::test]
async fn structural_errors_abort_planning() {
    let dir = TempDir::new().unwrap();
    let mut request = request(&dir);
    request.overlays.push(RawOverlaySpec::new(touch(&dir, "good.png")));
    request.overlays.push(RawOverlaySpec::new(touch(&dir, "notes.txt")));

    let err = composer(Vec::new()).plan(&request).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert_eq!(err.field(), Some("assetPath"));
}
