//! Overlay Composition Module
//!
//! Resolves every overlay of a request, probes durations for auto-hide, compiles the
//! filter graph and runs the engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ffmpeg::{
    detect_ffmpeg, DurationProber, EngineCommand, EngineInput, FFmpegError, FFmpegRunner,
    ProbeResult,
};
use crate::graph::{GraphCompiler, PlannedOverlay, SubtitleTrack, VisibilityWindow};
use crate::overlay::{effective_duration, ChromaPresetTable, ParameterResolver, RawOverlaySpec};
use crate::settings::ComposerSettings;
use crate::{CoreError, CoreResult, Dimensions};

// =============================================================================
// Types
// =============================================================================

/// Everything needed to compose one output video
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionRequest {
    pub base_video: PathBuf,
    pub output: PathBuf,
    /// Caption file burned in before the overlays
    #[serde(default)]
    pub subtitles: Option<PathBuf>,
    /// Base frame size, when known; enables absolute percent sizing
    #[serde(default)]
    pub base_dimensions: Option<Dimensions>,
    #[serde(default)]
    pub overlays: Vec<RawOverlaySpec>,
}

impl CompositionRequest {
    pub fn new(base_video: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            base_video: base_video.into(),
            output: output.into(),
            subtitles: None,
            base_dimensions: None,
            overlays: Vec::new(),
        }
    }

    /// Reads a JSON job file. Relative paths are taken relative to the file's directory.
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CoreError::FileNotFound(path.display().to_string()),
            _ => CoreError::IoError(e),
        })?;
        let mut request: CompositionRequest = serde_json::from_str(&content)?;
        if let Some(dir) = path.parent() {
            request.resolve_relative_to(dir);
        }
        Ok(request)
    }

    fn resolve_relative_to(&mut self, dir: &Path) {
        let rebase = |p: &Path| -> PathBuf {
            if p.is_relative() {
                dir.join(p)
            } else {
                p.to_path_buf()
            }
        };

        self.base_video = rebase(&self.base_video);
        self.output = rebase(&self.output);
        self.subtitles = self.subtitles.as_deref().map(rebase);
        for overlay in &mut self.overlays {
            let rebased = overlay
                .asset_path
                .as_deref()
                .filter(|a| !a.trim().is_empty())
                .map(|a| rebase(Path::new(a)).to_string_lossy().to_string());
            if rebased.is_some() {
                overlay.asset_path = rebased;
            }
        }
    }
}

/// One overlay of a plan, with the probe attempts that shaped its window
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayPlan {
    #[serde(flatten)]
    pub overlay: PlannedOverlay,
    pub probed_duration: Option<f64>,
    pub probe_attempts: Vec<ProbeResult>,
}

/// Compiled composition, ready to hand to the engine
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionPlan {
    pub command: EngineCommand,
    pub overlays: Vec<OverlayPlan>,
    /// Full argument vector for `command` (program name excluded)
    pub args: Vec<String>,
}

impl CompositionPlan {
    pub fn filter_graph(&self) -> &str {
        &self.command.filter_graph
    }
}

/// Successful render
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionResult {
    pub output_path: PathBuf,
    pub file_size: u64,
    pub encoding_time_sec: f64,
    pub plan: CompositionPlan,
}

#[derive(Clone, Debug)]
pub enum ComposeOutcome {
    Rendered(CompositionResult),
    /// No overlays were left to compose; nothing was written
    NothingToDo,
}

/// Hidden sibling the engine writes to before the output is moved into place
pub fn partial_output_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let name = match output.extension() {
        Some(ext) => format!(".{}.partial.{}", stem, ext.to_string_lossy()),
        None => format!(".{}.partial", stem),
    };
    output.with_file_name(name)
}

// =============================================================================
// Composer
// =============================================================================

/// Composes overlays onto a base video
pub struct OverlayComposer {
    settings: ComposerSettings,
    presets: &'static ChromaPresetTable,
    prober: DurationProber,
    runner: Option<FFmpegRunner>,
}

impl OverlayComposer {
    /// Composer that can plan but not render until a runner is attached
    pub fn new(settings: ComposerSettings, prober: DurationProber) -> Self {
        Self {
            settings,
            presets: ChromaPresetTable::builtin(),
            prober,
            runner: None,
        }
    }

    pub fn with_runner(mut self, runner: FFmpegRunner) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Detects the engine and wires up the standard probe chain
    pub fn from_settings(settings: ComposerSettings) -> CoreResult<Self> {
        let info = detect_ffmpeg(
            settings.engine.ffmpeg_path.as_deref(),
            &settings.engine.extra_search_dirs,
        )?;
        let prober = DurationProber::new(Some(&info), settings.probe_timeout());
        Ok(Self::new(settings, prober).with_runner(FFmpegRunner::new(info)))
    }

    pub fn settings(&self) -> &ComposerSettings {
        &self.settings
    }

    pub fn runner(&self) -> Option<&FFmpegRunner> {
        self.runner.as_ref()
    }

    /// Validates, probes and compiles a request without running the engine.
    ///
    /// Returns `Ok(None)` when the request carries no overlays.
    pub async fn plan(&self, request: &CompositionRequest) -> CoreResult<Option<CompositionPlan>> {
        require_file(&request.base_video)?;
        if let Some(subtitles) = &request.subtitles {
            require_file(subtitles)?;
        }

        if request.overlays.is_empty() {
            info!("No overlays in request, nothing to compose");
            return Ok(None);
        }

        let resolver = ParameterResolver::new(self.presets, self.settings.resolver_defaults());
        let specs = request
            .overlays
            .iter()
            .map(|raw| resolver.resolve(raw))
            .collect::<Result<Vec<_>, _>>()?;
        for spec in &specs {
            require_file(&spec.asset_path)?;
        }

        let mut inputs = vec![EngineInput::new(&request.base_video)];
        let mut overlays = Vec::with_capacity(specs.len());
        for spec in specs {
            let probe_attempts = if spec.auto_hide {
                self.prober.probe_attempts(&spec.asset_path).await
            } else {
                Vec::new()
            };
            let probed_duration = probe_attempts
                .iter()
                .find(|attempt| attempt.succeeded)
                .map(|attempt| attempt.duration_sec);

            let duration =
                effective_duration(spec.requested_duration, spec.auto_hide, probed_duration);
            let window = VisibilityWindow::new(spec.start_time, duration);
            debug!(
                asset = %spec.asset_path.display(),
                start = window.start,
                end = ?window.end,
                "Planned overlay window"
            );

            let overlay = PlannedOverlay {
                input_index: inputs.len(),
                window,
                spec,
            };
            inputs.push(if overlay.loops_still() {
                EngineInput::looped(&overlay.spec.asset_path)
            } else {
                EngineInput::new(&overlay.spec.asset_path)
            });
            overlays.push(OverlayPlan {
                overlay,
                probed_duration,
                probe_attempts,
            });
        }

        let subtitles = request.subtitles.as_ref().map(|path| SubtitleTrack {
            path: path.clone(),
            force_style: self.settings.subtitles.force_style.clone(),
        });
        let compiler = GraphCompiler::new(self.settings.geometry_resolver())
            .with_base_dimensions(request.base_dimensions)
            .with_subtitles(subtitles)
            .with_overlay_start_alignment(self.settings.render.align_overlay_start);

        let planned: Vec<PlannedOverlay> = overlays.iter().map(|o| o.overlay.clone()).collect();
        let graph = compiler.compile(inputs.len(), 0, &planned)?;

        let command = EngineCommand {
            inputs,
            filter_graph: graph.to_string(),
            output: request.output.clone(),
        };
        let args = command.to_args();

        Ok(Some(CompositionPlan {
            command,
            overlays,
            args,
        }))
    }

    /// Plans and renders a request.
    ///
    /// With atomic output the destination only appears after a successful run. A failed
    /// run removes whatever the engine wrote and returns its stderr verbatim.
    pub async fn compose(&self, request: &CompositionRequest) -> CoreResult<ComposeOutcome> {
        let Some(plan) = self.plan(request).await? else {
            return Ok(ComposeOutcome::NothingToDo);
        };
        let runner = self.runner.as_ref().ok_or(FFmpegError::NotFound)?;

        let start_time = std::time::Instant::now();
        let output = plan.command.output.clone();
        let target = if self.settings.render.atomic_output {
            partial_output_path(&output)
        } else {
            output.clone()
        };

        let outcome = runner.run(&plan.command.with_output(&target)).await?;
        if !outcome.success() {
            warn!(
                exit_code = ?outcome.exit_code,
                output = %output.display(),
                "Composition render failed"
            );
            remove_quietly(&target).await;
            return Err(CoreError::RenderFailed {
                exit_code: outcome.exit_code,
                stderr: outcome.stderr,
            });
        }

        if target != output {
            // rename does not replace an existing file on Windows
            if cfg!(windows) && tokio::fs::metadata(&output).await.is_ok() {
                tokio::fs::remove_file(&output).await?;
            }
            tokio::fs::rename(&target, &output).await?;
        }

        let file_size = tokio::fs::metadata(&output)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        let encoding_time_sec = start_time.elapsed().as_secs_f64();
        info!(
            output = %output.display(),
            file_size,
            encoding_time_sec,
            "Composition rendered"
        );

        Ok(ComposeOutcome::Rendered(CompositionResult {
            output_path: output,
            file_size,
            encoding_time_sec,
            plan,
        }))
    }
}

fn require_file(path: &Path) -> CoreResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CoreError::FileNotFound(path.display().to_string()))
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove partial output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffmpeg::{FFmpegResult, ProbeStrategy, ProbeStrategyKind};
    use crate::overlay::AssetKind;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    struct FixedProbe(f64);

    #[async_trait]
    impl ProbeStrategy for FixedProbe {
        fn kind(&self) -> ProbeStrategyKind {
            ProbeStrategyKind::DirectProbe
        }

        async fn probe(&self, _asset: &Path) -> FFmpegResult<f64> {
            Ok(self.0)
        }
    }

    fn composer(probed: f64) -> OverlayComposer {
        let prober = DurationProber::with_strategies(
            vec![Box::new(FixedProbe(probed))],
            Duration::from_secs(1),
        );
        OverlayComposer::new(ComposerSettings::default(), prober)
    }

    /// Request with an existing (empty) base video inside `dir`
    fn request_in(dir: &TempDir) -> CompositionRequest {
        CompositionRequest::new(touch(dir, "base.mp4"), dir.path().join("out.mp4"))
    }

    fn touch(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn test_partial_output_path() {
        assert_eq!(
            partial_output_path(Path::new("/out/final.mp4")),
            PathBuf::from("/out/.final.partial.mp4")
        );
        assert_eq!(
            partial_output_path(Path::new("render")),
            PathBuf::from(".render.partial")
        );
    }

    #[tokio::test]
    async fn test_missing_base_video() {
        let dir = TempDir::new().unwrap();
        let request =
            CompositionRequest::new(dir.path().join("missing.mp4"), dir.path().join("out.mp4"));
        let err = composer(5.0).plan(&request).await.unwrap_err();
        assert!(matches!(err, CoreError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_no_overlays_is_nothing_to_do() {
        let dir = TempDir::new().unwrap();
        let request = request_in(&dir);
        let composer = composer(5.0);
        assert!(composer.plan(&request).await.unwrap().is_none());
        assert!(matches!(
            composer.compose(&request).await.unwrap(),
            ComposeOutcome::NothingToDo
        ));
    }

    #[tokio::test]
    async fn test_missing_overlay_asset() {
        let dir = TempDir::new().unwrap();
        let mut request = request_in(&dir);
        request.overlays.push(RawOverlaySpec::new(
            dir.path().join("ghost.mp4").to_string_lossy().to_string(),
        ));
        let err = composer(5.0).plan(&request).await.unwrap_err();
        assert!(matches!(err, CoreError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_validation_error_surfaces_field() {
        let dir = TempDir::new().unwrap();
        let mut request = request_in(&dir);
        let mut raw = RawOverlaySpec::new(touch(&dir, "clip.mp4").to_string_lossy().to_string());
        raw.start_time = Some(-2.0);
        request.overlays.push(raw);

        let err = composer(5.0).plan(&request).await.unwrap_err();
        assert_eq!(err.field(), Some("startTime"));
    }

    #[tokio::test]
    async fn test_plan_probes_auto_hide_video() {
        let dir = TempDir::new().unwrap();
        let mut request = request_in(&dir);
        let mut raw = RawOverlaySpec::new(touch(&dir, "clip.mp4").to_string_lossy().to_string());
        raw.start_time = Some(1.0);
        request.overlays.push(raw);

        let plan = composer(6.0).plan(&request).await.unwrap().unwrap();
        let overlay = &plan.overlays[0];
        assert_eq!(overlay.probed_duration, Some(6.0));
        assert_eq!(overlay.overlay.window.end, Some(7.0));
        assert!(plan.filter_graph().contains("enable='between(t,1.000,7.000)'"));
    }

    #[tokio::test]
    async fn test_images_are_not_probed() {
        let dir = TempDir::new().unwrap();
        let mut request = request_in(&dir);
        let mut raw = RawOverlaySpec::new(touch(&dir, "logo.png").to_string_lossy().to_string());
        raw.animation = Some("fade_in".to_string());
        request.overlays.push(raw);

        let plan = composer(6.0).plan(&request).await.unwrap().unwrap();
        assert!(plan.overlays[0].probe_attempts.is_empty());
        assert_eq!(plan.overlays[0].overlay.spec.kind, AssetKind::Image);
        assert!(plan.command.inputs[1].loop_still);
        assert_eq!(&plan.args[2..4], &["-loop".to_string(), "1".to_string()]);
    }

    #[tokio::test]
    async fn test_compose_without_engine() {
        let dir = TempDir::new().unwrap();
        let mut request = request_in(&dir);
        request
            .overlays
            .push(RawOverlaySpec::new(touch(&dir, "logo.png").to_string_lossy().to_string()));

        let err = composer(6.0).compose(&request).await.unwrap_err();
        assert!(matches!(err, CoreError::FFmpeg(FFmpegError::NotFound)));
    }

    #[test]
    fn test_request_paths_rebased_on_job_dir() {
        let dir = TempDir::new().unwrap();
        let job = dir.path().join("job.json");
        std::fs::write(
            &job,
            r#"{"baseVideo": "base.mp4", "output": "out/final.mp4",
                "overlays": [{"assetPath": "clips/a.mp4"}, {"assetPath": "/abs/b.png"}]}"#,
        )
        .unwrap();

        let request = CompositionRequest::from_file(&job).unwrap();
        assert_eq!(request.base_video, dir.path().join("base.mp4"));
        assert_eq!(request.output, dir.path().join("out/final.mp4"));
        assert_eq!(
            request.overlays[0].asset_path.as_deref(),
            Some(dir.path().join("clips/a.mp4").to_string_lossy().as_ref())
        );
        assert_eq!(request.overlays[1].asset_path.as_deref(), Some("/abs/b.png"));
    }

    #[test]
    fn test_job_file_read_errors() {
        let dir = TempDir::new().unwrap();

        let missing = CompositionRequest::from_file(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(CoreError::FileNotFound(_))));

        // A directory exists but cannot be read as a job
        let unreadable = CompositionRequest::from_file(dir.path());
        assert!(matches!(unreadable, Err(CoreError::IoError(_))));
    }
}
