use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use vidoverlay_core::ffmpeg::{detect_ffmpeg, DurationProber, ProbeResult, ProbeStrategyKind};
use vidoverlay_core::overlay::ChromaPresetTable;
use vidoverlay_core::render::{ComposeOutcome, CompositionRequest, OverlayComposer};
use vidoverlay_core::settings::{ComposerSettings, SettingsManager};

#[derive(Parser, Debug)]
#[command(
    name = "vidoverlay",
    version,
    about = "Compose video and image overlays onto a base video"
)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (defaults to the platform config directory).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compose the overlays described by a JSON job file (requires `ffmpeg`).
    Compose(ComposeArgs),
    /// Print an asset's duration and the strategy that found it.
    Probe(ProbeArgs),
    /// List the chroma-key color presets.
    Presets,
    /// Show the detected FFmpeg installation.
    Detect,
    /// Print the effective settings.
    Settings(SettingsArgs),
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Job file: base video, output and overlays.
    job: PathBuf,

    /// Print the plan as JSON instead of rendering.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Media file to probe.
    asset: PathBuf,
}

#[derive(Parser, Debug)]
struct SettingsArgs {
    /// Write the effective (normalized) settings back to the settings file.
    #[arg(long, default_value_t = false)]
    write: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProbeReport<'a> {
    asset: &'a Path,
    duration_sec: Option<f64>,
    strategy: Option<ProbeStrategyKind>,
    attempts: &'a [ProbeResult],
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stdout carries command output only
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let manager = settings_manager(cli.settings.as_deref());
    let settings = manager
        .as_ref()
        .map(SettingsManager::load)
        .unwrap_or_default();
    match cli.cmd {
        Command::Compose(args) => cmd_compose(args, settings).await,
        Command::Probe(args) => cmd_probe(args, settings).await,
        Command::Presets => cmd_presets(),
        Command::Detect => cmd_detect(settings),
        Command::Settings(args) => cmd_settings(args, manager.as_ref(), settings),
    }
}

fn settings_manager(path: Option<&Path>) -> Option<SettingsManager> {
    match path {
        Some(path) => Some(SettingsManager::from_file(path)),
        None => SettingsManager::default_location(),
    }
}

async fn cmd_compose(args: ComposeArgs, settings: ComposerSettings) -> anyhow::Result<()> {
    let request = CompositionRequest::from_file(&args.job)
        .with_context(|| format!("read job '{}'", args.job.display()))?;

    if args.dry_run {
        let composer = match OverlayComposer::from_settings(settings.clone()) {
            Ok(composer) => composer,
            Err(e) => {
                warn!(error = %e, "Planning without duration probes from ffmpeg");
                let prober = DurationProber::new(None, settings.probe_timeout());
                OverlayComposer::new(settings, prober)
            }
        };
        match composer.plan(&request).await? {
            Some(plan) => println!("{}", serde_json::to_string_pretty(&plan)?),
            None => println!("nothing to do"),
        }
        return Ok(());
    }

    let composer = OverlayComposer::from_settings(settings).context("locate ffmpeg")?;
    match composer
        .compose(&request)
        .await
        .with_context(|| format!("compose '{}'", request.output.display()))?
    {
        ComposeOutcome::Rendered(result) => {
            eprintln!(
                "wrote {} ({} bytes in {:.1}s)",
                result.output_path.display(),
                result.file_size,
                result.encoding_time_sec
            );
            println!("{}", result.output_path.display());
        }
        ComposeOutcome::NothingToDo => println!("nothing to do"),
    }
    Ok(())
}

async fn cmd_probe(args: ProbeArgs, settings: ComposerSettings) -> anyhow::Result<()> {
    if !args.asset.is_file() {
        anyhow::bail!("file not found: {}", args.asset.display());
    }

    let info = detect_ffmpeg(
        settings.engine.ffmpeg_path.as_deref(),
        &settings.engine.extra_search_dirs,
    )
    .ok();
    let prober = DurationProber::new(info.as_ref(), settings.probe_timeout());
    let attempts = prober.probe_attempts(&args.asset).await;
    let found = attempts.iter().find(|attempt| attempt.succeeded);

    let report = ProbeReport {
        asset: &args.asset,
        duration_sec: found.map(|attempt| attempt.duration_sec),
        strategy: found.map(|attempt| attempt.strategy),
        attempts: &attempts,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_presets() -> anyhow::Result<()> {
    println!("{:<10} {:<10} {:>10} {:>8}", "color", "hex", "similarity", "blend");
    for preset in ChromaPresetTable::builtin().presets() {
        println!(
            "{:<10} {:<10} {:>10} {:>8}",
            preset.name, preset.hex, preset.optimal.similarity, preset.optimal.blend
        );
    }
    Ok(())
}

fn cmd_detect(settings: ComposerSettings) -> anyhow::Result<()> {
    let info = detect_ffmpeg(
        settings.engine.ffmpeg_path.as_deref(),
        &settings.engine.extra_search_dirs,
    )
    .context("detect ffmpeg")?;

    println!("ffmpeg:  {}", info.ffmpeg_path.display());
    println!("ffprobe: {}", info.ffprobe_path.display());
    println!("version: {}", info.version.as_deref().unwrap_or("unknown"));
    Ok(())
}

fn cmd_settings(
    args: SettingsArgs,
    manager: Option<&SettingsManager>,
    settings: ComposerSettings,
) -> anyhow::Result<()> {
    let settings = if args.write {
        let manager = manager.context("no config directory; pass --settings")?;
        let saved = manager.save(&settings).with_context(|| {
            format!("write settings '{}'", manager.settings_path().display())
        })?;
        eprintln!("wrote {}", manager.settings_path().display());
        saved
    } else {
        settings
    };
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
