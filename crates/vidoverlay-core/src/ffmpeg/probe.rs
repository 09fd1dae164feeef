//! Duration Probing
//!
//! Determines how long an overlay asset plays so that auto-hide can bound its visible
//! window. Probing is an ordered list of independent strategies tried one after another;
//! each gets a bounded wait, and a failure or timeout simply moves on to the next one.
//! Only when every strategy fails is the duration reported as unknown, which callers must
//! treat as "unavailable", never as zero.
//!
//! Results are never cached: assets can change between requests and a probe is cheap next
//! to the render itself.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{derive_ffprobe_path, FFmpegError, FFmpegInfo, FFmpegResult};
use crate::process::configure_tokio_command;

/// Bounded wait applied to every probe strategy
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Identifies which strategy produced (or failed to produce) a duration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProbeStrategyKind {
    /// `ffprobe` looked up by name on the search path
    DirectProbe,
    /// `ffprobe` derived from the location of the detected ffmpeg binary
    PathDerivedProbe,
    /// `Duration: HH:MM:SS.hh` scraped from ffmpeg's diagnostic stream
    StreamInfoParse,
}

/// Outcome of a single strategy attempt.
///
/// `duration_sec` is only meaningful when `succeeded` is true.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub duration_sec: f64,
    pub strategy: ProbeStrategyKind,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    fn success(strategy: ProbeStrategyKind, duration_sec: f64) -> Self {
        Self {
            duration_sec,
            strategy,
            succeeded: true,
            error: None,
        }
    }

    fn failure(strategy: ProbeStrategyKind, error: &FFmpegError) -> Self {
        Self {
            duration_sec: 0.0,
            strategy,
            succeeded: false,
            error: Some(error.to_string()),
        }
    }
}

/// One way of asking the engine for an asset's duration.
#[async_trait]
pub trait ProbeStrategy: Send + Sync {
    fn kind(&self) -> ProbeStrategyKind;

    async fn probe(&self, asset: &Path) -> FFmpegResult<f64>;
}

// =============================================================================
// Strategies
// =============================================================================

/// Queries `ffprobe` for `format.duration` only, as bare CSV.
async fn query_format_duration(ffprobe: &Path, asset: &Path) -> FFmpegResult<f64> {
    let mut cmd = tokio::process::Command::new(ffprobe);
    configure_tokio_command(&mut cmd);
    cmd.args(["-v", "quiet", "-show_entries", "format=duration", "-of", "csv=p=0"])
        .arg(asset);

    let output = cmd.output().await.map_err(FFmpegError::ProcessError)?;
    if !output.status.success() {
        return Err(FFmpegError::ProbeError(format!(
            "ffprobe exited with {}",
            output.status
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_probe_duration(&stdout).ok_or_else(|| {
        FFmpegError::ParseError(format!("Unexpected ffprobe output: {:?}", stdout.trim()))
    })
}

/// Strategy 1: the metadata tool by its well-known name.
pub struct DirectProbe {
    program: PathBuf,
}

impl DirectProbe {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ffprobe"),
        }
    }
}

impl Default for DirectProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProbeStrategy for DirectProbe {
    fn kind(&self) -> ProbeStrategyKind {
        ProbeStrategyKind::DirectProbe
    }

    async fn probe(&self, asset: &Path) -> FFmpegResult<f64> {
        query_format_duration(&self.program, asset).await
    }
}

/// Strategy 2: the same query against the ffprobe that sits next to ffmpeg.
pub struct PathDerivedProbe {
    ffprobe_path: PathBuf,
}

impl PathDerivedProbe {
    pub fn new(ffmpeg_path: &Path) -> Self {
        Self {
            ffprobe_path: derive_ffprobe_path(ffmpeg_path),
        }
    }
}

#[async_trait]
impl ProbeStrategy for PathDerivedProbe {
    fn kind(&self) -> ProbeStrategyKind {
        ProbeStrategyKind::PathDerivedProbe
    }

    async fn probe(&self, asset: &Path) -> FFmpegResult<f64> {
        query_format_duration(&self.ffprobe_path, asset).await
    }
}

/// Strategy 3: run ffmpeg with an input and no output, then scrape its banner.
///
/// ffmpeg exits non-zero here ("At least one output file must be specified"); only the
/// diagnostic text matters.
pub struct StreamInfoParse {
    ffmpeg_path: PathBuf,
}

impl StreamInfoParse {
    pub fn new(ffmpeg_path: &Path) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.to_path_buf(),
        }
    }
}

#[async_trait]
impl ProbeStrategy for StreamInfoParse {
    fn kind(&self) -> ProbeStrategyKind {
        ProbeStrategyKind::StreamInfoParse
    }

    async fn probe(&self, asset: &Path) -> FFmpegResult<f64> {
        let mut cmd = tokio::process::Command::new(&self.ffmpeg_path);
        configure_tokio_command(&mut cmd);
        cmd.args(["-hide_banner", "-i"]).arg(asset);

        let output = cmd.output().await.map_err(FFmpegError::ProcessError)?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        parse_duration_token(&stderr)
            .ok_or_else(|| {
                FFmpegError::ParseError("No Duration token in ffmpeg output".to_string())
            })
    }
}

// =============================================================================
// Parsers
// =============================================================================

/// Parses the plain numeric duration printed by `-of csv=p=0`.
pub fn parse_probe_duration(stdout: &str) -> Option<f64> {
    let value: f64 = stdout.trim().parse().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

fn duration_regex() -> Option<&'static Regex> {
    static DURATION_RE: OnceLock<Option<Regex>> = OnceLock::new();
    DURATION_RE
        .get_or_init(|| Regex::new(r"Duration:\s*(\d+):(\d{2}):(\d{2})\.(\d+)").ok())
        .as_ref()
}

/// Extracts `Duration: HH:MM:SS.hh` from ffmpeg's diagnostic stream, in seconds.
///
/// The fractional part is read as hundredths, which is the format ffmpeg prints.
pub fn parse_duration_token(stderr: &str) -> Option<f64> {
    let caps = duration_regex()?.captures(stderr)?;
    let hours: u64 = caps[1].parse().ok()?;
    let minutes: u64 = caps[2].parse().ok()?;
    let seconds: u64 = caps[3].parse().ok()?;
    let hundredths: u64 = caps[4].parse().ok()?;

    let whole = hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)?;
    let total = whole as f64 + hundredths as f64 / 100.0;
    (total > 0.0).then_some(total)
}

// =============================================================================
// Prober
// =============================================================================

/// Ordered fallback chain of duration probe strategies.
pub struct DurationProber {
    strategies: Vec<Box<dyn ProbeStrategy>>,
    timeout: Duration,
}

impl DurationProber {
    /// Builds the standard chain. Without a detected engine only the direct probe remains.
    pub fn new(engine: Option<&FFmpegInfo>, timeout: Duration) -> Self {
        let mut prober = Self::with_strategies(vec![Box::new(DirectProbe::new())], timeout);
        if let Some(info) = engine {
            prober.push(Box::new(PathDerivedProbe::new(&info.ffmpeg_path)));
            prober.push(Box::new(StreamInfoParse::new(&info.ffmpeg_path)));
        }
        prober
    }

    pub fn with_strategies(strategies: Vec<Box<dyn ProbeStrategy>>, timeout: Duration) -> Self {
        Self {
            strategies,
            timeout,
        }
    }

    /// Appends a strategy to the end of the chain.
    pub fn push(&mut self, strategy: Box<dyn ProbeStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn strategy_kinds(&self) -> Vec<ProbeStrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// Returns the asset's duration in seconds, or `None` when every strategy failed.
    pub async fn probe(&self, asset: &Path) -> Option<f64> {
        self.probe_attempts(asset)
            .await
            .into_iter()
            .find(|attempt| attempt.succeeded)
            .map(|attempt| attempt.duration_sec)
    }

    /// Runs the chain and reports every attempt, stopping at the first success.
    pub async fn probe_attempts(&self, asset: &Path) -> Vec<ProbeResult> {
        let mut attempts = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let kind = strategy.kind();
            let outcome = tokio::time::timeout(self.timeout, strategy.probe(asset))
                .await
                .unwrap_or_else(|_| Err(FFmpegError::Timeout));

            match outcome {
                Ok(duration) => {
                    info!(
                        asset = %asset.display(),
                        strategy = ?kind,
                        duration_sec = duration,
                        "Probed overlay duration"
                    );
                    attempts.push(ProbeResult::success(kind, duration));
                    return attempts;
                }
                Err(e) => {
                    warn!(
                        asset = %asset.display(),
                        strategy = ?kind,
                        timeout_secs = self.timeout.as_secs_f64(),
                        error = %e,
                        "Duration probe failed"
                    );
                    attempts.push(ProbeResult::failure(kind, &e));
                }
            }
        }

        warn!(asset = %asset.display(), "Could not determine duration with any strategy");
        debug!(attempts = attempts.len(), "Probe chain exhausted");
        attempts
    }
}
