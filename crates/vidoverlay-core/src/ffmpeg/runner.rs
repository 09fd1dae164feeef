//! FFmpeg Runner Module
//!
//! Builds the engine command line for a composition and executes it, capturing the
//! exit status and the diagnostic stream. The runner does not interpret engine error
//! codes; a failed run is reported with its stderr verbatim.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::{FFmpegError, FFmpegInfo, FFmpegResult};
use crate::process::configure_tokio_command;

/// One `-i` input of the engine command, in attachment order
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineInput {
    pub path: PathBuf,
    /// Repeat a still image indefinitely (`-loop 1`) so time expressions have frames
    pub loop_still: bool,
}

impl EngineInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loop_still: false,
        }
    }

    pub fn looped(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loop_still: true,
        }
    }
}

/// A complete render invocation
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineCommand {
    /// Base video first, then overlays in spec order
    pub inputs: Vec<EngineInput>,
    /// Compiled `filter_complex` text
    pub filter_graph: String,
    pub output: PathBuf,
}

impl EngineCommand {
    /// Argument vector handed to ffmpeg (program name excluded).
    ///
    /// Audio is always stream-copied and the output is always overwritten.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.inputs.len() * 2 + 7);

        for input in &self.inputs {
            if input.loop_still {
                args.push("-loop".to_string());
                args.push("1".to_string());
            }
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend([
            "-filter_complex".to_string(),
            self.filter_graph.clone(),
            "-c:a".to_string(),
            "copy".to_string(),
            "-y".to_string(),
            self.output.to_string_lossy().to_string(),
        ]);

        args
    }

    /// Same command writing to a different destination.
    pub fn with_output(&self, output: &Path) -> Self {
        Self {
            output: output.to_path_buf(),
            ..self.clone()
        }
    }
}

/// Exit status and diagnostics of an engine run
#[derive(Clone, Debug, PartialEq)]
pub struct EngineOutcome {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stderr: String,
}

impl EngineOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// FFmpeg Runner for executing composition commands
#[derive(Clone)]
pub struct FFmpegRunner {
    info: Arc<FFmpegInfo>,
}

impl FFmpegRunner {
    /// Create a new FFmpegRunner from a detected installation
    pub fn new(info: FFmpegInfo) -> Self {
        Self {
            info: Arc::new(info),
        }
    }

    /// Get the FFmpeg info
    pub fn info(&self) -> &FFmpegInfo {
        &self.info
    }

    /// Executes the command and waits for the engine to exit.
    ///
    /// Only failures to launch or wait on the process are errors here; a non-zero exit
    /// is returned as an [`EngineOutcome`] for the caller to surface.
    pub async fn run(&self, command: &EngineCommand) -> FFmpegResult<EngineOutcome> {
        if let Some(parent) = command.output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    FFmpegError::OutputError(format!("Failed to create output directory: {}", e))
                })?;
            }
        }

        let args = command.to_args();
        debug!(program = %self.info.ffmpeg_path.display(), ?args, "Launching FFmpeg");
        info!(
            inputs = command.inputs.len(),
            output = %command.output.display(),
            "Rendering composition"
        );

        let mut cmd = tokio::process::Command::new(&self.info.ffmpeg_path);
        configure_tokio_command(&mut cmd);
        cmd.args(&args);

        let output = cmd.output().await.map_err(FFmpegError::ProcessError)?;

        Ok(EngineOutcome {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
