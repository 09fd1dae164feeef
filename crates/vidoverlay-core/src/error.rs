//! vidoverlay Error Definitions
//!
//! Defines the error taxonomy shared by the composition pipeline.

use thiserror::Error;

use crate::ffmpeg::FFmpegError;
use crate::graph::CompileError;
use crate::overlay::ValidationError;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Structural Errors
    // =========================================================================
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("File not found: {0}")]
    FileNotFound(String),

    // =========================================================================
    // Graph Errors
    // =========================================================================
    #[error("Filter graph error: {0}")]
    Compile(#[from] CompileError),

    // =========================================================================
    // Engine Errors
    // =========================================================================
    #[error(transparent)]
    FFmpeg(#[from] FFmpegError),

    #[error("Render failed (exit code {exit_code:?}): {stderr}")]
    RenderFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Returns the offending field for structural parameter errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            CoreError::Validation(err) => Some(err.field.as_str()),
            _ => None,
        }
    }
}
