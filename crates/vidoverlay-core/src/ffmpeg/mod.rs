//! FFmpeg Integration Module
//!
//! Everything that touches the external media engine lives here:
//! - engine discovery (`ffmpeg` on the search path or in platform install directories)
//! - duration probing through an ordered chain of strategies
//! - execution of the final render command
//!
//! The core never decodes media itself; it only asks the engine questions and hands it
//! filter-graph text.

mod detection;
pub mod probe;
mod runner;

pub use detection::*;
pub use probe::{
    parse_duration_token, parse_probe_duration, DirectProbe, DurationProber, PathDerivedProbe,
    ProbeResult, ProbeStrategy, ProbeStrategyKind, StreamInfoParse, DEFAULT_PROBE_TIMEOUT,
};
pub use runner::{EngineCommand, EngineInput, EngineOutcome, FFmpegRunner};

/// FFmpeg-related error types
#[derive(Debug, thiserror::Error)]
pub enum FFmpegError {
    #[error("FFmpeg not found. Install FFmpeg, add it to PATH, or set engine.ffmpegPath.")]
    NotFound,

    #[error("FFmpeg execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Output path error: {0}")]
    OutputError(String),

    #[error("FFprobe error: {0}")]
    ProbeError(String),

    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Timed out waiting for the engine")]
    Timeout,
}

pub type FFmpegResult<T> = Result<T, FFmpegError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_error_display() {
        let err = FFmpegError::NotFound;
        assert!(err.to_string().contains("FFmpeg not found"));

        let err = FFmpegError::ExecutionFailed("exit code 1".to_string());
        assert!(err.to_string().contains("exit code 1"));
    }

    #[test]
    fn test_io_error_converts_to_process_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: FFmpegError = io.into();
        assert!(matches!(err, FFmpegError::ProcessError(_)));
    }
}
