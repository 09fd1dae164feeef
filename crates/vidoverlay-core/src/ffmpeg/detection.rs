//! FFmpeg Detection Module
//!
//! Resolves the media engine executable:
//! 1. an explicitly configured path (settings), if it exists;
//! 2. the first match on the process search path (`PATH`);
//! 3. a fixed list of platform-conventional installation directories;
//! 4. caller-supplied extra directories.
//!
//! Failing all of them is a structural error that aborts the request.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use super::{FFmpegError, FFmpegResult};
use crate::process::configure_std_command;

#[cfg(target_os = "windows")]
const FFMPEG_BINARY: &str = "ffmpeg.exe";
#[cfg(not(target_os = "windows"))]
const FFMPEG_BINARY: &str = "ffmpeg";

#[cfg(target_os = "windows")]
const FFPROBE_BINARY: &str = "ffprobe.exe";
#[cfg(not(target_os = "windows"))]
const FFPROBE_BINARY: &str = "ffprobe";

/// Information about the detected engine installation
#[derive(Debug, Clone)]
pub struct FFmpegInfo {
    /// Path to ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Path to the ffprobe binary next to it (may not exist)
    pub ffprobe_path: PathBuf,
    /// FFmpeg version string, when it could be read
    pub version: Option<String>,
}

impl FFmpegInfo {
    /// Builds info for a known engine path without querying it.
    pub fn from_path(ffmpeg_path: impl Into<PathBuf>) -> Self {
        let ffmpeg_path = ffmpeg_path.into();
        let ffprobe_path = derive_ffprobe_path(&ffmpeg_path);
        Self {
            ffmpeg_path,
            ffprobe_path,
            version: None,
        }
    }
}

/// Detects the engine and reads its version.
pub fn detect_ffmpeg(
    configured: Option<&Path>,
    extra_dirs: &[PathBuf],
) -> FFmpegResult<FFmpegInfo> {
    let ffmpeg_path = find_ffmpeg(configured, extra_dirs)?;
    let mut info = FFmpegInfo::from_path(ffmpeg_path);
    info.version = get_ffmpeg_version(&info.ffmpeg_path).ok();
    Ok(info)
}

/// Finds the ffmpeg binary, see the module docs for the search order.
pub fn find_ffmpeg(configured: Option<&Path>, extra_dirs: &[PathBuf]) -> FFmpegResult<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            debug!(path = %path.display(), "Using configured FFmpeg");
            return Ok(path.to_path_buf());
        }
        debug!(path = %path.display(), "Configured FFmpeg path does not exist, searching");
    }

    if let Some(found) = search_path_var(FFMPEG_BINARY, std::env::var_os("PATH")) {
        return Ok(found);
    }

    let fallback_dirs = get_common_ffmpeg_paths()
        .into_iter()
        .chain(extra_dirs.iter().cloned());
    search_dirs(FFMPEG_BINARY, fallback_dirs).ok_or(FFmpegError::NotFound)
}

/// Searches a `PATH`-style variable for a binary.
fn search_path_var(binary_name: &str, path_var: Option<OsString>) -> Option<PathBuf> {
    let path_var = path_var?;
    search_dirs(binary_name, std::env::split_paths(&path_var))
}

fn search_dirs(binary_name: &str, dirs: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    dirs.into_iter()
        .map(|dir| dir.join(binary_name))
        .find(|candidate| candidate.is_file())
}

/// Get common FFmpeg installation paths for the current platform
fn get_common_ffmpeg_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from(r"C:\ffmpeg\bin"));
        paths.push(PathBuf::from(r"C:\Program Files\ffmpeg\bin"));
        paths.push(PathBuf::from(r"C:\Program Files (x86)\ffmpeg\bin"));

        // Chocolatey installation
        if let Ok(programdata) = std::env::var("ProgramData") {
            paths.push(PathBuf::from(programdata).join("chocolatey").join("bin"));
        }

        // Scoop installation
        if let Ok(userprofile) = std::env::var("USERPROFILE") {
            paths.push(PathBuf::from(userprofile).join("scoop").join("shims"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from("/opt/homebrew/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/opt/local/bin")); // MacPorts
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/snap/bin"));
    }

    // Portable installs unpacked next to the working directory
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join("ffmpeg").join("bin"));
        paths.push(cwd);
    }

    paths
}

/// Derives the ffprobe path that ships alongside a given ffmpeg binary.
///
/// `/opt/ffmpeg-6/bin/ffmpeg` becomes `/opt/ffmpeg-6/bin/ffprobe`; a binary whose file
/// name does not mention ffmpeg still gets a sibling named `ffprobe`.
pub fn derive_ffprobe_path(ffmpeg_path: &Path) -> PathBuf {
    let file_name = ffmpeg_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let probe_name = if file_name.contains("ffmpeg") {
        file_name.replacen("ffmpeg", "ffprobe", 1)
    } else {
        FFPROBE_BINARY.to_string()
    };

    match ffmpeg_path.parent() {
        Some(parent) => parent.join(probe_name),
        None => PathBuf::from(probe_name),
    }
}

/// Get FFmpeg version string
pub fn get_ffmpeg_version(ffmpeg_path: &Path) -> FFmpegResult<String> {
    let mut cmd = Command::new(ffmpeg_path);
    configure_std_command(&mut cmd);
    let output = cmd.arg("-version").output().map_err(FFmpegError::ProcessError)?;

    if !output.status.success() {
        return Err(FFmpegError::ExecutionFailed(
            "Failed to get FFmpeg version".to_string(),
        ));
    }

    parse_version_line(&String::from_utf8_lossy(&output.stdout))
}

/// Parses "ffmpeg version X.Y.Z ..." from the first line of `ffmpeg -version`.
fn parse_version_line(output: &str) -> FFmpegResult<String> {
    let first_line = output
        .lines()
        .next()
        .ok_or_else(|| FFmpegError::ParseError("Could not parse FFmpeg version".to_string()))?;

    let version = first_line
        .strip_prefix("ffmpeg version ")
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or(first_line);

    Ok(version.to_string())
}
