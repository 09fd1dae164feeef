//! Engine process spawning helpers.
//!
//! Every external engine invocation (ffmpeg, ffprobe) goes through these helpers so
//! that platform flags and lifetime rules are applied uniformly:
//! - on Windows, no console window is created per invocation;
//! - async children are killed when their handle is dropped, so a probe that hits its
//!   bounded wait does not leave a stray process behind.

use std::process::Stdio;

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Applies platform flags to a blocking engine command (used for quick version queries).
pub fn configure_std_command(cmd: &mut std::process::Command) {
    cmd.stdin(Stdio::null());
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
}

/// Applies platform flags and capture settings to an async engine command.
pub fn configure_tokio_command(cmd: &mut tokio::process::Command) {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(target_os = "windows")]
    {
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
}
