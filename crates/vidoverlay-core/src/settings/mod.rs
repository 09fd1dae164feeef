//! Composer Settings
//!
//! Persistent settings for the composer with:
//! - Tolerant loading (missing or corrupt files fall back to defaults)
//! - Normalization that clamps instead of failing
//! - Atomic file writes (temp file + rename)
//!
//! Storage location: {config_dir}/vidoverlay/settings.json

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::overlay::{GeometryResolver, ResolverDefaults};
use crate::CoreResult;

/// Settings schema version
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Directory under the platform config dir
pub const SETTINGS_DIR: &str = "vidoverlay";

/// Default ASS style for burned-in captions
pub const DEFAULT_FORCE_STYLE: &str =
    "FontName=Arial,FontSize=12,PrimaryColour=&Hffffff,OutlineColour=&H000000,Outline=2,Shadow=1,MarginV=50";

/// Composer settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComposerSettings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Engine discovery
    #[serde(default)]
    pub engine: EngineSettings,

    /// Duration probing
    #[serde(default)]
    pub probe: ProbeSettings,

    /// Placement and sizing defaults
    #[serde(default)]
    pub layout: LayoutSettings,

    /// Caption burn-in
    #[serde(default)]
    pub subtitles: SubtitleSettings,

    /// Render behavior
    #[serde(default)]
    pub render: RenderSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            engine: EngineSettings::default(),
            probe: ProbeSettings::default(),
            layout: LayoutSettings::default(),
            subtitles: SubtitleSettings::default(),
            render: RenderSettings::default(),
        }
    }
}

impl ComposerSettings {
    /// Normalizes and clamps settings so loaded state is always usable.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        if let Some(path) = &self.engine.ffmpeg_path {
            if !path.is_file() {
                warn!(
                    path = %path.display(),
                    "Configured ffmpeg path does not exist, falling back to auto-detection"
                );
                self.engine.ffmpeg_path = None;
            }
        }

        self.probe.timeout_secs = self.probe.timeout_secs.clamp(1, 120);

        self.layout.edge_inset = self.layout.edge_inset.clamp(0, 1000);
        self.layout.default_video_size_percent =
            self.layout.default_video_size_percent.clamp(1, 1000);
        self.layout.default_image_size_percent =
            self.layout.default_image_size_percent.clamp(1, 1000);
        self.layout.default_animation_secs =
            clamp_f64(self.layout.default_animation_secs, 0.05, 60.0);

        if self.subtitles.force_style.trim().is_empty() {
            self.subtitles.force_style = DEFAULT_FORCE_STYLE.to_string();
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe.timeout_secs)
    }

    pub fn resolver_defaults(&self) -> ResolverDefaults {
        ResolverDefaults {
            video_size_percent: self.layout.default_video_size_percent,
            image_size_percent: self.layout.default_image_size_percent,
            animation_secs: self.layout.default_animation_secs,
        }
    }

    pub fn geometry_resolver(&self) -> GeometryResolver {
        GeometryResolver::new(i64::from(self.layout.edge_inset))
    }
}

fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return min;
    }
    value.clamp(min, max)
}

/// Engine discovery settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    /// Explicit ffmpeg binary; auto-detected when unset
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Searched after the platform directories
    #[serde(default)]
    pub extra_search_dirs: Vec<PathBuf>,
}

/// Duration probe settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeSettings {
    /// Per-attempt timeout
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_probe_timeout(),
        }
    }
}

fn default_probe_timeout() -> u64 {
    10
}

/// Layout defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSettings {
    /// Inset from the frame edge for corner placements, in pixels
    #[serde(default = "default_edge_inset")]
    pub edge_inset: u32,

    #[serde(default = "default_video_size_percent")]
    pub default_video_size_percent: u32,

    #[serde(default = "default_image_size_percent")]
    pub default_image_size_percent: u32,

    #[serde(default = "default_animation_secs")]
    pub default_animation_secs: f64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            edge_inset: default_edge_inset(),
            default_video_size_percent: default_video_size_percent(),
            default_image_size_percent: default_image_size_percent(),
            default_animation_secs: default_animation_secs(),
        }
    }
}

fn default_edge_inset() -> u32 {
    10
}

fn default_video_size_percent() -> u32 {
    30
}

fn default_image_size_percent() -> u32 {
    20
}

fn default_animation_secs() -> f64 {
    1.0
}

/// Caption burn-in settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleSettings {
    /// ASS style override passed as `force_style`
    #[serde(default = "default_force_style")]
    pub force_style: String,
}

impl Default for SubtitleSettings {
    fn default() -> Self {
        Self {
            force_style: default_force_style(),
        }
    }
}

fn default_force_style() -> String {
    DEFAULT_FORCE_STYLE.to_string()
}

/// Render settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenderSettings {
    /// Shift overlay videos so their first frame plays at their start time
    #[serde(default = "default_true")]
    pub align_overlay_start: bool,

    /// Render to a hidden partial file and rename on success
    #[serde(default = "default_true")]
    pub atomic_output: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            align_overlay_start: true,
            atomic_output: true,
        }
    }
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Settings Manager
// =============================================================================

/// Loads and saves `ComposerSettings`
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Settings stored in `dir/settings.json`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            settings_path: dir.as_ref().join(SETTINGS_FILE),
        }
    }

    /// Settings stored at an explicit file path
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            settings_path: path.into(),
        }
    }

    /// Settings under the platform config directory, if there is one
    pub fn default_location() -> Option<Self> {
        dirs::config_dir().map(|dir| Self::new(dir.join(SETTINGS_DIR)))
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Load settings from disk, returning defaults if the file is missing or unreadable
    pub fn load(&self) -> ComposerSettings {
        if !self.settings_path.exists() {
            info!("Settings file not found, using defaults");
            let mut settings = ComposerSettings::default();
            settings.normalize();
            return settings;
        }

        let parsed = fs::read_to_string(&self.settings_path)
            .map_err(|e| format!("Failed to read settings file: {}", e))
            .and_then(|content| {
                serde_json::from_str::<ComposerSettings>(&content)
                    .map_err(|e| format!("Failed to parse settings file: {}", e))
            });

        let mut settings = match parsed {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Failed to load settings, using defaults");
                ComposerSettings::default()
            }
        };
        settings.normalize();
        settings
    }

    /// Save settings to disk using atomic write (temp file + rename)
    pub fn save(&self, settings: &ComposerSettings) -> CoreResult<ComposerSettings> {
        let mut normalized = settings.clone();
        normalized.normalize();

        if let Some(parent) = self.settings_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(&normalized)?;

        let temp_path = self.settings_path.with_extension("json.tmp");
        if temp_path.exists() {
            let _ = fs::remove_file(&temp_path);
        }

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);

        // rename does not replace an existing file on Windows
        if cfg!(windows) && self.settings_path.exists() {
            fs::remove_file(&self.settings_path)?;
        }
        fs::rename(&temp_path, &self.settings_path)?;

        info!(path = %self.settings_path.display(), "Settings saved");
        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = ComposerSettings::default();
        assert_eq!(settings.version, SETTINGS_VERSION);
        assert_eq!(settings.probe.timeout_secs, 10);
        assert_eq!(settings.layout.edge_inset, 10);
        assert_eq!(settings.layout.default_video_size_percent, 30);
        assert_eq!(settings.layout.default_image_size_percent, 20);
        assert!((settings.layout.default_animation_secs - 1.0).abs() < 1e-9);
        assert_eq!(settings.subtitles.force_style, DEFAULT_FORCE_STYLE);
        assert!(settings.render.align_overlay_start);
        assert!(settings.render.atomic_output);
    }

    #[test]
    fn test_normalization_clamps() {
        let mut settings = ComposerSettings::default();
        settings.probe.timeout_secs = 0;
        settings.layout.edge_inset = 50_000;
        settings.layout.default_video_size_percent = 0;
        settings.layout.default_animation_secs = f64::NAN;
        settings.subtitles.force_style = "  ".to_string();
        settings.engine.ffmpeg_path = Some(PathBuf::from("/definitely/not/here/ffmpeg"));

        settings.normalize();

        assert_eq!(settings.probe.timeout_secs, 1);
        assert_eq!(settings.layout.edge_inset, 1000);
        assert_eq!(settings.layout.default_video_size_percent, 1);
        assert!((settings.layout.default_animation_secs - 0.05).abs() < 1e-9);
        assert_eq!(settings.subtitles.force_style, DEFAULT_FORCE_STYLE);
        assert!(settings.engine.ffmpeg_path.is_none());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: ComposerSettings =
            serde_json::from_str(r#"{"layout": {"edgeInset": 24}}"#).unwrap();
        assert_eq!(settings.layout.edge_inset, 24);
        assert_eq!(settings.layout.default_video_size_percent, 30);
        assert_eq!(settings.probe.timeout_secs, 10);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path());
        assert_eq!(manager.load(), ComposerSettings::default());
    }

    #[test]
    fn test_load_corrupt_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path());
        fs::write(manager.settings_path(), "{ not json").unwrap();
        assert_eq!(manager.load(), ComposerSettings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path().join("nested"));

        let mut settings = ComposerSettings::default();
        settings.layout.edge_inset = 32;
        settings.probe.timeout_secs = 500;
        let saved = manager.save(&settings).unwrap();
        assert_eq!(saved.probe.timeout_secs, 120);

        let loaded = manager.load();
        assert_eq!(loaded, saved);
        assert!(!manager.settings_path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_derived_components() {
        let mut settings = ComposerSettings::default();
        settings.layout.edge_inset = 16;
        settings.probe.timeout_secs = 3;
        assert_eq!(settings.geometry_resolver().inset(), 16);
        assert_eq!(settings.probe_timeout(), Duration::from_secs(3));
        assert_eq!(settings.resolver_defaults(), ResolverDefaults::default());
    }
}
