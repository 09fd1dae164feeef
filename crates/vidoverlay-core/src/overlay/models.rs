//! Overlay data models.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::TimeSec;

// =============================================================================
// Asset Kind
// =============================================================================

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "webm", "flv", "m4v"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// Overlay asset kind, derived from the file extension
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetKind {
    Video,
    Image,
}

impl AssetKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(AssetKind::Video)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(AssetKind::Image)
        } else {
            None
        }
    }
}

// =============================================================================
// Placement / Sizing
// =============================================================================

/// Where the overlay sits on the base frame
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Placement {
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Custom { x: i64, y: i64 },
}

impl Placement {
    /// Resolves a placement name. Unknown or missing names, and `custom` without both
    /// coordinates, fall back to `Center`.
    pub fn from_name(name: Option<&str>, custom: Option<(i64, i64)>) -> Self {
        let normalized = name
            .map(|n| n.trim().to_ascii_lowercase().replace(['_', ' '], "-"))
            .unwrap_or_default();

        match normalized.as_str() {
            "top-left" | "topleft" => Placement::TopLeft,
            "top-right" | "topright" => Placement::TopRight,
            "bottom-left" | "bottomleft" => Placement::BottomLeft,
            "bottom-right" | "bottomright" => Placement::BottomRight,
            "custom" => match custom {
                Some((x, y)) => Placement::Custom { x, y },
                None => Placement::Center,
            },
            _ => Placement::Center,
        }
    }
}

/// How the overlay is scaled
///
/// `Pixels { keep_aspect: false }` stretches the overlay to the exact box and may
/// distort it; that is deliberate and left to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum Sizing {
    /// Overlay height as a percentage of the base height, width follows the aspect ratio
    Percent { pct_of_base_height: u32 },
    /// Explicit pixel box
    Pixels {
        width: u32,
        height: u32,
        keep_aspect: bool,
    },
}

// =============================================================================
// Chroma / Animation
// =============================================================================

/// Resolved chroma-key parameters, tuning already clamped
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChromaKey {
    pub color_name: String,
    /// `0xRRGGBB` literal handed to the engine
    pub color_hex: String,
    pub similarity: f64,
    pub blend: f64,
}

/// Named animation curves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationCurve {
    FadeIn,
    FadeOut,
    FadeInOut,
    SlideLeft,
    SlideRight,
    SlideUp,
    SlideDown,
    ZoomIn,
    ZoomOut,
    RotateIn,
    Bounce,
    Pulse,
}

impl AnimationCurve {
    pub const ALL: [AnimationCurve; 12] = [
        AnimationCurve::FadeIn,
        AnimationCurve::FadeOut,
        AnimationCurve::FadeInOut,
        AnimationCurve::SlideLeft,
        AnimationCurve::SlideRight,
        AnimationCurve::SlideUp,
        AnimationCurve::SlideDown,
        AnimationCurve::ZoomIn,
        AnimationCurve::ZoomOut,
        AnimationCurve::RotateIn,
        AnimationCurve::Bounce,
        AnimationCurve::Pulse,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AnimationCurve::FadeIn => "fade_in",
            AnimationCurve::FadeOut => "fade_out",
            AnimationCurve::FadeInOut => "fade_in_out",
            AnimationCurve::SlideLeft => "slide_left",
            AnimationCurve::SlideRight => "slide_right",
            AnimationCurve::SlideUp => "slide_up",
            AnimationCurve::SlideDown => "slide_down",
            AnimationCurve::ZoomIn => "zoom_in",
            AnimationCurve::ZoomOut => "zoom_out",
            AnimationCurve::RotateIn => "rotate_in",
            AnimationCurve::Bounce => "bounce",
            AnimationCurve::Pulse => "pulse",
        }
    }

    /// Looks a curve up by name; unrecognized names play as fade-in.
    pub fn from_name(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|curve| curve.name() == normalized)
            .unwrap_or(AnimationCurve::FadeIn)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Animation {
    pub curve: AnimationCurve,
    pub duration_sec: TimeSec,
}

// =============================================================================
// Overlay Spec
// =============================================================================

/// One overlay asset's full, validated intent
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySpec {
    pub asset_path: PathBuf,
    pub kind: AssetKind,
    pub start_time: TimeSec,
    /// `None`: until the end of the base video, or the probed length under auto-hide
    pub requested_duration: Option<TimeSec>,
    pub auto_hide: bool,
    pub placement: Placement,
    pub sizing: Sizing,
    pub chroma: Option<ChromaKey>,
    pub animation: Option<Animation>,
}

/// Overlay description as supplied by a caller (job file, front-end).
///
/// Numeric fields that may arrive malformed are kept as raw JSON values so the resolver
/// can tell "missing", "out of range" and "not a number" apart. Snake-case aliases accept
/// the settings dictionaries written by older front-ends.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawOverlaySpec {
    #[serde(alias = "asset_path", alias = "video_path", alias = "image_path")]
    pub asset_path: Option<String>,
    #[serde(alias = "start_time")]
    pub start_time: Option<f64>,
    pub duration: Option<f64>,
    #[serde(alias = "auto_hide")]
    pub auto_hide: Option<bool>,

    pub position: Option<String>,
    #[serde(alias = "custom_x")]
    pub custom_x: Option<serde_json::Value>,
    #[serde(alias = "custom_y")]
    pub custom_y: Option<serde_json::Value>,

    #[serde(alias = "size_mode")]
    pub size_mode: Option<String>,
    #[serde(alias = "size_percent")]
    pub size_percent: Option<serde_json::Value>,
    #[serde(alias = "custom_width")]
    pub custom_width: Option<serde_json::Value>,
    #[serde(alias = "custom_height")]
    pub custom_height: Option<serde_json::Value>,
    #[serde(alias = "keep_aspect")]
    pub keep_aspect: Option<bool>,

    #[serde(alias = "chroma_key")]
    pub chroma_key: Option<bool>,
    #[serde(alias = "chroma_color")]
    pub chroma_color: Option<String>,
    #[serde(alias = "chroma_similarity")]
    pub chroma_similarity: Option<serde_json::Value>,
    #[serde(alias = "chroma_blend")]
    pub chroma_blend: Option<serde_json::Value>,
    #[serde(alias = "chroma_strictness", alias = "chroma_sensitivity", alias = "chroma_preset")]
    pub chroma_strictness: Option<String>,
    /// Legacy alias for `chromaColor`; wins when present
    pub color: Option<String>,
    /// Legacy alias setting both similarity and blend; wins when present
    pub similarity: Option<serde_json::Value>,

    pub animation: Option<String>,
    #[serde(alias = "animation_duration")]
    pub animation_duration: Option<f64>,
}

impl RawOverlaySpec {
    pub fn new(asset_path: impl Into<String>) -> Self {
        Self {
            asset_path: Some(asset_path.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_kind_from_extension() {
        assert_eq!(AssetKind::from_path(Path::new("a/b/clip.MP4")), Some(AssetKind::Video));
        assert_eq!(AssetKind::from_path(Path::new("greenscreen.mkv")), Some(AssetKind::Video));
        assert_eq!(AssetKind::from_path(Path::new("logo.png")), Some(AssetKind::Image));
        assert_eq!(AssetKind::from_path(Path::new("photo.JPEG")), Some(AssetKind::Image));
        assert_eq!(AssetKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(AssetKind::from_path(Path::new("no_extension")), None);
    }

    #[test]
    fn test_placement_aliases() {
        assert_eq!(Placement::from_name(Some("top-right"), None), Placement::TopRight);
        assert_eq!(Placement::from_name(Some("Bottom_Left"), None), Placement::BottomLeft);
        assert_eq!(Placement::from_name(Some("somewhere"), None), Placement::Center);
        assert_eq!(Placement::from_name(None, None), Placement::Center);
    }

    #[test]
    fn test_custom_placement_requires_coordinates() {
        assert_eq!(
            Placement::from_name(Some("custom"), Some((100, 50))),
            Placement::Custom { x: 100, y: 50 }
        );
        assert_eq!(Placement::from_name(Some("custom"), None), Placement::Center);
    }

    #[test]
    fn test_animation_curve_names() {
        assert_eq!(AnimationCurve::ALL.len(), 12);
        for curve in AnimationCurve::ALL {
            assert_eq!(AnimationCurve::from_name(curve.name()), curve);
        }
        assert_eq!(AnimationCurve::from_name("slide-left"), AnimationCurve::SlideLeft);
        assert_eq!(AnimationCurve::from_name("wobble"), AnimationCurve::FadeIn);
    }

    #[test]
    fn test_raw_spec_accepts_legacy_keys() {
        let json = r#"{
            "video_path": "overlay.mp4",
            "start_time": 2,
            "duration": 8,
            "position": "top-right",
            "size_percent": 25,
            "chroma_key": true,
            "chroma_color": "green",
            "chroma_sensitivity": "custom",
            "auto_hide": true
        }"#;
        let raw: RawOverlaySpec = serde_json::from_str(json).unwrap();
        assert_eq!(raw.asset_path.as_deref(), Some("overlay.mp4"));
        assert_eq!(raw.start_time, Some(2.0));
        assert_eq!(raw.size_percent, Some(serde_json::json!(25)));
        assert_eq!(raw.chroma_strictness.as_deref(), Some("custom"));
        assert_eq!(raw.auto_hide, Some(true));
    }

    #[test]
    fn test_raw_spec_camel_case() {
        let json = r#"{"assetPath": "logo.png", "sizeMode": "pixels", "customWidth": 400, "customHeight": 200}"#;
        let raw: RawOverlaySpec = serde_json::from_str(json).unwrap();
        assert_eq!(raw.asset_path.as_deref(), Some("logo.png"));
        assert_eq!(raw.size_mode.as_deref(), Some("pixels"));
        assert_eq!(raw.custom_width, Some(serde_json::json!(400)));
    }
}
