//! Parameter resolution.
//!
//! Validates a `RawOverlaySpec`, fills defaults, applies the legacy chroma aliases and
//! clamps tuning values. Structural problems (asset, times, pixel sizes, coordinates)
//! are errors; tuning problems degrade to safe values with a warning.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;

use super::chroma::{ChromaPresetTable, ChromaTuning};
use super::models::{
    Animation, AnimationCurve, AssetKind, ChromaKey, OverlaySpec, Placement, RawOverlaySpec,
    Sizing,
};
use super::ValidationError;
use crate::TimeSec;

/// Defaults applied when a raw spec leaves a field out
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolverDefaults {
    pub video_size_percent: u32,
    pub image_size_percent: u32,
    pub animation_secs: TimeSec,
}

impl Default for ResolverDefaults {
    fn default() -> Self {
        Self {
            video_size_percent: 30,
            image_size_percent: 20,
            animation_secs: 1.0,
        }
    }
}

/// Resolves raw overlay descriptions against the chroma preset table
#[derive(Clone, Copy, Debug)]
pub struct ParameterResolver<'a> {
    presets: &'a ChromaPresetTable,
    defaults: ResolverDefaults,
}

impl<'a> ParameterResolver<'a> {
    pub fn new(presets: &'a ChromaPresetTable, defaults: ResolverDefaults) -> Self {
        Self { presets, defaults }
    }

    pub fn defaults(&self) -> &ResolverDefaults {
        &self.defaults
    }

    pub fn resolve(&self, raw: &RawOverlaySpec) -> Result<OverlaySpec, ValidationError> {
        let asset_path = raw
            .asset_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| ValidationError::new("assetPath", "is required"))?;
        let kind = asset_kind(&asset_path)?;

        let start_time = match raw.start_time {
            None => 0.0,
            Some(t) if t.is_finite() && t >= 0.0 => t,
            Some(t) => {
                return Err(ValidationError::new(
                    "startTime",
                    format!("must be a non-negative number, got {t}"),
                ))
            }
        };

        let requested_duration = match raw.duration {
            None => None,
            Some(d) if d.is_finite() && d > 0.0 => Some(d),
            Some(d) => {
                return Err(ValidationError::new(
                    "duration",
                    format!("must be a positive number, got {d}"),
                ))
            }
        };

        let auto_hide = match kind {
            AssetKind::Video => raw.auto_hide.unwrap_or(true),
            AssetKind::Image => {
                if raw.auto_hide == Some(true) {
                    warn!(
                        asset = %asset_path.display(),
                        "autoHide ignored for still image"
                    );
                }
                false
            }
        };

        Ok(OverlaySpec {
            placement: self.placement(raw)?,
            sizing: self.sizing(raw, kind)?,
            chroma: self.chroma(raw),
            animation: self.animation(raw)?,
            asset_path,
            kind,
            start_time,
            requested_duration,
            auto_hide,
        })
    }

    fn placement(&self, raw: &RawOverlaySpec) -> Result<Placement, ValidationError> {
        let custom = match (&raw.custom_x, &raw.custom_y) {
            (Some(x), Some(y)) => Some((integer("customX", x)?, integer("customY", y)?)),
            _ => None,
        };
        Ok(Placement::from_name(raw.position.as_deref(), custom))
    }

    fn sizing(&self, raw: &RawOverlaySpec, kind: AssetKind) -> Result<Sizing, ValidationError> {
        let mode = raw
            .size_mode
            .as_deref()
            .map(|m| m.trim().to_ascii_lowercase());
        let pixel_mode = match mode.as_deref() {
            Some("pixels" | "pixel") => true,
            Some("percent" | "percentage") => false,
            Some(other) => {
                return Err(ValidationError::new(
                    "sizeMode",
                    format!("unknown mode '{other}', expected 'percent' or 'pixels'"),
                ))
            }
            None => raw.custom_width.is_some() && raw.custom_height.is_some(),
        };

        if pixel_mode {
            let width = raw
                .custom_width
                .as_ref()
                .ok_or_else(|| ValidationError::new("customWidth", "is required in pixel mode"))?;
            let height = raw
                .custom_height
                .as_ref()
                .ok_or_else(|| ValidationError::new("customHeight", "is required in pixel mode"))?;
            return Ok(Sizing::Pixels {
                width: positive_integer("customWidth", width)?,
                height: positive_integer("customHeight", height)?,
                keep_aspect: raw.keep_aspect.unwrap_or(true),
            });
        }

        let default_pct = match kind {
            AssetKind::Video => self.defaults.video_size_percent,
            AssetKind::Image => self.defaults.image_size_percent,
        };
        let pct = match &raw.size_percent {
            None => default_pct,
            Some(value) => positive_integer("sizePercent", value)?,
        };
        Ok(Sizing::Percent {
            pct_of_base_height: pct,
        })
    }

    fn chroma(&self, raw: &RawOverlaySpec) -> Option<ChromaKey> {
        let color_override = non_empty(raw.color.as_deref());
        let requested =
            color_override.is_some() || non_empty(raw.chroma_color.as_deref()).is_some();
        if !raw.chroma_key.unwrap_or(requested) {
            return None;
        }

        let color_name = color_override
            .or_else(|| non_empty(raw.chroma_color.as_deref()))
            .unwrap_or("green")
            .to_ascii_lowercase();

        let derived = match non_empty(raw.chroma_strictness.as_deref()) {
            Some(strictness) => self.presets.tuning_for_strictness(&color_name, strictness),
            None => self.presets.tuning_for(&color_name),
        };

        // `similarity` stands in for both values and wins over the specific fields
        let (similarity, blend) = match &raw.similarity {
            Some(both) => (Some(both), Some(both)),
            None => (raw.chroma_similarity.as_ref(), raw.chroma_blend.as_ref()),
        };

        let tuning = if similarity.is_none() && blend.is_none() {
            derived
        } else {
            let similarity = similarity.map_or(Some(derived.similarity), numeric);
            let blend = blend.map_or(Some(derived.blend), numeric);
            match (similarity, blend) {
                (Some(similarity), Some(blend)) => ChromaTuning::new(similarity, blend),
                _ => {
                    warn!(color = %color_name, "Invalid chroma values, using safe defaults");
                    ChromaTuning::SAFE_FALLBACK
                }
            }
        };

        let clamped = tuning.clamped();
        if clamped != tuning {
            warn!(
                color = %color_name,
                similarity = tuning.similarity,
                blend = tuning.blend,
                clamped_similarity = clamped.similarity,
                clamped_blend = clamped.blend,
                "Chroma values clamped"
            );
        }

        Some(ChromaKey {
            color_hex: self.presets.color_hex(&color_name),
            color_name,
            similarity: clamped.similarity,
            blend: clamped.blend,
        })
    }

    fn animation(&self, raw: &RawOverlaySpec) -> Result<Option<Animation>, ValidationError> {
        let Some(name) = non_empty(raw.animation.as_deref()) else {
            return Ok(None);
        };
        if name.eq_ignore_ascii_case("none") {
            return Ok(None);
        }

        let curve = AnimationCurve::from_name(name);
        if curve.name() != name.to_ascii_lowercase().replace(['-', ' '], "_") {
            warn!(requested = name, using = curve.name(), "Unknown animation");
        }

        let duration_sec = match raw.animation_duration {
            None => self.defaults.animation_secs,
            Some(d) if d.is_finite() && d > 0.0 => d,
            Some(d) => {
                return Err(ValidationError::new(
                    "animationDuration",
                    format!("must be a positive number, got {d}"),
                ))
            }
        };

        Ok(Some(Animation {
            curve,
            duration_sec,
        }))
    }
}

/// Length of the visibility window.
///
/// With auto-hide the window is capped at the probed asset length; without a request
/// it is the probed length itself. `None` means "until the base video ends".
pub fn effective_duration(
    requested: Option<TimeSec>,
    auto_hide: bool,
    probed: Option<TimeSec>,
) -> Option<TimeSec> {
    if !auto_hide {
        return requested;
    }
    match (requested, probed) {
        (Some(requested), Some(probed)) => Some(requested.min(probed)),
        (Some(requested), None) => Some(requested),
        (None, probed) => probed,
    }
}

fn asset_kind(path: &Path) -> Result<AssetKind, ValidationError> {
    AssetKind::from_path(path).ok_or_else(|| {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!("'.{e}'"))
            .unwrap_or_else(|| "without extension".to_string());
        ValidationError::new("assetPath", format!("unsupported file type {ext}"))
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Reads a JSON number or numeric string as a finite float
fn numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Reads a JSON integer (or integral float/string) for a structural field
fn integer(field: &str, value: &Value) -> Result<i64, ValidationError> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ValidationError::new(field, format!("must be an integer, got {value}")))
}

fn positive_integer(field: &str, value: &Value) -> Result<u32, ValidationError> {
    let parsed = integer(field, value)?;
    u32::try_from(parsed)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| {
            ValidationError::new(field, format!("must be a positive integer, got {parsed}"))
        })
}
