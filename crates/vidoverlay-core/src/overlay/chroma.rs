//! Chroma Preset Table
//!
//! Process-wide, read-only tuning data for chroma keying: a hex value per named color,
//! an optimal similarity/blend pair per color, and per-strictness rows.

use serde::Serialize;

/// Lowest similarity/blend handed to the engine
pub const MIN_TUNING: f64 = 0.0005;
/// Highest similarity/blend handed to the engine
pub const MAX_TUNING: f64 = 0.5;

/// Hex used when a color is neither a known name nor a hex literal
pub const FALLBACK_COLOR_HEX: &str = "0x00ff00";

/// Similarity/blend pair
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ChromaTuning {
    pub similarity: f64,
    pub blend: f64,
}

impl ChromaTuning {
    /// Pair used for colors the table doesn't know
    pub const DEFAULT: ChromaTuning = ChromaTuning::new(0.15, 0.1);
    /// Pair used when explicit values can't be read as numbers
    pub const SAFE_FALLBACK: ChromaTuning = ChromaTuning::new(0.1, 0.1);

    pub const fn new(similarity: f64, blend: f64) -> Self {
        Self { similarity, blend }
    }

    /// Clamps both values into `[MIN_TUNING, MAX_TUNING]`
    pub fn clamped(self) -> Self {
        Self {
            similarity: self.similarity.clamp(MIN_TUNING, MAX_TUNING),
            blend: self.blend.clamp(MIN_TUNING, MAX_TUNING),
        }
    }
}

// =============================================================================
// Strictness
// =============================================================================

/// Keying strictness, from most to least permissive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    Loose,
    Normal,
    Custom,
    Strict,
    VeryStrict,
    UltraStrict,
}

impl Strictness {
    pub const ALL: [Strictness; 6] = [
        Strictness::Loose,
        Strictness::Normal,
        Strictness::Custom,
        Strictness::Strict,
        Strictness::VeryStrict,
        Strictness::UltraStrict,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Strictness::Loose => "loose",
            Strictness::Normal => "normal",
            Strictness::Custom => "custom",
            Strictness::Strict => "strict",
            Strictness::VeryStrict => "very_strict",
            Strictness::UltraStrict => "ultra_strict",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL.into_iter().find(|s| s.name() == normalized)
    }

    fn row(&self) -> usize {
        *self as usize
    }
}

// =============================================================================
// Presets
// =============================================================================

/// A named key color
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ChromaPreset {
    pub name: &'static str,
    pub hex: &'static str,
    pub optimal: ChromaTuning,
    /// Rows indexed by `Strictness`; `None` uses the generic rows
    #[serde(skip)]
    pub strictness: Option<[ChromaTuning; 6]>,
}

impl ChromaPreset {
    pub fn tuning_for(&self, strictness: Strictness) -> Option<ChromaTuning> {
        self.strictness.map(|rows| rows[strictness.row()])
    }
}

const fn t(similarity: f64, blend: f64) -> ChromaTuning {
    ChromaTuning::new(similarity, blend)
}

static PRESETS: [ChromaPreset; 8] = [
    ChromaPreset {
        name: "green",
        hex: "0x00ff00",
        optimal: t(0.2, 0.15),
        strictness: Some([
            t(0.3, 0.25),
            t(0.15, 0.1),
            t(0.2, 0.15),
            t(0.08, 0.05),
            t(0.03, 0.02),
            t(0.01, 0.005),
        ]),
    },
    ChromaPreset {
        name: "blue",
        hex: "0x0000ff",
        optimal: t(0.18, 0.12),
        strictness: Some([
            t(0.35, 0.3),
            t(0.2, 0.15),
            t(0.25, 0.2),
            t(0.1, 0.08),
            t(0.05, 0.03),
            t(0.02, 0.01),
        ]),
    },
    ChromaPreset {
        name: "cyan",
        hex: "0x00ffff",
        optimal: t(0.12, 0.08),
        strictness: Some([
            t(0.25, 0.2),
            t(0.12, 0.08),
            t(0.15, 0.1),
            t(0.06, 0.04),
            t(0.03, 0.02),
            t(0.01, 0.005),
        ]),
    },
    ChromaPreset {
        name: "red",
        hex: "0xff0000",
        optimal: t(0.25, 0.2),
        strictness: Some([
            t(0.4, 0.35),
            t(0.25, 0.2),
            t(0.3, 0.25),
            t(0.15, 0.1),
            t(0.08, 0.05),
            t(0.03, 0.02),
        ]),
    },
    ChromaPreset {
        name: "magenta",
        hex: "0xff00ff",
        optimal: t(0.18, 0.12),
        strictness: Some([
            t(0.3, 0.25),
            t(0.18, 0.12),
            t(0.22, 0.18),
            t(0.1, 0.08),
            t(0.05, 0.03),
            t(0.02, 0.01),
        ]),
    },
    ChromaPreset {
        name: "yellow",
        hex: "0xffff00",
        optimal: t(0.22, 0.18),
        strictness: Some([
            t(0.35, 0.3),
            t(0.22, 0.18),
            t(0.28, 0.22),
            t(0.12, 0.1),
            t(0.06, 0.04),
            t(0.03, 0.02),
        ]),
    },
    ChromaPreset {
        name: "white",
        hex: "0xffffff",
        optimal: t(0.02, 0.01),
        strictness: None,
    },
    ChromaPreset {
        name: "black",
        hex: "0x000000",
        optimal: t(0.01, 0.005),
        strictness: Some([
            t(0.05, 0.03),
            t(0.02, 0.015),
            t(0.01, 0.005),
            t(0.005, 0.003),
            t(0.001, 0.001),
            t(0.0005, 0.0005),
        ]),
    },
];

const GENERIC_ROWS: [ChromaTuning; 6] = [
    t(0.3, 0.25),
    t(0.15, 0.1),
    t(0.2, 0.15),
    t(0.05, 0.03),
    t(0.01, 0.005),
    t(0.005, 0.003),
];

static BUILTIN: ChromaPresetTable = ChromaPresetTable {
    presets: &PRESETS,
    generic: GENERIC_ROWS,
    default: ChromaTuning::DEFAULT,
};

/// Immutable lookup table shared by reference across the process
#[derive(Debug)]
pub struct ChromaPresetTable {
    presets: &'static [ChromaPreset],
    generic: [ChromaTuning; 6],
    default: ChromaTuning,
}

impl ChromaPresetTable {
    pub fn builtin() -> &'static ChromaPresetTable {
        &BUILTIN
    }

    /// Presets in canonical order
    pub fn presets(&self) -> &[ChromaPreset] {
        self.presets
    }

    /// Finds a preset by name or by its hex literal, case-insensitively
    pub fn find(&self, color: &str) -> Option<&ChromaPreset> {
        let wanted = color.trim().to_ascii_lowercase();
        let as_hex = normalize_hex(&wanted);
        self.presets
            .iter()
            .find(|p| p.name == wanted || as_hex.as_deref() == Some(p.hex))
    }

    /// Optimal pair for a color; unknown colors get the table default
    pub fn tuning_for(&self, color: &str) -> ChromaTuning {
        self.find(color).map(|p| p.optimal).unwrap_or(self.default)
    }

    /// Pair for a color at a named strictness.
    ///
    /// Colors without their own rows use the generic rows. An unknown strictness name
    /// yields the color's optimal pair.
    pub fn tuning_for_strictness(&self, color: &str, strictness: &str) -> ChromaTuning {
        let Some(level) = Strictness::from_name(strictness) else {
            return self.tuning_for(color);
        };
        self.find(color)
            .and_then(|p| p.tuning_for(level))
            .unwrap_or(self.generic[level.row()])
    }

    /// `0xRRGGBB` literal for a color name or hex literal; unknown values map to green
    pub fn color_hex(&self, color: &str) -> String {
        if let Some(preset) = self.find(color) {
            return preset.hex.to_string();
        }
        normalize_hex(color).unwrap_or_else(|| FALLBACK_COLOR_HEX.to_string())
    }
}

/// Accepts `0xRRGGBB`, `#RRGGBB` or bare `RRGGBB` and returns lowercase `0xrrggbb`
fn normalize_hex(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .or_else(|| trimmed.strip_prefix('#'))
        .unwrap_or(trimmed);

    if digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(format!("0x{}", digits.to_ascii_lowercase()))
    } else {
        None
    }
}
