//! Shared value types used across the composition pipeline.

use serde::{Deserialize, Serialize};

/// Time in seconds (floating point)
pub type TimeSec = f64;

/// Frame dimensions in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Formats a time value the way every filter-graph time anchor is written.
pub fn format_time(value: TimeSec) -> String {
    format!("{:.3}", value)
}

/// Formats a tuning value or scale factor for the filter graph.
pub fn format_fraction(value: f64) -> String {
    format!("{:.4}", value)
}
