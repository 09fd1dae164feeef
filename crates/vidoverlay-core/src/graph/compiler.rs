//! Overlay graph compiler.
//!
//! Lowers an ordered list of planned overlays into one filter graph. Per overlay the
//! statements are scale, optional chroma-key, optional animation, then the composite.
//! Overlays are threaded sequentially: each composite becomes the next overlay's base
//! and only the last one is left unlabeled.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, warn};

use super::{CompileError, FilterGraph, FilterGraphBuilder, Pad};
use crate::overlay::animation::{self, AnimationFragment};
use crate::overlay::{AssetKind, GeometryResolver, OverlaySpec};
use crate::{format_fraction, format_time, Dimensions, TimeSec};

/// Caption file burned into the base before any overlay
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleTrack {
    pub path: PathBuf,
    pub force_style: String,
}

/// Interval of base-video time during which an overlay is shown
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityWindow {
    pub start: TimeSec,
    /// `None`: visible until the base video ends
    pub end: Option<TimeSec>,
}

impl VisibilityWindow {
    pub fn new(start: TimeSec, duration: Option<TimeSec>) -> Self {
        Self {
            start,
            end: duration.map(|d| start + d),
        }
    }

    pub fn duration(&self) -> Option<TimeSec> {
        self.end.map(|end| end - self.start)
    }

    /// Timeline expression for the composite's `enable` option
    pub fn enable_expr(&self) -> String {
        match self.end {
            Some(end) => format!(
                "between(t,{},{})",
                format_time(self.start),
                format_time(end)
            ),
            None => format!("gte(t,{})", format_time(self.start)),
        }
    }
}

/// An overlay bound to its engine input and its final visibility window
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedOverlay {
    pub spec: OverlaySpec,
    pub input_index: usize,
    pub window: VisibilityWindow,
}

impl PlannedOverlay {
    /// Animated stills are attached looped and composited with `shortest=1`
    pub fn loops_still(&self) -> bool {
        self.spec.kind == AssetKind::Image && self.spec.animation.is_some()
    }
}

/// Compiles planned overlays into a `FilterGraph`
#[derive(Clone, Debug)]
pub struct GraphCompiler {
    geometry: GeometryResolver,
    base_dimensions: Option<Dimensions>,
    subtitles: Option<SubtitleTrack>,
    align_overlay_start: bool,
}

impl GraphCompiler {
    pub fn new(geometry: GeometryResolver) -> Self {
        Self {
            geometry,
            base_dimensions: None,
            subtitles: None,
            align_overlay_start: true,
        }
    }

    pub fn with_base_dimensions(mut self, dimensions: Option<Dimensions>) -> Self {
        self.base_dimensions = dimensions;
        self
    }

    pub fn with_subtitles(mut self, subtitles: Option<SubtitleTrack>) -> Self {
        self.subtitles = subtitles;
        self
    }

    pub fn with_overlay_start_alignment(mut self, align: bool) -> Self {
        self.align_overlay_start = align;
        self
    }

    /// Compiles the graph for `overlays` onto engine input `base_input_index`.
    ///
    /// Pure: the same inputs always produce the same graph text.
    pub fn compile(
        &self,
        input_count: usize,
        base_input_index: usize,
        overlays: &[PlannedOverlay],
    ) -> Result<FilterGraph, CompileError> {
        if overlays.is_empty() {
            return Err(CompileError::NothingToCompose);
        }

        let mut builder = FilterGraphBuilder::new(input_count);
        let mut base = builder.input(base_input_index)?;

        if let Some(track) = &self.subtitles {
            let operation = format!(
                "subtitles='{}':force_style='{}'",
                escape_filter_path(&track.path.to_string_lossy()),
                escape_quoted(&track.force_style)
            );
            base = builder.push(vec![base], operation, "sub")?;
        }

        let last = overlays.len() - 1;
        for (i, overlay) in overlays.iter().enumerate() {
            let spec = &overlay.spec;
            let geometry = self
                .geometry
                .resolve(&spec.placement, &spec.sizing, self.base_dimensions);

            // Shifted so the overlay's first frame lands on its start time
            let align = (self.align_overlay_start
                && spec.kind == AssetKind::Video
                && overlay.window.start > 0.0)
                .then(|| {
                    format!(
                        "setpts=PTS-STARTPTS+{}/TB",
                        format_time(overlay.window.start)
                    )
                });

            let mut source = builder.input(overlay.input_index)?;
            let mut stream = if geometry.scale.references_base() {
                // Sized against the current base, which passes through as ref{i}
                if let Some(setpts) = align {
                    source = builder.push(vec![source], setpts, format!("aligned{i}"))?;
                }
                let scaled = format!("scaled{i}");
                let reference = format!("ref{i}");
                builder.push_many(
                    vec![source, base],
                    geometry.scale.to_string(),
                    vec![scaled.clone(), reference.clone()],
                )?;
                base = Pad::Label(reference);
                Pad::Label(scaled)
            } else {
                let chain = match align {
                    Some(setpts) => format!("{setpts},{}", geometry.scale),
                    None => geometry.scale.to_string(),
                };
                builder.push(vec![source], chain, format!("scaled{i}"))?
            };

            if let Some(chroma) = &spec.chroma {
                let operation = format!(
                    "chromakey={}:{}:{}",
                    chroma.color_hex,
                    format_fraction(chroma.similarity),
                    format_fraction(chroma.blend)
                );
                stream = builder.push(vec![stream], operation, format!("keyed{i}"))?;
            }

            let mut x = geometry.position.x_expr();
            let mut y = geometry.position.y_expr();
            if let Some(anim) = &spec.animation {
                let fragment = animation::generate(
                    anim.curve,
                    overlay.window.start,
                    overlay.window.duration(),
                    anim.duration_sec,
                );
                match fragment {
                    Some(AnimationFragment::Filter { chain }) => {
                        stream = builder.push(vec![stream], chain, format!("anim{i}"))?;
                    }
                    Some(AnimationFragment::Offset { dx, dy }) => {
                        if let Some(dx) = dx {
                            x = format!("{x}+{dx}");
                        }
                        if let Some(dy) = dy {
                            y = format!("{y}+{dy}");
                        }
                    }
                    None => warn!(
                        asset = %spec.asset_path.display(),
                        animation = anim.curve.name(),
                        "Animation dropped: visibility window is unbounded"
                    ),
                }
            }

            let mut operation = format!(
                "overlay={}:{}:enable='{}'",
                quote_expr(&x),
                quote_expr(&y),
                overlay.window.enable_expr()
            );
            if overlay.loops_still() {
                operation.push_str(":shortest=1");
            }

            let inputs = vec![base, stream];
            if i == last {
                builder.push_terminal(inputs, operation)?;
                break;
            }
            base = builder.push(inputs, operation, format!("tmp{i}"))?;
        }

        let graph = builder.finish()?;
        debug!(statements = graph.len(), graph = %graph, "Compiled filter graph");
        Ok(graph)
    }
}

/// Escapes a file path for use inside a single-quoted filter argument
pub fn escape_filter_path(path: &str) -> String {
    escape_quoted(&path.replace('\\', "/").replace(':', r"\:"))
}

/// Closes the quote around each `'`, emits it escaped, and reopens
fn escape_quoted(value: &str) -> String {
    value.replace('\'', r"'\''")
}

/// Single-quotes expressions whose commas would otherwise split the filter chain
fn quote_expr(expr: &str) -> String {
    if expr.contains(',') {
        format!("'{expr}'")
    } else {
        expr.to_string()
    }
}
