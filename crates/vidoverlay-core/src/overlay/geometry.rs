//! Overlay geometry: where the overlay goes and how it is scaled.
//!
//! Positions stay symbolic (`main_w`, `overlay_w`, ...) so the engine resolves them per
//! frame; `Position::evaluate` computes the same values numerically for previews.

use std::fmt;

use serde::Serialize;

use super::models::{Placement, Sizing};
use crate::{format_fraction, Dimensions};

/// One axis of an overlay position
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum AxisOffset {
    Centered,
    /// Inset from the left/top edge
    Near(i64),
    /// Inset from the right/bottom edge
    Far(i64),
    Literal(i64),
}

impl AxisOffset {
    fn expression(&self, main: &str, overlay: &str) -> String {
        match self {
            AxisOffset::Centered => format!("({main}-{overlay})/2"),
            AxisOffset::Near(inset) => inset.to_string(),
            AxisOffset::Far(inset) => format!("{main}-{overlay}-{inset}"),
            AxisOffset::Literal(value) => value.to_string(),
        }
    }

    pub fn evaluate(&self, main: i64, overlay: i64) -> i64 {
        match self {
            AxisOffset::Centered => (main - overlay) / 2,
            AxisOffset::Near(inset) => *inset,
            AxisOffset::Far(inset) => main - overlay - inset,
            AxisOffset::Literal(value) => *value,
        }
    }
}

/// Overlay top-left corner on the base frame
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Position {
    pub x: AxisOffset,
    pub y: AxisOffset,
}

impl Position {
    pub fn x_expr(&self) -> String {
        self.x.expression("main_w", "overlay_w")
    }

    pub fn y_expr(&self) -> String {
        self.y.expression("main_h", "overlay_h")
    }

    /// Numeric position for known base and overlay dimensions
    pub fn evaluate(&self, base: Dimensions, overlay: Dimensions) -> (i64, i64) {
        (
            self.x.evaluate(base.width as i64, overlay.width as i64),
            self.y.evaluate(base.height as i64, overlay.height as i64),
        )
    }
}

/// Scale operation applied to the overlay stream
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ScaleExpr {
    /// Height as a fraction of the base frame's height, measured in the graph
    /// (`scale2ref` against the current base) when base dimensions are unknown
    BaseRelative { factor: f64 },
    /// Fixed pixel height derived from the base height
    BaseHeight { height: u32 },
    /// Fit inside the box, preserving aspect ratio
    Fit { width: u32, height: u32 },
    /// Exact box, aspect ratio ignored
    Stretch { width: u32, height: u32 },
}

impl fmt::Display for ScaleExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Inside scale2ref `ih` is the reference height and `mdar` the overlay's
            // display aspect ratio
            ScaleExpr::BaseRelative { factor } => write!(
                f,
                "scale2ref=w=trunc(oh*mdar/2)*2:h=trunc(ih*{}/2)*2",
                format_fraction(*factor)
            ),
            ScaleExpr::BaseHeight { height } => write!(f, "scale=-2:{height}"),
            ScaleExpr::Fit { width, height } => write!(
                f,
                "scale={width}:{height}:force_original_aspect_ratio=decrease"
            ),
            ScaleExpr::Stretch { width, height } => write!(f, "scale={width}:{height}"),
        }
    }
}

impl ScaleExpr {
    /// Whether the operation takes the base stream as a second input
    pub fn references_base(&self) -> bool {
        matches!(self, ScaleExpr::BaseRelative { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Geometry {
    pub position: Position,
    pub scale: ScaleExpr,
}

/// Maps placement and sizing onto expressions, using a fixed edge inset
#[derive(Clone, Copy, Debug)]
pub struct GeometryResolver {
    inset: i64,
}

impl GeometryResolver {
    pub const DEFAULT_INSET: i64 = 10;

    pub fn new(inset: i64) -> Self {
        Self { inset }
    }

    pub fn inset(&self) -> i64 {
        self.inset
    }

    pub fn resolve(
        &self,
        placement: &Placement,
        sizing: &Sizing,
        base: Option<Dimensions>,
    ) -> Geometry {
        Geometry {
            position: self.position(placement),
            scale: self.scale(sizing, base),
        }
    }

    pub fn position(&self, placement: &Placement) -> Position {
        let inset = self.inset;
        let (x, y) = match *placement {
            Placement::Center => (AxisOffset::Centered, AxisOffset::Centered),
            Placement::TopLeft => (AxisOffset::Near(inset), AxisOffset::Near(inset)),
            Placement::TopRight => (AxisOffset::Far(inset), AxisOffset::Near(inset)),
            Placement::BottomLeft => (AxisOffset::Near(inset), AxisOffset::Far(inset)),
            Placement::BottomRight => (AxisOffset::Far(inset), AxisOffset::Far(inset)),
            Placement::Custom { x, y } => (AxisOffset::Literal(x), AxisOffset::Literal(y)),
        };
        Position { x, y }
    }

    pub fn scale(&self, sizing: &Sizing, base: Option<Dimensions>) -> ScaleExpr {
        match *sizing {
            Sizing::Percent { pct_of_base_height } => match base {
                Some(dims) => ScaleExpr::BaseHeight {
                    height: even_height(dims.height, pct_of_base_height),
                },
                None => ScaleExpr::BaseRelative {
                    factor: pct_of_base_height as f64 / 100.0,
                },
            },
            Sizing::Pixels {
                width,
                height,
                keep_aspect: true,
            } => ScaleExpr::Fit { width, height },
            Sizing::Pixels {
                width,
                height,
                keep_aspect: false,
            } => ScaleExpr::Stretch { width, height },
        }
    }
}

impl Default for GeometryResolver {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INSET)
    }
}

/// Percentage of `base_height`, rounded to an even pixel count (at least 2)
fn even_height(base_height: u32, pct: u32) -> u32 {
    let exact = base_height as f64 * pct as f64 / 100.0;
    let even = ((exact / 2.0).round() * 2.0) as u32;
    even.max(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_expressions() {
        let resolver = GeometryResolver::default();

        let top_right = resolver.position(&Placement::TopRight);
        assert_eq!(top_right.x_expr(), "main_w-overlay_w-10");
        assert_eq!(top_right.y_expr(), "10");

        let bottom_left = resolver.position(&Placement::BottomLeft);
        assert_eq!(bottom_left.x_expr(), "10");
        assert_eq!(bottom_left.y_expr(), "main_h-overlay_h-10");

        let center = resolver.position(&Placement::Center);
        assert_eq!(center.x_expr(), "(main_w-overlay_w)/2");
        assert_eq!(center.y_expr(), "(main_h-overlay_h)/2");
    }

    #[test]
    fn test_custom_coordinates_pass_through() {
        let position = GeometryResolver::new(24).position(&Placement::Custom { x: 100, y: -5 });
        assert_eq!(position.x_expr(), "100");
        assert_eq!(position.y_expr(), "-5");
    }

    #[test]
    fn test_numeric_evaluation() {
        let base = Dimensions::new(1920, 1080);
        let overlay = Dimensions::new(480, 270);
        let resolver = GeometryResolver::default();

        assert_eq!(
            resolver.position(&Placement::BottomRight).evaluate(base, overlay),
            (1430, 800)
        );
        assert_eq!(
            resolver.position(&Placement::Center).evaluate(base, overlay),
            (720, 405)
        );
        assert_eq!(
            resolver.position(&Placement::TopLeft).evaluate(base, overlay),
            (10, 10)
        );
    }

    #[test]
    fn test_top_right_against_full_hd() {
        let position = GeometryResolver::default().position(&Placement::TopRight);
        let (x, y) = position.evaluate(Dimensions::new(1920, 1080), Dimensions::new(400, 300));
        assert_eq!(x, 1510);
        assert_eq!(y, 10);
    }

    #[test]
    fn test_percent_sizing() {
        let resolver = GeometryResolver::default();
        let sizing = Sizing::Percent {
            pct_of_base_height: 25,
        };

        let relative = resolver.scale(&sizing, None);
        assert!(relative.references_base());
        assert_eq!(
            relative.to_string(),
            "scale2ref=w=trunc(oh*mdar/2)*2:h=trunc(ih*0.2500/2)*2"
        );

        let absolute = resolver.scale(&sizing, Some(Dimensions::new(1920, 1080)));
        assert_eq!(absolute, ScaleExpr::BaseHeight { height: 270 });
        assert_eq!(absolute.to_string(), "scale=-2:270");
        assert!(!absolute.references_base());
    }

    #[test]
    fn test_percent_height_is_even() {
        // 30% of 1080 is 324; 30% of 1081 is 324.3
        assert_eq!(even_height(1080, 30), 324);
        assert_eq!(even_height(1081, 30), 324);
        // 25% of 1082 is 270.5, rounded to an even count
        assert_eq!(even_height(1082, 25) % 2, 0);
        assert_eq!(even_height(10, 1), 2);
    }

    #[test]
    fn test_pixel_sizing() {
        let resolver = GeometryResolver::default();
        let fit = resolver.scale(
            &Sizing::Pixels {
                width: 400,
                height: 200,
                keep_aspect: true,
            },
            None,
        );
        assert_eq!(
            fit.to_string(),
            "scale=400:200:force_original_aspect_ratio=decrease"
        );

        let stretch = resolver.scale(
            &Sizing::Pixels {
                width: 400,
                height: 200,
                keep_aspect: false,
            },
            None,
        );
        assert_eq!(stretch.to_string(), "scale=400:200");
    }
}
