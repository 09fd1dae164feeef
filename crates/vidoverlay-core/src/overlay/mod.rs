//! Overlay Parameter Model
//!
//! Turns the loose, user-facing overlay description into the canonical form the graph
//! compiler consumes:
//! - `models`    - canonical types (`OverlaySpec`, placement, sizing, chroma, animation)
//! - `chroma`    - the immutable chroma preset table
//! - `resolver`  - validation, defaults, aliasing and clamping of raw parameters
//! - `geometry`  - symbolic position and scale expressions
//! - `animation` - time-based filter fragments for the 12 animation curves

pub mod animation;
pub mod chroma;
pub mod geometry;
mod models;
mod resolver;

pub use animation::{AnimationFragment, AnimationTiming};
pub use chroma::{ChromaPreset, ChromaPresetTable, ChromaTuning, Strictness};
pub use geometry::{AxisOffset, Geometry, GeometryResolver, Position, ScaleExpr};
pub use models::{
    Animation, AnimationCurve, AssetKind, ChromaKey, OverlaySpec, Placement, RawOverlaySpec,
    Sizing,
};
pub use resolver::{effective_duration, ParameterResolver, ResolverDefaults};

/// Unrecoverable problem with a structural overlay parameter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid overlay parameter '{field}': {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
