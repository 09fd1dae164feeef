//! vidoverlay Core Library
//!
//! Composes one or more overlay assets (videos or still images) onto a base video by
//! compiling a declarative overlay description into an FFmpeg `filter_complex` graph and
//! driving the external `ffmpeg` binary to render it.
//!
//! ## Pipeline
//!
//! ```text
//! RawOverlaySpec ──► ParameterResolver ──► OverlaySpec
//!                                            │
//!              DurationProber (auto-hide) ◄──┤
//!                                            ▼
//!        Geometry / Chroma / Animation ──► GraphCompiler ──► FilterGraph
//!                                                              │
//!                                         FFmpegRunner ◄───────┘
//! ```
//!
//! The chroma preset table is immutable, process-wide configuration; everything else is
//! created per composition request and dropped afterwards.

pub mod ffmpeg;
pub mod graph;
pub mod overlay;
pub mod process;
pub mod render;
pub mod settings;

mod error;
pub use error::*;

mod types;
pub use types::*;
