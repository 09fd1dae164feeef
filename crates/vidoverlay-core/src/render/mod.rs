//! Render Pipeline Module
//!
//! Turns a composition request into an engine run.
//!
//! # Modules
//!
//! - `compose`: request planning, duration probing, graph compilation and atomic output

mod compose;

pub use compose::*;
