// THEORY:
// This file is the entry point for the `block_importance` library crate. It
// exposes a small public API for turning an encoder's lookahead importance dump
// plus its half-resolution reference frame into a heat-map overlay image.
//
// The layering mirrors the data flow:
// - `core_modules` holds the pieces that know about bytes and pixels: the dump
//   loader, block geometry, frame scaling, the overlay renderer, and the PNG writer.
// - `pipeline` turns a user request into independent render jobs and runs them
//   one at a time.
// - `parallel_pipeline` runs the same jobs across a bounded pool of workers.
// - `error` is the single error type shared by all of them.

pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use core_modules::block_geometry::BlockGeometry;
pub use core_modules::frame::FrameImage;
pub use core_modules::importance_map::ImportanceMap;
pub use core_modules::overlay::{OverlayStyle, ScoreScale};
pub use error::{ImportanceError, Result};
