//! Binary reduction of raw frames.
//!
//! Converts each frame's RGB samples into a 0/1 matrix by averaging the
//! samples of every pixel and comparing against a fixed threshold.

mod config;
mod matrix;
mod reducer;

pub use config::{ReductionConfig, RowMode, DEFAULT_THRESHOLD, DEFAULT_WINDOW};
pub use matrix::PixelMatrix;
pub use reducer::{PixelReducer, ReductionError};
