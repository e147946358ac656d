//! Reduction parameters.

use crate::source::ConfigError;
use serde::{Deserialize, Serialize};

/// Default intensity threshold: averages below this map to 0.
pub const DEFAULT_THRESHOLD: u8 = 125;

/// Default averaging window (one RGB24 pixel).
pub const DEFAULT_WINDOW: usize = 3;

/// How many pixels of each row are reduced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowMode {
    /// Every pixel: rows are `width` values long.
    #[default]
    Full,
    /// Drops the last pixel of every row (`width - 1` values), matching
    /// output produced by older tooling.
    Legacy,
}

impl RowMode {
    /// Output row length for a frame `width` pixels wide.
    pub fn row_len(self, width: usize) -> usize {
        match self {
            RowMode::Full => width,
            RowMode::Legacy => width.saturating_sub(1),
        }
    }
}

/// Parameters of the average-then-threshold reduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// Averages `>= threshold` become 1, the rest 0.
    pub threshold: u8,
    /// Byte samples averaged per pixel; also the stream's bytes per pixel.
    pub window: usize,
    /// Full rows or legacy truncated rows.
    pub row_mode: RowMode,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            window: DEFAULT_WINDOW,
            row_mode: RowMode::Full,
        }
    }
}

impl ReductionConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=4).contains(&self.window) {
            return Err(ConfigError::InvalidWindow(self.window));
        }
        Ok(())
    }
}
