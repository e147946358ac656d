//! Stream and run configuration.
//!
//! Frame dimensions, threshold and slack are fixed for the whole run.
//! They are read once (TOML file, then CLI overrides) and validated
//! before the first byte is ingested.

use crate::pipeline::AbortPolicy;
use crate::reduction::ReductionConfig;
use crate::sink::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default slack: 1 MiB of headroom above one frame.
pub const DEFAULT_SLACK_BYTES: usize = 1024 * 1024;

/// Upper bound on the assembly buffer (one frame plus slack).
pub const MAX_BUFFER_BYTES: usize = 1024 * 1024 * 1024;

/// Geometry of the raw stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second the producer emits.
    pub fps: u32,
    /// Extra buffer capacity beyond one frame.
    ///
    /// Must be at least the largest chunk the producer can deliver.
    pub slack_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: 86,
            height: 64,
            fps: 30,
            slack_bytes: DEFAULT_SLACK_BYTES,
        }
    }
}

impl StreamConfig {
    /// Creates a new configuration with the specified dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Validates the configuration parameters.
    ///
    /// The buffer check here assumes one byte per pixel; use
    /// [`buffer_capacity`](Self::buffer_capacity) once the averaging
    /// window is known.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.fps == 0 || self.fps > 240 {
            return Err(ConfigError::InvalidFrameRate);
        }
        if self.slack_bytes == 0 {
            return Err(ConfigError::InvalidSlack);
        }
        self.buffer_capacity(1)?;
        Ok(())
    }

    /// Assembly buffer size for `bytes_per_pixel`: one frame plus slack.
    ///
    /// Fails when the size overflows `usize` or exceeds
    /// [`MAX_BUFFER_BYTES`].
    pub fn buffer_capacity(&self, bytes_per_pixel: usize) -> Result<usize, ConfigError> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|pixels| pixels.checked_mul(bytes_per_pixel))
            .and_then(|frame| frame.checked_add(self.slack_bytes))
            .filter(|&capacity| capacity <= MAX_BUFFER_BYTES)
            .ok_or(ConfigError::BufferTooLarge {
                width: self.width,
                height: self.height,
                slack: self.slack_bytes,
            })
    }
}

/// Size of the colour planes fed to ffmpeg's `threshold` filter.
///
/// These have to match the decoded size of the input video, not the
/// output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdFilter {
    /// Decoded width of the input video.
    pub source_width: u32,
    /// Decoded height of the input video.
    pub source_height: u32,
}

impl std::str::FromStr for ThresholdFilter {
    type Err = String;

    /// Parses `WIDTHxHEIGHT`, e.g. `480x360`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| v.trim().parse::<u32>().ok().filter(|&n| n > 0);
        s.split_once(['x', 'X'])
            .and_then(|(w, h)| {
                Some(Self {
                    source_width: parse(w)?,
                    source_height: parse(h)?,
                })
            })
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{}`", s))
    }
}

/// How the upstream decoder is launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// ffmpeg executable.
    pub ffmpeg: PathBuf,
    /// Video file to decode. `None` reads raw RGB24 from stdin.
    pub input: Option<PathBuf>,
    /// Forces the input frame rate (`-r` before `-i`).
    pub input_fps: Option<u32>,
    /// Binarise in ffmpeg before the raw stream reaches us.
    pub threshold_filter: Option<ThresholdFilter>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            input: None,
            input_fps: None,
            threshold_filter: None,
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Destination JSON file.
    pub path: PathBuf,
    /// Bare frame array or a document with run metadata.
    pub format: OutputFormat,
    /// Pretty-print the JSON.
    pub pretty: bool,
    /// What to do with frames already built when the run is cut short.
    pub on_abort: AbortPolicy,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/data.json"),
            format: OutputFormat::Frames,
            pretty: false,
            on_abort: AbortPolicy::Flush,
            metrics_port: 0,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Width or height is zero.
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    /// Frame rate outside 1-240.
    #[error("invalid frame rate (must be 1-240 fps)")]
    InvalidFrameRate,
    /// Slack is zero.
    #[error("slack must be at least one byte")]
    InvalidSlack,
    /// One frame plus slack does not fit in memory limits.
    #[error(
        "{width}x{height} frames with {slack} bytes of slack exceed the \
         {}-byte buffer limit",
        MAX_BUFFER_BYTES
    )]
    BufferTooLarge {
        /// Configured width.
        width: u32,
        /// Configured height.
        height: u32,
        /// Configured slack.
        slack: usize,
    },
    /// Averaging window outside 1-4.
    #[error("invalid averaging window {0} (must be 1-4)")]
    InvalidWindow(usize),
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The config file is not valid TOML for this format.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Frame geometry and buffer slack.
    #[serde(default)]
    pub stream: StreamConfig,
    /// Threshold, window and row mode.
    #[serde(default)]
    pub reduction: ReductionConfig,
    /// Upstream decoder.
    #[serde(default)]
    pub source: SourceConfig,
    /// Where and how frames are written.
    #[serde(default)]
    pub output: OutputConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section that has constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stream.validate()?;
        self.reduction.validate()?;
        self.stream.buffer_capacity(self.reduction.window)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduction::RowMode;

    #[test]
    fn test_default_config_valid() {
        let config = FileConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stream.width, 86);
        assert_eq!(config.stream.height, 64);
        assert_eq!(config.stream.slack_bytes, 1024 * 1024);
    }

    #[test]
    fn test_zero_dimensions_invalid() {
        let mut config = StreamConfig::default();
        config.height = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDimensions)
        ));
    }

    #[test]
    fn test_zero_slack_invalid() {
        let config = StreamConfig {
            slack_bytes: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSlack)));
    }

    #[test]
    fn test_slack_overflow_rejected() {
        let config = StreamConfig {
            slack_bytes: usize::MAX,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BufferTooLarge { slack: usize::MAX, .. })
        ));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut config = FileConfig::default();
        config.stream.width = u32::MAX;
        config.stream.height = u32::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BufferTooLarge { .. })
        ));

        // Fits at one byte per pixel, not at four.
        config.stream.width = 16_384;
        config.stream.height = 16_384;
        config.stream.slack_bytes = 1;
        config.reduction.window = 4;
        assert!(config.stream.validate().is_ok());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BufferTooLarge { .. })
        ));
    }

    #[test]
    fn test_buffer_capacity() {
        let config = StreamConfig {
            width: 2,
            height: 1,
            slack_bytes: 16,
            ..Default::default()
        };
        assert_eq!(config.buffer_capacity(3).unwrap(), 22);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = FileConfig::from_toml(
            r#"
            [stream]
            width = 2
            height = 1

            [reduction]
            threshold = 100
            row_mode = "legacy"

            [output]
            path = "out/frames.json"
            format = "document"
            "#,
        )
        .unwrap();

        assert_eq!(config.stream.width, 2);
        assert_eq!(config.stream.fps, 30);
        assert_eq!(config.reduction.threshold, 100);
        assert_eq!(config.reduction.window, 3);
        assert_eq!(config.reduction.row_mode, RowMode::Legacy);
        assert_eq!(config.output.format, OutputFormat::Document);
        assert_eq!(config.output.on_abort, AbortPolicy::Flush);
    }

    #[test]
    fn test_toml_rejects_bad_window() {
        let result = FileConfig::from_toml("[reduction]\nwindow = 7\n");
        assert!(matches!(result, Err(ConfigError::InvalidWindow(7))));
    }

    #[test]
    fn test_example_config_parses() {
        let config =
            FileConfig::from_toml(include_str!("../../config/bw-frames.example.toml")).unwrap();
        assert_eq!(config.stream.width, 86);
        assert_eq!(config.output.on_abort, AbortPolicy::Flush);
        assert!(config.source.threshold_filter.is_some());
    }

    #[test]
    fn test_threshold_filter_parse() {
        assert_eq!(
            "480x360".parse::<ThresholdFilter>(),
            Ok(ThresholdFilter {
                source_width: 480,
                source_height: 360
            })
        );
        assert!("480".parse::<ThresholdFilter>().is_err());
        assert!("0x360".parse::<ThresholdFilter>().is_err());
    }

    #[test]
    fn test_threshold_filter_section() {
        let config = FileConfig::from_toml(
            r#"
            [source]
            input = "data/video.mp4"
            input_fps = 30

            [source.threshold_filter]
            source_width = 480
            source_height = 360
            "#,
        )
        .unwrap();

        assert_eq!(
            config.source.threshold_filter,
            Some(ThresholdFilter {
                source_width: 480,
                source_height: 360
            })
        );
        assert_eq!(config.source.ffmpeg, PathBuf::from("ffmpeg"));
    }
}
