//! Upstream byte stream and run configuration.
//!
//! The decoder is treated as an opaque producer of raw RGB24 bytes. This
//! module provides the session abstraction over it, the concrete
//! producers (ffmpeg child process, any reader, a synthetic mock) and the
//! configuration fixed at startup.

mod config;
mod ffmpeg;
mod stream;

pub use config::{
    ConfigError, FileConfig, OutputConfig, SourceConfig, StreamConfig, ThresholdFilter,
    DEFAULT_SLACK_BYTES, MAX_BUFFER_BYTES,
};
pub use ffmpeg::FfmpegSource;
pub use stream::{ByteSource, MockSource, ReaderSource, SourceError};
