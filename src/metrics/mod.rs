//! Prometheus metrics for the frame pipeline.
//!
//! # Metrics Exposed
//!
//! ## Throughput
//! - `bw_frames_frames_total` - Frames reduced
//! - `bw_frames_chunks_total` - Chunks received from the producer
//! - `bw_frames_bytes_ingested_total` - Bytes received from the producer
//! - `bw_frames_bytes_dropped_total` - Trailing bytes dropped at end of stream
//!
//! ## Buffer
//! - `bw_frames_buffer_fill_bytes` - Bytes waiting for the next frame boundary
//! - `bw_frames_buffer_capacity_bytes` - Frame size plus slack
//!
//! ## Content
//! - `bw_frames_white_ratio` - White fraction of the latest frame
//!
//! With the `metrics` feature the registry can be served over HTTP on
//! `/metrics`.

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
