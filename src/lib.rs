//! Black/white frame extraction from raw video streams.
//!
//! Takes the raw RGB24 byte stream of a video decoder (ffmpeg), cuts it
//! back into fixed-size frames regardless of how the pipe chunks it, and
//! reduces every frame to a matrix of 0/1 pixels.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! source → assembly → reduction → pipeline (frame sequence) → sink
//!                          ↓
//!                       metrics
//! ```
//!
//! # Design Principles
//!
//! - **Lossless framing**: every byte lands in exactly one frame, in
//!   order, whatever the chunk boundaries
//! - **Bounded memory**: one buffer of `frame + slack` bytes, allocated once
//! - **Fail loudly on misconfiguration**: a chunk larger than the slack is
//!   an error, never a silent truncation
//! - **Deterministic reduction**: the same frame always gives the same matrix
//!
//! # Example
//!
//! ```no_run
//! use bw_frames::{
//!     pipeline::{AbortPolicy, Pipeline},
//!     reduction::ReductionConfig,
//!     sink::{FrameSink, JsonFileSink},
//!     source::{MockSource, StreamConfig},
//! };
//! use std::sync::atomic::AtomicBool;
//!
//! let stream = StreamConfig::with_dimensions(86, 64);
//! let mut source = MockSource::new(86, 64, 10).with_chunk_sizes(vec![4096, 17]);
//!
//! let outcome = Pipeline::new(&stream, ReductionConfig::default())
//!     .run(&mut source, &AtomicBool::new(false), AbortPolicy::Flush)
//!     .unwrap();
//!
//! let mut sink = JsonFileSink::new("data/data.json");
//! sink.write(&outcome.frames, &outcome.report).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

/// Chunk-to-frame reassembly.
pub mod assembly;
/// Prometheus metrics and the optional HTTP exporter.
pub mod metrics;
/// Run driver, frame sequence and run report.
pub mod pipeline;
/// Average-and-threshold pixel reduction.
pub mod reduction;
/// Output sinks.
pub mod sink;
/// Upstream byte sources and configuration.
pub mod source;

// Re-export commonly used types at crate root
pub use assembly::{AssemblyError, FrameAssembler, RawFrame};
pub use pipeline::{AbortPolicy, FrameSequence, Pipeline, PipelineError, RunReport};
pub use reduction::{PixelMatrix, PixelReducer, ReductionConfig, RowMode};
pub use sink::{FrameSink, JsonFileSink, OutputFormat};
pub use source::{ByteSource, FfmpegSource, FileConfig, MockSource, ReaderSource, StreamConfig};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
