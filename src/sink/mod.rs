//! Output sinks for the finished frame sequence.
//!
//! A sink receives the whole sequence once, after the stream has ended.
//! A failed write leaves the in-memory sequence untouched so the caller
//! can retry or report it.

mod json;

pub use json::{JsonFileSink, StreamInfo};

use crate::pipeline::{FrameSequence, RunReport};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while persisting frames.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Creating or writing the destination failed.
    #[error("failed to write {path}: {source}")]
    Io {
        /// Destination path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Serialization failed.
    #[error("failed to encode frames: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Layout of the written output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Bare nested array: frames → rows → 0/1 values.
    #[default]
    Frames,
    /// Object with stream parameters, run report and the frames.
    Document,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "frames" => Ok(Self::Frames),
            "document" => Ok(Self::Document),
            other => Err(format!("unknown output format `{}` (frames, document)", other)),
        }
    }
}

/// Destination for a completed run.
pub trait FrameSink {
    /// Persists the sequence. Called once per run.
    fn write(&mut self, frames: &FrameSequence, report: &RunReport) -> Result<(), SinkError>;
}

/// Keeps the last written sequence in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    frames: Option<FrameSequence>,
    report: Option<RunReport>,
    writes: usize,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// The last sequence written, if any.
    pub fn frames(&self) -> Option<&FrameSequence> {
        self.frames.as_ref()
    }

    /// The report of the last write.
    pub fn report(&self) -> Option<&RunReport> {
        self.report.as_ref()
    }

    /// Number of writes received.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl FrameSink for MemorySink {
    fn write(&mut self, frames: &FrameSequence, report: &RunReport) -> Result<(), SinkError> {
        self.frames = Some(frames.clone());
        self.report = Some(report.clone());
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduction::PixelMatrix;
    use chrono::Utc;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("frames".parse::<OutputFormat>(), Ok(OutputFormat::Frames));
        assert_eq!("DOCUMENT".parse::<OutputFormat>(), Ok(OutputFormat::Document));
        assert!("csv".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_memory_sink_keeps_last_write() {
        let mut frames = FrameSequence::new();
        frames.push(PixelMatrix::from_rows(&[vec![1, 0]]).unwrap());
        let now = Utc::now();
        let report = RunReport {
            frames: 1,
            chunks: 1,
            bytes_ingested: 6,
            bytes_dropped: 0,
            frames_discarded: 0,
            interrupted: None,
            started_at: now,
            finished_at: now,
        };

        let mut sink = MemorySink::new();
        sink.write(&frames, &report).unwrap();

        assert_eq!(sink.writes(), 1);
        assert_eq!(sink.frames(), Some(&frames));
        assert_eq!(sink.report().map(|r| r.bytes_ingested), Some(6));
    }
}
