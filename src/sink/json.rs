//! JSON file sink.

use super::{FrameSink, OutputFormat, SinkError};
use crate::pipeline::{FrameSequence, RunReport};
use crate::reduction::RowMode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Stream parameters recorded in [`OutputFormat::Document`] output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Producer frame rate.
    pub fps: u32,
    /// Averages below this became 0.
    pub threshold: u8,
    /// Whether rows were reduced in full.
    pub row_mode: RowMode,
}

#[derive(Serialize)]
struct Document<'a> {
    #[serde(flatten)]
    stream: Option<&'a StreamInfo>,
    generated_at: DateTime<Utc>,
    report: &'a RunReport,
    frames: &'a FrameSequence,
}

/// Writes the sequence to a JSON file, creating parent directories.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
    format: OutputFormat,
    pretty: bool,
    stream: Option<StreamInfo>,
}

impl JsonFileSink {
    /// Creates a sink writing the bare frame array to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: OutputFormat::Frames,
            pretty: false,
            stream: None,
        }
    }

    /// Sets the output layout.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Enables indented output.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Stream parameters to include in document output.
    pub fn with_stream_info(mut self, info: StreamInfo) -> Self {
        self.stream = Some(info);
        self
    }

    /// Destination path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn encode<W: Write, T: Serialize>(&self, writer: W, value: &T) -> Result<(), SinkError> {
        if self.pretty {
            serde_json::to_writer_pretty(writer, value)?;
        } else {
            serde_json::to_writer(writer, value)?;
        }
        Ok(())
    }
}

impl FrameSink for JsonFileSink {
    fn write(&mut self, frames: &FrameSequence, report: &RunReport) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let file = File::create(&self.path).map_err(|e| self.io_error(e))?;
        let mut writer = BufWriter::new(file);

        match self.format {
            OutputFormat::Frames => self.encode(&mut writer, frames)?,
            OutputFormat::Document => {
                let document = Document {
                    stream: self.stream.as_ref(),
                    generated_at: Utc::now(),
                    report,
                    frames,
                };
                self.encode(&mut writer, &document)?;
            }
        }
        writer.flush().map_err(|e| self.io_error(e))?;

        tracing::info!(
            path = %self.path.display(),
            frames = frames.len(),
            "Frames written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduction::PixelMatrix;

    fn sample() -> (FrameSequence, RunReport) {
        let mut frames = FrameSequence::new();
        frames.push(PixelMatrix::from_rows(&[vec![0, 1]]).unwrap());
        frames.push(PixelMatrix::from_rows(&[vec![1, 1]]).unwrap());
        let now = Utc::now();
        let report = RunReport {
            frames: 2,
            chunks: 3,
            bytes_ingested: 14,
            bytes_dropped: 2,
            frames_discarded: 0,
            interrupted: None,
            started_at: now,
            finished_at: now,
        };
        (frames, report)
    }

    #[test]
    fn test_writes_bare_frame_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/data.json");
        let (frames, report) = sample();

        let mut sink = JsonFileSink::new(&path);
        sink.write(&frames, &report).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "[[[0,1]],[[1,1]]]");
    }

    #[test]
    fn test_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let (frames, report) = sample();

        let mut sink = JsonFileSink::new(&path)
            .with_format(OutputFormat::Document)
            .pretty(true)
            .with_stream_info(StreamInfo {
                width: 2,
                height: 1,
                fps: 30,
                threshold: 125,
                row_mode: RowMode::Full,
            });
        sink.write(&frames, &report).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["width"], 2);
        assert_eq!(value["threshold"], 125);
        assert_eq!(value["row_mode"], "full");
        assert_eq!(value["report"]["bytes_dropped"], 2);
        assert_eq!(value["frames"], serde_json::json!([[[0, 1]], [[1, 1]]]));
        assert!(value["generated_at"].is_string());
    }

    #[test]
    fn test_unwritable_path_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let (frames, report) = sample();

        // A regular file cannot be used as a directory.
        let mut sink = JsonFileSink::new(blocker.join("data.json"));
        let err = sink.write(&frames, &report).unwrap_err();
        assert!(matches!(err, SinkError::Io { .. }));
        assert_eq!(frames.len(), 2);
    }
}
