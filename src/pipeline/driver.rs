//! Pipeline driver: source → assembler → reducer → frame sequence.
//!
//! Owns all mutable run state. Chunks are ingested strictly in order on
//! the caller's thread; nothing here blocks except reading the source.

use super::report::{AbortPolicy, RunReport};
use super::sequence::FrameSequence;
use crate::assembly::{AssemblyError, FrameAssembler};
use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use crate::reduction::{PixelReducer, ReductionConfig, ReductionError};
use crate::sink::SinkError;
use crate::source::{ByteSource, ConfigError, FileConfig, SourceError, StreamConfig};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Upper bound on a single read from the source.
const MAX_READ_BYTES: usize = 64 * 1024;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Rejected configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A chunk did not fit the assembly buffer.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    /// An assembled frame did not match the reducer's geometry.
    #[error(transparent)]
    Reduction(#[from] ReductionError),
    /// The source could not be opened.
    #[error("upstream failed to start: {0}")]
    Source(#[from] SourceError),
    /// The sink could not store the frames.
    #[error("failed to write frames: {0}")]
    Sink(#[from] SinkError),
}

/// Why a run stopped before the end event.
#[derive(Debug)]
pub enum Interruption {
    /// The producer failed mid-stream or exited unsuccessfully.
    Upstream(SourceError),
    /// Cancelled by the caller (Ctrl-C).
    Cancelled,
}

impl std::fmt::Display for Interruption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interruption::Upstream(e) => write!(f, "upstream error: {}", e),
            Interruption::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Result of [`Pipeline::run`].
#[derive(Debug)]
pub struct RunOutcome {
    /// Frames assembled before the end event or interruption.
    pub frames: FrameSequence,
    /// Counters and timing for the run.
    pub report: RunReport,
    /// Set when the run stopped early.
    pub interruption: Option<Interruption>,
    /// Policy the run was driven with.
    pub policy: AbortPolicy,
}

impl RunOutcome {
    /// Frames that should reach the sink, if any.
    ///
    /// `None` only when the run was interrupted under
    /// [`AbortPolicy::Discard`].
    pub fn frames_to_write(&self) -> Option<&FrameSequence> {
        match (&self.interruption, self.policy) {
            (Some(_), AbortPolicy::Discard) => None,
            _ => Some(&self.frames),
        }
    }
}

/// Streaming frame pipeline.
pub struct Pipeline {
    assembler: FrameAssembler,
    reducer: PixelReducer,
    frames: FrameSequence,
    slack: usize,
    chunks: u64,
    started_at: DateTime<Utc>,
    metrics: Option<MetricsRegistry>,
}

impl Pipeline {
    /// Creates a pipeline; the assembly buffer is allocated here, once.
    pub fn new(stream: &StreamConfig, reduction: ReductionConfig) -> Self {
        let reducer = PixelReducer::new(stream.width, stream.height, reduction);
        let frame_size = reducer.dimensions().frame_byte_size();

        tracing::debug!(
            width = stream.width,
            height = stream.height,
            frame_size,
            slack = stream.slack_bytes,
            "Pipeline created"
        );

        Self {
            assembler: FrameAssembler::new(frame_size, stream.slack_bytes),
            reducer,
            frames: FrameSequence::new(),
            slack: stream.slack_bytes,
            chunks: 0,
            started_at: Utc::now(),
            metrics: None,
        }
    }

    /// Validates the configuration and creates a pipeline from it.
    pub fn from_config(config: &FileConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self::new(&config.stream, config.reduction.clone()))
    }

    /// Publishes progress to a Prometheus registry.
    pub fn with_metrics(mut self, registry: MetricsRegistry) -> Self {
        registry.set_buffer_capacity(self.assembler.capacity());
        self.metrics = Some(registry);
        self
    }

    /// Feeds one chunk, returning how many frames it completed.
    pub fn ingest(&mut self, chunk: &[u8]) -> Result<usize, PipelineError> {
        let reducer = &self.reducer;
        let frames = &mut self.frames;
        let mut failed = None;
        let emitted = self.assembler.ingest(chunk, |raw| {
            match reducer.reduce_frame(&raw) {
                Ok(matrix) => frames.push(matrix),
                Err(e) => {
                    failed.get_or_insert(e);
                }
            }
        })?;
        self.chunks += 1;
        if let Some(e) = failed {
            return Err(e.into());
        }

        if emitted > 0 {
            tracing::debug!(
                emitted,
                total = self.frames.len(),
                "Frames reduced"
            );
        }
        self.publish_metrics(0);
        Ok(emitted)
    }

    /// Ends the stream normally and hands over the sequence.
    pub fn finish(self) -> (FrameSequence, RunReport) {
        self.close(None, AbortPolicy::Flush)
    }

    /// Drives `source` from its start event to its end event.
    ///
    /// Upstream failures and cancellation stop ingestion; whatever was
    /// assembled so far is kept or dropped per `policy`. Only start-up
    /// failures and buffer overflow are returned as errors.
    pub fn run<S: ByteSource + ?Sized>(
        mut self,
        source: &mut S,
        cancel: &AtomicBool,
        policy: AbortPolicy,
    ) -> Result<RunOutcome, PipelineError> {
        source.open()?;
        self.started_at = Utc::now();

        // Never read more than the slack, so a read always fits.
        let mut buf = vec![0u8; self.slack.clamp(1, MAX_READ_BYTES)];
        let mut interruption = None;

        loop {
            if cancel.load(Ordering::Relaxed) {
                tracing::warn!("Run cancelled");
                interruption = Some(Interruption::Cancelled);
                break;
            }
            match source.read_chunk(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if let Err(e) = self.ingest(&buf[..n]) {
                        let _ = source.close();
                        return Err(e);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Upstream stream failed");
                    interruption = Some(Interruption::Upstream(e));
                    break;
                }
            }
        }

        if let Err(e) = source.close() {
            if interruption.is_none() {
                // A producer killed by the same Ctrl-C exits unsuccessfully.
                interruption = Some(if cancel.load(Ordering::Relaxed) {
                    Interruption::Cancelled
                } else {
                    tracing::warn!(error = %e, "Upstream producer failed");
                    Interruption::Upstream(e)
                });
            }
        }

        let (frames, report) = self.close(interruption.as_ref(), policy);
        Ok(RunOutcome {
            frames,
            report,
            interruption,
            policy,
        })
    }

    fn close(
        mut self,
        interruption: Option<&Interruption>,
        policy: AbortPolicy,
    ) -> (FrameSequence, RunReport) {
        let assembly = self.assembler.finish();
        let frames_discarded = match (interruption, policy) {
            (Some(_), AbortPolicy::Discard) => self.frames.discard() as u64,
            _ => 0,
        };

        let report = RunReport {
            frames: self.frames.len() as u64,
            chunks: self.chunks,
            bytes_ingested: assembly.bytes_ingested,
            bytes_dropped: assembly.leftover_bytes as u64,
            frames_discarded,
            interrupted: interruption.map(ToString::to_string),
            started_at: self.started_at,
            finished_at: Utc::now(),
        };
        self.publish_metrics(report.bytes_dropped);

        tracing::info!(
            frames = report.frames,
            chunks = report.chunks,
            bytes = report.bytes_ingested,
            dropped = report.bytes_dropped,
            discarded = report.frames_discarded,
            elapsed_ms = report.duration().num_milliseconds(),
            "Run finished"
        );

        (self.frames, report)
    }

    fn publish_metrics(&self, bytes_dropped: u64) {
        if let Some(registry) = &self.metrics {
            registry.update(&MetricsSnapshot::from_pipeline(self, bytes_dropped));
        }
    }

    /// Frames produced so far.
    pub fn frames(&self) -> &FrameSequence {
        &self.frames
    }

    /// The assembler's current state.
    pub fn assembler(&self) -> &FrameAssembler {
        &self.assembler
    }

    /// The reducer in use.
    pub fn reducer(&self) -> &PixelReducer {
        &self.reducer
    }

    /// Chunks ingested so far.
    pub fn chunks(&self) -> u64 {
        self.chunks
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("assembler", &self.assembler)
            .field("frames", &self.frames.len())
            .field("chunks", &self.chunks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockSource;

    fn tiny_stream() -> StreamConfig {
        StreamConfig {
            width: 2,
            height: 1,
            slack_bytes: 16,
            ..Default::default()
        }
    }

    struct FailingSource {
        chunks: Vec<Vec<u8>>,
    }

    impl ByteSource for FailingSource {
        fn open(&mut self) -> Result<(), SourceError> {
            Ok(())
        }

        fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
            if self.chunks.is_empty() {
                return Err(SourceError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "decoder died",
                )));
            }
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }

        fn close(&mut self) -> Result<(), SourceError> {
            Ok(())
        }
    }

    #[test]
    fn test_single_chunk_then_end() {
        let mut pipeline = Pipeline::new(&tiny_stream(), ReductionConfig::default());
        assert_eq!(pipeline.ingest(&[10, 10, 10, 200, 200, 200]).unwrap(), 1);
        assert_eq!(pipeline.ingest(&[]).unwrap(), 0);

        let (frames, report) = pipeline.finish();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames.get(0).unwrap().to_rows(), vec![vec![0, 1]]);
        assert_eq!(report.chunks, 2);
        assert_eq!(report.bytes_dropped, 0);
        assert!(report.completed());
    }

    #[test]
    fn test_overflow_surfaces_as_error() {
        let stream = StreamConfig {
            slack_bytes: 2,
            ..tiny_stream()
        };
        let mut pipeline = Pipeline::new(&stream, ReductionConfig::default());

        let err = pipeline.ingest(&[0u8; 9]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Assembly(AssemblyError::BufferOverflow {
                chunk_len: 9,
                capacity: 8,
                ..
            })
        ));
    }

    #[test]
    fn test_run_reports_leftover() {
        let mut data = vec![200u8; 6 * 3];
        data.extend_from_slice(&[1, 2, 3, 4]);
        let mut source = MockSource::from_bytes(data).with_chunk_sizes(vec![5]);

        let outcome = Pipeline::new(&tiny_stream(), ReductionConfig::default())
            .run(&mut source, &AtomicBool::new(false), AbortPolicy::Flush)
            .unwrap();

        assert!(outcome.interruption.is_none());
        assert_eq!(outcome.frames.len(), 3);
        assert_eq!(outcome.report.bytes_dropped, 4);
        assert_eq!(outcome.report.bytes_ingested, 22);
        assert!(outcome.frames_to_write().is_some());
    }

    #[test]
    fn test_upstream_error_flushes_assembled_frames() {
        let mut source = FailingSource {
            chunks: vec![vec![200; 6], vec![0; 3]],
        };

        let outcome = Pipeline::new(&tiny_stream(), ReductionConfig::default())
            .run(&mut source, &AtomicBool::new(false), AbortPolicy::Flush)
            .unwrap();

        assert!(matches!(
            outcome.interruption,
            Some(Interruption::Upstream(_))
        ));
        assert_eq!(outcome.frames_to_write().map(FrameSequence::len), Some(1));
        assert_eq!(outcome.report.bytes_dropped, 3);
        assert!(!outcome.report.completed());
    }

    #[test]
    fn test_upstream_error_discard_policy() {
        let mut source = FailingSource {
            chunks: vec![vec![200; 6]],
        };

        let outcome = Pipeline::new(&tiny_stream(), ReductionConfig::default())
            .run(&mut source, &AtomicBool::new(false), AbortPolicy::Discard)
            .unwrap();

        assert!(outcome.frames_to_write().is_none());
        assert!(outcome.frames.is_empty());
        assert_eq!(outcome.report.frames_discarded, 1);
    }

    #[test]
    fn test_cancelled_before_first_chunk() {
        let mut source = MockSource::new(2, 1, 4);
        let cancel = AtomicBool::new(true);

        let outcome = Pipeline::new(&tiny_stream(), ReductionConfig::default())
            .run(&mut source, &cancel, AbortPolicy::Flush)
            .unwrap();

        assert!(matches!(outcome.interruption, Some(Interruption::Cancelled)));
        assert!(outcome.frames.is_empty());
        assert_eq!(outcome.report.interrupted.as_deref(), Some("cancelled"));
    }

    #[test]
    fn test_from_config_validates() {
        let mut config = FileConfig::default();
        config.reduction.window = 9;
        assert!(matches!(
            Pipeline::from_config(&config),
            Err(PipelineError::Config(ConfigError::InvalidWindow(9)))
        ));
    }

    #[test]
    fn test_from_config_rejects_overflowing_slack() {
        let mut config = FileConfig::default();
        config.stream.slack_bytes = usize::MAX;
        assert!(matches!(
            Pipeline::from_config(&config),
            Err(PipelineError::Config(ConfigError::BufferTooLarge { .. }))
        ));
    }

    #[test]
    fn test_metrics_follow_ingest() {
        let registry = MetricsRegistry::new().unwrap();
        let mut pipeline =
            Pipeline::new(&tiny_stream(), ReductionConfig::default()).with_metrics(registry.clone());

        pipeline.ingest(&[200; 6]).unwrap();
        pipeline.ingest(&[0; 2]).unwrap();

        let output = registry.encode().unwrap();
        assert!(output.contains("bw_frames_frames_total 1"));
        assert!(output.contains("bw_frames_chunks_total 2"));
        assert!(output.contains("bw_frames_buffer_fill_bytes 2"));
        assert!(output.contains("bw_frames_buffer_capacity_bytes 22"));
    }
}
