//! Metrics collection and registry.

use crate::pipeline::Pipeline;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registering or encoding a metric failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of pipeline state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Frames reduced so far.
    pub frames: u64,
    /// Chunks ingested so far.
    pub chunks: u64,
    /// Bytes ingested so far.
    pub bytes_ingested: u64,
    /// Trailing bytes dropped at end of stream.
    pub bytes_dropped: u64,
    /// Bytes waiting in the assembly buffer.
    pub buffered_bytes: usize,
    /// White fraction of the latest frame.
    pub white_ratio: Option<f64>,
}

impl MetricsSnapshot {
    /// Captures the current state of a pipeline.
    pub fn from_pipeline(pipeline: &Pipeline, bytes_dropped: u64) -> Self {
        let assembler = pipeline.assembler();
        Self {
            frames: pipeline.frames().len() as u64,
            chunks: pipeline.chunks(),
            bytes_ingested: assembler.bytes_ingested(),
            bytes_dropped,
            buffered_bytes: assembler.buffered(),
            white_ratio: pipeline.frames().last().map(|m| m.white_ratio()),
        }
    }
}

/// Prometheus metrics registry for the frame pipeline.
///
/// Cloning shares the underlying metrics.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,

    // Throughput
    frames_total: IntCounter,
    chunks_total: IntCounter,
    bytes_ingested_total: IntCounter,
    bytes_dropped_total: IntCounter,

    // Buffer
    buffer_fill_bytes: IntGauge,
    buffer_capacity_bytes: IntGauge,

    // Content
    white_ratio: Gauge,
}

impl MetricsRegistry {
    /// Creates a new registry with all pipeline metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_total = IntCounter::new(
            "bw_frames_frames_total",
            "Total number of frames reduced",
        )?;
        let chunks_total = IntCounter::new(
            "bw_frames_chunks_total",
            "Total number of chunks received from the producer",
        )?;
        let bytes_ingested_total = IntCounter::new(
            "bw_frames_bytes_ingested_total",
            "Total bytes received from the producer",
        )?;
        let bytes_dropped_total = IntCounter::new(
            "bw_frames_bytes_dropped_total",
            "Trailing bytes dropped because they did not form a whole frame",
        )?;

        let buffer_fill_bytes = IntGauge::new(
            "bw_frames_buffer_fill_bytes",
            "Bytes currently held in the assembly buffer",
        )?;
        let buffer_capacity_bytes = IntGauge::new(
            "bw_frames_buffer_capacity_bytes",
            "Capacity of the assembly buffer (frame size plus slack)",
        )?;

        let white_ratio = Gauge::new(
            "bw_frames_white_ratio",
            "Fraction of white pixels in the latest frame",
        )?;

        registry.register(Box::new(frames_total.clone()))?;
        registry.register(Box::new(chunks_total.clone()))?;
        registry.register(Box::new(bytes_ingested_total.clone()))?;
        registry.register(Box::new(bytes_dropped_total.clone()))?;
        registry.register(Box::new(buffer_fill_bytes.clone()))?;
        registry.register(Box::new(buffer_capacity_bytes.clone()))?;
        registry.register(Box::new(white_ratio.clone()))?;

        Ok(Self {
            registry,
            frames_total,
            chunks_total,
            bytes_ingested_total,
            bytes_dropped_total,
            buffer_fill_bytes,
            buffer_capacity_bytes,
            white_ratio,
        })
    }

    /// Updates all metrics from a snapshot of pipeline state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        // Counters only move forward: add the difference.
        advance(&self.frames_total, snapshot.frames);
        advance(&self.chunks_total, snapshot.chunks);
        advance(&self.bytes_ingested_total, snapshot.bytes_ingested);
        advance(&self.bytes_dropped_total, snapshot.bytes_dropped);

        self.buffer_fill_bytes.set(snapshot.buffered_bytes as i64);

        if let Some(ratio) = snapshot.white_ratio {
            self.white_ratio.set(ratio);
        }
    }

    /// Records the assembly buffer capacity.
    pub fn set_buffer_capacity(&self, bytes: usize) {
        self.buffer_capacity_bytes.set(bytes as i64);
    }

    /// Frames counted so far.
    pub fn frames(&self) -> u64 {
        self.frames_total.get()
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, target: u64) {
    let current = counter.get();
    if target > current {
        counter.inc_by(target - current);
    }
}
