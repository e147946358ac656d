//! Chunk-to-frame reassembly.
//!
//! Raw video pipes deliver bytes in chunks whose boundaries have nothing
//! to do with frame boundaries. A chunk may hold a fraction of a frame,
//! the tail of one frame and the head of the next, or several whole
//! frames at once. The assembler copies each chunk into one fixed buffer,
//! cuts out every complete frame, and carries the remainder forward.

use super::frame::RawFrame;
use thiserror::Error;

/// Errors raised while assembling frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    /// The chunk does not fit in the space left in the buffer.
    ///
    /// Slack is smaller than the producer's largest chunk; this is a
    /// configuration problem, not bad data.
    #[error(
        "chunk of {chunk_len} bytes does not fit: {buffered} bytes buffered, \
         capacity {capacity} (increase slack to at least the largest chunk size)"
    )]
    BufferOverflow {
        /// Length of the rejected chunk.
        chunk_len: usize,
        /// Bytes already held when it arrived.
        buffered: usize,
        /// Total buffer capacity.
        capacity: usize,
    },
}

/// Summary returned by [`FrameAssembler::finish`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    /// Frames emitted over the whole stream.
    pub frames_emitted: u64,
    /// Bytes accepted over the whole stream.
    pub bytes_ingested: u64,
    /// Trailing bytes that never formed a full frame.
    pub leftover_bytes: usize,
}

/// Reassembles fixed-size frames from an arbitrarily chunked stream.
///
/// The buffer is allocated once with capacity `frame_size + slack` and
/// never grows. Bytes `[0, buffered)` are always valid and in stream
/// order. Calls must be sequential; there is no internal locking.
pub struct FrameAssembler {
    buffer: Box<[u8]>,
    buffered: usize,
    frame_size: usize,
    next_sequence: u64,
    bytes_ingested: u64,
}

impl FrameAssembler {
    /// Creates an assembler for frames of `frame_size` bytes.
    ///
    /// `slack` must be at least the largest chunk the producer will
    /// deliver, otherwise [`AssemblyError::BufferOverflow`] follows.
    /// Sizes come from a validated [`StreamConfig`], which bounds
    /// `frame_size + slack` by
    /// [`MAX_BUFFER_BYTES`](crate::source::MAX_BUFFER_BYTES).
    ///
    /// [`StreamConfig`]: crate::source::StreamConfig
    pub fn new(frame_size: usize, slack: usize) -> Self {
        debug_assert!(frame_size > 0, "frame size must be non-zero");
        Self {
            buffer: vec![0u8; frame_size + slack].into_boxed_slice(),
            buffered: 0,
            frame_size,
            next_sequence: 0,
            bytes_ingested: 0,
        }
    }

    /// Appends `chunk` and emits every frame it completes, in order.
    ///
    /// Returns the number of frames emitted, which may be zero or more
    /// than one. On overflow nothing is copied and the buffered bytes are
    /// left untouched.
    pub fn ingest<F>(&mut self, chunk: &[u8], mut emit: F) -> Result<usize, AssemblyError>
    where
        F: FnMut(RawFrame),
    {
        if chunk.len() > self.remaining_capacity() {
            return Err(AssemblyError::BufferOverflow {
                chunk_len: chunk.len(),
                buffered: self.buffered,
                capacity: self.capacity(),
            });
        }

        let end = self.buffered + chunk.len();
        self.buffer[self.buffered..end].copy_from_slice(chunk);
        self.buffered = end;
        self.bytes_ingested += chunk.len() as u64;

        // Cut frames from the front, then compact once.
        let mut start = 0;
        let mut emitted = 0;
        while self.frame_size > 0 && self.buffered - start >= self.frame_size {
            let frame = self.buffer[start..start + self.frame_size].to_vec();
            emit(RawFrame::new(frame, self.next_sequence));
            self.next_sequence += 1;
            start += self.frame_size;
            emitted += 1;
        }

        if start > 0 {
            self.buffer.copy_within(start..self.buffered, 0);
            self.buffered -= start;
        }

        tracing::trace!(
            chunk_len = chunk.len(),
            frames = emitted,
            buffered = self.buffered,
            "Ingested chunk"
        );

        Ok(emitted)
    }

    /// Ends the stream, dropping any incomplete trailing frame.
    ///
    /// A stream that stops mid-frame is normal for media pipes, so the
    /// leftover is reported rather than treated as an error. The
    /// assembler is ready for a new stream afterwards.
    pub fn finish(&mut self) -> AssemblyReport {
        let report = AssemblyReport {
            frames_emitted: self.next_sequence,
            bytes_ingested: self.bytes_ingested,
            leftover_bytes: self.buffered,
        };

        if report.leftover_bytes > 0 {
            tracing::info!(
                leftover = report.leftover_bytes,
                frame_size = self.frame_size,
                "Dropped incomplete trailing frame"
            );
        }

        self.reset();
        report
    }

    fn reset(&mut self) {
        self.buffered = 0;
        self.next_sequence = 0;
        self.bytes_ingested = 0;
    }

    /// Bytes currently held that do not yet form a frame.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.buffered
    }

    /// Total buffer capacity (`frame_size + slack`).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Largest chunk the next `ingest` accepts.
    #[inline]
    pub fn remaining_capacity(&self) -> usize {
        self.capacity() - self.buffered
    }

    /// Size of one frame in bytes.
    #[inline]
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Frames emitted since the stream started.
    #[inline]
    pub fn frames_emitted(&self) -> u64 {
        self.next_sequence
    }

    /// Bytes accepted since the stream started.
    #[inline]
    pub fn bytes_ingested(&self) -> u64 {
        self.bytes_ingested
    }
}

impl std::fmt::Debug for FrameAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameAssembler")
            .field("frame_size", &self.frame_size)
            .field("capacity", &self.capacity())
            .field("buffered", &self.buffered)
            .field("frames_emitted", &self.next_sequence)
            .finish()
    }
}
