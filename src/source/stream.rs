//! Byte source abstraction for the raw pixel stream.
//!
//! The decoder is an external process; this module only models its
//! session: a start event (`open`), zero or more data events
//! (`read_chunk` returning a positive length) and a single end event
//! (`read_chunk` returning 0).

use std::io::{self, Read};
use thiserror::Error;

/// Errors raised by the upstream producer.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The producer process could not be started.
    #[error("failed to start producer `{program}`: {source}")]
    Spawn {
        /// Executable that was launched.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Reading the stream failed.
    #[error("failed to read from producer: {0}")]
    Io(#[from] io::Error),
    /// The producer finished unsuccessfully.
    #[error("producer exited with {status}: {stderr}")]
    Exited {
        /// Exit status as reported by the OS.
        status: String,
        /// Tail of the producer's stderr.
        stderr: String,
    },
    /// `read_chunk` was called before `open`.
    #[error("source not opened")]
    NotOpen,
}

/// Trait for upstream byte producers.
///
/// Chunk boundaries carry no meaning; they are whatever the underlying
/// pipe or file hands back.
pub trait ByteSource {
    /// Starts the producer.
    fn open(&mut self) -> Result<(), SourceError>;

    /// Reads the next chunk into `buf`, returning its length.
    ///
    /// `Ok(0)` signals end of stream; no data follows it.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, SourceError>;

    /// Stops the producer and reports how it terminated.
    fn close(&mut self) -> Result<(), SourceError>;
}

/// Source over any [`Read`] implementation (stdin, a raw dump on disk).
#[derive(Debug)]
pub struct ReaderSource<R> {
    reader: R,
    finished: bool,
}

impl<R: Read> ReaderSource<R> {
    /// Wraps `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            finished: false,
        }
    }

    /// Returns the wrapped reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl ReaderSource<io::Stdin> {
    /// Reads raw frames piped into this process.
    pub fn stdin() -> Self {
        Self::new(io::stdin())
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn open(&mut self) -> Result<(), SourceError> {
        self.finished = false;
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        if self.finished {
            return Ok(0);
        }
        loop {
            match self.reader.read(buf) {
                Ok(0) => {
                    self.finished = true;
                    return Ok(0);
                }
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn close(&mut self) -> Result<(), SourceError> {
        self.finished = true;
        Ok(())
    }
}

/// Synthetic RGB24 producer for testing and demos.
///
/// Emits `frame_count` frames of a deterministic pattern and hands them
/// out in a repeating list of chunk sizes, so frame boundaries land at
/// arbitrary offsets inside chunks.
#[derive(Debug)]
pub struct MockSource {
    data: Vec<u8>,
    position: usize,
    chunk_sizes: Vec<usize>,
    next_chunk: usize,
    open: bool,
}

impl MockSource {
    /// Creates a source of `frame_count` frames of `width x height` RGB24.
    pub fn new(width: u32, height: u32, frame_count: usize) -> Self {
        let frame_len = width as usize * height as usize * 3;
        let data = (0..frame_count)
            .flat_map(|frame| {
                (0..frame_len).map(move |i| {
                    // Bright/dark bands that shift by one pixel per frame.
                    let pixel = i / 3 + frame;
                    if (pixel / 4) % 2 == 0 {
                        220
                    } else {
                        (pixel % 97) as u8
                    }
                })
            })
            .collect();
        Self::from_bytes(data)
    }

    /// Wraps an explicit byte stream.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            position: 0,
            chunk_sizes: vec![4096],
            next_chunk: 0,
            open: false,
        }
    }

    /// Sets the repeating chunk-size pattern. Zero sizes are skipped.
    pub fn with_chunk_sizes(mut self, sizes: Vec<usize>) -> Self {
        let sizes: Vec<usize> = sizes.into_iter().filter(|&s| s > 0).collect();
        if !sizes.is_empty() {
            self.chunk_sizes = sizes;
        }
        self
    }

    /// Total bytes the source will deliver.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the source has nothing to deliver.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ByteSource for MockSource {
    fn open(&mut self) -> Result<(), SourceError> {
        self.position = 0;
        self.next_chunk = 0;
        self.open = true;
        tracing::info!(bytes = self.data.len(), "MockSource opened");
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        if !self.open {
            return Err(SourceError::NotOpen);
        }
        let wanted = self.chunk_sizes[self.next_chunk % self.chunk_sizes.len()];
        self.next_chunk += 1;

        let remaining = self.data.len() - self.position;
        let n = wanted.min(remaining).min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }

    fn close(&mut self) -> Result<(), SourceError> {
        self.open = false;
        tracing::info!("MockSource closed");
        Ok(())
    }
}
