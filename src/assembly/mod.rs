//! Frame reassembly from a chunked byte stream.
//!
//! The producer's chunks are not aligned to frames. This module turns
//! them back into a sequence of exactly-one-frame byte vectors, in
//! stream order, using a single bounded buffer.

mod assembler;
mod frame;

pub use assembler::{AssemblyError, AssemblyReport, FrameAssembler};
pub use frame::{FrameDimensions, RawFrame};
