//! Run driver and its outputs.
//!
//! The [`Pipeline`] owns the assembler, the reducer and the growing
//! [`FrameSequence`]. It can be fed chunk by chunk through
//! [`Pipeline::ingest`] / [`Pipeline::finish`], or left to pull from a
//! [`ByteSource`](crate::source::ByteSource) with [`Pipeline::run`].

mod driver;
mod report;
mod sequence;

pub use driver::{Interruption, Pipeline, PipelineError, RunOutcome};
pub use report::{AbortPolicy, RunReport};
pub use sequence::FrameSequence;
