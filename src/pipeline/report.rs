//! End-of-run summary and abort policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What happens to frames already built when a run is cut short by an
/// upstream failure or cancellation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbortPolicy {
    /// Hand the partial sequence to the sink.
    #[default]
    Flush,
    /// Drop everything; nothing is written.
    Discard,
}

impl FromStr for AbortPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flush" => Ok(Self::Flush),
            "discard" => Ok(Self::Discard),
            other => Err(format!("unknown abort policy `{}` (flush, discard)", other)),
        }
    }
}

/// Statistics of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Frames in the final sequence.
    pub frames: u64,
    /// Data chunks received.
    pub chunks: u64,
    /// Bytes received.
    pub bytes_ingested: u64,
    /// Trailing bytes that never formed a whole frame.
    pub bytes_dropped: u64,
    /// Frames thrown away under [`AbortPolicy::Discard`].
    pub frames_discarded: u64,
    /// Why the run ended early, if it did.
    pub interrupted: Option<String>,
    /// When the source was opened.
    pub started_at: DateTime<Utc>,
    /// When the end event (or interruption) was handled.
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Wall-clock duration of the run.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Returns true if the stream ran to its end event.
    pub fn completed(&self) -> bool {
        self.interrupted.is_none()
    }
}
