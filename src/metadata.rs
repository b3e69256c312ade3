//! Buffer metadata types.

use crate::clock::ClockTime;

/// Per-buffer metadata read by queues and consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Duration of this buffer's content. Counted toward queue time levels
    /// when known.
    pub duration: Option<ClockTime>,

    /// Monotonic sequence number within a stream.
    pub sequence: u64,
}

impl Metadata {
    /// Create new metadata with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create metadata with a sequence number.
    pub fn with_sequence(sequence: u64) -> Self {
        Self {
            sequence,
            ..Default::default()
        }
    }

    /// Set the duration.
    pub fn with_duration(mut self, duration: ClockTime) -> Self {
        self.duration = Some(duration);
        self
    }
}
