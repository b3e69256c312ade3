//! Typed payloads of the built-in message kinds.

use crate::clock::{ClockTime, ClockTimeDiff};

/// Unit of positions, sizes and amounts carried by messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// No format.
    #[default]
    Undefined,
    /// Producer-specific default unit (samples, frames).
    Default,
    /// Bytes.
    Bytes,
    /// Nanoseconds.
    Time,
    /// Buffers.
    Buffers,
    /// Percent of the total.
    Percent,
}

// ============================================================================
// Stream start
// ============================================================================

/// Flags of a stream-start message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StreamFlags(u32);

impl StreamFlags {
    /// No special flags.
    pub const NONE: Self = Self(0);
    /// Sparse stream (e.g., subtitles).
    pub const SPARSE: Self = Self(1 << 0);
    /// Should be selected by default.
    pub const SELECT: Self = Self(1 << 1);
    /// Should not be selected by default.
    pub const UNSELECT: Self = Self(1 << 2);

    /// Create empty flags.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Check if contains a flag.
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of flags.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Start of a new logical stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamStart {
    /// Unique stream identifier.
    pub stream_id: String,
    /// Stream flags.
    pub flags: StreamFlags,
    /// Group of streams meant to be played together.
    pub group_id: Option<u32>,
}

impl StreamStart {
    /// Stream start without flags or group.
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            flags: StreamFlags::empty(),
            group_id: None,
        }
    }
}

// ============================================================================
// Segment
// ============================================================================

/// Playback segment announced downstream before data.
///
/// Positions are in `format` units; `stop` of `None` means open-ended.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// This segment updates the previous one instead of replacing it.
    pub update: bool,
    /// Requested playback rate, never zero.
    pub rate: f64,
    /// Rate already applied to the data, never zero.
    pub applied_rate: f64,
    /// Unit of the positions.
    pub format: Format,
    /// First position of the segment.
    pub start: u64,
    /// Last position of the segment.
    pub stop: Option<u64>,
    /// Stream time corresponding to `start`.
    pub time: u64,
}

impl Segment {
    /// Open-ended time segment at normal rate.
    pub fn new_time(start: ClockTime, stop: Option<ClockTime>) -> Self {
        Self {
            update: false,
            rate: 1.0,
            applied_rate: 1.0,
            format: Format::Time,
            start: start.nanos(),
            stop: stop.map(ClockTime::nanos),
            time: start.nanos(),
        }
    }

    /// Byte segment at normal rate.
    pub fn new_bytes(start: u64, stop: Option<u64>) -> Self {
        Self {
            update: false,
            rate: 1.0,
            applied_rate: 1.0,
            format: Format::Bytes,
            start,
            stop,
            time: 0,
        }
    }

    /// Set the playback rate.
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }
}

impl Default for Segment {
    fn default() -> Self {
        Self::new_time(ClockTime::ZERO, None)
    }
}

// ============================================================================
// Buffer size
// ============================================================================

/// Downstream hint about the buffering a consumer should provide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferSize {
    /// Unit of the sizes.
    pub format: Format,
    /// Minimum amount to buffer.
    pub min_size: i64,
    /// Maximum amount to buffer.
    pub max_size: i64,
    /// Buffering is done asynchronously.
    pub is_async: bool,
}

// ============================================================================
// Gap
// ============================================================================

/// No data will arrive for a stretch of stream time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    /// Start of the gap.
    pub timestamp: ClockTime,
    /// Length of the gap, if known.
    pub duration: Option<ClockTime>,
}

// ============================================================================
// QoS
// ============================================================================

/// Kind of QoS report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QosType {
    /// Data arrives faster than it can be processed.
    #[default]
    Overflow,
    /// Data arrives too late.
    Underflow,
    /// The producer is asked to lower its rate.
    Throttle,
}

/// Quality-of-service feedback sent upstream by a consumer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Qos {
    /// Kind of report.
    pub qos_type: QosType,
    /// Long-term ratio of processing speed to real time.
    pub proportion: f64,
    /// Lateness of the reported buffer; negative means early.
    pub diff: ClockTimeDiff,
    /// Timestamp of the reported buffer.
    pub timestamp: ClockTime,
}

// ============================================================================
// Seek
// ============================================================================

/// Flags of a seek request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SeekFlags(u32);

impl SeekFlags {
    /// No special flags.
    pub const NONE: Self = Self(0);
    /// Flush pipeline before seek.
    pub const FLUSH: Self = Self(1 << 0);
    /// Seek to exact position (may be slower).
    pub const ACCURATE: Self = Self(1 << 1);
    /// Seek to nearest keyframe.
    pub const KEY_UNIT: Self = Self(1 << 2);
    /// Segment seek: post a segment-done instead of EOS.
    pub const SEGMENT: Self = Self(1 << 3);
    /// Skip intermediate data when playing fast.
    pub const SKIP: Self = Self(1 << 4);

    /// Create empty flags.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Check if empty.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Check if contains a flag.
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of flags.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// How a seek position is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SeekType {
    /// Don't change this position.
    #[default]
    None,
    /// Absolute position.
    Set,
    /// Relative to end.
    End,
}

/// Start or stop position of a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeekPosition {
    /// Interpretation of `position`.
    pub seek_type: SeekType,
    /// Position value.
    pub position: i64,
}

impl SeekPosition {
    /// Absolute position.
    pub fn set(position: i64) -> Self {
        Self {
            seek_type: SeekType::Set,
            position,
        }
    }

    /// Position relative to the end.
    pub fn end(offset: i64) -> Self {
        Self {
            seek_type: SeekType::End,
            position: offset,
        }
    }

    /// Leave the position unchanged.
    pub fn none() -> Self {
        Self {
            seek_type: SeekType::None,
            position: -1,
        }
    }
}

/// Request sent upstream to reposition the stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seek {
    /// New playback rate; negative plays backwards, never zero.
    pub rate: f64,
    /// Unit of the positions.
    pub format: Format,
    /// Seek flags.
    pub flags: SeekFlags,
    /// New start position.
    pub start: SeekPosition,
    /// New stop position.
    pub stop: SeekPosition,
}

impl Seek {
    /// Flushing keyframe seek to a time position.
    pub fn new_time(position: ClockTime) -> Self {
        Self {
            rate: 1.0,
            format: Format::Time,
            flags: SeekFlags::FLUSH.union(SeekFlags::KEY_UNIT),
            start: SeekPosition::set(i64::try_from(position.nanos()).unwrap_or(i64::MAX)),
            stop: SeekPosition::none(),
        }
    }

    /// Set the seek rate.
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Set seek flags.
    pub fn with_flags(mut self, flags: SeekFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the stop position.
    pub fn with_stop(mut self, stop: SeekPosition) -> Self {
        self.stop = stop;
        self
    }
}

// ============================================================================
// Step
// ============================================================================

/// Request to advance the stream by an amount without playing it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    /// Unit of `amount`.
    pub format: Format,
    /// Amount to skip.
    pub amount: u64,
    /// Rate of the step, always positive.
    pub rate: f64,
    /// Flush data queued before the step.
    pub flush: bool,
    /// Part of a larger stepping operation.
    pub intermediate: bool,
}
