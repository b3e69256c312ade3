//! Queue limits, levels and configuration.

use crate::clock::ClockTime;

/// Per-dimension limits. A zero dimension is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueLimits {
    /// Number of buffers.
    pub buffers: u32,
    /// Total payload bytes.
    pub bytes: u64,
    /// Total known buffer duration.
    pub time: ClockTime,
}

impl QueueLimits {
    /// Every dimension disabled.
    pub const DISABLED: Self = Self {
        buffers: 0,
        bytes: 0,
        time: ClockTime::ZERO,
    };

    /// Limits with every dimension set.
    pub const fn new(buffers: u32, bytes: u64, time: ClockTime) -> Self {
        Self {
            buffers,
            bytes,
            time,
        }
    }

    /// Whether every dimension is disabled.
    pub fn is_disabled(&self) -> bool {
        *self == Self::DISABLED
    }

    /// Whether any enabled dimension of `level` is at or over its limit.
    pub fn reached_by(&self, level: &QueueLevel) -> bool {
        (self.buffers > 0 && level.buffers >= self.buffers)
            || (self.bytes > 0 && level.bytes >= self.bytes)
            || (self.time > ClockTime::ZERO && level.time >= self.time)
    }

    /// Whether any enabled dimension of `level` is below its limit.
    pub fn unmet_by(&self, level: &QueueLevel) -> bool {
        (self.buffers > 0 && level.buffers < self.buffers)
            || (self.bytes > 0 && level.bytes < self.bytes)
            || (self.time > ClockTime::ZERO && level.time < self.time)
    }
}

/// Current fill of a queue. Control messages are not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueLevel {
    /// Queued buffers.
    pub buffers: u32,
    /// Queued payload bytes.
    pub bytes: u64,
    /// Sum of known durations of queued buffers.
    pub time: ClockTime,
}

impl QueueLevel {
    /// Whether nothing is counted.
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn add(&mut self, bytes: u64, duration: Option<ClockTime>) {
        self.buffers = self.buffers.saturating_add(1);
        self.bytes = self.bytes.saturating_add(bytes);
        if let Some(duration) = duration {
            self.time += duration;
        }
    }

    pub(crate) fn sub(&mut self, bytes: u64, duration: Option<ClockTime>) {
        self.buffers = self.buffers.saturating_sub(1);
        self.bytes = self.bytes.saturating_sub(bytes);
        if let Some(duration) = duration {
            self.time -= duration;
        }
    }
}

/// What a queue does with data when it is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LeakyMode {
    /// Block the feeder until space is available.
    #[default]
    None,
    /// Drop the incoming item.
    Upstream,
    /// Drop the oldest queued buffers.
    Downstream,
}

/// Configuration of a [`BoundedQueue`](super::BoundedQueue).
///
/// # Example
///
/// ```rust
/// use sluice::clock::ClockTime;
/// use sluice::queue::{BoundedQueue, LeakyMode, QueueSettings};
///
/// let settings = QueueSettings::default()
///     .max_buffers(50)
///     .max_bytes(0)
///     .max_time(ClockTime::from_millis(500))
///     .leaky(LeakyMode::Downstream)
///     .name("video-queue");
///
/// let queue = BoundedQueue::with_settings(settings);
/// assert_eq!(queue.name(), "video-queue");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    /// Queue name used in logs and metric labels.
    pub name: Option<String>,
    /// Upper limits; reaching any one fills the queue.
    pub max_size: QueueLimits,
    /// Lower limits; below any one the queue reads as empty.
    pub min_threshold: QueueLimits,
    /// Overflow policy.
    pub leaky: LeakyMode,
    /// Percent below which the queue starts buffering.
    pub low_watermark: u32,
    /// Percent at which the queue stops buffering.
    pub high_watermark: u32,
}

/// Default maximum number of buffers.
pub const DEFAULT_MAX_BUFFERS: u32 = 200;
/// Default maximum payload bytes.
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
/// Default maximum queued time.
pub const DEFAULT_MAX_TIME: ClockTime = ClockTime::SECOND;
/// Default low buffering watermark, in percent.
pub const DEFAULT_LOW_WATERMARK: u32 = 10;
/// Default high buffering watermark, in percent.
pub const DEFAULT_HIGH_WATERMARK: u32 = 99;

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            name: None,
            max_size: QueueLimits::new(DEFAULT_MAX_BUFFERS, DEFAULT_MAX_BYTES, DEFAULT_MAX_TIME),
            min_threshold: QueueLimits::DISABLED,
            leaky: LeakyMode::None,
            low_watermark: DEFAULT_LOW_WATERMARK,
            high_watermark: DEFAULT_HIGH_WATERMARK,
        }
    }
}

impl QueueSettings {
    /// Set the queue name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set all upper limits.
    pub fn max_size(mut self, limits: QueueLimits) -> Self {
        self.max_size = limits;
        self
    }

    /// Set the buffer-count limit (0 disables it).
    pub fn max_buffers(mut self, buffers: u32) -> Self {
        self.max_size.buffers = buffers;
        self
    }

    /// Set the byte limit (0 disables it).
    pub fn max_bytes(mut self, bytes: u64) -> Self {
        self.max_size.bytes = bytes;
        self
    }

    /// Set the time limit (zero disables it).
    pub fn max_time(mut self, time: ClockTime) -> Self {
        self.max_size.time = time;
        self
    }

    /// Set all lower thresholds.
    pub fn min_threshold(mut self, limits: QueueLimits) -> Self {
        self.min_threshold = limits;
        self
    }

    /// Set the overflow policy.
    pub fn leaky(mut self, mode: LeakyMode) -> Self {
        self.leaky = mode;
        self
    }

    /// Set the buffering watermarks, in percent.
    pub fn buffering_watermarks(mut self, low: u32, high: u32) -> Self {
        self.low_watermark = low;
        self.high_watermark = high;
        self
    }
}
