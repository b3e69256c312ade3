//! Metrics collection using metrics-rs.

use metrics::{Counter, Gauge, Unit, counter, gauge};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::queue::QueueLevel;

/// Whether metrics have been initialized.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

// Metric names as constants for consistency
const QUEUE_PUSHED: &str = "sluice_queue_pushed";
const QUEUE_POPPED: &str = "sluice_queue_popped";
const QUEUE_DROPPED: &str = "sluice_queue_dropped";
const QUEUE_OVERRUNS: &str = "sluice_queue_overruns";
const QUEUE_UNDERRUNS: &str = "sluice_queue_underruns";
const QUEUE_LEVEL_BUFFERS: &str = "sluice_queue_level_buffers";
const QUEUE_LEVEL_BYTES: &str = "sluice_queue_level_bytes";
const QUEUE_LEVEL_TIME_NS: &str = "sluice_queue_level_time_ns";
const QUEUE_BUFFERING_PERCENT: &str = "sluice_queue_buffering_percent";

/// Initialize metrics descriptions.
///
/// Call this once at application startup before using any metrics.
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    metrics::describe_counter!(QUEUE_PUSHED, Unit::Count, "Items accepted by queues");
    metrics::describe_counter!(QUEUE_POPPED, Unit::Count, "Items handed out by queues");
    metrics::describe_counter!(
        QUEUE_DROPPED,
        Unit::Count,
        "Buffers dropped by leaky queues"
    );
    metrics::describe_counter!(
        QUEUE_OVERRUNS,
        Unit::Count,
        "Buffers that arrived at a filled queue"
    );
    metrics::describe_counter!(
        QUEUE_UNDERRUNS,
        Unit::Count,
        "Pops that found the queue empty"
    );
    metrics::describe_gauge!(QUEUE_LEVEL_BUFFERS, Unit::Count, "Buffers currently queued");
    metrics::describe_gauge!(QUEUE_LEVEL_BYTES, Unit::Bytes, "Payload bytes currently queued");
    metrics::describe_gauge!(
        QUEUE_LEVEL_TIME_NS,
        Unit::Nanoseconds,
        "Buffer duration currently queued"
    );
    metrics::describe_gauge!(
        QUEUE_BUFFERING_PERCENT,
        Unit::Percent,
        "Last reported buffering progress"
    );
}

/// Metrics handles for one queue, labelled with its name.
#[derive(Clone)]
pub struct QueueMetrics {
    queue: String,
    pushed: Counter,
    popped: Counter,
    dropped: Counter,
    overruns: Counter,
    underruns: Counter,
    level_buffers: Gauge,
    level_bytes: Gauge,
    level_time: Gauge,
    buffering: Gauge,
}

impl QueueMetrics {
    /// Create the handles for queue `name`.
    pub fn new(name: &str) -> Self {
        Self {
            queue: name.to_string(),
            pushed: counter!(QUEUE_PUSHED, "queue" => name.to_string()),
            popped: counter!(QUEUE_POPPED, "queue" => name.to_string()),
            dropped: counter!(QUEUE_DROPPED, "queue" => name.to_string()),
            overruns: counter!(QUEUE_OVERRUNS, "queue" => name.to_string()),
            underruns: counter!(QUEUE_UNDERRUNS, "queue" => name.to_string()),
            level_buffers: gauge!(QUEUE_LEVEL_BUFFERS, "queue" => name.to_string()),
            level_bytes: gauge!(QUEUE_LEVEL_BYTES, "queue" => name.to_string()),
            level_time: gauge!(QUEUE_LEVEL_TIME_NS, "queue" => name.to_string()),
            buffering: gauge!(QUEUE_BUFFERING_PERCENT, "queue" => name.to_string()),
        }
    }

    /// Record an accepted item.
    #[inline]
    pub fn record_push(&self) {
        self.pushed.increment(1);
    }

    /// Record a handed-out item.
    #[inline]
    pub fn record_pop(&self) {
        self.popped.increment(1);
    }

    /// Record leaked buffers.
    #[inline]
    pub fn record_dropped(&self, count: u64) {
        self.dropped.increment(count);
    }

    /// Record an overrun.
    #[inline]
    pub fn record_overrun(&self) {
        self.overruns.increment(1);
    }

    /// Record an underrun.
    #[inline]
    pub fn record_underrun(&self) {
        self.underruns.increment(1);
    }

    /// Publish the current level.
    #[inline]
    pub fn record_level(&self, level: &QueueLevel) {
        self.level_buffers.set(f64::from(level.buffers));
        self.level_bytes.set(level.bytes as f64);
        self.level_time.set(level.time.nanos() as f64);
    }

    /// Publish buffering progress.
    #[inline]
    pub fn record_buffering(&self, percent: u32) {
        self.buffering.set(f64::from(percent));
    }

    /// Get the queue name.
    pub fn queue(&self) -> &str {
        &self.queue
    }
}

impl std::fmt::Debug for QueueMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueMetrics")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
