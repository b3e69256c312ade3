//! The bounded queue between two pipeline stages.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use super::{LeakyMode, QueueItem, QueueLevel, QueueLimits, QueueObserver, QueueSettings};
use crate::clock::ClockTime;
use crate::error::{Error, FlowError, Result};
use crate::message::MessageType;
use crate::observability::{QueueMetrics, instrument_queue, trace_leak, trace_state_change};

/// Dataflow state of a queue or connection point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Items flow.
    Active,
    /// Between flush-start and flush-stop; every operation is refused.
    Flushing,
    /// Deactivated.
    Stopped,
}

impl ConnectionState {
    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            ConnectionState::Active => "active",
            ConnectionState::Flushing => "flushing",
            ConnectionState::Stopped => "stopped",
        }
    }
}

/// A FIFO of buffers and serialized messages with backpressure.
///
/// One feeder thread pushes and one drainer thread pops. Buffers count
/// toward the level in three dimensions (buffers, bytes, time); messages
/// travel in order but are weightless. When the queue is filled, a pushed
/// buffer blocks or leaks depending on [`LeakyMode`]. When it reads empty,
/// `pop` blocks. A flush unblocks both sides.
///
/// Cloning a `BoundedQueue` yields another handle to the same queue.
///
/// # Example
///
/// ```rust
/// use sluice::buffer::Buffer;
/// use sluice::message::ControlMessage;
/// use sluice::metadata::Metadata;
/// use sluice::queue::BoundedQueue;
///
/// let queue = BoundedQueue::new(10);
/// queue.push(Buffer::from_slice(b"abc", Metadata::with_sequence(0))).unwrap();
/// queue.push(ControlMessage::new_eos()).unwrap();
///
/// assert_eq!(queue.level().buffers, 1);
/// assert!(queue.pop().unwrap().is_buffer());
/// assert!(queue.pop().unwrap().is_eos());
/// ```
#[derive(Clone)]
pub struct BoundedQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    name: String,
    state: Mutex<QueueState>,
    item_added: Condvar,
    item_removed: Condvar,
    metrics: QueueMetrics,
}

struct QueueState {
    items: VecDeque<QueueItem>,
    level: QueueLevel,
    max_size: QueueLimits,
    min_threshold: QueueLimits,
    leaky: LeakyMode,
    flushing: bool,
    stopped: bool,
    eos: bool,
    low_watermark: u32,
    high_watermark: u32,
    buffering: bool,
    /// Last reported unscaled buffering percent.
    buffering_percent: u32,
    total_pushed: u64,
    total_popped: u64,
    total_dropped: u64,
    observer: Option<Arc<dyn QueueObserver>>,
}

/// Statistics about queue operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Current level.
    pub level: QueueLevel,
    /// Queued items, messages included.
    pub items: usize,
    /// Total items accepted.
    pub total_pushed: u64,
    /// Total items handed out.
    pub total_popped: u64,
    /// Total buffers dropped by leaking.
    pub total_dropped: u64,
}

fn default_name() -> String {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    format!("queue{}", NEXT.fetch_add(1, Ordering::Relaxed))
}

impl QueueState {
    fn state(&self) -> ConnectionState {
        if self.stopped {
            ConnectionState::Stopped
        } else if self.flushing {
            ConnectionState::Flushing
        } else {
            ConnectionState::Active
        }
    }

    fn check_running(&self) -> std::result::Result<(), FlowError> {
        if self.flushing || self.stopped {
            Err(FlowError::WrongState)
        } else {
            Ok(())
        }
    }

    fn is_filled(&self) -> bool {
        self.max_size.reached_by(&self.level)
    }

    /// A populated queue still reads as empty while below a min threshold,
    /// unless EOS is queued.
    fn is_empty(&self) -> bool {
        self.items.is_empty() || (!self.eos && self.min_threshold.unmet_by(&self.level))
    }

    fn enqueue(&mut self, item: QueueItem) {
        if item.is_buffer() {
            self.level.add(item.size(), item.duration());
        }
        self.items.push_back(item);
        self.total_pushed += 1;
    }

    fn dequeue(&mut self) -> Option<QueueItem> {
        let item = self.items.pop_front()?;
        if item.is_buffer() {
            self.level.sub(item.size(), item.duration());
        }
        self.total_popped += 1;
        Some(item)
    }

    /// Remove the first buffer, skipping over messages.
    fn leak_head_buffer(&mut self) -> Option<QueueItem> {
        let index = self.items.iter().position(QueueItem::is_buffer)?;
        let item = self.items.remove(index)?;
        self.level.sub(item.size(), item.duration());
        self.total_dropped += 1;
        Some(item)
    }

    fn fill_percent(&self) -> u32 {
        if self.eos {
            return 100;
        }
        let ratio = |level: u128, max: u128| {
            if max > 0 {
                u32::try_from(level * 100 / max).unwrap_or(u32::MAX)
            } else {
                0
            }
        };
        let max = &self.max_size;
        ratio(self.level.buffers.into(), max.buffers.into())
            .max(ratio(self.level.bytes.into(), max.bytes.into()))
            .max(ratio(self.level.time.nanos().into(), max.time.nanos().into()))
            .min(100)
    }

    /// Advance the buffering state machine; returns the percent to report.
    ///
    /// Entering and leaving buffering are always reported; while buffering,
    /// only changes of the fill percentage are.
    fn update_buffering(&mut self) -> Option<u32> {
        let percent = self.fill_percent();
        let was_buffering = self.buffering;
        if self.buffering {
            if percent >= self.high_watermark {
                self.buffering = false;
            }
        } else if percent < self.low_watermark {
            self.buffering = true;
        }
        let changed = was_buffering != self.buffering;
        if !changed && (!self.buffering || percent == self.buffering_percent) {
            return None;
        }
        self.buffering_percent = percent;
        let high = self.high_watermark.max(1);
        Some((percent.saturating_mul(100) / high).min(100))
    }

    fn reset_buffering(&mut self) {
        self.buffering = false;
        self.buffering_percent = 100;
    }
}

impl BoundedQueue {
    /// Create a queue holding at most `max_buffers` buffers.
    ///
    /// The byte and time limits are disabled.
    pub fn new(max_buffers: u32) -> Self {
        Self::with_settings(
            QueueSettings::default().max_size(QueueLimits::new(max_buffers, 0, ClockTime::ZERO)),
        )
    }

    /// Create a queue from settings.
    pub fn with_settings(settings: QueueSettings) -> Self {
        let name = settings.name.unwrap_or_else(default_name);
        tracing::debug!(
            queue = %name,
            max_size = ?settings.max_size,
            min_threshold = ?settings.min_threshold,
            leaky = ?settings.leaky,
            "created queue"
        );
        let capacity = (settings.max_size.buffers as usize).min(1024);
        Self {
            inner: Arc::new(QueueInner {
                metrics: QueueMetrics::new(&name),
                name,
                state: Mutex::new(QueueState {
                    items: VecDeque::with_capacity(capacity),
                    level: QueueLevel::default(),
                    max_size: settings.max_size,
                    min_threshold: settings.min_threshold,
                    leaky: settings.leaky,
                    flushing: false,
                    stopped: false,
                    eos: false,
                    low_watermark: settings.low_watermark,
                    high_watermark: settings.high_watermark,
                    buffering: false,
                    buffering_percent: 100,
                    total_pushed: 0,
                    total_popped: 0,
                    total_dropped: 0,
                    observer: None,
                }),
                item_added: Condvar::new(),
                item_removed: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    // ------------------------------------------------------------------------
    // Dataflow
    // ------------------------------------------------------------------------

    /// Append an item, blocking or leaking while the queue is filled.
    ///
    /// Returns [`FlowError::WrongState`] when the queue is flushing or
    /// stopped, including when a flush interrupts a blocked push, and
    /// [`FlowError::Eos`] after end-of-stream was queued. Items refused this
    /// way are released. A buffer dropped by an upstream leak is reported as
    /// success.
    pub fn push(&self, item: impl Into<QueueItem>) -> std::result::Result<(), FlowError> {
        let item = item.into();
        let mut leaked = Vec::new();
        let mut state = self.lock();
        state.check_running()?;

        if state.eos {
            // a new stream or segment resets end-of-stream
            let restarts = item.as_message().is_some_and(|m| {
                matches!(
                    m.message_type(),
                    MessageType::Segment | MessageType::StreamStart
                )
            });
            if !restarts {
                tracing::debug!(queue = %self.inner.name, "refusing item after EOS");
                return Err(FlowError::Eos);
            }
            state.eos = false;
        }

        if item.is_buffer() && state.is_filled() {
            let observer = state.observer.clone();
            drop(state);
            self.inner.metrics.record_overrun();
            tracing::debug!(queue = %self.inner.name, "queue is filled");
            if let Some(observer) = observer {
                observer.overrun();
            }
            state = self.lock();
            state.check_running()?;

            // the leak policy is re-read after every wakeup
            while state.is_filled() {
                match state.leaky {
                    LeakyMode::Upstream => {
                        state.total_dropped += 1;
                        drop(state);
                        self.inner.metrics.record_dropped(1);
                        trace_leak(&self.inner.name, "upstream", 1);
                        return Ok(());
                    }
                    LeakyMode::Downstream => {
                        while state.is_filled() {
                            match state.leak_head_buffer() {
                                Some(old) => leaked.push(old),
                                None => break,
                            }
                        }
                        break;
                    }
                    LeakyMode::None => {
                        state = self
                            .inner
                            .item_removed
                            .wait(state)
                            .unwrap_or_else(PoisonError::into_inner);
                        state.check_running()?;
                    }
                }
            }
        }

        let is_eos = item.is_eos();
        tracing::trace!(
            queue = %self.inner.name,
            buffer = item.is_buffer(),
            size = item.size(),
            "enqueue"
        );
        state.enqueue(item);
        if is_eos {
            state.eos = true;
            tracing::debug!(queue = %self.inner.name, "EOS queued");
        }
        let buffering = state.update_buffering();
        let observer = buffering.and(state.observer.clone());
        let level = state.level;
        self.inner.item_added.notify_one();
        drop(state);

        self.inner.metrics.record_push();
        self.inner.metrics.record_level(&level);
        if !leaked.is_empty() {
            self.inner.metrics.record_dropped(leaked.len() as u64);
            trace_leak(&self.inner.name, "downstream", leaked.len() as u64);
        }
        drop(leaked);
        self.report_buffering(buffering, observer);
        Ok(())
    }

    /// Remove the head item, blocking while the queue reads empty.
    ///
    /// Returns [`FlowError::WrongState`] when the queue is flushing or
    /// stopped, including when a flush interrupts a blocked pop.
    pub fn pop(&self) -> std::result::Result<QueueItem, FlowError> {
        let mut state = self.lock();
        state.check_running()?;

        while state.is_empty() {
            let observer = state.observer.clone();
            drop(state);
            self.inner.metrics.record_underrun();
            tracing::debug!(queue = %self.inner.name, "queue is empty");
            if let Some(observer) = &observer {
                observer.underrun();
            }
            state = self.lock();
            state.check_running()?;

            // the underrun handler may have changed the thresholds
            while state.is_empty() {
                state = self
                    .inner
                    .item_added
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
                state.check_running()?;
            }

            let observer = state.observer.clone();
            drop(state);
            tracing::debug!(queue = %self.inner.name, "queue is running");
            if let Some(observer) = observer {
                observer.running();
            }
            state = self.lock();
            state.check_running()?;
        }

        self.finish_pop(state)
    }

    /// Remove the head item if the queue is readable, without blocking.
    pub fn try_pop(&self) -> std::result::Result<Option<QueueItem>, FlowError> {
        let state = self.lock();
        state.check_running()?;
        if state.is_empty() {
            return Ok(None);
        }
        self.finish_pop(state).map(Some)
    }

    fn finish_pop(
        &self,
        mut state: MutexGuard<'_, QueueState>,
    ) -> std::result::Result<QueueItem, FlowError> {
        let item = state.dequeue().ok_or(FlowError::WrongState)?;
        let buffering = state.update_buffering();
        let observer = buffering.and(state.observer.clone());
        let level = state.level;
        self.inner.item_removed.notify_one();
        drop(state);

        tracing::trace!(
            queue = %self.inner.name,
            buffer = item.is_buffer(),
            size = item.size(),
            "dequeue"
        );
        self.inner.metrics.record_pop();
        self.inner.metrics.record_level(&level);
        self.report_buffering(buffering, observer);
        Ok(item)
    }

    fn report_buffering(&self, percent: Option<u32>, observer: Option<Arc<dyn QueueObserver>>) {
        let Some(percent) = percent else {
            return;
        };
        tracing::debug!(queue = %self.inner.name, percent, "buffering");
        self.inner.metrics.record_buffering(percent);
        if let Some(observer) = observer {
            observer.buffering(percent);
        }
    }

    // ------------------------------------------------------------------------
    // Flushing and activation
    // ------------------------------------------------------------------------

    /// Start flushing: release every item and wake all blocked callers.
    ///
    /// Until [`unflush`](Self::unflush), every push and pop returns
    /// [`FlowError::WrongState`].
    pub fn flush(&self) {
        let _span = instrument_queue(&self.inner.name);
        let mut state = self.lock();
        let from = state.state();
        state.flushing = true;
        let items = self.clear_locked(&mut state);
        let to = state.state();
        drop(state);

        tracing::debug!(dropped = items.len(), "flushed queue");
        drop(items);
        if from != to {
            trace_state_change(&self.inner.name, from.name(), to.name());
        }
    }

    /// Stop flushing.
    pub fn unflush(&self) {
        let mut state = self.lock();
        let from = state.state();
        state.flushing = false;
        let to = state.state();
        drop(state);
        if from != to {
            trace_state_change(&self.inner.name, from.name(), to.name());
        }
    }

    /// Resume dataflow after [`deactivate`](Self::deactivate).
    pub fn activate(&self) {
        let mut state = self.lock();
        let from = state.state();
        state.stopped = false;
        state.flushing = false;
        let to = state.state();
        drop(state);
        if from != to {
            trace_state_change(&self.inner.name, from.name(), to.name());
        }
    }

    /// Stop dataflow: release every item and wake all blocked callers.
    pub fn deactivate(&self) {
        let _span = instrument_queue(&self.inner.name);
        let mut state = self.lock();
        let from = state.state();
        state.stopped = true;
        let items = self.clear_locked(&mut state);
        let to = state.state();
        drop(state);

        drop(items);
        if from != to {
            trace_state_change(&self.inner.name, from.name(), to.name());
        }
    }

    /// Empty the queue and reset levels; returns the items for release
    /// outside the lock.
    fn clear_locked(&self, state: &mut QueueState) -> VecDeque<QueueItem> {
        let items = std::mem::take(&mut state.items);
        state.level = QueueLevel::default();
        state.eos = false;
        state.reset_buffering();
        self.inner.item_added.notify_all();
        self.inner.item_removed.notify_all();
        self.inner.metrics.record_level(&state.level);
        items
    }

    /// Current dataflow state.
    pub fn state(&self) -> ConnectionState {
        self.lock().state()
    }

    /// Whether the queue is flushing.
    pub fn is_flushing(&self) -> bool {
        self.lock().flushing
    }

    /// Whether end-of-stream is queued or was consumed without a flush since.
    pub fn is_eos(&self) -> bool {
        self.lock().eos
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    /// Change the upper limits. Blocked pushers re-evaluate.
    pub fn set_max_size(&self, limits: QueueLimits) {
        let mut state = self.lock();
        state.max_size = limits;
        self.inner.item_removed.notify_all();
        let buffering = state.update_buffering();
        let observer = buffering.and(state.observer.clone());
        drop(state);
        tracing::debug!(queue = %self.inner.name, max_size = ?limits, "max size changed");
        self.report_buffering(buffering, observer);
    }

    /// Change the lower thresholds. Blocked poppers re-evaluate.
    pub fn set_min_threshold(&self, limits: QueueLimits) {
        let mut state = self.lock();
        state.min_threshold = limits;
        self.inner.item_added.notify_all();
        tracing::debug!(queue = %self.inner.name, min_threshold = ?limits, "min threshold changed");
    }

    /// Change the overflow policy. Blocked pushers re-evaluate.
    pub fn set_leaky(&self, mode: LeakyMode) {
        let mut state = self.lock();
        state.leaky = mode;
        self.inner.item_removed.notify_all();
        tracing::debug!(queue = %self.inner.name, leaky = ?mode, "leaky mode changed");
    }

    /// Change the buffering watermarks, in percent.
    pub fn set_buffering_watermarks(&self, low: u32, high: u32) -> Result<()> {
        if low > high || high == 0 || high > 100 {
            return Err(Error::InvalidArgument(format!(
                "invalid buffering watermarks {low}%/{high}%"
            )));
        }
        let mut state = self.lock();
        state.low_watermark = low;
        state.high_watermark = high;
        let buffering = state.update_buffering();
        let observer = buffering.and(state.observer.clone());
        drop(state);
        self.report_buffering(buffering, observer);
        Ok(())
    }

    /// Install or remove the notification observer.
    pub fn set_observer(&self, observer: Option<Arc<dyn QueueObserver>>) {
        self.lock().observer = observer;
    }

    /// Upper limits.
    pub fn max_size(&self) -> QueueLimits {
        self.lock().max_size
    }

    /// Lower thresholds.
    pub fn min_threshold(&self) -> QueueLimits {
        self.lock().min_threshold
    }

    /// Overflow policy.
    pub fn leaky(&self) -> LeakyMode {
        self.lock().leaky
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    /// Current level.
    pub fn level(&self) -> QueueLevel {
        self.lock().level
    }

    /// Number of queued items, messages included.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Whether no items are queued.
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Whether an enabled upper limit is reached.
    pub fn is_filled(&self) -> bool {
        self.lock().is_filled()
    }

    /// Whether the queue is currently refilling below its high watermark.
    pub fn is_buffering(&self) -> bool {
        self.lock().buffering
    }

    /// Get statistics about the queue.
    pub fn stats(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            level: state.level,
            items: state.items.len(),
            total_pushed: state.total_pushed,
            total_popped: state.total_popped,
            total_dropped: state.total_dropped,
        }
    }
}

impl std::fmt::Debug for BoundedQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("BoundedQueue")
            .field("name", &self.inner.name)
            .field("state", &state.state())
            .field("items", &state.items.len())
            .field("level", &state.level)
            .field("max_size", &state.max_size)
            .field("leaky", &state.leaky)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::message::ControlMessage;
    use crate::metadata::Metadata;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    fn create_test_buffer(size: usize, seq: u64) -> Buffer {
        Buffer::with_size(size, Metadata::with_sequence(seq))
    }

    fn sequence(item: QueueItem) -> u64 {
        item.into_buffer().unwrap().metadata().sequence
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    impl QueueObserver for Recorder {
        fn underrun(&self) {
            self.events.lock().unwrap().push("underrun".into());
        }
        fn running(&self) {
            self.events.lock().unwrap().push("running".into());
        }
        fn overrun(&self) {
            self.events.lock().unwrap().push("overrun".into());
        }
        fn buffering(&self, percent: u32) {
            self.events.lock().unwrap().push(format!("buffering {percent}"));
        }
    }

    #[test]
    fn test_queue_creation() {
        let queue = BoundedQueue::new(10);
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.state(), ConnectionState::Active);
        assert_eq!(queue.max_size().buffers, 10);
        assert_eq!(queue.max_size().bytes, 0);
    }

    #[test]
    fn test_queue_push_pop() {
        let queue = BoundedQueue::new(10);

        queue.push(create_test_buffer(100, 0)).unwrap();
        queue.push(create_test_buffer(100, 1)).unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.level().bytes, 200);

        assert_eq!(sequence(queue.pop().unwrap()), 0);
        assert_eq!(sequence(queue.pop().unwrap()), 1);
        assert!(queue.is_empty());
        assert!(queue.level().is_zero());
    }

    #[test]
    fn test_messages_are_weightless() {
        let queue = BoundedQueue::new(1);
        queue.push(create_test_buffer(10, 0)).unwrap();
        assert!(queue.is_filled());

        // messages bypass the filled check
        queue.push(ControlMessage::new_tag(Default::default())).unwrap();
        queue.push(ControlMessage::new_gap(ClockTime::ZERO, None)).unwrap();
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.level().buffers, 1);
        assert_eq!(queue.level().bytes, 10);
    }

    #[test]
    fn test_time_level_uses_known_durations() {
        let queue = BoundedQueue::new(0);
        let timed = Metadata::new().with_duration(ClockTime::from_millis(40));
        queue.push(Buffer::with_size(1, timed)).unwrap();
        queue.push(Buffer::with_size(1, Metadata::new())).unwrap();
        assert_eq!(queue.level().time, ClockTime::from_millis(40));

        queue.pop().unwrap();
        assert_eq!(queue.level().time, ClockTime::ZERO);
    }

    #[test]
    fn test_queue_leaky_upstream() {
        let queue = BoundedQueue::new(2);
        queue.set_leaky(LeakyMode::Upstream);

        queue.push(create_test_buffer(100, 0)).unwrap();
        queue.push(create_test_buffer(100, 1)).unwrap();
        queue.push(create_test_buffer(100, 2)).unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.stats().total_dropped, 1);
        assert_eq!(sequence(queue.pop().unwrap()), 0);
    }

    #[test]
    fn test_queue_leaky_downstream() {
        let queue = BoundedQueue::new(2);
        queue.set_leaky(LeakyMode::Downstream);

        queue.push(create_test_buffer(100, 0)).unwrap();
        queue.push(create_test_buffer(100, 1)).unwrap();
        queue.push(create_test_buffer(100, 2)).unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.stats().total_dropped, 1);
        assert_eq!(sequence(queue.pop().unwrap()), 1);
    }

    #[test]
    fn test_leak_downstream_skips_messages() {
        let queue = BoundedQueue::new(1);
        queue.set_leaky(LeakyMode::Downstream);

        queue.push(ControlMessage::new_flush_stop(false)).unwrap();
        queue.push(create_test_buffer(1, 0)).unwrap();
        queue.push(create_test_buffer(1, 1)).unwrap();

        let first = queue.pop().unwrap();
        assert!(first.is_message());
        assert_eq!(sequence(queue.pop().unwrap()), 1);
    }

    #[test]
    fn test_byte_limit() {
        let queue = BoundedQueue::with_settings(
            QueueSettings::default()
                .max_size(QueueLimits::new(100, 200, ClockTime::ZERO))
                .leaky(LeakyMode::Upstream),
        );

        queue.push(create_test_buffer(100, 0)).unwrap();
        queue.push(create_test_buffer(100, 1)).unwrap();
        queue.push(create_test_buffer(100, 2)).unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.level().bytes, 200);
    }

    #[test]
    fn test_flush_refuses_until_unflush() {
        let queue = BoundedQueue::new(10);
        queue.push(create_test_buffer(100, 0)).unwrap();
        queue.push(ControlMessage::new_eos()).unwrap();

        queue.flush();
        assert!(queue.is_empty());
        assert!(queue.level().is_zero());
        assert!(!queue.is_eos());
        assert_eq!(queue.state(), ConnectionState::Flushing);
        assert_eq!(queue.push(create_test_buffer(1, 1)), Err(FlowError::WrongState));
        assert_eq!(queue.try_pop().unwrap_err(), FlowError::WrongState);

        queue.unflush();
        queue.push(create_test_buffer(1, 2)).unwrap();
        assert_eq!(sequence(queue.pop().unwrap()), 2);
    }

    #[test]
    fn test_flush_releases_items() {
        let queue = BoundedQueue::new(10);
        let buffer = create_test_buffer(1, 0);
        queue.push(buffer.clone()).unwrap();
        assert_eq!(buffer.refcount(), 2);
        queue.flush();
        assert_eq!(buffer.refcount(), 1);
    }

    #[test]
    fn test_eos_refuses_data() {
        let queue = BoundedQueue::new(10);
        queue.push(ControlMessage::new_eos()).unwrap();
        assert!(queue.is_eos());
        assert_eq!(queue.push(create_test_buffer(1, 0)), Err(FlowError::Eos));
        assert_eq!(
            queue.push(ControlMessage::new_tag(Default::default())),
            Err(FlowError::Eos)
        );

        // a new segment restarts the stream
        queue
            .push(ControlMessage::new_segment(Default::default()).unwrap())
            .unwrap();
        assert!(!queue.is_eos());
        queue.push(create_test_buffer(1, 1)).unwrap();
    }

    #[test]
    fn test_min_threshold_gates_reads() {
        let queue = BoundedQueue::with_settings(
            QueueSettings::default()
                .max_buffers(10)
                .min_threshold(QueueLimits::new(2, 0, ClockTime::ZERO)),
        );
        queue.push(create_test_buffer(1, 0)).unwrap();
        assert_eq!(queue.len(), 1);
        assert!(queue.try_pop().unwrap().is_none());

        queue.push(create_test_buffer(1, 1)).unwrap();
        assert_eq!(sequence(queue.try_pop().unwrap().unwrap()), 0);
        // below the threshold again
        assert!(queue.try_pop().unwrap().is_none());

        // EOS lifts the gate
        queue.push(ControlMessage::new_eos()).unwrap();
        assert_eq!(sequence(queue.try_pop().unwrap().unwrap()), 1);
        assert!(queue.try_pop().unwrap().unwrap().is_eos());
    }

    #[test]
    fn test_overrun_notification() {
        let recorder = Arc::new(Recorder::default());
        let queue = BoundedQueue::new(1);
        queue.set_buffering_watermarks(0, 100).unwrap();
        queue.set_leaky(LeakyMode::Upstream);
        queue.set_observer(Some(recorder.clone()));

        queue.push(create_test_buffer(1, 0)).unwrap();
        assert!(recorder.take().is_empty());
        queue.push(create_test_buffer(1, 1)).unwrap();
        assert_eq!(recorder.take(), vec!["overrun"]);
    }

    #[test]
    fn test_overrun_handler_may_raise_limit() {
        struct Grow(BoundedQueue);
        impl QueueObserver for Grow {
            fn overrun(&self) {
                self.0.set_max_size(QueueLimits::new(5, 0, ClockTime::ZERO));
            }
        }

        let queue = BoundedQueue::new(1);
        queue.set_observer(Some(Arc::new(Grow(queue.clone()))));
        queue.push(create_test_buffer(1, 0)).unwrap();
        // would block forever without the handler
        queue.push(create_test_buffer(1, 1)).unwrap();
        assert_eq!(queue.len(), 2);
        queue.set_observer(None);
    }

    #[test]
    fn test_underrun_and_running() {
        let recorder = Arc::new(Recorder::default());
        let queue = BoundedQueue::new(10);
        queue.set_buffering_watermarks(0, 100).unwrap();
        queue.set_observer(Some(recorder.clone()));

        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || sequence(queue.pop().unwrap()))
        };
        thread::sleep(Duration::from_millis(50));
        queue.push(create_test_buffer(1, 7)).unwrap();

        assert_eq!(consumer.join().unwrap(), 7);
        assert_eq!(recorder.take(), vec!["underrun", "running"]);
    }

    #[test]
    fn test_buffering_watermarks() {
        let recorder = Arc::new(Recorder::default());
        let queue = BoundedQueue::new(10);
        queue.set_buffering_watermarks(20, 50).unwrap();
        queue.set_observer(Some(recorder.clone()));

        for i in 0..6 {
            queue.push(create_test_buffer(1, i)).unwrap();
        }
        assert_eq!(
            recorder.take(),
            vec![
                "buffering 20",
                "buffering 40",
                "buffering 60",
                "buffering 80",
                "buffering 100"
            ]
        );
        assert!(!queue.is_buffering());

        for _ in 0..5 {
            queue.pop().unwrap();
        }
        assert_eq!(recorder.take(), vec!["buffering 20"]);
        assert!(queue.is_buffering());
    }

    #[test]
    fn test_leaving_buffering_after_watermark_change() {
        let recorder = Arc::new(Recorder::default());
        let queue = BoundedQueue::new(10);
        queue.set_buffering_watermarks(20, 50).unwrap();
        queue.set_observer(Some(recorder.clone()));

        queue.push(create_test_buffer(1, 0)).unwrap();
        assert_eq!(recorder.take(), vec!["buffering 20"]);
        assert!(queue.is_buffering());

        // 10% now reaches the high watermark
        queue.set_buffering_watermarks(5, 10).unwrap();
        assert_eq!(recorder.take(), vec!["buffering 100"]);
        assert!(!queue.is_buffering());

        queue.push(ControlMessage::new_gap(ClockTime::ZERO, None)).unwrap();
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn test_leaving_buffering_at_same_percent() {
        let recorder = Arc::new(Recorder::default());
        let queue = BoundedQueue::new(10);
        queue.set_buffering_watermarks(20, 50).unwrap();
        queue.set_observer(Some(recorder.clone()));

        queue.push(create_test_buffer(1, 0)).unwrap();
        queue.push(create_test_buffer(1, 1)).unwrap();
        assert_eq!(recorder.take(), vec!["buffering 20", "buffering 40"]);

        // 2 of 4 buffers: the raw percent jumps to 50 and buffering ends
        queue.set_max_size(QueueLimits::new(4, 0, ClockTime::ZERO));
        assert_eq!(recorder.take(), vec!["buffering 100"]);
        assert!(!queue.is_buffering());

        // a drop to 25% stays above the low watermark
        queue.pop().unwrap();
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn test_leaky_change_releases_blocked_push() {
        let queue = BoundedQueue::new(1);
        queue.push(create_test_buffer(1, 0)).unwrap();

        let feeder = {
            let queue = queue.clone();
            thread::spawn(move || queue.push(create_test_buffer(1, 1)))
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!feeder.is_finished());

        queue.set_leaky(LeakyMode::Upstream);
        assert_eq!(feeder.join().unwrap(), Ok(()));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.stats().total_dropped, 1);
        assert_eq!(sequence(queue.pop().unwrap()), 0);
    }

    #[test]
    fn test_leaky_change_to_downstream_while_blocked() {
        let queue = BoundedQueue::new(2);
        queue.push(create_test_buffer(1, 0)).unwrap();
        queue.push(create_test_buffer(1, 1)).unwrap();

        let feeder = {
            let queue = queue.clone();
            thread::spawn(move || queue.push(create_test_buffer(1, 2)))
        };
        thread::sleep(Duration::from_millis(50));

        queue.set_leaky(LeakyMode::Downstream);
        assert_eq!(feeder.join().unwrap(), Ok(()));
        assert_eq!(sequence(queue.pop().unwrap()), 1);
        assert_eq!(sequence(queue.pop().unwrap()), 2);
    }

    #[test]
    fn test_invalid_watermarks() {
        let queue = BoundedQueue::new(1);
        assert!(queue.set_buffering_watermarks(60, 40).is_err());
        assert!(queue.set_buffering_watermarks(0, 101).is_err());
        assert!(queue.set_buffering_watermarks(10, 99).is_ok());
    }

    #[test]
    fn test_deactivate_and_activate() {
        let queue = BoundedQueue::new(10);
        queue.push(create_test_buffer(1, 0)).unwrap();
        queue.deactivate();
        assert_eq!(queue.state(), ConnectionState::Stopped);
        assert!(queue.is_empty());
        assert_eq!(queue.pop().unwrap_err(), FlowError::WrongState);

        queue.activate();
        assert_eq!(queue.state(), ConnectionState::Active);
        queue.push(create_test_buffer(1, 1)).unwrap();
        assert_eq!(sequence(queue.pop().unwrap()), 1);
    }

    #[test]
    fn test_stats() {
        let queue = BoundedQueue::new(10);
        queue.push(create_test_buffer(10, 0)).unwrap();
        queue.push(ControlMessage::new_eos()).unwrap();
        queue.pop().unwrap();

        let stats = queue.stats();
        assert_eq!(stats.total_pushed, 2);
        assert_eq!(stats.total_popped, 1);
        assert_eq!(stats.items, 1);
        assert_eq!(stats.level.buffers, 0);
    }

    #[test]
    fn test_queue_multithreaded() {
        let queue = BoundedQueue::new(16);
        let queue_clone = queue.clone();

        let producer = thread::spawn(move || {
            for i in 0..500 {
                queue_clone.push(create_test_buffer(8, i)).unwrap();
            }
        });

        for i in 0..500 {
            assert_eq!(sequence(queue.pop().unwrap()), i);
        }
        producer.join().unwrap();
        assert!(queue.level().is_zero());
    }
}
