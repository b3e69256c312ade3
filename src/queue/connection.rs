//! Connection point: a queue plus the sticky-message cache in front of it.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{BoundedQueue, ConnectionState, QueueItem, QueueSettings};
use crate::buffer::Buffer;
use crate::error::{Error, FlowError, Result};
use crate::message::{ControlMessage, MessageType, STICKY_SLOTS};
use crate::observability::instrument_connection;

/// What [`ConnectionPoint::send`] did with an item.
#[derive(Debug)]
pub enum Dispatch {
    /// The item was queued for the drainer.
    Queued,
    /// The message bypasses the queue; the caller delivers it directly.
    OutOfBand(ControlMessage),
}

impl Dispatch {
    /// Whether the item was queued.
    pub fn is_queued(&self) -> bool {
        matches!(self, Dispatch::Queued)
    }
}

/// Latest sticky message per slot, and which of them the drainer has not
/// seen since the last flush.
#[derive(Debug, Default)]
struct StickyCache {
    slots: [Option<ControlMessage>; STICKY_SLOTS],
    pending: [bool; STICKY_SLOTS],
}

impl StickyCache {
    fn index(ty: MessageType) -> usize {
        ty.code().sticky_index().unwrap_or_default() as usize
    }

    fn take(&mut self, ty: MessageType) -> Option<ControlMessage> {
        let index = Self::index(ty);
        self.pending[index] = false;
        self.slots[index].take()
    }

    fn store(&mut self, message: ControlMessage) -> Option<ControlMessage> {
        let index = Self::index(message.message_type());
        self.pending[index] = false;
        self.slots[index].replace(message)
    }

    fn mark_pending(&mut self) {
        for (pending, slot) in self.pending.iter_mut().zip(&self.slots) {
            *pending = slot.is_some();
        }
    }

    /// Pending messages in sticky-index order, leaving slot `skip` pending.
    fn take_pending(&mut self, skip: Option<usize>) -> Vec<(usize, ControlMessage)> {
        let mut replay = Vec::new();
        for (index, (pending, slot)) in self.pending.iter_mut().zip(&self.slots).enumerate() {
            if !*pending || Some(index) == skip {
                continue;
            }
            *pending = false;
            if let Some(message) = slot {
                replay.push((index, message.clone()));
            }
        }
        replay
    }
}

/// The downstream end of a link between two pipeline stages.
///
/// Routes data and downstream messages into a [`BoundedQueue`], applies
/// flush-start / flush-stop to the queue, and keeps the latest instance of
/// every sticky message. After a flush-stop or a restart the cached
/// messages are queued again, in sticky-index order, ahead of the next
/// buffer or serialized message.
///
/// # Example
///
/// ```rust
/// use sluice::message::{ControlMessage, StreamStart};
/// use sluice::queue::{ConnectionPoint, QueueSettings};
///
/// let point = ConnectionPoint::new(QueueSettings::default());
/// point.send(ControlMessage::new_stream_start(StreamStart::new("s0"))).unwrap();
/// point.send(ControlMessage::new_flush_start()).unwrap();
///
/// // flushing dropped the queued copy, the sticky cache still has it
/// assert!(point.queue().is_empty());
/// assert_eq!(point.sticky_messages().len(), 1);
/// ```
#[derive(Debug)]
pub struct ConnectionPoint {
    queue: BoundedQueue,
    sticky: Mutex<StickyCache>,
}

impl ConnectionPoint {
    /// Create a connection point with a new queue.
    pub fn new(settings: QueueSettings) -> Self {
        Self::with_queue(BoundedQueue::with_settings(settings))
    }

    /// Create a connection point in front of an existing queue.
    pub fn with_queue(queue: BoundedQueue) -> Self {
        Self {
            queue,
            sticky: Mutex::new(StickyCache::default()),
        }
    }

    fn sticky_store(&self) -> MutexGuard<'_, StickyCache> {
        self.sticky.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The queue behind this connection point.
    pub fn queue(&self) -> &BoundedQueue {
        &self.queue
    }

    /// Send a buffer or a downstream message.
    ///
    /// Upstream-only messages are refused with [`Error::WrongDirection`].
    pub fn send(&self, item: impl Into<QueueItem>) -> Result<Dispatch> {
        match item.into() {
            QueueItem::Buffer(buffer) => self.send_buffer(buffer),
            QueueItem::Message(message) => self.send_message(message),
        }
    }

    fn send_buffer(&self, buffer: Buffer) -> Result<Dispatch> {
        self.replay_pending(None)?;
        self.queue.push(buffer)?;
        Ok(Dispatch::Queued)
    }

    fn send_message(&self, message: ControlMessage) -> Result<Dispatch> {
        let ty = message.message_type();
        if !message.is_downstream() {
            return Err(Error::WrongDirection {
                message: ty,
                expected: "downstream",
            });
        }

        match ty {
            MessageType::FlushStart => {
                let _span = instrument_connection(self.queue.name());
                self.queue.flush();
                Ok(Dispatch::OutOfBand(message))
            }
            MessageType::FlushStop => {
                let _span = instrument_connection(self.queue.name());
                self.queue.unflush();
                let pruned = {
                    let mut store = self.sticky_store();
                    [MessageType::Segment, MessageType::Eos].map(|ty| store.take(ty))
                };
                tracing::debug!(
                    pruned = pruned.iter().flatten().count(),
                    "flush stopped, dropped sticky segment and EOS"
                );
                drop(pruned);
                self.queue.push(message)?;
                self.sticky_store().mark_pending();
                Ok(Dispatch::Queued)
            }
            _ if message.is_sticky() => {
                if self.queue.state() != ConnectionState::Active {
                    return Err(FlowError::WrongState.into());
                }
                let index = message.sticky_index().map(usize::from);
                self.replay_pending(index)?;
                self.queue.push(message.clone())?;
                self.store_sticky(message);
                Ok(Dispatch::Queued)
            }
            _ if message.is_serialized() => {
                self.replay_pending(None)?;
                self.queue.push(message)?;
                Ok(Dispatch::Queued)
            }
            _ => Ok(Dispatch::OutOfBand(message)),
        }
    }

    fn store_sticky(&self, message: ControlMessage) {
        let ty = message.message_type();
        let previous = {
            let mut store = self.sticky_store();
            let eos = if matches!(ty, MessageType::StreamStart | MessageType::Segment) {
                store.take(MessageType::Eos)
            } else {
                None
            };
            (store.store(message), eos)
        };
        tracing::trace!(message_type = %ty, "cached sticky message");
        drop(previous);
    }

    /// Queue the cached sticky messages the drainer has not seen since the
    /// last flush-stop or restart, except slot `skip`.
    fn replay_pending(&self, skip: Option<usize>) -> Result<()> {
        let replay = self.sticky_store().take_pending(skip);
        for (n, (_, message)) in replay.iter().enumerate() {
            if let Err(err) = self.queue.push(message.clone()) {
                let mut store = self.sticky_store();
                for (index, _) in &replay[n..] {
                    store.pending[*index] = true;
                }
                return Err(err.into());
            }
        }
        if !replay.is_empty() {
            tracing::debug!(replayed = replay.len(), "replayed sticky messages");
        }
        Ok(())
    }

    /// Cached sticky messages, ordered by sticky index.
    pub fn sticky_messages(&self) -> Vec<ControlMessage> {
        self.sticky_store().slots.iter().flatten().cloned().collect()
    }

    /// The cached sticky message of type `ty`.
    pub fn sticky(&self, ty: MessageType) -> Option<ControlMessage> {
        let index = ty.code().sticky_index()?;
        self.sticky_store().slots[index as usize].clone()
    }

    /// Receive the next item from the queue.
    pub fn pop(&self) -> std::result::Result<QueueItem, FlowError> {
        self.queue.pop()
    }

    /// Resume dataflow. Cached sticky messages are queued again before the
    /// next buffer.
    pub fn activate(&self) {
        self.queue.activate();
        self.sticky_store().mark_pending();
    }

    /// Stop dataflow, release queued items and forget sticky messages.
    pub fn deactivate(&self) {
        self.queue.deactivate();
        let cleared = std::mem::take(&mut *self.sticky_store());
        drop(cleared);
    }

    /// Current dataflow state.
    pub fn state(&self) -> ConnectionState {
        self.queue.state()
    }
}
