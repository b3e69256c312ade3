//! Items carried by a queue.

use crate::buffer::Buffer;
use crate::clock::ClockTime;
use crate::message::{ControlMessage, MessageType};

/// A buffer or a control message travelling through a queue.
///
/// Only buffers count toward the queue level; messages are weightless and
/// keep their position relative to the buffers around them.
#[derive(Debug, Clone)]
pub enum QueueItem {
    /// Data.
    Buffer(Buffer),
    /// Serialized control message.
    Message(ControlMessage),
}

impl QueueItem {
    /// Whether this item is a buffer.
    pub fn is_buffer(&self) -> bool {
        matches!(self, QueueItem::Buffer(_))
    }

    /// Whether this item is a control message.
    pub fn is_message(&self) -> bool {
        matches!(self, QueueItem::Message(_))
    }

    /// Whether this item is an end-of-stream message.
    pub fn is_eos(&self) -> bool {
        matches!(self, QueueItem::Message(m) if m.message_type() == MessageType::Eos)
    }

    /// Bytes this item adds to the queue level.
    pub fn size(&self) -> u64 {
        match self {
            QueueItem::Buffer(b) => b.len() as u64,
            QueueItem::Message(_) => 0,
        }
    }

    /// Time this item adds to the queue level, if known.
    pub fn duration(&self) -> Option<ClockTime> {
        match self {
            QueueItem::Buffer(b) => b.duration(),
            QueueItem::Message(_) => None,
        }
    }

    /// Borrow the buffer.
    pub fn as_buffer(&self) -> Option<&Buffer> {
        match self {
            QueueItem::Buffer(b) => Some(b),
            QueueItem::Message(_) => None,
        }
    }

    /// Borrow the message.
    pub fn as_message(&self) -> Option<&ControlMessage> {
        match self {
            QueueItem::Message(m) => Some(m),
            QueueItem::Buffer(_) => None,
        }
    }

    /// Take the buffer.
    pub fn into_buffer(self) -> Option<Buffer> {
        match self {
            QueueItem::Buffer(b) => Some(b),
            QueueItem::Message(_) => None,
        }
    }

    /// Take the message.
    pub fn into_message(self) -> Option<ControlMessage> {
        match self {
            QueueItem::Message(m) => Some(m),
            QueueItem::Buffer(_) => None,
        }
    }
}

impl From<Buffer> for QueueItem {
    fn from(buffer: Buffer) -> Self {
        QueueItem::Buffer(buffer)
    }
}

impl From<ControlMessage> for QueueItem {
    fn from(message: ControlMessage) -> Self {
        QueueItem::Message(message)
    }
}
