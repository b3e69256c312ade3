//! Data buffers.
//!
//! A [`Buffer`] is a reference-counted [`MiniObject`] holding a byte payload
//! and its [`Metadata`]. Cloning a buffer handle only bumps the refcount; the
//! payload bytes themselves are shared through [`bytes::Bytes`] until a
//! writable copy is requested.
//!
//! # Example
//!
//! ```rust
//! use sluice::buffer::Buffer;
//! use sluice::clock::ClockTime;
//! use sluice::metadata::Metadata;
//!
//! let buffer = Buffer::from_slice(
//!     b"hello",
//!     Metadata::with_sequence(0).with_duration(ClockTime::from_millis(20)),
//! );
//!
//! // Clone is O(1): one refcount increment
//! let shared = buffer.clone();
//! assert_eq!(shared.len(), 5);
//! assert!(!buffer.is_writable());
//! ```

use bytes::Bytes;

use crate::clock::ClockTime;
use crate::metadata::Metadata;
use crate::object::{MiniObject, MiniObjectImpl};

/// Contents of a [`Buffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferData {
    data: Bytes,
    metadata: Metadata,
}

/// A reference-counted data buffer.
pub type Buffer = MiniObject<BufferData>;

impl MiniObjectImpl for BufferData {
    const TYPE_NAME: &'static str = "Buffer";

    /// Copies the payload bytes into a new allocation.
    fn copy(&self) -> Option<Self> {
        Some(Self {
            data: Bytes::copy_from_slice(&self.data),
            metadata: self.metadata,
        })
    }
}

impl BufferData {
    /// Create buffer contents.
    pub fn new(data: impl Into<Bytes>, metadata: Metadata) -> Self {
        Self {
            data: data.into(),
            metadata,
        }
    }

    /// Buffer metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Mutable buffer metadata.
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Payload bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Payload as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Replace the payload.
    pub fn set_data(&mut self, data: impl Into<Bytes>) {
        self.data = data.into();
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Duration of the buffer, if known.
    pub fn duration(&self) -> Option<ClockTime> {
        self.metadata.duration
    }
}

impl MiniObject<BufferData> {
    /// Create a buffer with refcount 1.
    pub fn from_bytes(data: impl Into<Bytes>, metadata: Metadata) -> Self {
        MiniObject::new(BufferData::new(data, metadata))
    }

    /// Create a buffer by copying `data`.
    pub fn from_slice(data: &[u8], metadata: Metadata) -> Self {
        Self::from_bytes(Bytes::copy_from_slice(data), metadata)
    }

    /// Create a zero-filled buffer of `size` bytes.
    pub fn with_size(size: usize, metadata: Metadata) -> Self {
        Self::from_bytes(vec![0u8; size], metadata)
    }

    /// Create a buffer sharing a sub-range of this buffer's bytes.
    ///
    /// Metadata is copied. Returns `None` if the range is out of bounds.
    pub fn slice(&self, offset: usize, len: usize) -> Option<Self> {
        let end = offset.checked_add(len)?;
        if end > self.len() {
            return None;
        }
        Some(Self::from_bytes(
            self.data.slice(offset..end),
            self.metadata,
        ))
    }
}
