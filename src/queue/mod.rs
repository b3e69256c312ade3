//! Bounded queues connecting pipeline stages.
//!
//! A [`BoundedQueue`] decouples a feeder thread from a drainer thread:
//!
//! - **Backpressure**: a push blocks while any enabled upper limit
//!   (buffers, bytes, time) is reached.
//! - **Leaking**: instead of blocking, an upstream-leaky queue drops the
//!   incoming buffer and a downstream-leaky queue drops its oldest buffers.
//! - **Thresholds**: a pop blocks while any enabled lower threshold is unmet,
//!   until end-of-stream is queued.
//! - **Flushing**: `flush` releases everything and makes blocked calls
//!   return [`FlowError::WrongState`](crate::error::FlowError::WrongState).
//!
//! A [`ConnectionPoint`] sits in front of a queue and applies control
//! messages: flushes, sticky caching and out-of-band routing.

mod bounded;
mod connection;
mod item;
mod observer;
mod settings;

pub use bounded::{BoundedQueue, ConnectionState, QueueStats};
pub use connection::{ConnectionPoint, Dispatch};
pub use item::QueueItem;
pub use observer::QueueObserver;
pub use settings::{
    DEFAULT_HIGH_WATERMARK, DEFAULT_LOW_WATERMARK, DEFAULT_MAX_BUFFERS, DEFAULT_MAX_BYTES,
    DEFAULT_MAX_TIME, LeakyMode, QueueLevel, QueueLimits, QueueSettings,
};
