//! # Sluice
//!
//! Flow-control core for streaming media pipelines.
//!
//! Sluice provides the pieces that move data between independently scheduled
//! pipeline stages: reference-counted copy-on-write objects, typed control
//! messages that travel with or against the data, and a bounded queue with
//! backpressure, leaky overflow and coordinated flushing.
//!
//! ## Features
//!
//! - **Refcounted objects**: atomic refcount, copy-on-write, weak references,
//!   recycling through a dispose hook, per-object keyed data
//! - **Control messages**: flush, EOS, segment, tags, seek, QoS and custom
//!   kinds with direction/serialization/sticky flags
//! - **Bounded queue**: buffer, byte and time limits, min thresholds, leaky
//!   modes, buffering watermarks, observer notifications
//! - **Connection points**: flush routing and sticky-message replay
//!
//! ## Quick Start
//!
//! ```rust
//! use sluice::prelude::*;
//! use std::thread;
//!
//! let queue = BoundedQueue::new(4);
//! let feeder = {
//!     let queue = queue.clone();
//!     thread::spawn(move || {
//!         for seq in 0..16 {
//!             queue.push(Buffer::with_size(188, Metadata::with_sequence(seq)))?;
//!         }
//!         queue.push(ControlMessage::new_eos())
//!     })
//! };
//!
//! let mut received = 0;
//! loop {
//!     let item = queue.pop()?;
//!     if item.is_eos() {
//!         break;
//!     }
//!     received += 1;
//! }
//! feeder.join().unwrap()?;
//! assert_eq!(received, 16);
//! # Ok::<(), sluice::error::FlowError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod buffer;
pub mod clock;
pub mod error;
pub mod message;
pub mod metadata;
pub mod object;
pub mod observability;
pub mod queue;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::buffer::Buffer;
    pub use crate::clock::ClockTime;
    pub use crate::error::{Error, FlowError, Result};
    pub use crate::message::{ControlMessage, MessageType};
    pub use crate::metadata::Metadata;
    pub use crate::object::{MiniObject, MiniObjectImpl};
    pub use crate::queue::{BoundedQueue, ConnectionPoint, LeakyMode, QueueItem, QueueSettings};
}

pub use error::{Error, FlowError, Result};
