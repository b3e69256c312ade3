//! Error types for sluice.

use thiserror::Error;

use crate::message::MessageType;

/// Result type alias using sluice's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a blocked or refused queue operation.
///
/// Callers driving a push or pop loop must stop on either variant instead of
/// retrying: the connection has been flushed, stopped, or has seen its last
/// item.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowError {
    /// The queue is flushing or stopped.
    #[error("wrong state: queue is flushing or stopped")]
    WrongState,

    /// End of stream was already queued; no further data is accepted.
    #[error("end of stream already queued")]
    Eos,
}

/// Main error type for sluice operations.
#[derive(Error, Debug)]
pub enum Error {
    /// An argument violated a constructor precondition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A control message was sent in a direction its type does not allow.
    #[error("{message:?} cannot travel {expected}")]
    WrongDirection {
        /// The offending message type.
        message: MessageType,
        /// The direction that was attempted.
        expected: &'static str,
    },

    /// A queue operation was refused.
    #[error(transparent)]
    Flow(#[from] FlowError),
}
