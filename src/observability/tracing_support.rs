//! Tracing integration for structured logging and spans.

use tracing::{Level, Span, span};

/// Create a span for queue operations.
///
/// # Example
///
/// ```rust
/// use sluice::observability::span_queue;
///
/// let span = span_queue("video-queue");
/// let _guard = span.enter();
/// // queue maintenance here...
/// ```
#[inline]
pub fn span_queue(name: &str) -> Span {
    span!(Level::DEBUG, "queue", name = %name)
}

/// Create a span for a connection point.
#[inline]
pub fn span_connection(queue: &str) -> Span {
    span!(Level::DEBUG, "connection", queue = %queue)
}

/// Enter a queue span and return the guard.
pub fn instrument_queue(name: &str) -> tracing::span::EnteredSpan {
    span_queue(name).entered()
}

/// Enter a connection span and return the guard.
pub fn instrument_connection(queue: &str) -> tracing::span::EnteredSpan {
    span_connection(queue).entered()
}

/// Log a queue state change.
#[inline]
pub fn trace_state_change(queue: &str, from: &str, to: &str) {
    tracing::debug!(
        queue = %queue,
        from = %from,
        to = %to,
        "queue state changed"
    );
}

/// Log buffers dropped by a leaky queue.
#[inline]
pub fn trace_leak(queue: &str, leaky: &str, dropped: u64) {
    tracing::debug!(
        queue = %queue,
        leaky = %leaky,
        dropped = dropped,
        "queue is full, leaking buffers"
    );
}
