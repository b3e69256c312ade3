//! Notifications emitted by a queue.

/// Receives queue notifications.
///
/// Callbacks run on the pushing or popping thread with the queue lock
/// released, so an observer may call back into the queue (for example to
/// raise a limit from `overrun`).
pub trait QueueObserver: Send + Sync {
    /// `pop` is about to block on an empty queue.
    fn underrun(&self) {}

    /// A blocked `pop` has data again.
    fn running(&self) {}

    /// A buffer arrived while the queue was filled.
    fn overrun(&self) {}

    /// Buffering progress in percent, reported while refilling.
    fn buffering(&self, _percent: u32) {}
}
