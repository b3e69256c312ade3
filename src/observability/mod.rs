//! Observability features: metrics and tracing.
//!
//! - **Metrics**: counters and gauges via `metrics-rs`
//! - **Tracing**: structured logging and spans via `tracing`
//!
//! ## Metrics
//!
//! Every queue records the following, labelled with `queue`:
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `sluice_queue_pushed` | Counter | Items accepted |
//! | `sluice_queue_popped` | Counter | Items handed out |
//! | `sluice_queue_dropped` | Counter | Buffers dropped by a leaky queue |
//! | `sluice_queue_overruns` | Counter | Buffers that arrived at a filled queue |
//! | `sluice_queue_underruns` | Counter | Pops that found the queue empty |
//! | `sluice_queue_level_buffers` | Gauge | Buffers queued |
//! | `sluice_queue_level_bytes` | Gauge | Bytes queued |
//! | `sluice_queue_level_time_ns` | Gauge | Duration queued |
//! | `sluice_queue_buffering_percent` | Gauge | Buffering progress |
//!
//! ## Example
//!
//! ```rust
//! use sluice::observability::init_metrics;
//!
//! // Initialize metrics (call once at startup)
//! init_metrics();
//!
//! // Use a metrics exporter (prometheus, statsd, etc.) to collect them
//! ```

mod metrics;
mod tracing_support;

pub use metrics::{QueueMetrics, init_metrics};
pub use tracing_support::{
    instrument_connection, instrument_queue, span_connection, span_queue, trace_leak,
    trace_state_change,
};
