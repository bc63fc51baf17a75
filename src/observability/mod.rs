//! Observability module for the Spotify client.
//!
//! Logging goes through `tracing`; counters live in [`ClientMetrics`].

mod logging;
mod metrics;

pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use metrics::{ClientMetrics, MetricsSnapshot};
