//! Read-only system tables describing the running engine.

mod async_metrics;

pub use async_metrics::{
    AsynchronousMetricValue, AsynchronousMetrics, MetricsError, SystemAsynchronousMetrics,
};
