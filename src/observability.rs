//! Log events emitted by the table engine.
//!
//! Every event goes to target `aggregating_memory` with a `component` field
//! naming the emitting path and an `event` field naming what happened. No
//! subscriber is installed here.
//!
//! | component  | event                       | level |
//! |------------|-----------------------------|-------|
//! | `table`    | `table_created`             | debug |
//! | `table`    | `table_truncated`           | info  |
//! | `table`    | `table_dropped`             | info  |
//! | `scan`     | `scan_planned`              | debug |
//! | `append`   | `append_finalized`          | info  |
//! | `mutation` | `mutation_applied`          | info  |
//! | `mutation` | `mutation_counters_swapped` | warn  |
//! | `mutation` | `mutation_aborted`          | error |
//! | `factory`  | `engine_registered`         | debug |
//! | `system`   | `async_metrics_updated`     | debug |
//!
//! Events from `table`, `scan`, `append` and `mutation` also carry `table`,
//! the `db.table` display of the `TableId`.

/// Target for all engine log events.
pub(crate) const LOG_TARGET: &str = "aggregating_memory";

/// Info level: a state change readers can observe.
macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::LOG_TARGET, $($field)*)
    };
}

/// Debug level: planning and registration detail.
macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::LOG_TARGET, $($field)*)
    };
}

/// Warn level: the table is in a known but surprising state.
macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::LOG_TARGET, $($field)*)
    };
}

/// Error level: an operation was aborted and nothing was published.
macro_rules! log_error {
    ($($field:tt)*) => {
        ::tracing::error!(target: $crate::observability::LOG_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_warn;
