use arrow::error::ArrowError;
use thiserror::Error;

use crate::schema::{UnknownColumn, ValidationError};

/// Boxed error reported by an external collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error returned when constructing a table
#[derive(Debug, Error)]
pub enum CreateError {
    /// The create statement has no `AS SELECT`.
    #[error("SELECT query is not specified for AggregatingMemory")]
    MissingDefiningQuery,
    /// The defining query is not exactly one `SELECT`.
    #[error("UNION is not supported for AggregatingMemory ({selects} selects given)")]
    UnsupportedUnionQuery {
        /// Number of `SELECT` clauses given.
        selects: usize,
    },
}

/// Error returned when appending to a write session
#[derive(Debug, Error)]
pub enum AppendError {
    /// The batch does not match the declared columns.
    #[error("batch does not match table structure: {0}")]
    Validation(#[from] ValidationError),
}

/// Error returned by a scan
#[derive(Debug, Error)]
pub enum ScanError {
    /// A requested column is not declared, or is absent from a stored batch.
    #[error(transparent)]
    UnknownColumn(#[from] UnknownColumn),
    /// The projected batch could not be built.
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

/// Error returned by a mutation. The published sequence is left untouched.
#[derive(Debug, Error)]
pub enum MutationError {
    /// The pipeline output does not line up with the stored batches.
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(String),
    /// The pipeline failed to start or to produce a batch.
    #[error("rewrite pipeline failed: {0}")]
    Pipeline(#[source] BoxError),
    /// A rewritten column is not in the stored batch.
    #[error("rewritten column `{0}` is not present in the stored batch")]
    UnknownColumn(String),
    /// A merged batch could not be built.
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
}
