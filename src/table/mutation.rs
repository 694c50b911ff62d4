//! Batch rewrites driven by an external rewrite pipeline.
//!
//! The pipeline owns the mutation semantics (which rows, which values); this
//! module only decides how its output replaces the stored sequence.

use std::{fmt, sync::Arc};

use arrow::array::RecordBatch;
use futures_util::stream::BoxStream;

use crate::{
    id::TableId,
    schema::TableMetadata,
    store::Snapshot,
    table::{BoxError, MutationError},
};

/// A mutation command as issued by the surrounding engine. Expressions are
/// opaque text interpreted by the rewrite pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationCommand {
    /// `ALTER TABLE ... DELETE WHERE predicate`
    Delete {
        /// Rows to delete.
        predicate: String,
    },
    /// `ALTER TABLE ... UPDATE column = expression, ... WHERE predicate`
    Update {
        /// Rows to update.
        predicate: String,
        /// `(column, expression)` pairs.
        assignments: Vec<(String, String)>,
    },
}

impl MutationCommand {
    /// Columns whose values the command rewrites. `None` means every column.
    pub fn updated_columns(&self) -> Option<Vec<&str>> {
        match self {
            MutationCommand::Delete { .. } => None,
            MutationCommand::Update { assignments, .. } => Some(
                assignments
                    .iter()
                    .map(|(column, _)| column.as_str())
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for MutationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationCommand::Delete { predicate } => write!(f, "DELETE WHERE {predicate}"),
            MutationCommand::Update {
                predicate,
                assignments,
            } => {
                f.write_str("UPDATE ")?;
                for (idx, (column, expression)) in assignments.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{column} = {expression}")?;
                }
                write!(f, " WHERE {predicate}")
            }
        }
    }
}

/// Everything a pipeline sees when asked to rewrite a table.
#[derive(Debug)]
pub struct RewriteRequest<'a> {
    /// Table being rewritten.
    pub table_id: &'a TableId,
    /// Its columns and defining query.
    pub metadata: &'a TableMetadata,
    /// The sequence being rewritten; stable for the whole mutation.
    pub snapshot: Snapshot,
    /// Commands to apply, in order.
    pub commands: &'a [MutationCommand],
}

/// Output of a rewrite pipeline.
pub struct RewriteOutput {
    /// Every column was rewritten; `batches` replaces the table wholesale.
    /// Otherwise `batches` holds only the changed columns, one batch per
    /// stored batch, in stored order.
    pub affects_all_columns: bool,
    /// Replacement batches in order.
    pub batches: BoxStream<'static, Result<RecordBatch, BoxError>>,
}

impl fmt::Debug for RewriteOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewriteOutput")
            .field("affects_all_columns", &self.affects_all_columns)
            .finish_non_exhaustive()
    }
}

/// The query engine's mutation executor, seen from the table.
pub trait RewritePipeline: Send + Sync {
    /// Start rewriting `request.snapshot`. The returned stream is drained
    /// while the table's writer lock is held.
    fn execute(&self, request: RewriteRequest<'_>) -> Result<RewriteOutput, BoxError>;
}

/// Positionally merge rewritten columns into the stored batches.
///
/// A partial rewrite never changes the number of batches; a length mismatch
/// means the pipeline and the table disagree and the mutation must abort.
pub(crate) fn merge_partial(
    stored: &[RecordBatch],
    rewritten: Vec<RecordBatch>,
) -> Result<Vec<RecordBatch>, MutationError> {
    if stored.len() != rewritten.len() {
        return Err(MutationError::InternalInvariantViolation(format!(
            "partial mutation produced {} batches for {} stored batches",
            rewritten.len(),
            stored.len()
        )));
    }

    stored
        .iter()
        .zip(rewritten)
        .map(|(stored, rewritten)| update_batch(stored, &rewritten))
        .collect()
}

fn update_batch(
    stored: &RecordBatch,
    rewritten: &RecordBatch,
) -> Result<RecordBatch, MutationError> {
    if stored.num_rows() != rewritten.num_rows() {
        return Err(MutationError::InternalInvariantViolation(format!(
            "partial mutation produced {} rows for a stored batch of {} rows",
            rewritten.num_rows(),
            stored.num_rows()
        )));
    }

    let schema = stored.schema();
    let mut columns = stored.columns().to_vec();
    for (field, column) in rewritten.schema_ref().fields().iter().zip(rewritten.columns()) {
        let (idx, _) = schema
            .column_with_name(field.name())
            .ok_or_else(|| MutationError::UnknownColumn(field.name().clone()))?;
        columns[idx] = Arc::clone(column);
    }
    Ok(RecordBatch::try_new(schema, columns)?)
}
