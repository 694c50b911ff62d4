use std::sync::Arc;

use arrow::{array::RecordBatch, datatypes::SchemaRef};

use crate::{
    observability::log_info,
    store::batch_bytes,
    table::{AppendError, TableInner},
};

/// Write session of one insert.
///
/// Batches are validated and buffered privately; nothing becomes visible to
/// readers until [`AppendSink::finalize`] publishes them in one step. Dropping
/// the sink without finalizing discards the buffer and leaves the table as it
/// was.
#[derive(Debug)]
pub struct AppendSink {
    table: Arc<TableInner>,
    pending: Vec<RecordBatch>,
    pending_rows: u64,
    pending_bytes: u64,
}

impl AppendSink {
    pub(crate) fn new(table: Arc<TableInner>) -> Self {
        Self {
            table,
            pending: Vec::new(),
            pending_rows: 0,
            pending_bytes: 0,
        }
    }

    /// Full table schema expected by [`AppendSink::append`].
    pub fn header(&self) -> &SchemaRef {
        self.table.metadata.schema()
    }

    /// Buffer `batch` after checking it against the table's columns.
    pub fn append(&mut self, batch: RecordBatch) -> Result<(), AppendError> {
        self.table
            .metadata
            .check_batch(&batch, self.table.option.require_all_columns)?;

        self.pending_rows += batch.num_rows() as u64;
        self.pending_bytes += batch_bytes(&batch);
        self.pending.push(batch);
        Ok(())
    }

    /// Batches buffered so far.
    pub fn pending_batches(&self) -> usize {
        self.pending.len()
    }

    /// Publish every buffered batch after the current ones and bump the
    /// counters.
    pub async fn finalize(self) {
        let AppendSink {
            table,
            pending,
            pending_rows,
            pending_bytes,
        } = self;
        let appended = pending.len();

        {
            let guard = table.store.lock_writer().await;
            let current = table.store.snapshot();
            let mut batches = Vec::with_capacity(current.len() + appended);
            batches.extend_from_slice(&current);
            batches.extend(pending);

            table.store.publish(&guard, batches);
            table.store.add_counters(pending_rows, pending_bytes);
        }

        log_info!(
            component = "append",
            event = "append_finalized",
            table = %table.id,
            batches = appended,
            rows = pending_rows,
            bytes = pending_bytes,
        );
    }
}
