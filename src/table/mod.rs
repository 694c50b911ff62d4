//! The `AggregatingMemory` table engine.
//!
//! Rows live in memory as an ordered sequence of Arrow `RecordBatch` values.
//! Readers pin a snapshot of that sequence without locking; appends,
//! mutations and truncation serialize on the store's writer lock and publish
//! a new sequence in one atomic swap.
//!
//! Row and byte totals are kept in separate relaxed counters for cost
//! estimation. They are not published together with the sequence, so a
//! concurrent reader may see them briefly out of step with a snapshot.

mod append;
mod error;
mod mutation;
mod scan;

use std::sync::{atomic::AtomicUsize, Arc};

use arrow::array::RecordBatch;
use futures_util::TryStreamExt;

pub use self::{
    append::AppendSink,
    error::{AppendError, BoxError, CreateError, MutationError, ScanError},
    mutation::{MutationCommand, RewriteOutput, RewritePipeline, RewriteRequest},
    scan::{ScanPipe, ScanSource},
};
use crate::{
    id::TableId,
    observability::{log_debug, log_error, log_info, log_warn},
    option::{MutationCounterMode, TableOptions},
    query::{CreateQuery, SelectQueryDescription},
    schema::{ColumnsDescription, ConstraintsDescription, TableMetadata},
    store::{batch_bytes, BatchStore, Snapshot},
};

/// Name under which the engine registers with a storage factory.
pub const ENGINE_NAME: &str = "AggregatingMemory";

#[derive(Debug)]
pub(crate) struct TableInner {
    pub(crate) id: TableId,
    pub(crate) metadata: Arc<TableMetadata>,
    pub(crate) option: TableOptions,
    pub(crate) store: BatchStore,
}

/// In-memory table handle with shared ownership.
///
/// Cloning is cheap; all clones address the same table.
#[derive(Debug, Clone)]
pub struct AggregatingMemory {
    inner: Arc<TableInner>,
}

impl AggregatingMemory {
    /// Create an empty table.
    ///
    /// Fails with [`CreateError::MissingDefiningQuery`] when `query` has no
    /// `SELECT`, and with [`CreateError::UnsupportedUnionQuery`] unless it has
    /// exactly one.
    pub fn new(
        id: TableId,
        columns: ColumnsDescription,
        constraints: ConstraintsDescription,
        query: &CreateQuery,
        option: TableOptions,
    ) -> Result<Self, CreateError> {
        let select = SelectQueryDescription::from_create_query(query)?;

        log_debug!(
            component = "table",
            event = "table_created",
            table = %id,
            query = %query,
            columns = %columns,
        );

        Ok(Self {
            inner: Arc::new(TableInner {
                id,
                metadata: Arc::new(TableMetadata::new(columns, constraints, select)),
                option,
                store: BatchStore::default(),
            }),
        })
    }

    /// Engine name, [`ENGINE_NAME`].
    pub fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    /// Table identity.
    pub fn id(&self) -> &TableId {
        &self.inner.id
    }

    /// Columns, constraints and defining query fixed at creation.
    pub fn metadata(&self) -> &Arc<TableMetadata> {
        &self.inner.metadata
    }

    /// Settings the table was created with.
    pub fn options(&self) -> &TableOptions {
        &self.inner.option
    }

    /// The currently published batch sequence.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.store.snapshot()
    }

    /// Plan a parallel scan of `column_names`.
    ///
    /// One snapshot is pinned for the whole scan. `num_streams` is clamped to
    /// the number of batches in it (and to the configured maximum), so an
    /// empty table yields a pipe with no sources. Unknown columns or
    /// subcolumns fail before any source is created.
    pub fn read(&self, column_names: &[String], num_streams: usize) -> Result<ScanPipe, ScanError> {
        let columns: Arc<[_]> = self.inner.metadata.check_columns(column_names)?.into();
        let schema = TableMetadata::sample_schema_for(&columns);

        let data = self.snapshot();
        let num_streams = self.inner.option.scan_parallelism(num_streams, data.len());
        let cursor = Arc::new(AtomicUsize::new(0));

        log_debug!(
            component = "scan",
            event = "scan_planned",
            table = %self.inner.id,
            batches = data.len(),
            streams = num_streams,
        );

        let sources = (0..num_streams)
            .map(|_| {
                ScanSource::new(
                    Arc::clone(&columns),
                    Arc::clone(&schema),
                    data.clone(),
                    Some(Arc::clone(&cursor)),
                )
            })
            .collect();
        Ok(ScanPipe::new(schema, sources))
    }

    /// A single-source scan whose snapshot is taken when the first batch is
    /// requested rather than now.
    pub fn read_deferred(&self, column_names: &[String]) -> Result<ScanSource, ScanError> {
        let columns: Arc<[_]> = self.inner.metadata.check_columns(column_names)?.into();
        let schema = TableMetadata::sample_schema_for(&columns);
        let table = Arc::clone(&self.inner);

        Ok(
            ScanSource::new(columns, schema, Snapshot::default(), None).with_initializer(Box::new(
                move |data: &mut Snapshot| *data = table.store.snapshot(),
            )),
        )
    }

    /// Open a write session.
    pub fn write(&self) -> AppendSink {
        AppendSink::new(Arc::clone(&self.inner))
    }

    /// Rewrite the table through `pipeline`.
    ///
    /// Holds the writer lock for the whole rewrite, so appends and other
    /// mutations wait until it is published or aborted. On error the
    /// previously published sequence and counters are left as they were.
    pub async fn mutate(
        &self,
        commands: &[MutationCommand],
        pipeline: &dyn RewritePipeline,
    ) -> Result<(), MutationError> {
        let inner = &self.inner;
        let guard = inner.store.lock_writer().await;
        let current = inner.store.snapshot();

        let result: Result<(bool, Vec<RecordBatch>), MutationError> = async {
            let output = pipeline
                .execute(RewriteRequest {
                    table_id: &inner.id,
                    metadata: &inner.metadata,
                    snapshot: current.clone(),
                    commands,
                })
                .map_err(MutationError::Pipeline)?;
            let affects_all_columns = output.affects_all_columns;
            let rewritten: Vec<_> = output
                .batches
                .try_collect()
                .await
                .map_err(MutationError::Pipeline)?;

            if affects_all_columns {
                Ok((true, rewritten))
            } else {
                mutation::merge_partial(&current, rewritten).map(|batches| (false, batches))
            }
        }
        .await;

        let (affects_all_columns, batches) = match result {
            Ok(output) => output,
            Err(err) => {
                log_error!(
                    component = "mutation",
                    event = "mutation_aborted",
                    table = %inner.id,
                    error = %err,
                );
                return Err(err);
            }
        };

        let rows = batches.iter().map(|batch| batch.num_rows() as u64).sum::<u64>();
        let bytes = batches.iter().map(batch_bytes).sum::<u64>();
        match inner.option.mutation_counters {
            MutationCounterMode::Swapped => {
                log_warn!(
                    component = "mutation",
                    event = "mutation_counters_swapped",
                    table = %inner.id,
                    rows,
                    bytes,
                );
                inner.store.store_counters(bytes, rows);
            }
            MutationCounterMode::Exact => inner.store.store_counters(rows, bytes),
        }
        let num_batches = batches.len();
        inner.store.publish(&guard, batches);

        log_info!(
            component = "mutation",
            event = "mutation_applied",
            table = %inner.id,
            commands = commands.len(),
            affects_all_columns,
            batches = num_batches,
        );
        Ok(())
    }

    /// Remove every row. Irreversible; takes effect before returning.
    pub async fn truncate(&self) {
        let guard = self.inner.store.lock_writer().await;
        self.inner.store.reset(&guard);
        log_info!(
            component = "table",
            event = "table_truncated",
            table = %self.inner.id,
        );
    }

    /// Release all data held by the table.
    pub async fn drop_table(&self) {
        let guard = self.inner.store.lock_writer().await;
        self.inner.store.reset(&guard);
        log_info!(
            component = "table",
            event = "table_dropped",
            table = %self.inner.id,
        );
    }

    /// Advisory row count for planning.
    pub fn total_rows(&self) -> Option<u64> {
        Some(self.inner.store.total_rows())
    }

    /// Advisory byte count for planning.
    pub fn total_bytes(&self) -> Option<u64> {
        Some(self.inner.store.total_bytes())
    }
}
