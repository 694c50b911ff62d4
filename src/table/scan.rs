use std::{
    fmt,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

use arrow::{
    array::{RecordBatch, RecordBatchOptions},
    datatypes::SchemaRef,
};
use futures_core::Stream;
use futures_util::stream::{self, SelectAll};

use crate::{
    schema::{NameAndType, UnknownColumn},
    store::Snapshot,
    table::ScanError,
};

/// Deferred setup run once, right before a source produces its first batch.
pub(crate) type Initializer = Box<dyn FnOnce(&mut Snapshot) + Send>;

enum Cursor {
    Local(usize),
    Shared(Arc<AtomicUsize>),
}

impl Cursor {
    fn claim(&mut self) -> usize {
        match self {
            Cursor::Local(next) => {
                let index = *next;
                *next += 1;
                index
            }
            Cursor::Shared(next) => next.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// One scan worker over a pinned snapshot.
///
/// Sources created by the same read share a cursor: each claimed index is
/// delivered by exactly one source. Once the cursor runs past the snapshot
/// the source is exhausted for good and keeps returning `None`.
pub struct ScanSource {
    columns: Arc<[NameAndType]>,
    schema: SchemaRef,
    data: Snapshot,
    cursor: Cursor,
    initializer: Option<Initializer>,
    exhausted: bool,
}

impl ScanSource {
    pub(crate) fn new(
        columns: Arc<[NameAndType]>,
        schema: SchemaRef,
        data: Snapshot,
        shared_cursor: Option<Arc<AtomicUsize>>,
    ) -> Self {
        Self {
            columns,
            schema,
            data,
            cursor: match shared_cursor {
                Some(cursor) => Cursor::Shared(cursor),
                None => Cursor::Local(0),
            },
            initializer: None,
            exhausted: false,
        }
    }

    pub(crate) fn with_initializer(self, initializer: Initializer) -> Self {
        Self {
            initializer: Some(initializer),
            ..self
        }
    }

    /// Schema of every batch this source yields.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Produce the next claimed batch, projected to the requested columns.
    pub fn next_batch(&mut self) -> Result<Option<RecordBatch>, ScanError> {
        if let Some(initializer) = self.initializer.take() {
            initializer(&mut self.data);
        }
        if self.exhausted {
            return Ok(None);
        }

        let index = self.cursor.claim();
        let Some(source) = self.data.get(index) else {
            self.exhausted = true;
            return Ok(None);
        };

        match self.project(source) {
            Ok(batch) => Ok(Some(batch)),
            Err(err) => {
                self.exhausted = true;
                Err(err)
            }
        }
    }

    fn project(&self, source: &RecordBatch) -> Result<RecordBatch, ScanError> {
        let mut columns = Vec::with_capacity(self.columns.len());

        for column in self.columns.iter() {
            let stored = source
                .column_by_name(column.storage_name())
                .ok_or_else(|| UnknownColumn {
                    name: column.storage_name().to_string(),
                })?;
            let projected = column.project(stored).ok_or_else(|| UnknownColumn {
                name: column.name().to_string(),
            })?;
            columns.push(projected);
        }

        let options = RecordBatchOptions::new().with_row_count(Some(source.num_rows()));
        Ok(RecordBatch::try_new_with_options(
            Arc::clone(&self.schema),
            columns,
            &options,
        )?)
    }
}

impl fmt::Debug for ScanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanSource")
            .field("columns", &self.columns.len())
            .field("batches", &self.data.len())
            .field("deferred", &self.initializer.is_some())
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

impl Stream for ScanSource {
    type Item = Result<RecordBatch, ScanError>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.get_mut().next_batch().transpose())
    }
}

/// The parallel sources of one read.
#[derive(Debug)]
pub struct ScanPipe {
    schema: SchemaRef,
    sources: Vec<ScanSource>,
}

impl ScanPipe {
    pub(crate) fn new(schema: SchemaRef, sources: Vec<ScanSource>) -> Self {
        Self { schema, sources }
    }

    /// Projected output schema; available even when there are no sources.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Number of parallel sources.
    pub fn num_sources(&self) -> usize {
        self.sources.len()
    }

    /// The sources, for driving each on its own worker.
    pub fn into_sources(self) -> Vec<ScanSource> {
        self.sources
    }

    /// Merge all sources into one stream, yielding batches as any source
    /// produces them.
    pub fn into_stream(self) -> SelectAll<ScanSource> {
        stream::select_all(self.sources)
    }
}
