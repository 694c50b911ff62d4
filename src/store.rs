//! Copy-on-write batch sequence shared by readers and writers.
//!
//! Readers load the current `Arc<Vec<RecordBatch>>` without locking and keep
//! it alive for as long as they need. Writers build a new sequence and swap it
//! in while holding the store's writer lock; nothing is mutated in place.

use std::{
    ops::Deref,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use arc_swap::ArcSwap;
use arrow::array::RecordBatch;
use async_lock::{Mutex, MutexGuard};

/// Bytes accounted for one batch.
pub(crate) fn batch_bytes(batch: &RecordBatch) -> u64 {
    batch.get_array_memory_size() as u64
}

/// An immutable, point-in-time view of the table's batches.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    batches: Arc<Vec<RecordBatch>>,
}

impl Snapshot {
    /// Wrap a batch sequence that was never published, e.g. for a rewrite
    /// pipeline under test.
    pub fn new(batches: Vec<RecordBatch>) -> Self {
        Self {
            batches: Arc::new(batches),
        }
    }

    /// Rows across all batches.
    pub fn num_rows(&self) -> u64 {
        self.batches.iter().map(|batch| batch.num_rows() as u64).sum()
    }

    /// Bytes across all batches, as the table's counters account them.
    pub fn num_bytes(&self) -> u64 {
        self.batches.iter().map(batch_bytes).sum()
    }

    /// Whether `self` and `other` are the same published version.
    pub fn ptr_eq(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.batches, &other.batches)
    }
}

impl Deref for Snapshot {
    type Target = [RecordBatch];

    fn deref(&self) -> &Self::Target {
        &self.batches
    }
}

/// Proof that the writer lock of a [`BatchStore`] is held.
pub(crate) struct WriterGuard<'a> {
    store: &'a BatchStore,
    _guard: MutexGuard<'a, ()>,
}

#[derive(Debug)]
pub(crate) struct BatchStore {
    current: ArcSwap<Vec<RecordBatch>>,
    writer: Mutex<()>,
    total_rows: AtomicU64,
    total_bytes: AtomicU64,
}

impl Default for BatchStore {
    fn default() -> Self {
        Self {
            current: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(()),
            total_rows: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
        }
    }
}

impl BatchStore {
    /// Current sequence. Lock-free; never blocks on writers.
    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            batches: self.current.load_full(),
        }
    }

    /// Serialize against every other writer of this store.
    pub(crate) async fn lock_writer(&self) -> WriterGuard<'_> {
        WriterGuard {
            store: self,
            _guard: self.writer.lock().await,
        }
    }

    pub(crate) fn publish(&self, guard: &WriterGuard<'_>, batches: Vec<RecordBatch>) {
        debug_assert!(std::ptr::eq(guard.store, self));
        self.current.store(Arc::new(batches));
    }

    pub(crate) fn add_counters(&self, rows: u64, bytes: u64) {
        self.total_rows.fetch_add(rows, Ordering::Relaxed);
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn store_counters(&self, rows: u64, bytes: u64) {
        self.total_rows.store(rows, Ordering::Relaxed);
        self.total_bytes.store(bytes, Ordering::Relaxed);
    }

    /// Publish an empty sequence and zero both counters.
    pub(crate) fn reset(&self, guard: &WriterGuard<'_>) {
        self.publish(guard, Vec::new());
        self.store_counters(0, 0);
    }

    pub(crate) fn total_rows(&self) -> u64 {
        self.total_rows.load(Ordering::Relaxed)
    }

    pub(crate) fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::{
        array::{ArrayRef, Int64Array, RecordBatch},
        datatypes::{DataType, Field, Schema},
    };

    use super::{batch_bytes, BatchStore};

    fn int_batch(values: impl IntoIterator<Item = i64>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, false)]));
        let array: ArrayRef = Arc::new(Int64Array::from_iter_values(values));
        RecordBatch::try_new(schema, vec![array]).unwrap()
    }

    #[tokio::test]
    async fn snapshot_survives_publish() {
        let store = BatchStore::default();
        let before = store.snapshot();
        assert!(before.is_empty());

        let guard = store.lock_writer().await;
        store.publish(&guard, vec![int_batch(0..3)]);
        drop(guard);

        let after = store.snapshot();
        assert!(before.is_empty());
        assert_eq!(after.len(), 1);
        assert!(!before.ptr_eq(&after));
        assert!(after.ptr_eq(&store.snapshot()));
    }

    #[tokio::test]
    async fn counters_and_reset() {
        let store = BatchStore::default();
        let batch = int_batch(0..10);
        let bytes = batch_bytes(&batch);

        let guard = store.lock_writer().await;
        store.publish(&guard, vec![batch.clone()]);
        store.add_counters(10, bytes);
        assert_eq!(store.total_rows(), 10);
        assert_eq!(store.total_bytes(), bytes);
        assert_eq!(store.snapshot().num_rows(), 10);
        assert_eq!(store.snapshot().num_bytes(), bytes);

        store.reset(&guard);
        assert_eq!(store.total_rows(), 0);
        assert_eq!(store.total_bytes(), 0);
        assert!(store.snapshot().is_empty());
    }
}
