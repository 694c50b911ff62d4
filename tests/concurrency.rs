mod common;

use std::{collections::HashSet, sync::Arc, time::Duration};

use aggregating_memory::{
    table::BoxError, MutationCommand, RewriteOutput, RewritePipeline, RewriteRequest,
    TableOptions,
};
use arrow::array::{ArrayRef, Int64Array, RecordBatch};
use common::{append, batch, table, values_of};
use futures::{stream, StreamExt, TryStreamExt};
use tokio::sync::Notify;

/// Negates `value` in every batch, yielding each replacement after a delay.
struct SlowNegate {
    started: Arc<Notify>,
}

impl RewritePipeline for SlowNegate {
    fn execute(&self, request: RewriteRequest<'_>) -> Result<RewriteOutput, BoxError> {
        self.started.notify_one();
        let mut out = Vec::with_capacity(request.snapshot.len());
        for stored in request.snapshot.iter() {
            let negated: ArrayRef = Arc::new(Int64Array::from_iter_values(
                values_of(stored, 1).into_iter().map(|v| -v),
            ));
            let columns = vec![stored.column(0).clone(), negated];
            out.push(RecordBatch::try_new(stored.schema(), columns)?);
        }
        Ok(RewriteOutput {
            affects_all_columns: true,
            batches: stream::iter(out)
                .then(|batch| async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, BoxError>(batch)
                })
                .boxed(),
        })
    }
}

fn negate_value() -> Vec<MutationCommand> {
    vec![MutationCommand::Update {
        predicate: "1".to_string(),
        assignments: vec![("value".to_string(), "-value".to_string())],
    }]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_scan_delivers_every_batch_once() {
    let table = table(TableOptions::default());
    let batches = 64;
    append(&table, (0..batches).map(|i| batch(i * 4..i * 4 + 4))).await;

    for _ in 0..8 {
        let parallelism = fastrand::usize(1..=16);
        let pipe = table.read(&["value".to_string()], parallelism).unwrap();
        assert_eq!(pipe.num_sources(), parallelism);

        let handles: Vec<_> = pipe
            .into_sources()
            .into_iter()
            .map(|mut source| {
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    while let Some(batch) = source.next_batch().unwrap() {
                        seen.push(values_of(&batch, 0)[0]);
                        tokio::task::yield_now().await;
                    }
                    seen
                })
            })
            .collect();

        let mut seen = Vec::new();
        for handle in handles {
            seen.extend(handle.await.unwrap());
        }
        let unique: HashSet<_> = seen.iter().copied().collect();
        assert_eq!(seen.len(), batches as usize);
        assert_eq!(unique, (0..batches).map(|i| i * 4).collect());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_keep_their_snapshot_during_appends() {
    let table = table(TableOptions::default());
    append(&table, [batch(0..10)]).await;

    let pinned = table.read(&["value".to_string()], 4).unwrap();
    let pinned_rows = table.snapshot().num_rows();

    let writers: Vec<_> = (0..4)
        .map(|i| {
            let table = table.clone();
            tokio::spawn(async move {
                for j in 0..10 {
                    let start = 100 + i * 1000 + j * 10;
                    append(&table, [batch(start..start + 10)]).await;
                }
            })
        })
        .collect();

    let batches: Vec<_> = pinned.into_stream().try_collect().await.unwrap();
    let rows: usize = batches.iter().map(|batch| batch.num_rows()).sum();
    assert_eq!(rows as u64, pinned_rows);

    for writer in writers {
        writer.await.unwrap();
    }
    assert_eq!(table.snapshot().len(), 41);
    assert_eq!(table.total_rows(), Some(410));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sessions_never_interleave() {
    let table = table(TableOptions::default());

    let writers: Vec<_> = (0..8i64)
        .map(|i| {
            let table = table.clone();
            tokio::spawn(async move {
                let start = i * 100;
                append(&table, (0..5).map(|j| batch(start + j..start + j + 1))).await;
            })
        })
        .collect();

    let observer = {
        let table = table.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                assert_eq!(table.snapshot().len() % 5, 0);
                tokio::task::yield_now().await;
            }
        })
    };

    for writer in writers {
        writer.await.unwrap();
    }
    observer.await.unwrap();

    let snapshot = table.snapshot();
    assert_eq!(snapshot.len(), 40);
    for session in snapshot.chunks(5) {
        let firsts: Vec<_> = session.iter().map(|batch| values_of(batch, 1)[0]).collect();
        let start = firsts[0];
        assert_eq!(firsts, (start..start + 5).collect::<Vec<_>>());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn append_waits_for_running_mutation() {
    let table = table(TableOptions::default());
    append(&table, [batch(0..2), batch(2..4), batch(4..6)]).await;

    let started = Arc::new(Notify::new());
    let mutation = {
        let table = table.clone();
        let pipeline = SlowNegate {
            started: Arc::clone(&started),
        };
        tokio::spawn(async move {
            let commands = negate_value();
            table.mutate(&commands, &pipeline).await
        })
    };

    started.notified().await;
    append(&table, [batch(9..10)]).await;
    mutation.await.unwrap().unwrap();

    let snapshot = table.snapshot();
    assert_eq!(snapshot.len(), 4);
    let rewritten: Vec<_> = snapshot[..3]
        .iter()
        .flat_map(|batch| values_of(batch, 1))
        .collect();
    assert_eq!(rewritten, vec![0, -1, -2, -3, -4, -5]);
    assert_eq!(values_of(&snapshot[3], 1), vec![9]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scan_planned_before_mutation_sees_old_values() {
    let table = table(TableOptions::default());
    append(&table, [batch(0..2), batch(2..4), batch(4..6)]).await;

    let pinned = table.read(&["value".to_string()], 2).unwrap();

    let pipeline = SlowNegate {
        started: Arc::new(Notify::new()),
    };
    table.mutate(&negate_value(), &pipeline).await.unwrap();

    let batches: Vec<_> = pinned.into_stream().try_collect().await.unwrap();
    let mut seen: Vec<_> = batches.iter().flat_map(|batch| values_of(batch, 0)).collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..6).collect::<Vec<_>>());

    let current: Vec<_> = table
        .snapshot()
        .iter()
        .flat_map(|batch| values_of(batch, 1))
        .collect();
    assert_eq!(current, vec![0, -1, -2, -3, -4, -5]);
}
