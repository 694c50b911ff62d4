use std::{collections::BTreeMap, sync::Arc};

use arc_swap::ArcSwap;
use arrow::{
    array::{ArrayRef, Float64Array, RecordBatch, StringArray},
    datatypes::DataType,
    error::ArrowError,
};
use thiserror::Error;

use crate::{
    factory::StorageEngine,
    observability::log_debug,
    schema::{ColumnDescriptor, ColumnsDescription},
    table::ENGINE_NAME,
};

/// Rows held by all `AggregatingMemory` tables.
pub const TOTAL_ROWS_OF_MEMORY_TABLES: &str = "TotalRowsOfMemoryTables";
/// Bytes held by all `AggregatingMemory` tables.
pub const TOTAL_BYTES_OF_MEMORY_TABLES: &str = "TotalBytesOfMemoryTables";

/// Error returned when rendering the metrics table.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The rendered columns did not form a valid batch.
    #[error("failed to render asynchronous metrics: {0}")]
    Arrow(#[from] ArrowError),
}

/// One metric reading.
#[derive(Debug, Clone, PartialEq)]
pub struct AsynchronousMetricValue {
    /// Current value.
    pub value: f64,
    /// What the metric measures.
    pub documentation: String,
}

impl AsynchronousMetricValue {
    /// A reading of `value`.
    pub fn new(value: f64, documentation: impl Into<String>) -> Self {
        Self {
            value,
            documentation: documentation.into(),
        }
    }
}

/// Periodically recomputed metrics. Readers see the last published set
/// without blocking the updater.
#[derive(Debug, Default)]
pub struct AsynchronousMetrics {
    values: ArcSwap<BTreeMap<String, AsynchronousMetricValue>>,
}

impl AsynchronousMetrics {
    /// The last published set, by name.
    pub fn values(&self) -> Arc<BTreeMap<String, AsynchronousMetricValue>> {
        self.values.load_full()
    }

    /// The last published value of `name`.
    pub fn get(&self, name: &str) -> Option<AsynchronousMetricValue> {
        self.values.load().get(name).cloned()
    }

    /// Set or overwrite the given metrics, keeping all others.
    pub fn update(&self, updates: impl IntoIterator<Item = (String, AsynchronousMetricValue)>) {
        let updates: Vec<_> = updates.into_iter().collect();
        self.values.rcu(|current| {
            let mut next = BTreeMap::clone(current);
            next.extend(updates.iter().cloned());
            next
        });
    }

    /// Recompute the memory-table totals from the given tables. Tables of
    /// other engines, or ones that cannot report a count, are skipped.
    pub fn update_from_storages(&self, storages: &[Arc<dyn StorageEngine>]) {
        let mut total_rows = 0u64;
        let mut total_bytes = 0u64;
        for storage in storages
            .iter()
            .filter(|storage| storage.engine_name() == ENGINE_NAME)
        {
            total_rows += storage.total_rows().unwrap_or(0);
            total_bytes += storage.total_bytes().unwrap_or(0);
        }

        log_debug!(
            component = "system",
            event = "async_metrics_updated",
            total_rows,
            total_bytes,
        );

        self.update([
            (
                TOTAL_ROWS_OF_MEMORY_TABLES.to_string(),
                AsynchronousMetricValue::new(
                    total_rows as f64,
                    "Total amount of rows stored in all tables of the AggregatingMemory engine.",
                ),
            ),
            (
                TOTAL_BYTES_OF_MEMORY_TABLES.to_string(),
                AsynchronousMetricValue::new(
                    total_bytes as f64,
                    "Total amount of bytes stored in all tables of the AggregatingMemory engine.",
                ),
            ),
        ]);
    }
}

/// `system.asynchronous_metrics`: one block, one row per metric.
#[derive(Debug, Clone)]
pub struct SystemAsynchronousMetrics {
    metrics: Arc<AsynchronousMetrics>,
}

impl SystemAsynchronousMetrics {
    /// Table name within the `system` database.
    pub const NAME: &'static str = "asynchronous_metrics";

    /// A view over `metrics`.
    pub fn new(metrics: Arc<AsynchronousMetrics>) -> Self {
        Self { metrics }
    }

    /// `metric`, `value` and `description` columns.
    pub fn columns_description() -> ColumnsDescription {
        ColumnsDescription::new(vec![
            ColumnDescriptor::new("metric", DataType::Utf8, false),
            ColumnDescriptor::new("value", DataType::Float64, false),
            ColumnDescriptor::new("description", DataType::Utf8, false),
        ])
    }

    /// Render the current metric set, sorted by name.
    pub fn fill(&self) -> Result<RecordBatch, MetricsError> {
        let values = self.metrics.values();
        let metric: ArrayRef = Arc::new(StringArray::from_iter_values(values.keys()));
        let value: ArrayRef = Arc::new(Float64Array::from_iter_values(
            values.values().map(|value| value.value),
        ));
        let description: ArrayRef = Arc::new(StringArray::from_iter_values(
            values.values().map(|value| value.documentation.as_str()),
        ));

        Ok(RecordBatch::try_new(
            Self::columns_description().arrow_schema(),
            vec![metric, value, description],
        )?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::{
        array::{ArrayRef, AsArray, Int64Array, RecordBatch},
        datatypes::{DataType, Float64Type},
    };

    use super::{
        AsynchronousMetricValue, AsynchronousMetrics, SystemAsynchronousMetrics,
        TOTAL_BYTES_OF_MEMORY_TABLES, TOTAL_ROWS_OF_MEMORY_TABLES,
    };
    use crate::{
        factory::{StorageArgs, StorageEngine, StorageFactory},
        id::TableId,
        query::CreateQuery,
        schema::{ColumnDescriptor, ColumnsDescription},
        table::AggregatingMemory,
    };

    async fn memory_table(name: &str, rows: usize) -> Arc<dyn StorageEngine> {
        let columns =
            ColumnsDescription::new(vec![ColumnDescriptor::new("v", DataType::Int64, false)]);
        let storage = StorageFactory::instance()
            .get(StorageArgs {
                engine_name: "AggregatingMemory".to_string(),
                engine_args: vec![],
                table_id: TableId::new("default", name),
                columns: columns.clone(),
                constraints: Default::default(),
                query: CreateQuery::with_select("SELECT 1"),
                options: Default::default(),
            })
            .unwrap();

        let table = storage
            .as_any()
            .downcast_ref::<AggregatingMemory>()
            .unwrap();
        let batch = RecordBatch::try_new(
            columns.arrow_schema(),
            vec![Arc::new(Int64Array::from_iter_values(0..rows as i64)) as ArrayRef],
        )
        .unwrap();
        let mut sink = table.write();
        sink.append(batch).unwrap();
        sink.finalize().await;
        storage
    }

    #[tokio::test]
    async fn totals_cover_memory_tables() {
        let a = memory_table("a", 10).await;
        let b = memory_table("b", 5).await;
        let expected_bytes = a.total_bytes().unwrap() + b.total_bytes().unwrap();

        let metrics = AsynchronousMetrics::default();
        metrics.update_from_storages(&[a, b]);

        assert_eq!(metrics.get(TOTAL_ROWS_OF_MEMORY_TABLES).unwrap().value, 15.0);
        assert_eq!(
            metrics.get(TOTAL_BYTES_OF_MEMORY_TABLES).unwrap().value,
            expected_bytes as f64
        );
    }

    #[tokio::test]
    async fn fill_renders_sorted_rows() {
        let metrics = Arc::new(AsynchronousMetrics::default());
        metrics.update([(
            "Uptime".to_string(),
            AsynchronousMetricValue::new(42.0, "Server uptime in seconds."),
        )]);
        metrics.update_from_storages(&[memory_table("c", 3).await]);

        let batch = SystemAsynchronousMetrics::new(Arc::clone(&metrics))
            .fill()
            .unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(
            batch.schema().fields().len(),
            SystemAsynchronousMetrics::columns_description().len()
        );

        let names: Vec<_> = batch
            .column(0)
            .as_string::<i32>()
            .iter()
            .map(|name| name.unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                TOTAL_BYTES_OF_MEMORY_TABLES,
                TOTAL_ROWS_OF_MEMORY_TABLES,
                "Uptime"
            ]
        );
        assert_eq!(batch.column(1).as_primitive::<Float64Type>().value(1), 3.0);
        assert_eq!(batch.column(1).as_primitive::<Float64Type>().value(2), 42.0);
    }

    #[test]
    fn empty_metrics_render_empty_block() {
        let batch = SystemAsynchronousMetrics::new(Arc::default()).fill().unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 3);
    }
}
