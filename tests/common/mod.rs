#![allow(dead_code)]

use std::sync::Arc;

use aggregating_memory::{
    AggregatingMemory, ColumnDescriptor, ColumnsDescription, CreateQuery, TableId, TableOptions,
};
use arrow::{
    array::{ArrayRef, AsArray, Int64Array, RecordBatch, StringArray},
    datatypes::{DataType, Int64Type},
};

pub fn columns() -> ColumnsDescription {
    ColumnsDescription::new(vec![
        ColumnDescriptor::new("key", DataType::Utf8, false),
        ColumnDescriptor::new("value", DataType::Int64, false),
    ])
}

pub fn table(option: TableOptions) -> AggregatingMemory {
    AggregatingMemory::new(
        TableId::new("default", "agg"),
        columns(),
        Default::default(),
        &CreateQuery::with_select("SELECT key, sum(value) AS value FROM events GROUP BY key"),
        option,
    )
    .unwrap()
}

/// A batch whose `value` column holds `values`.
pub fn batch(values: std::ops::Range<i64>) -> RecordBatch {
    let keys: ArrayRef = Arc::new(StringArray::from_iter_values(
        values.clone().map(|v| format!("k{v}")),
    ));
    let values: ArrayRef = Arc::new(Int64Array::from_iter_values(values));
    RecordBatch::try_new(columns().arrow_schema(), vec![keys, values]).unwrap()
}

pub fn values_of(batch: &RecordBatch, column: usize) -> Vec<i64> {
    batch
        .column(column)
        .as_primitive::<Int64Type>()
        .values()
        .to_vec()
}

pub async fn append(table: &AggregatingMemory, batches: impl IntoIterator<Item = RecordBatch>) {
    let mut sink = table.write();
    for batch in batches {
        sink.append(batch).unwrap();
    }
    sink.finalize().await;
}
