#![deny(missing_docs)]
//! In-memory `AggregatingMemory` table engine over Arrow record batches.
//!
//! A table holds its rows as an ordered sequence of immutable `RecordBatch`
//! values. Readers pin a snapshot of that sequence and scan it in parallel;
//! writers buffer batches and publish them atomically; mutations rewrite the
//! sequence through a caller-provided pipeline.

mod observability;

/// Table identity.
pub mod id;

/// Per-table configuration.
pub mod option;

/// Defining `SELECT` of a table.
pub mod query;

/// Column metadata, subcolumn resolution and batch validation.
pub mod schema;

/// Copy-on-write batch storage.
pub mod store;

/// The table engine and its scan, append and mutation paths.
pub mod table;

/// Engine registry.
pub mod factory;

/// Block compression codecs.
pub mod codec;

/// SSH public key material.
pub mod ssh;

/// Client connection parameters.
pub mod connection;

/// System tables.
pub mod system;

pub use crate::{
    id::TableId,
    option::{MutationCounterMode, TableOptions},
    query::{CreateQuery, SelectQuery},
    schema::{
        ColumnDescriptor, ColumnsDescription, ConstraintsDescription, NameAndType, TableMetadata,
        ValidationError,
    },
    store::Snapshot,
    table::{
        AggregatingMemory, AppendError, AppendSink, CreateError, MutationCommand, MutationError,
        RewriteOutput, RewritePipeline, RewriteRequest, ScanError, ScanPipe, ScanSource,
    },
};
