//! Table schema: declared columns, constraints, and the checks applied to
//! batches entering or leaving the engine.

mod subcolumn;

use std::{collections::HashSet, fmt, sync::Arc};

use arrow::{
    array::{Array, ArrayRef, RecordBatch},
    datatypes::{DataType, Field, FieldRef, Schema, SchemaRef},
};
use thiserror::Error;

pub(crate) use self::subcolumn::extract_subcolumn;
use self::subcolumn::{subcolumn_field, SUBCOLUMN_SEPARATOR};
use crate::query::SelectQueryDescription;

/// A declared storage column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Storage column name.
    pub name: String,
    /// Arrow type of the column.
    pub data_type: DataType,
    /// Whether the column accepts nulls.
    pub nullable: bool,
}

impl ColumnDescriptor {
    /// Describe one column.
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }

    fn arrow_field(&self) -> Field {
        Field::new(&self.name, self.data_type.clone(), self.nullable)
    }
}

impl From<&Field> for ColumnDescriptor {
    fn from(field: &Field) -> Self {
        ColumnDescriptor::new(
            field.name().clone(),
            field.data_type().clone(),
            field.is_nullable(),
        )
    }
}

/// The ordered set of columns a table is created with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnsDescription {
    columns: Vec<ColumnDescriptor>,
}

impl ColumnsDescription {
    /// Columns in declaration order.
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns }
    }

    /// The storage column named `name`.
    pub fn get(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Columns in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter()
    }

    /// Number of declared columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether no column is declared.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Arrow schema of the storage columns, in declaration order.
    pub fn arrow_schema(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.columns
                .iter()
                .map(ColumnDescriptor::arrow_field)
                .collect::<Vec<_>>(),
        ))
    }

    /// Resolve a requested name to a storage column or a subcolumn of one.
    ///
    /// An exact storage-column match wins. Otherwise the longest declared
    /// prefix (split at `.`) is taken as the storage column and the remainder
    /// as the subcolumn path.
    pub fn resolve(&self, name: &str) -> Option<NameAndType> {
        if let Some(column) = self.get(name) {
            return Some(NameAndType {
                storage_name: column.name.clone(),
                subcolumn: None,
                field: Arc::new(column.arrow_field()),
            });
        }

        let mut split_points = name
            .match_indices(SUBCOLUMN_SEPARATOR)
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();
        split_points.reverse();

        for idx in split_points {
            let (storage_name, rest) = (&name[..idx], &name[idx + 1..]);
            let Some(column) = self.get(storage_name) else {
                continue;
            };
            let field = subcolumn_field(&column.arrow_field(), rest.split(SUBCOLUMN_SEPARATOR))?;
            return Some(NameAndType {
                storage_name: column.name.clone(),
                subcolumn: Some(rest.to_string()),
                field: Arc::new(field.as_ref().clone().with_name(name)),
            });
        }
        None
    }
}

impl FromIterator<ColumnDescriptor> for ColumnsDescription {
    fn from_iter<T: IntoIterator<Item = ColumnDescriptor>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A requested column bound to its storage column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameAndType {
    storage_name: String,
    subcolumn: Option<String>,
    field: FieldRef,
}

impl NameAndType {
    /// Name as requested, `storage.sub.path` for subcolumns.
    pub fn name(&self) -> &str {
        self.field.name()
    }

    /// Column the data is read from.
    pub fn storage_name(&self) -> &str {
        &self.storage_name
    }

    /// Path inside the storage column, for subcolumns.
    pub fn subcolumn_name(&self) -> Option<&str> {
        self.subcolumn.as_deref()
    }

    /// Whether this names a part of a composite column.
    pub fn is_subcolumn(&self) -> bool {
        self.subcolumn.is_some()
    }

    /// Output field; named after the requested name.
    pub fn field(&self) -> &FieldRef {
        &self.field
    }

    /// Project this column out of `storage_column`.
    pub(crate) fn project(&self, storage_column: &ArrayRef) -> Option<ArrayRef> {
        match &self.subcolumn {
            Some(path) => extract_subcolumn(storage_column, path.split(SUBCOLUMN_SEPARATOR)),
            None => Some(Arc::clone(storage_column)),
        }
    }
}

/// A named check constraint. The expression is carried for the surrounding
/// engine and is not evaluated here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    /// Constraint name.
    pub name: String,
    /// Boolean expression as written.
    pub expression: String,
}

/// Constraints declared with the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintsDescription {
    /// Constraints in declaration order.
    pub constraints: Vec<Constraint>,
}

/// Batch rejected by the declared schema.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The batch carries a column the table does not declare.
    #[error("column `{0}` is not declared in the table")]
    UnexpectedColumn(String),
    /// A declared column is absent from the batch.
    #[error("column `{0}` is missing from the batch")]
    MissingColumn(String),
    /// The batch carries a column twice.
    #[error("column `{0}` appears more than once in the batch")]
    DuplicateColumn(String),
    /// A column's type differs from its declaration.
    #[error("column `{name}` has type {actual}, expected {expected}")]
    TypeMismatch {
        /// Column name.
        name: String,
        /// Declared type.
        expected: DataType,
        /// Type found in the batch.
        actual: DataType,
    },
    /// A NOT NULL column holds nulls.
    #[error("column `{0}` is declared NOT NULL but the batch contains nulls")]
    NullabilityMismatch(String),
}

/// Unknown column requested from the table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("there is no column `{name}` in table")]
pub struct UnknownColumn {
    /// The name as requested.
    pub name: String,
}

/// Metadata fixed at table creation.
#[derive(Debug, Clone)]
pub struct TableMetadata {
    columns: ColumnsDescription,
    constraints: ConstraintsDescription,
    select: SelectQueryDescription,
    schema: SchemaRef,
}

impl TableMetadata {
    pub(crate) fn new(
        columns: ColumnsDescription,
        constraints: ConstraintsDescription,
        select: SelectQueryDescription,
    ) -> Self {
        let schema = columns.arrow_schema();
        Self {
            columns,
            constraints,
            select,
            schema,
        }
    }

    /// Declared columns.
    pub fn columns(&self) -> &ColumnsDescription {
        &self.columns
    }

    /// Declared constraints.
    pub fn constraints(&self) -> &ConstraintsDescription {
        &self.constraints
    }

    /// The defining query.
    pub fn select_query(&self) -> &SelectQueryDescription {
        &self.select
    }

    /// Arrow schema of all storage columns.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Resolve every requested name, failing on the first unknown one.
    pub fn check_columns(&self, names: &[String]) -> Result<Vec<NameAndType>, UnknownColumn> {
        names
            .iter()
            .map(|name| {
                self.columns.resolve(name).ok_or_else(|| UnknownColumn {
                    name: name.clone(),
                })
            })
            .collect()
    }

    /// Output schema for a projection over `columns`.
    pub fn sample_schema_for(columns: &[NameAndType]) -> SchemaRef {
        Arc::new(Schema::new(
            columns
                .iter()
                .map(|column| Arc::clone(column.field()))
                .collect::<Vec<_>>(),
        ))
    }

    /// Check a batch against the declared columns.
    ///
    /// Every batch column must be declared with the same type and, when
    /// declared NOT NULL, carry no nulls. With `need_all`, every declared
    /// column must also be present.
    pub fn check_batch(&self, batch: &RecordBatch, need_all: bool) -> Result<(), ValidationError> {
        let mut seen = HashSet::with_capacity(batch.num_columns());

        for (field, array) in batch.schema_ref().fields().iter().zip(batch.columns()) {
            let name = field.name();
            if !seen.insert(name.as_str()) {
                return Err(ValidationError::DuplicateColumn(name.clone()));
            }
            let declared = self
                .columns
                .get(name)
                .ok_or_else(|| ValidationError::UnexpectedColumn(name.clone()))?;
            if declared.data_type != *array.data_type() {
                return Err(ValidationError::TypeMismatch {
                    name: name.clone(),
                    expected: declared.data_type.clone(),
                    actual: array.data_type().clone(),
                });
            }
            if !declared.nullable && array.null_count() > 0 {
                return Err(ValidationError::NullabilityMismatch(name.clone()));
            }
        }

        if need_all {
            if let Some(missing) = self
                .columns
                .iter()
                .find(|column| !seen.contains(column.name.as_str()))
            {
                return Err(ValidationError::MissingColumn(missing.name.clone()));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ColumnsDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, column) in self.columns.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", column.name, column.data_type)?;
            if !column.nullable {
                f.write_str(" NOT NULL")?;
            }
        }
        Ok(())
    }
}
