//! Defining query captured at table creation.
//!
//! The engine never evaluates the query; it only checks that exactly one
//! non-union `SELECT` was given and keeps it for the surrounding system,
//! which uses it to decide aggregation semantics.

use std::fmt;

use crate::table::CreateError;

/// One `SELECT` clause, kept as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectClause {
    text: String,
}

impl SelectClause {
    /// Wrap the text of one `SELECT`.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The clause as written.
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for SelectClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A `SELECT ... [UNION ALL SELECT ...]` list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectQuery {
    /// Clauses joined by `UNION ALL`, in order.
    pub list_of_selects: Vec<SelectClause>,
}

impl SelectQuery {
    /// A query of one clause.
    pub fn single(select: impl Into<String>) -> Self {
        Self {
            list_of_selects: vec![SelectClause::new(select)],
        }
    }

    /// A `UNION ALL` of `selects`.
    pub fn union(selects: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            list_of_selects: selects.into_iter().map(SelectClause::new).collect(),
        }
    }
}

/// The parts of a `CREATE TABLE` statement the engine consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateQuery {
    /// The `AS SELECT ...` part, if any.
    pub select: Option<SelectQuery>,
}

impl CreateQuery {
    /// `CREATE TABLE ... AS select`.
    pub fn with_select(select: impl Into<String>) -> Self {
        Self {
            select: Some(SelectQuery::single(select)),
        }
    }
}

impl fmt::Display for CreateQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.select {
            None => f.write_str("CREATE TABLE"),
            Some(select) => {
                f.write_str("CREATE TABLE AS ")?;
                for (idx, clause) in select.list_of_selects.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(" UNION ALL ")?;
                    }
                    write!(f, "{clause}")?;
                }
                Ok(())
            }
        }
    }
}

/// The validated defining query of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQueryDescription {
    select: SelectClause,
}

impl SelectQueryDescription {
    /// Extract the single defining `SELECT` from a create statement.
    pub fn from_create_query(query: &CreateQuery) -> Result<Self, CreateError> {
        let select = query
            .select
            .as_ref()
            .ok_or(CreateError::MissingDefiningQuery)?;

        match select.list_of_selects.as_slice() {
            [single] => Ok(Self {
                select: single.clone(),
            }),
            other => Err(CreateError::UnsupportedUnionQuery {
                selects: other.len(),
            }),
        }
    }

    /// The defining clause.
    pub fn select(&self) -> &SelectClause {
        &self.select
    }
}

#[cfg(test)]
mod tests {
    use super::{CreateQuery, SelectQuery, SelectQueryDescription};
    use crate::table::CreateError;

    #[test]
    fn single_select_is_accepted() {
        let query = CreateQuery::with_select("SELECT k, sum(v) FROM src GROUP BY k");
        let description = SelectQueryDescription::from_create_query(&query).unwrap();
        assert_eq!(
            description.select().text(),
            "SELECT k, sum(v) FROM src GROUP BY k"
        );
    }

    #[test]
    fn missing_select_is_rejected() {
        let err = SelectQueryDescription::from_create_query(&CreateQuery::default()).unwrap_err();
        assert!(matches!(err, CreateError::MissingDefiningQuery));
    }

    #[test]
    fn union_is_rejected() {
        let query = CreateQuery {
            select: Some(SelectQuery::union(["SELECT 1", "SELECT 2"])),
        };
        let err = SelectQueryDescription::from_create_query(&query).unwrap_err();
        assert!(matches!(
            err,
            CreateError::UnsupportedUnionQuery { selects: 2 }
        ));

        let empty = CreateQuery {
            select: Some(SelectQuery::default()),
        };
        assert!(matches!(
            SelectQueryDescription::from_create_query(&empty),
            Err(CreateError::UnsupportedUnionQuery { selects: 0 })
        ));
    }

    #[test]
    fn display_joins_union() {
        let query = CreateQuery {
            select: Some(SelectQuery::union(["SELECT 1", "SELECT 2"])),
        };
        assert_eq!(
            query.to_string(),
            "CREATE TABLE AS SELECT 1 UNION ALL SELECT 2"
        );
    }
}
