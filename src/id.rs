use std::fmt;

use ulid::Ulid;

/// Identity of a table within the surrounding catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableId {
    /// Database the table belongs to.
    pub database: String,
    /// Table name within the database.
    pub table: String,
    /// Unique across renames and re-creations under the same name.
    pub uuid: Ulid,
}

impl TableId {
    /// A fresh identity for `database.table`.
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            uuid: Ulid::new(),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::TableId;

    #[test]
    fn display_and_identity() {
        let a = TableId::new("db", "events");
        let b = TableId::new("db", "events");
        assert_eq!(a.to_string(), "db.events");
        assert_ne!(a.uuid, b.uuid);
        assert_ne!(a, b);
    }
}
