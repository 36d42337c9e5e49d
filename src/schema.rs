//! Table identity as seen by listeners.
//!
//! A [`Schema`] is the per-shard description of one table. Listeners receive
//! it on every dispatch and decide applicability from its keyspace and table
//! names; the stable [`Uuid`] is the same on every shard.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

/// Fully qualified table name: `keyspace.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TableName {
    keyspace: String,
    table: String,
}

impl TableName {
    pub fn new(keyspace: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
        }
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns `true` if `schema` describes this table.
    pub fn matches(&self, schema: &Schema) -> bool {
        schema.keyspace() == self.keyspace && schema.table() == self.table
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.keyspace, self.table)
    }
}

/// Schema of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    id: Uuid,
    name: TableName,
}

/// Shared handle to a shard-local schema.
pub type SchemaRef = Arc<Schema>;

impl Schema {
    pub fn new(id: Uuid, name: TableName) -> Self {
        Self { id, name }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &TableName {
        &self.name
    }

    pub fn keyspace(&self) -> &str {
        self.name.keyspace()
    }

    pub fn table(&self) -> &str {
        self.name.table()
    }
}
