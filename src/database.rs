//! Per-shard in-memory storage.
//!
//! A [`Database`] owns one shard's tables and its [`DataListeners`]. Every
//! write is reported to the listeners before it is applied; every read builds
//! a lazy partition stream, lets the listeners wrap it, then materializes the
//! result. Listeners never change what is stored or returned.
//!
//! ```
//! use toppartitions::database::Database;
//! use toppartitions::ds::ShardId;
//! use toppartitions::partition::{Mutation, PartitionRange, PartitionSlice};
//! use toppartitions::schema::{Schema, TableName};
//! use uuid::Uuid;
//!
//! let table = TableName::new("ks", "t1");
//! let mut db = Database::new(ShardId::new(0));
//! db.create_table(Schema::new(Uuid::now_v7(), table.clone()));
//!
//! db.apply(&table, Mutation::new("k1").with_row("c", "v")).unwrap();
//! let rows = db.query(&table, &PartitionRange::Full, &PartitionSlice::full()).unwrap();
//! assert_eq!(rows.len(), 1);
//! assert_eq!(rows[0].row_count(), 1);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::ds::shard::ShardId;
use crate::error::EngineError;
use crate::listener::DataListeners;
use crate::partition::{Mutation, Partition, PartitionKey, PartitionRange, PartitionSlice, PartitionStream};
use crate::schema::{Schema, SchemaRef, TableName};

#[derive(Debug)]
struct Table {
    schema: SchemaRef,
    partitions: BTreeMap<PartitionKey, Partition>,
}

/// One shard's tables plus the listeners observing them.
#[derive(Debug)]
pub struct Database {
    shard: ShardId,
    tables: FxHashMap<TableName, Table>,
    listeners: DataListeners,
}

impl Database {
    /// Creates an empty shard database with an unlimited listener registry.
    pub fn new(shard: ShardId) -> Self {
        Self::with_listeners(shard, DataListeners::new())
    }

    pub fn with_listeners(shard: ShardId, listeners: DataListeners) -> Self {
        Self {
            shard,
            tables: FxHashMap::default(),
            listeners,
        }
    }

    pub fn shard(&self) -> ShardId {
        self.shard
    }

    /// Registers `schema`; an existing table of the same name is kept as is.
    pub fn create_table(&mut self, schema: Schema) -> SchemaRef {
        let table = self.tables.entry(schema.name().clone()).or_insert_with(|| {
            debug!(shard = %self.shard, table = %schema.name(), "create table");
            Table {
                schema: Arc::new(schema),
                partitions: BTreeMap::new(),
            }
        });
        Arc::clone(&table.schema)
    }

    pub fn find_schema(&self, name: &TableName) -> Option<SchemaRef> {
        self.tables.get(name).map(|t| Arc::clone(&t.schema))
    }

    /// Number of partitions stored for `name` on this shard.
    pub fn partition_count(&self, name: &TableName) -> Option<usize> {
        self.tables.get(name).map(|t| t.partitions.len())
    }

    /// Applies `mutation` to `name`, notifying listeners first.
    pub fn apply(&mut self, name: &TableName, mutation: Mutation) -> Result<(), EngineError> {
        let table = self
            .tables
            .get_mut(name)
            .ok_or_else(|| EngineError::UnknownTable(name.clone()))?;

        self.listeners.on_write(&table.schema, &mutation);
        table
            .partitions
            .entry(mutation.key().clone())
            .or_insert_with(|| Partition::new(mutation.key().clone()))
            .apply(&mutation);
        Ok(())
    }

    /// Reads the partitions of `name` selected by `range`, in key order.
    ///
    /// The slice's row limit is applied to each partition after the listener
    /// chain has seen it.
    pub fn query(
        &mut self,
        name: &TableName,
        range: &PartitionRange,
        slice: &PartitionSlice,
    ) -> Result<Vec<Partition>, EngineError> {
        let table = self
            .tables
            .get(name)
            .ok_or_else(|| EngineError::UnknownTable(name.clone()))?;

        let source: PartitionStream<'_> = Box::new(
            table
                .partitions
                .values()
                .filter(move |p| range.contains(p.key()))
                .cloned(),
        );
        let reader = self.listeners.on_read(&table.schema, range, slice, source);

        let row_limit = slice.row_limit();
        Ok(reader
            .map(|mut partition| {
                if let Some(limit) = row_limit {
                    partition.truncate_rows(limit);
                }
                partition
            })
            .collect())
    }

    pub fn listeners(&self) -> &DataListeners {
        &self.listeners
    }

    pub fn listeners_mut(&mut self) -> &mut DataListeners {
        &mut self.listeners
    }
}
