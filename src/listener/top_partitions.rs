//! Top-partitions sampling listener.
//!
//! A [`PartitionObserver`] is installed on every shard for the duration of a
//! query window. It counts, per canonical partition key, how often the target
//! table's partitions are read and written, each in its own
//! [`FrequencyEstimator`].
//!
//! ```
//! use toppartitions::listener::{DataListener, ListenerId, PartitionObserver};
//! use toppartitions::partition::{Mutation, Partition, PartitionRange, PartitionSlice};
//! use toppartitions::schema::{Schema, TableName};
//! use uuid::Uuid;
//!
//! let table = TableName::new("ks", "t1");
//! let schema = Schema::new(Uuid::nil(), table.clone());
//! let mut observer = PartitionObserver::new(ListenerId::new(), table, 8);
//!
//! observer.on_write(&schema, &Mutation::new("k1"));
//! let reader = Box::new(vec![Partition::new("k1"), Partition::new("k2")].into_iter());
//! let read: Vec<_> = observer
//!     .on_read(&schema, &PartitionRange::Full, &PartitionSlice::full(), reader)
//!     .collect();
//!
//! assert_eq!(read.len(), 2);
//! assert_eq!(observer.top_reads(10).len(), 2);
//! assert_eq!(observer.top_writes(10)[0].item, read[0].key().canonical());
//! ```

use std::any::Any;

use crate::ds::space_saving::{Counter, FrequencyEstimator};
use crate::listener::{DataListener, ListenerId};
use crate::partition::{tap, Mutation, PartitionRange, PartitionSlice, PartitionStream};
use crate::schema::{Schema, TableName};

/// Observer counting read and write frequency of one table's partitions.
#[derive(Debug)]
pub struct PartitionObserver {
    id: ListenerId,
    table: TableName,
    read: FrequencyEstimator<String>,
    write: FrequencyEstimator<String>,
}

impl PartitionObserver {
    /// Creates an observer whose estimators each track up to `capacity` keys.
    pub fn new(id: ListenerId, table: TableName, capacity: usize) -> Self {
        Self {
            id,
            table,
            read: FrequencyEstimator::new(capacity),
            write: FrequencyEstimator::new(capacity),
        }
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn reads(&self) -> &FrequencyEstimator<String> {
        &self.read
    }

    pub fn writes(&self) -> &FrequencyEstimator<String> {
        &self.write
    }

    /// The `k` most read partitions seen so far.
    pub fn top_reads(&self, k: usize) -> Vec<Counter<String>> {
        self.read.top(k)
    }

    /// The `k` most written partitions seen so far.
    pub fn top_writes(&self, k: usize) -> Vec<Counter<String>> {
        self.write.top(k)
    }
}

impl DataListener for PartitionObserver {
    fn id(&self) -> ListenerId {
        self.id
    }

    fn is_applicable(&self, schema: &Schema) -> bool {
        self.table.matches(schema)
    }

    fn on_write(&mut self, _schema: &Schema, mutation: &Mutation) {
        self.write.append(mutation.key().canonical());
    }

    fn on_read<'a>(
        &'a mut self,
        _schema: &Schema,
        _range: &PartitionRange,
        _slice: &PartitionSlice,
        reader: PartitionStream<'a>,
    ) -> PartitionStream<'a> {
        let read = &mut self.read;
        tap(reader, move |key| {
            read.append(key.canonical());
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
