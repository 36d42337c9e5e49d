//! Read/write listeners installed on a shard.
//!
//! ## Architecture
//!
//! ```text
//!   write(schema, mutation)            read(schema, range, slice)
//!            │                                   │
//!            ▼                                   ▼
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │  DataListeners (one per shard, owns Box<dyn DataListener>)  │
//!   │                                                              │
//!   │  for each listener, in installation order:                   │
//!   │    if is_applicable(schema):                                 │
//!   │      on_write(schema, mutation)          (side effect only)  │
//!   │      reader = on_read(schema, .., reader)  (wrap the stream) │
//!   └──────────────────────────────────────────────────────────────┘
//!            │                                   │
//!            ▼                                   ▼
//!     mutation applied                reader ─► tap ─► tap ─► consumer
//! ```
//!
//! Listeners observe only: the partitions a reader yields and the mutations
//! a shard applies are identical whichever listeners are installed.
//!
//! ## Key Components
//!
//! - [`ListenerId`]: time-ordered id shared by one query's listeners on every
//!   shard
//! - [`DataListener`]: the capability every listener implements
//! - [`DataListeners`]: the per-shard registry
//! - [`PartitionObserver`]: top-partitions sampling listener

use std::any::Any;
use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::partition::{Mutation, PartitionRange, PartitionSlice, PartitionStream};
use crate::schema::Schema;

pub mod registry;
pub mod top_partitions;

pub use registry::DataListeners;
pub use top_partitions::PartitionObserver;

/// Identifier correlating one query's listeners across shards.
///
/// UUIDv7, so ids sort by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ListenerId(Uuid);

impl ListenerId {
    /// Allocates a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Capability implemented by every listener a shard can dispatch to.
///
/// Dispatch happens synchronously on the shard's worker, on the hot path of
/// every read and write, so implementations must not block and must never
/// fail into the data path. Listeners move with their shard's `Database`
/// onto its worker thread, hence `Send`.
pub trait DataListener: Any + Send {
    fn id(&self) -> ListenerId;

    /// Whether this listener wants events for `schema`'s table.
    fn is_applicable(&self, _schema: &Schema) -> bool {
        true
    }

    /// Invoked once per applied mutation, with partition granularity.
    fn on_write(&mut self, _schema: &Schema, _mutation: &Mutation) {}

    /// Invoked when a read builds its partition stream.
    ///
    /// The returned stream replaces `reader`. It may borrow the listener for
    /// the duration of the read.
    fn on_read<'a>(
        &'a mut self,
        _schema: &Schema,
        _range: &PartitionRange,
        _slice: &PartitionSlice,
        reader: PartitionStream<'a>,
    ) -> PartitionStream<'a> {
        reader
    }

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}
