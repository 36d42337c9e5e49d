//! Per-shard listener registry.
//!
//! [`DataListeners`] owns every listener installed on one shard. The shard's
//! read and write paths call [`on_read`](DataListeners::on_read) and
//! [`on_write`](DataListeners::on_write); both dispatch only to listeners that
//! are applicable to the schema, in installation order.
//!
//! ## Example Usage
//!
//! ```
//! use toppartitions::listener::{DataListeners, ListenerId, PartitionObserver};
//! use toppartitions::partition::Mutation;
//! use toppartitions::schema::{Schema, TableName};
//! use uuid::Uuid;
//!
//! let table = TableName::new("ks", "t1");
//! let schema = Schema::new(Uuid::nil(), table.clone());
//! let id = ListenerId::new();
//!
//! let mut listeners = DataListeners::new();
//! listeners.install(Box::new(PartitionObserver::new(id, table, 16))).unwrap();
//! listeners.on_write(&schema, &Mutation::new("k1"));
//!
//! let observer = listeners.find::<PartitionObserver>(&id).unwrap();
//! assert_eq!(observer.top_writes(1)[0].count, 1);
//!
//! assert_eq!(listeners.uninstall(&id), 1);
//! assert_eq!(listeners.uninstall(&id), 0);
//! ```

use tracing::{debug, info, trace};

use crate::error::ListenerError;
use crate::listener::{DataListener, ListenerId};
#[cfg(feature = "metrics")]
use crate::metrics::{
    ListenerMetrics, ListenerMetricsRecorder, ListenerMetricsSnapshot, MetricsSnapshotProvider,
};
use crate::partition::{Mutation, PartitionRange, PartitionSlice, PartitionStream};
use crate::schema::Schema;

/// Ordered collection of the listeners installed on one shard.
pub struct DataListeners {
    listeners: Vec<Box<dyn DataListener>>,
    limit: Option<usize>,
    #[cfg(feature = "metrics")]
    metrics: ListenerMetrics,
}

impl DataListeners {
    /// Creates an empty registry with no installation limit.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            limit: None,
            #[cfg(feature = "metrics")]
            metrics: ListenerMetrics::default(),
        }
    }

    /// Creates an empty registry that accepts at most `limit` listeners.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::new()
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Takes ownership of `listener` and appends it to the dispatch order.
    pub fn install(&mut self, listener: Box<dyn DataListener>) -> Result<(), ListenerError> {
        if let Some(limit) = self.limit {
            if self.listeners.len() >= limit {
                debug!(listener = %listener.id(), limit, "listener limit reached");
                return Err(ListenerError::LimitReached { limit });
            }
        }
        info!(listener = %listener.id(), "install listener");
        self.listeners.push(listener);
        #[cfg(feature = "metrics")]
        self.metrics.record_install();
        Ok(())
    }

    /// Drops every listener carrying `id`; returns how many were removed.
    ///
    /// Unknown ids are a no-op.
    pub fn uninstall(&mut self, id: &ListenerId) -> usize {
        self.detach(id).len()
    }

    /// Removes every listener carrying `id` and hands them to the caller.
    ///
    /// Remaining listeners keep their relative order.
    pub fn detach(&mut self, id: &ListenerId) -> Vec<Box<dyn DataListener>> {
        if !self.exists(id) {
            return Vec::new();
        }
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.listeners)
            .into_iter()
            .partition(|listener| listener.id() == *id);
        self.listeners = kept;
        info!(listener = %id, removed = taken.len(), "uninstall listener");
        #[cfg(feature = "metrics")]
        self.metrics.record_uninstall(taken.len());
        taken
    }

    pub fn exists(&self, id: &ListenerId) -> bool {
        self.listeners.iter().any(|listener| listener.id() == *id)
    }

    /// Returns the first listener with `id` if it is a `T`.
    pub fn find<T: DataListener>(&self, id: &ListenerId) -> Option<&T> {
        self.listeners
            .iter()
            .find(|listener| listener.id() == *id)
            .and_then(|listener| listener.as_any().downcast_ref::<T>())
    }

    /// Iterates installed listeners in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &(dyn DataListener + 'static)> + '_ {
        self.listeners.iter().map(|listener| &**listener)
    }

    /// Lets every applicable listener wrap `reader`, first installed innermost.
    pub fn on_read<'a>(
        &'a mut self,
        schema: &Schema,
        range: &PartitionRange,
        slice: &PartitionSlice,
        reader: PartitionStream<'a>,
    ) -> PartitionStream<'a> {
        if self.listeners.is_empty() {
            return reader;
        }
        #[cfg(feature = "metrics")]
        self.metrics.record_read();

        let mut reader = reader;
        for listener in self.listeners.iter_mut() {
            if listener.is_applicable(schema) {
                trace!(listener = %listener.id(), table = %schema.name(), "dispatch read");
                reader = listener.on_read(schema, range, slice, reader);
            }
        }
        reader
    }

    /// Reports `mutation` to every applicable listener.
    pub fn on_write(&mut self, schema: &Schema, mutation: &Mutation) {
        if self.listeners.is_empty() {
            return;
        }
        #[cfg(feature = "metrics")]
        self.metrics.record_write();

        for listener in self.listeners.iter_mut() {
            if listener.is_applicable(schema) {
                trace!(listener = %listener.id(), table = %schema.name(), "dispatch write");
                listener.on_write(schema, mutation);
            }
        }
    }

    #[cfg(feature = "metrics")]
    pub fn metrics_snapshot(&self) -> ListenerMetricsSnapshot {
        ListenerMetricsSnapshot {
            installed: self.listeners.len(),
            ..self.metrics.snapshot()
        }
    }
}

impl Default for DataListeners {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DataListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataListeners")
            .field("ids", &self.listeners.iter().map(|l| l.id()).collect::<Vec<_>>())
            .field("limit", &self.limit)
            .finish()
    }
}
