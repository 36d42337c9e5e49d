pub use crate::config::{RuntimeConfig, TopPartitionsConfig};
pub use crate::database::Database;
pub use crate::ds::{Counter, FrequencyEstimator, ShardId, ShardSelector};
pub use crate::error::{ConfigError, EngineError, ListenerError, QueryError, ShardError};
pub use crate::listener::{DataListener, DataListeners, ListenerId, PartitionObserver};
#[cfg(feature = "metrics")]
pub use crate::metrics::ListenerMetricsSnapshot;
pub use crate::partition::{
    Mutation, Partition, PartitionKey, PartitionRange, PartitionSlice, PartitionStream,
};
pub use crate::query::{
    parse_duration_ms, QueryState, TopPartitionRecord, TopPartitionsQuery, TopPartitionsResults,
};
pub use crate::runtime::ShardRuntime;
pub use crate::schema::{Schema, SchemaRef, TableName};
