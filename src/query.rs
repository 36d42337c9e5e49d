//! Distributed top-partitions query.
//!
//! ## Lifecycle
//!
//! ```text
//!   Constructed ──scatter()──► Scattered ──gather(k)──► Gathered
//!        │                                                 ▲
//!        └──────────── scatter() failed (rolled back) ─────┘
//! ```
//!
//! `scatter` installs one [`PartitionObserver`] per shard under a single
//! [`ListenerId`]. `gather` detaches it from every shard, takes each shard's
//! top-k read and write lists and merges them into one ranked answer. A query
//! dropped while still `Scattered` queues the uninstall on every shard.
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//!
//! use toppartitions::config::{RuntimeConfig, TopPartitionsConfig};
//! use toppartitions::partition::Mutation;
//! use toppartitions::query::TopPartitionsQuery;
//! use toppartitions::runtime::ShardRuntime;
//! use toppartitions::schema::TableName;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let runtime = ShardRuntime::new(RuntimeConfig::builder().shards(2).build()).unwrap();
//! let table = TableName::new("ks", "events");
//! runtime.create_table(table.clone()).await.unwrap();
//!
//! let mut query = TopPartitionsQuery::new(&runtime, table.clone(), TopPartitionsConfig::default());
//! query.scatter().await.unwrap();
//! for _ in 0..3 {
//!     runtime.apply(&table, Mutation::new("hot")).await.unwrap();
//! }
//! runtime.apply(&table, Mutation::new("cold")).await.unwrap();
//!
//! let results = query.gather(10).await.unwrap();
//! assert_eq!(results.write[0].count, 3);
//! assert_eq!(results.write.len(), 2);
//! assert!(results.read.is_empty());
//! # });
//! ```

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::TopPartitionsConfig;
use crate::ds::shard::ShardId;
use crate::ds::space_saving::{Counter, FrequencyEstimator};
use crate::error::{QueryError, Result};
use crate::listener::{ListenerId, PartitionObserver};
use crate::partition::PartitionKey;
use crate::runtime::ShardRuntime;
use crate::schema::TableName;

/// Lifecycle state of a [`TopPartitionsQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Constructed,
    Scattered,
    Gathered,
}

impl QueryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Constructed => "constructed",
            Self::Scattered => "scattered",
            Self::Gathered => "gathered",
        }
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merged top-k lists, most frequent first, keyed by canonical partition key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopPartitionsResults {
    pub read: Vec<Counter<String>>,
    pub write: Vec<Counter<String>>,
}

impl TopPartitionsResults {
    /// Flattens both lists into report records.
    pub fn records(&self) -> TopPartitionRecords {
        fn convert(list: &[Counter<String>]) -> Vec<TopPartitionRecord> {
            list.iter()
                .map(|c| TopPartitionRecord {
                    partition: c.item.clone(),
                    count: c.count,
                    error: c.error,
                })
                .collect()
        }
        TopPartitionRecords {
            read: convert(&self.read),
            write: convert(&self.write),
        }
    }
}

/// One reported partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopPartitionRecord {
    pub partition: String,
    pub count: u64,
    pub error: u64,
}

impl TopPartitionRecord {
    /// Decodes the partition key from its canonical form.
    pub fn partition_key(&self) -> std::result::Result<PartitionKey, hex::FromHexError> {
        PartitionKey::from_canonical(&self.partition)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopPartitionRecords {
    pub read: Vec<TopPartitionRecord>,
    pub write: Vec<TopPartitionRecord>,
}

/// One top-partitions collection window over every shard.
#[derive(Debug)]
pub struct TopPartitionsQuery<'r> {
    runtime: &'r ShardRuntime,
    id: ListenerId,
    table: TableName,
    config: TopPartitionsConfig,
    state: QueryState,
}

impl<'r> TopPartitionsQuery<'r> {
    /// Creates a query with a fresh listener id; nothing is installed yet.
    pub fn new(runtime: &'r ShardRuntime, table: TableName, config: TopPartitionsConfig) -> Self {
        Self {
            runtime,
            id: ListenerId::new(),
            table,
            config,
            state: QueryState::Constructed,
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn config(&self) -> &TopPartitionsConfig {
        &self.config
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    /// Installs an observer on every shard.
    ///
    /// If any shard fails, the observer is removed from every shard, the
    /// query becomes `Gathered` and the first failure (in shard order) is
    /// returned.
    #[tracing::instrument(skip(self), fields(listener = %self.id, table = %self.table))]
    pub async fn scatter(&mut self) -> Result<()> {
        self.expect_state(QueryState::Constructed)?;
        // Installs may land even if this future is dropped; let Drop clean up.
        self.state = QueryState::Scattered;

        let (id, table, capacity) = (self.id, self.table.clone(), self.config.capacity());
        let installs = self
            .runtime
            .invoke_on_all(move |db| {
                let observer = PartitionObserver::new(id, table.clone(), capacity);
                db.listeners_mut().install(Box::new(observer))
            })
            .await;

        let failure = self
            .runtime
            .shards()
            .zip(installs)
            .find_map(|(shard, result)| match result {
                Ok(Ok(())) => None,
                Ok(Err(source)) => Some(QueryError::Listener { shard, source }),
                Err(err) => Some(QueryError::from(err)),
            });

        if let Some(err) = failure {
            warn!(error = %err, "scatter failed, rolling back");
            self.uninstall_everywhere().await;
            self.state = QueryState::Gathered;
            return Err(err);
        }

        info!(shards = self.runtime.shard_count(), "observers installed");
        Ok(())
    }

    /// Removes the observer from every shard and merges its top-`result_size`
    /// lists.
    ///
    /// The query is `Gathered` afterwards whatever the outcome. If any shard
    /// fails, the partial result is discarded and the first failure (in shard
    /// order) is returned; every shard that could still be reached has
    /// dropped its observer.
    #[tracing::instrument(skip(self), fields(listener = %self.id, table = %self.table))]
    pub async fn gather(&mut self, result_size: usize) -> Result<TopPartitionsResults> {
        self.expect_state(QueryState::Scattered)?;
        self.state = QueryState::Gathered;

        let id = self.id;
        let per_shard = self
            .runtime
            .invoke_on_all(move |db| {
                let shard = db.shard();
                db.listeners_mut()
                    .detach(&id)
                    .into_iter()
                    .find_map(|listener| listener.into_any().downcast::<PartitionObserver>().ok())
                    .map(|observer| (observer.top_reads(result_size), observer.top_writes(result_size)))
                    .ok_or(QueryError::ListenerMissing { shard })
            })
            .await;

        let capacity = self.config.capacity();
        let mut read = FrequencyEstimator::new(capacity);
        let mut write = FrequencyEstimator::new(capacity);
        for result in per_shard {
            let (reads, writes) = match result {
                Ok(Ok(lists)) => lists,
                Ok(Err(err)) => return Err(gather_failed(err)),
                Err(err) => return Err(gather_failed(err.into())),
            };
            read.merge_top(reads);
            write.merge_top(writes);
        }

        let results = TopPartitionsResults {
            read: read.top(result_size),
            write: write.top(result_size),
        };
        info!(
            reads = results.read.len(),
            writes = results.write.len(),
            "observers gathered"
        );
        Ok(results)
    }

    /// Validates the request, then scatters, waits `duration` and gathers the
    /// configured list size.
    ///
    /// Nothing is installed on any shard unless validation passes.
    #[tracing::instrument(skip(runtime, config))]
    pub async fn run(
        runtime: &ShardRuntime,
        keyspace: &str,
        table: &str,
        duration: Duration,
        config: TopPartitionsConfig,
    ) -> Result<TopPartitionsResults> {
        if keyspace.is_empty() || table.is_empty() {
            return Err(QueryError::InvalidRequest(
                "keyspace and table must not be empty".to_string(),
            ));
        }
        if duration.is_zero() {
            return Err(QueryError::InvalidRequest(
                "duration must be positive".to_string(),
            ));
        }
        config.validate()?;

        let name = TableName::new(keyspace, table);
        let lookup = name.clone();
        let exists = runtime
            .invoke_on(ShardId::new(0), move |db| db.find_schema(&lookup).is_some())
            .await?;
        if !exists {
            return Err(QueryError::UnknownTable(name));
        }

        let mut query = TopPartitionsQuery::new(runtime, name, config);
        query.scatter().await?;
        runtime.sleep(duration).await;
        query.gather(config.list_size()).await
    }

    fn expect_state(&self, expected: QueryState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(QueryError::InvalidState {
                expected: expected.as_str(),
                actual: self.state.as_str(),
            })
        }
    }

    async fn uninstall_everywhere(&self) {
        let id = self.id;
        let results = self
            .runtime
            .invoke_on_all(move |db| db.listeners_mut().uninstall(&id))
            .await;
        for err in results.into_iter().filter_map(|r| r.err()) {
            warn!(error = %err, "uninstall failed during rollback");
        }
    }
}

impl Drop for TopPartitionsQuery<'_> {
    fn drop(&mut self) {
        if self.state != QueryState::Scattered {
            return;
        }
        let id = self.id;
        let queued = self.runtime.submit_on_all(move |db| {
            db.listeners_mut().uninstall(&id);
        });
        warn!(listener = %id, shards = queued, "query dropped before gather, uninstalling");
    }
}

fn gather_failed(err: QueryError) -> QueryError {
    warn!(error = %err, "gather failed, discarding partial result");
    err
}

/// Parses a collection window given in milliseconds.
///
/// ```
/// use std::time::Duration;
/// use toppartitions::query::parse_duration_ms;
///
/// assert_eq!(parse_duration_ms("250").unwrap(), Duration::from_millis(250));
/// assert!(parse_duration_ms("0").is_err());
/// assert!(parse_duration_ms("soon").is_err());
/// ```
pub fn parse_duration_ms(input: &str) -> Result<Duration> {
    let millis: u64 = input
        .trim()
        .parse()
        .map_err(|_| QueryError::InvalidRequest(format!("invalid duration {input:?}")))?;
    if millis == 0 {
        return Err(QueryError::InvalidRequest(
            "duration must be positive".to_string(),
        ));
    }
    Ok(Duration::from_millis(millis))
}
