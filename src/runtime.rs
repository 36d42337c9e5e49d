//! Shard-per-thread runtime.
//!
//! ## Architecture
//!
//! ```text
//!   async caller                      shard workers (one OS thread each)
//!   ────────────                      ─────────────────────────────────
//!   invoke_on(s, f) ──── Task ───►  [ shard 0 ] owns Database 0
//!        ▲                           [ shard 1 ] owns Database 1
//!        └──── oneshot reply ◄────   [   ...   ]
//!
//!   invoke_on_all(f) = join_all(invoke_on(s, f) for s in shards)
//! ```
//!
//! Each worker owns its [`Database`] exclusively; the only way to touch shard
//! state is to send a closure to that shard. Closures on one shard run one
//! at a time, in submission order. A panicking closure is reported as
//! [`ShardError::Panicked`] and the worker keeps serving.
//!
//! ## Example
//!
//! ```
//! use toppartitions::config::RuntimeConfig;
//! use toppartitions::runtime::ShardRuntime;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let runtime = ShardRuntime::new(RuntimeConfig::builder().shards(3).build()).unwrap();
//! let ids = runtime.invoke_on_all(|db| db.shard().index()).await;
//! let ids: Vec<_> = ids.into_iter().map(Result::unwrap).collect();
//! assert_eq!(ids, vec![0, 1, 2]);
//! # });
//! ```

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RuntimeConfig;
use crate::database::Database;
use crate::ds::shard::{ShardId, ShardSelector};
use crate::error::{Result, ShardError};
use crate::listener::DataListeners;
use crate::partition::{Mutation, Partition, PartitionKey, PartitionRange, PartitionSlice};
use crate::schema::{Schema, TableName};

type Task = Box<dyn FnOnce(&mut Database) + Send>;

/// Handle to a fixed set of shard workers.
#[derive(Debug)]
pub struct ShardRuntime {
    selector: ShardSelector,
    senders: RwLock<Vec<mpsc::UnboundedSender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ShardRuntime {
    /// Starts one worker thread per configured shard.
    pub fn new(config: RuntimeConfig) -> io::Result<Self> {
        let selector = ShardSelector::new(config.shards(), config.seed());
        let mut senders = Vec::with_capacity(selector.shard_count());
        let mut workers = Vec::with_capacity(selector.shard_count());

        for shard in selector.shards() {
            let (tx, rx) = mpsc::unbounded_channel::<Task>();
            let listeners = match config.max_listeners_per_shard() {
                Some(limit) => DataListeners::with_limit(limit),
                None => DataListeners::new(),
            };
            let database = Database::with_listeners(shard, listeners);
            let handle = thread::Builder::new()
                .name(format!("shard-{}", shard.index()))
                .spawn(move || serve(database, rx))?;
            senders.push(tx);
            workers.push(handle);
        }

        info!(shards = selector.shard_count(), "shard runtime started");
        Ok(Self {
            selector,
            senders: RwLock::new(senders),
            workers: Mutex::new(workers),
        })
    }

    pub fn shard_count(&self) -> usize {
        self.selector.shard_count()
    }

    /// Iterates every shard id in ascending order.
    pub fn shards(&self) -> impl Iterator<Item = ShardId> {
        self.selector.shards()
    }

    /// Shard owning partition `key`.
    pub fn shard_for_key(&self, key: &PartitionKey) -> ShardId {
        self.selector.shard_for_key(key)
    }

    /// Runs `f` on `shard` and returns its result.
    pub async fn invoke_on<F, R>(&self, shard: ShardId, f: F) -> std::result::Result<R, ShardError>
    where
        F: FnOnce(&mut Database) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let task: Task = Box::new(move |db| {
            let result = panic::catch_unwind(AssertUnwindSafe(|| f(&mut *db))).map_err(|payload| {
                ShardError::Panicked {
                    shard,
                    message: panic_message(&*payload),
                }
            });
            let _ = reply.send(result);
        });

        self.send(shard, task)?;
        response
            .await
            .map_err(|_| ShardError::Unavailable { shard })?
    }

    /// Runs `f` on every shard concurrently; results are in shard order.
    pub async fn invoke_on_all<F, R>(&self, f: F) -> Vec<std::result::Result<R, ShardError>>
    where
        F: Fn(&mut Database) -> R + Send + Sync + 'static,
        R: Send + 'static,
    {
        let f = Arc::new(f);
        join_all(self.shards().map(|shard| {
            let f = Arc::clone(&f);
            self.invoke_on(shard, move |db| f(db))
        }))
        .await
    }

    /// Runs `map` on every shard and folds the results in shard order.
    ///
    /// Every shard runs to completion before the first error is returned.
    pub async fn map_reduce<F, R, A, G>(
        &self,
        map: F,
        initial: A,
        mut reduce: G,
    ) -> std::result::Result<A, ShardError>
    where
        F: Fn(&mut Database) -> R + Send + Sync + 'static,
        R: Send + 'static,
        G: FnMut(A, R) -> A,
    {
        let mut acc = initial;
        for result in self.invoke_on_all(map).await {
            acc = reduce(acc, result?);
        }
        Ok(acc)
    }

    /// Queues `f` on every shard without waiting; returns how many accepted it.
    ///
    /// Usable from synchronous contexts such as `Drop`.
    pub fn submit_on_all<F>(&self, f: F) -> usize
    where
        F: Fn(&mut Database) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.shards()
            .filter(|&shard| {
                let f = Arc::clone(&f);
                let task: Task = Box::new(move |db| {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| f(&mut *db))) {
                        warn!(
                            shard = %db.shard(),
                            message = %panic_message(&*payload),
                            "submitted task panicked"
                        );
                    }
                });
                self.send(shard, task).is_ok()
            })
            .count()
    }

    /// Suspends the caller for `duration`.
    pub async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Runs `f` on `shard` once `delay` has elapsed.
    ///
    /// The shard stays free to serve other work while the delay runs.
    pub async fn run_after<F, R>(
        &self,
        delay: Duration,
        shard: ShardId,
        f: F,
    ) -> std::result::Result<R, ShardError>
    where
        F: FnOnce(&mut Database) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.sleep(delay).await;
        self.invoke_on(shard, f).await
    }

    /// Creates `name` on every shard under one shared schema id.
    pub async fn create_table(&self, name: TableName) -> Result<Uuid> {
        let id = Uuid::now_v7();
        for result in self
            .invoke_on_all(move |db| {
                db.create_table(Schema::new(id, name.clone()));
            })
            .await
        {
            result?;
        }
        Ok(id)
    }

    /// Routes `mutation` to the shard owning its key and applies it there.
    pub async fn apply(&self, table: &TableName, mutation: Mutation) -> Result<()> {
        let shard = self.shard_for_key(mutation.key());
        let table = table.clone();
        self.invoke_on(shard, move |db| db.apply(&table, mutation))
            .await??;
        Ok(())
    }

    /// Reads `range` from every shard; partitions come back in key order.
    pub async fn query(
        &self,
        table: &TableName,
        range: PartitionRange,
        slice: PartitionSlice,
    ) -> Result<Vec<Partition>> {
        let table = table.clone();
        let mut out = Vec::new();
        for result in self
            .invoke_on_all(move |db| db.query(&table, &range, &slice))
            .await
        {
            out.extend(result??);
        }
        out.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(out)
    }

    /// Stops accepting work and joins every worker after it drains its queue.
    ///
    /// Later calls report [`ShardError::Unavailable`]. Idempotent.
    pub fn shutdown(&self) {
        let closed = {
            let mut senders = self.senders.write();
            let closed = senders.len();
            senders.clear();
            closed
        };
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in workers {
            if handle.join().is_err() {
                warn!("shard worker exited by panic");
            }
        }
        if closed > 0 {
            info!(shards = closed, "shard runtime stopped");
        }
    }

    fn send(&self, shard: ShardId, task: Task) -> std::result::Result<(), ShardError> {
        let sender = self.senders.read().get(shard.index()).cloned();
        sender
            .ok_or(ShardError::Unavailable { shard })?
            .send(task)
            .map_err(|_| ShardError::Unavailable { shard })
    }
}

impl Drop for ShardRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn serve(mut database: Database, mut tasks: mpsc::UnboundedReceiver<Task>) {
    while let Some(task) = tasks.blocking_recv() {
        task(&mut database);
    }
    debug!(shard = %database.shard(), "shard worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
