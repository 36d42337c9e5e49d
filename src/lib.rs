//! toppartitions: per-shard read/write listeners and a distributed
//! top-partitions (heavy hitter) query.
//!
//! See `DESIGN.md` for the module map and design decisions.

pub mod config;
pub mod database;
pub mod ds;
pub mod error;
pub mod listener;
pub mod partition;
pub mod query;
pub mod runtime;
pub mod schema;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod prelude;
