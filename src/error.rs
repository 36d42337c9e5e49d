//! Error types for the toppartitions library.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: Returned when configuration parameters are invalid
//!   (e.g. zero estimator capacity, list size larger than capacity).
//! - [`InvariantError`]: Returned when internal data-structure invariants are
//!   violated.
//! - [`ListenerError`]: Returned by a shard's listener registry when it refuses
//!   an installation.
//! - [`EngineError`]: Returned by the per-shard storage stand-in.
//! - [`ShardError`]: Returned by the shard runtime when a shard cannot run a
//!   submitted closure.
//! - [`QueryError`]: Returned by a top-partitions query; wraps the others.
//!
//! Listener dispatch on the read/write path never produces any of these.
//!
//! ## Example Usage
//!
//! ```
//! use toppartitions::config::TopPartitionsConfig;
//!
//! let err = TopPartitionsConfig::builder().capacity(0).try_build().unwrap_err();
//! assert!(err.message().contains("capacity"));
//! ```

use thiserror::Error;

use crate::ds::shard::ShardId;
use crate::schema::TableName;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when configuration parameters are invalid.
///
/// Produced by fallible constructors such as
/// [`FrequencyEstimator::try_new`](crate::ds::FrequencyEstimator::try_new)
/// and builder `try_build()` methods. Carries a human-readable description of
/// which parameter failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when an internal invariant is violated.
///
/// Produced by
/// [`FrequencyEstimator::check_invariants`](crate::ds::FrequencyEstimator::check_invariants).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Registry / engine / runtime errors
// ---------------------------------------------------------------------------

/// Errors raised by [`DataListeners`](crate::listener::DataListeners).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListenerError {
    /// The registry already holds its configured maximum of listeners.
    #[error("listener limit reached ({limit} installed)")]
    LimitReached { limit: usize },
}

/// Errors raised by the per-shard [`Database`](crate::database::Database).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// No table with this keyspace/table name exists on the shard.
    #[error("unknown table {0}")]
    UnknownTable(TableName),
}

/// Errors raised by [`ShardRuntime`](crate::runtime::ShardRuntime).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShardError {
    /// The shard's worker has stopped and no longer accepts work.
    #[error("shard {shard} is unavailable")]
    Unavailable { shard: ShardId },

    /// The submitted closure panicked on the shard.
    #[error("shard {shard} panicked: {message}")]
    Panicked { shard: ShardId, message: String },
}

impl ShardError {
    /// Returns the shard the error originated from.
    pub fn shard(&self) -> ShardId {
        match self {
            Self::Unavailable { shard } | Self::Panicked { shard, .. } => *shard,
        }
    }
}

// ---------------------------------------------------------------------------
// QueryError
// ---------------------------------------------------------------------------

/// Errors returned by [`TopPartitionsQuery`](crate::query::TopPartitionsQuery).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Malformed request rejected before any shard state was created.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The target table does not exist.
    #[error("unknown table {0}")]
    UnknownTable(TableName),

    /// Invalid query configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A shard refused to install the query's listener.
    #[error("shard {shard} refused listener: {source}")]
    Listener {
        shard: ShardId,
        #[source]
        source: ListenerError,
    },

    /// A shard could not run the scatter or gather step.
    #[error(transparent)]
    Shard(#[from] ShardError),

    /// The storage stand-in rejected an operation.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The query's listener was no longer installed on a shard at gather time.
    #[error("listener missing on shard {shard}")]
    ListenerMissing { shard: ShardId },

    /// An operation was issued in the wrong lifecycle state.
    #[error("query is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Result type for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_display_shows_message() {
        let err = ConfigError::new("capacity must be > 0");
        assert_eq!(err.to_string(), "capacity must be > 0");
        assert_eq!(err.message(), "capacity must be > 0");
    }

    #[test]
    fn invariant_display_shows_message() {
        let err = InvariantError::new("bucket link mismatch");
        assert_eq!(err.to_string(), "bucket link mismatch");
        assert_eq!(err.message(), "bucket link mismatch");
    }

    #[test]
    fn shard_error_reports_origin() {
        let err = ShardError::Panicked {
            shard: ShardId::new(3),
            message: "boom".into(),
        };
        assert_eq!(err.shard(), ShardId::new(3));
        assert_eq!(err.to_string(), "shard 3 panicked: boom");
    }

    #[test]
    fn query_error_wraps_config_error() {
        let err: QueryError = ConfigError::new("list size must be > 0").into();
        assert_eq!(
            err.to_string(),
            "invalid configuration: list size must be > 0"
        );
    }

    #[test]
    fn listener_error_chain_is_preserved() {
        use std::error::Error as _;

        let err = QueryError::Listener {
            shard: ShardId::new(1),
            source: ListenerError::LimitReached { limit: 4 },
        };
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("listener limit reached (4 installed)"));
    }

    #[test]
    fn errors_implement_std_error() {
        fn assert_error<T: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<ConfigError>();
        assert_error::<InvariantError>();
        assert_error::<ListenerError>();
        assert_error::<ShardError>();
        assert_error::<QueryError>();
    }
}
