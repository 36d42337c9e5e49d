//! # Metrics Trait Hierarchy
//!
//! Recording, snapshotting and export are split into small traits so the
//! registry only ever writes counters while tests and monitoring read them.
//!
//! ```text
//!   ┌──────────────────────────────┐
//!   │   ListenerMetricsRecorder    │   written by DataListeners
//!   │ install/uninstall/read/write │
//!   └──────────────┬───────────────┘
//!                  │
//!       ┌──────────┴───────────┐
//!       ▼                      ▼
//!   ┌────────────────────┐  ┌────────────────────┐
//!   │ MetricsSnapshot-   │  │ MetricsExporter<S> │
//!   │ Provider<S> (test) │  │ (monitoring)       │
//!   └────────────────────┘  └────────────────────┘
//! ```

/// Counters maintained by a listener registry.
pub trait ListenerMetricsRecorder {
    fn record_install(&mut self);
    fn record_uninstall(&mut self, removed: usize);
    fn record_read(&mut self);
    fn record_write(&mut self);
}

/// Produces a point-in-time copy of the counters.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

/// Reset metrics between tests or benchmark iterations.
pub trait MetricsReset {
    fn reset_metrics(&mut self);
}

/// Publishes a snapshot to a monitoring backend.
pub trait MetricsExporter<S> {
    fn export(&self, snapshot: &S);
}
