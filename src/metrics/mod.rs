//! Listener dispatch metrics, compiled with the `metrics` feature.

pub mod exporter;
pub mod metrics_impl;
pub mod snapshot;
pub mod traits;

pub use exporter::PrometheusTextExporter;
pub use metrics_impl::ListenerMetrics;
pub use snapshot::ListenerMetricsSnapshot;
pub use traits::{ListenerMetricsRecorder, MetricsExporter, MetricsReset, MetricsSnapshotProvider};
