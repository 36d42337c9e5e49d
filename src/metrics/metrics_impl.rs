use crate::metrics::snapshot::ListenerMetricsSnapshot;
use crate::metrics::traits::{ListenerMetricsRecorder, MetricsReset, MetricsSnapshotProvider};

/// Dispatch counters owned by one shard's registry.
///
/// Only the shard's worker touches them, so plain integers suffice.
#[derive(Debug, Default)]
pub struct ListenerMetrics {
    pub installs: u64,
    pub uninstalls: u64,
    pub read_dispatches: u64,
    pub write_dispatches: u64,
}

impl ListenerMetricsRecorder for ListenerMetrics {
    fn record_install(&mut self) {
        self.installs += 1;
    }

    fn record_uninstall(&mut self, removed: usize) {
        self.uninstalls += removed as u64;
    }

    fn record_read(&mut self) {
        self.read_dispatches += 1;
    }

    fn record_write(&mut self) {
        self.write_dispatches += 1;
    }
}

impl MetricsSnapshotProvider<ListenerMetricsSnapshot> for ListenerMetrics {
    fn snapshot(&self) -> ListenerMetricsSnapshot {
        ListenerMetricsSnapshot {
            installs: self.installs,
            uninstalls: self.uninstalls,
            read_dispatches: self.read_dispatches,
            write_dispatches: self.write_dispatches,
            installed: 0,
        }
    }
}

impl MetricsReset for ListenerMetrics {
    fn reset_metrics(&mut self) {
        *self = Self::default();
    }
}
