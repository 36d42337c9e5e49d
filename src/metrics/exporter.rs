use std::io::Write;

use parking_lot::Mutex;

use crate::metrics::snapshot::ListenerMetricsSnapshot;
use crate::metrics::traits::MetricsExporter;

/// Prometheus text exporter for listener metrics snapshots.
///
/// Writes the Prometheus text exposition format so the output can be scraped
/// or forwarded to a collector.
#[derive(Debug)]
pub struct PrometheusTextExporter<W: Write + Send> {
    prefix: String,
    writer: Mutex<W>,
}

impl<W: Write + Send> PrometheusTextExporter<W> {
    pub fn new(prefix: impl Into<String>, writer: W) -> Self {
        Self {
            prefix: prefix.into(),
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_metric(&self, kind: &str, suffix: &str, value: u64) {
        let name = self.metric_name(suffix);
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "# TYPE {} {}", name, kind);
        let _ = writeln!(writer, "{} {}", name, value);
    }

    fn metric_name(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}_{}", self.prefix, suffix)
        }
    }
}

impl<W: Write + Send> MetricsExporter<ListenerMetricsSnapshot> for PrometheusTextExporter<W> {
    fn export(&self, snapshot: &ListenerMetricsSnapshot) {
        self.write_metric("counter", "listener_installs_total", snapshot.installs);
        self.write_metric("counter", "listener_uninstalls_total", snapshot.uninstalls);
        self.write_metric(
            "counter",
            "listener_read_dispatches_total",
            snapshot.read_dispatches,
        );
        self.write_metric(
            "counter",
            "listener_write_dispatches_total",
            snapshot.write_dispatches,
        );
        self.write_metric("gauge", "listeners_installed", snapshot.installed as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_prefixed_text_format() {
        let exporter = PrometheusTextExporter::new("shard0", Vec::new());
        exporter.export(&ListenerMetricsSnapshot {
            installs: 2,
            uninstalls: 1,
            read_dispatches: 7,
            write_dispatches: 3,
            installed: 1,
        });

        let text = String::from_utf8(exporter.into_inner()).unwrap();
        assert!(text.contains("# TYPE shard0_listener_installs_total counter\n"));
        assert!(text.contains("shard0_listener_installs_total 2\n"));
        assert!(text.contains("shard0_listener_read_dispatches_total 7\n"));
        assert!(text.contains("# TYPE shard0_listeners_installed gauge\n"));
        assert!(text.contains("shard0_listeners_installed 1\n"));
    }

    #[test]
    fn empty_prefix_uses_bare_names() {
        let exporter = PrometheusTextExporter::new("", Vec::new());
        exporter.export(&ListenerMetricsSnapshot::default());
        let text = String::from_utf8(exporter.into_inner()).unwrap();
        assert!(text.starts_with("# TYPE listener_installs_total counter\n"));
    }
}
