use serde::Serialize;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListenerMetricsSnapshot {
    pub installs: u64,
    pub uninstalls: u64, // listeners removed, not uninstall calls
    pub read_dispatches: u64,
    pub write_dispatches: u64,

    // gauge captured at snapshot time
    pub installed: usize,
}
