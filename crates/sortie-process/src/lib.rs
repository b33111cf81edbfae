use std::time::Duration;

/// A live OS process believed to be the supervised server.
///
/// `started_at` is the OS-recorded start time in seconds since the Unix epoch.
/// Together with `pid` it guards against PID reuse: a recycled PID has a
/// different start time and no longer matches the handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ProcessHandle {
    pub pid: u32,
    pub started_at: u64,
    pub save_folder: String,
}

impl ProcessHandle {
    /// Uptime relative to `now` (seconds since the Unix epoch).
    pub fn uptime_at(&self, now: u64) -> Duration {
        Duration::from_secs(now.saturating_sub(self.started_at))
    }
}

/// Lifecycle phase of the supervisor itself.
///
/// `Starting` and `Stopping` are only observable while a transition holds the
/// lifecycle lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecyclePhase {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running(ProcessHandle),
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running(_))
    }

    pub fn handle(&self) -> Option<&ProcessHandle> {
        match self {
            RunState::Running(h) => Some(h),
            RunState::Stopped => None,
        }
    }
}

impl From<Option<ProcessHandle>> for RunState {
    fn from(value: Option<ProcessHandle>) -> Self {
        match value {
            Some(h) => RunState::Running(h),
            None => RunState::Stopped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ServerStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub uptime_secs: Option<u64>,
}

impl ServerStatus {
    pub fn stopped() -> Self {
        Self {
            running: false,
            pid: None,
            uptime_secs: None,
        }
    }

    /// `H:MM:SS`, or `N/A` when stopped.
    pub fn uptime_display(&self) -> String {
        match self.uptime_secs {
            Some(secs) => format_uptime(Duration::from_secs(secs)),
            None => "N/A".to_string(),
        }
    }
}

pub fn format_uptime(d: Duration) -> String {
    let total = d.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if days > 0 {
        let unit = if days == 1 { "day" } else { "days" };
        format!("{days} {unit}, {hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours}:{minutes:02}:{seconds:02}")
    }
}
