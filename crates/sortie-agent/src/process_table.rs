//! OS process access behind a trait, so locator and supervisor logic can run
//! against a fake process list in tests.

use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::Mutex,
};

use sortie_process::ProcessHandle;
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, Signal, System, UpdateKind};

/// One row of the live process list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedProcess {
    pub pid: u32,
    pub name: String,
    pub cmd: Vec<String>,
    /// Seconds since the Unix epoch.
    pub started_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

pub trait ProcessTable: Send + Sync {
    fn processes(&self) -> Vec<ObservedProcess>;

    /// True only if `handle.pid` exists with the same start time.
    fn is_alive(&self, handle: &ProcessHandle) -> bool;

    /// Graceful termination request. Returns false if the signal could not be
    /// delivered.
    fn terminate(&self, pid: u32) -> bool;

    fn kill(&self, pid: u32) -> bool;

    /// Fire-and-forget launch; the child is not tracked by handle.
    fn launch(&self, spec: &LaunchSpec) -> std::io::Result<()>;
}

pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

// ============================================================================
// sysinfo-backed table
// ============================================================================

pub struct SystemProcessTable {
    system: Mutex<System>,
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl SystemProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_process<T>(&self, pid: u32, f: impl FnOnce(&sysinfo::Process) -> T) -> Option<T> {
        let pid = Pid::from_u32(pid);
        let mut sys = self.system.lock().unwrap_or_else(|e| e.into_inner());
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing(),
        );
        sys.process(pid).map(f)
    }
}

impl ProcessTable for SystemProcessTable {
    fn processes(&self) -> Vec<ObservedProcess> {
        let mut sys = self.system.lock().unwrap_or_else(|e| e.into_inner());
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::OnlyIfNotSet),
        );
        sys.processes()
            .iter()
            // Linux reports threads as tasks; only whole processes matter here.
            .filter(|(_, p)| p.thread_kind().is_none())
            .map(|(pid, p)| ObservedProcess {
                pid: pid.as_u32(),
                name: p.name().to_string_lossy().into_owned(),
                cmd: p
                    .cmd()
                    .iter()
                    .map(|a| a.to_string_lossy().into_owned())
                    .collect(),
                started_at: p.start_time(),
            })
            .collect()
    }

    fn is_alive(&self, handle: &ProcessHandle) -> bool {
        self.with_process(handle.pid, |p| {
            p.start_time() == handle.started_at
                && !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead)
        })
        .unwrap_or(false)
    }

    fn terminate(&self, pid: u32) -> bool {
        // Windows has no SIGTERM; sysinfo returns None there and we fall back
        // to TerminateProcess.
        self.with_process(pid, |p| p.kill_with(Signal::Term).unwrap_or_else(|| p.kill()))
            .unwrap_or(false)
    }

    fn kill(&self, pid: u32) -> bool {
        self.with_process(pid, |p| p.kill()).unwrap_or(false)
    }

    fn launch(&self, spec: &LaunchSpec) -> std::io::Result<()> {
        let mut cmd = tokio::process::Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }

        // Detach from our console/process group: the server must outlive a
        // supervisor restart and must not receive our Ctrl-C.
        #[cfg(unix)]
        cmd.process_group(0);
        #[cfg(windows)]
        {
            const DETACHED_PROCESS: u32 = 0x0000_0008;
            const HIGH_PRIORITY_CLASS: u32 = 0x0000_0080;
            cmd.creation_flags(DETACHED_PROCESS | HIGH_PRIORITY_CLASS);
        }

        let child = cmd.spawn()?;
        tracing::debug!(pid = ?child.id(), program = %spec.program.display(), "launched");
        // Dropping the handle does not kill the child; tokio reaps it.
        drop(child);
        Ok(())
    }
}
