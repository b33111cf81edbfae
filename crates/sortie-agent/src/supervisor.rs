//! Start/stop/status for the single supervised DCS server process.

use std::{
    collections::BTreeMap,
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use sortie_process::{LifecyclePhase, ProcessHandle, RunState, ServerStatus};
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::locator::{ProcessLocator, SAVE_FOLDER_FLAG};
use crate::missions::{MissionFileStore, StateFileNotFound, UploadError, UploadedMission};
use crate::patcher::{ConfigPatcher, PatchError, RestoreReport, SettingsOutcome};
use crate::paths::ServerPaths;
use crate::process_table::{LaunchSpec, ProcessTable, SystemProcessTable, unix_now};

/// Export-directory variables read by the mission scripts.
pub const EXPORT_DIR_ENV: [&str; 2] = ["RETRIBUTION_EXPORT_DIR", "LIBERATION_EXPORT_DIR"];

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("DCS server did not appear after {attempts} checks")]
    StartTimeout { attempts: u32 },

    #[error("DCS server (pid {pid}) did not exit within {timeout:?} and was killed")]
    StopForced { pid: u32, timeout: Duration },

    #[error("failed to launch {}: {source}", program.display())]
    Launch {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Patch(#[from] PatchError),
}

#[derive(Debug, Clone, Copy)]
pub struct SupervisorTimings {
    pub start_attempts: u32,
    pub start_poll: Duration,
    pub stop_timeout: Duration,
    pub stop_poll: Duration,
    /// How long to wait for the process table to drop a killed process.
    pub kill_grace: Duration,
}

impl Default for SupervisorTimings {
    fn default() -> Self {
        Self {
            start_attempts: 20,
            start_poll: Duration::from_millis(500),
            stop_timeout: Duration::from_secs(15),
            stop_poll: Duration::from_millis(100),
            kill_grace: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub hook_source: PathBuf,
    pub allowed_filenames: Vec<String>,
    pub max_upload_size: u64,
    /// `None` disables the running-time watchdog.
    pub max_running_time: Option<Duration>,
    pub timings: SupervisorTimings,
}

impl SupervisorOptions {
    pub fn from_config(cfg: &Config) -> Self {
        let minutes = cfg.server.max_running_time;
        Self {
            hook_source: cfg.server.hook_script.clone(),
            allowed_filenames: cfg.app.allowed_filenames.clone(),
            max_upload_size: cfg.app.allowed_max_size,
            max_running_time: (minutes > 0).then(|| Duration::from_secs(minutes * 60)),
            timings: SupervisorTimings::default(),
        }
    }
}

pub struct Supervisor {
    paths: ServerPaths,
    locator: ProcessLocator,
    patcher: ConfigPatcher,
    missions: MissionFileStore,
    table: Arc<dyn ProcessTable>,
    timings: SupervisorTimings,
    max_running_time: Option<Duration>,
    // Held for a whole transition, including poll loops.
    lifecycle: tokio::sync::Mutex<()>,
    // Never held across an await.
    remembered: Mutex<Option<ProcessHandle>>,
    transition: Mutex<Option<LifecyclePhase>>,
}

impl Supervisor {
    pub fn new(paths: ServerPaths, options: SupervisorOptions, table: Arc<dyn ProcessTable>) -> Self {
        let locator = ProcessLocator::new(
            paths.executable_name(),
            paths.save_folder(),
            paths.default_save_folder.clone(),
        );
        let patcher = ConfigPatcher::new(
            &paths,
            options.hook_source,
            options.allowed_filenames.first().map(String::as_str),
        );
        let missions = MissionFileStore::new(
            &paths.mission_dir,
            options.allowed_filenames,
            options.max_upload_size,
            UploadedMission::new(&paths.last_upload_file),
            &paths.state_file,
        );
        Self {
            paths,
            locator,
            patcher,
            missions,
            table,
            timings: options.timings,
            max_running_time: options.max_running_time,
            lifecycle: tokio::sync::Mutex::new(()),
            remembered: Mutex::new(None),
            transition: Mutex::new(None),
        }
    }

    /// Resolves paths and attaches to the real OS process table.
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        let paths = ServerPaths::resolve(&cfg.server)?;
        Ok(Self::new(
            paths,
            SupervisorOptions::from_config(cfg),
            Arc::new(SystemProcessTable::new()),
        ))
    }

    pub fn paths(&self) -> &ServerPaths {
        &self.paths
    }

    pub fn missions(&self) -> &MissionFileStore {
        &self.missions
    }

    pub fn max_running_time(&self) -> Option<Duration> {
        self.max_running_time
    }

    /// Applies the file patches, launches the server and waits for it to show
    /// up in the process table. A no-op when it is already running.
    ///
    /// On timeout the patches stay applied: the process may still be coming
    /// up, and restoring underneath it would break its configuration. The
    /// next `stop` (or a supervisor restart followed by `stop`) restores them.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let _lock = self.lifecycle.lock().await;

        if let Some(h) = self.locate() {
            tracing::info!(pid = h.pid, "DCS server already running");
            return Ok(());
        }

        let _phase = self.enter(LifecyclePhase::Starting);

        match self.patcher.apply_all()? {
            SettingsOutcome::Injected(mission) => {
                tracing::info!(mission = %mission.display(), "mission selected");
            }
            SettingsOutcome::MissionMissing(_) | SettingsOutcome::NoMissionConfigured => {
                tracing::warn!("starting with existing serverSettings.lua mission list");
            }
        }

        std::fs::create_dir_all(&self.paths.data_dir).map_err(|source| PatchError::Io {
            action: "create data directory",
            path: self.paths.data_dir.clone(),
            source,
        })?;

        let spec = self.launch_spec();
        tracing::info!(
            program = %spec.program.display(),
            args = ?spec.args,
            "launching DCS server"
        );
        self.table
            .launch(&spec)
            .map_err(|source| SupervisorError::Launch {
                program: spec.program.clone(),
                source,
            })?;

        let attempts = self.timings.start_attempts;
        for attempt in 1..=attempts {
            if let Some(h) = self.locate() {
                tracing::info!(pid = h.pid, attempt, "DCS server started");
                return Ok(());
            }
            tokio::time::sleep(self.timings.start_poll).await;
        }

        tracing::error!(attempts, "DCS server did not start; patches left applied");
        Err(SupervisorError::StartTimeout { attempts })
    }

    /// Requests termination, waits for exit, and restores the patched files.
    /// A process that outlives the grace period is killed; files are restored
    /// either way and `StopForced` is returned.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        let _lock = self.lifecycle.lock().await;

        let Some(handle) = self.locate() else {
            tracing::info!("DCS server not running");
            return Ok(());
        };

        let _phase = self.enter(LifecyclePhase::Stopping);

        tracing::info!(pid = handle.pid, "stopping DCS server");
        if !self.table.terminate(handle.pid) {
            tracing::warn!(pid = handle.pid, "termination request not delivered");
        }

        let exited = self.wait_for_exit(&handle, self.timings.stop_timeout).await;
        if !exited {
            tracing::warn!(
                pid = handle.pid,
                timeout = ?self.timings.stop_timeout,
                "DCS server did not exit in time; killing"
            );
            if !self.table.kill(handle.pid) {
                tracing::warn!(pid = handle.pid, "kill not delivered");
            }
            if !self.wait_for_exit(&handle, self.timings.kill_grace).await {
                tracing::error!(pid = handle.pid, "DCS server still present after kill");
            }
        }
        self.forget();

        log_restore(&self.patcher.restore_all());

        if exited {
            tracing::info!(pid = handle.pid, "DCS server stopped");
            Ok(())
        } else {
            Err(SupervisorError::StopForced {
                pid: handle.pid,
                timeout: self.timings.stop_timeout,
            })
        }
    }

    /// Fresh status from the process table. Does not update the remembered
    /// handle.
    pub fn status(&self) -> ServerStatus {
        match self.run_state().handle() {
            Some(h) => ServerStatus {
                running: true,
                pid: Some(h.pid),
                uptime_secs: Some(h.uptime_at(unix_now()).as_secs()),
            },
            None => ServerStatus::stopped(),
        }
    }

    pub fn run_state(&self) -> RunState {
        let remembered = self.remembered_handle();
        self.locator
            .find(self.table.as_ref(), remembered.as_ref())
            .into()
    }

    /// Transient phase while a transition runs, else derived from the process
    /// table.
    pub fn phase(&self) -> LifecyclePhase {
        let transition = *self.transition.lock().unwrap_or_else(|e| e.into_inner());
        match transition {
            Some(phase) => phase,
            None if self.run_state().is_running() => LifecyclePhase::Running,
            None => LifecyclePhase::Stopped,
        }
    }

    /// Serialized with start/stop so an upload never races the settings patch.
    pub async fn save_mission(&self, bytes: &[u8], filename: &str) -> Result<PathBuf, UploadError> {
        let _lock = self.lifecycle.lock().await;
        let path = self.missions.save(bytes, filename)?;
        tracing::info!(path = %path.display(), size = bytes.len(), "mission uploaded");
        Ok(path)
    }

    pub fn state_file(&self) -> Result<PathBuf, StateFileNotFound> {
        self.missions.state_file()
    }

    /// Stops the server when it has been up longer than the configured
    /// budget. Returns whether a stop was triggered.
    pub async fn enforce_max_running_time(&self) -> Result<bool, SupervisorError> {
        let Some(budget) = self.max_running_time else {
            return Ok(false);
        };
        let Some(uptime) = self.status().uptime_secs else {
            return Ok(false);
        };
        if uptime <= budget.as_secs() {
            return Ok(false);
        }

        tracing::info!(
            uptime_secs = uptime,
            max_secs = budget.as_secs(),
            "DCS server exceeded max running time; stopping"
        );
        self.stop().await?;
        Ok(true)
    }

    fn launch_spec(&self) -> LaunchSpec {
        let data_dir = self.paths.data_dir.to_string_lossy().into_owned();
        let env: BTreeMap<String, String> = EXPORT_DIR_ENV
            .iter()
            .map(|k| (k.to_string(), data_dir.clone()))
            .collect();
        LaunchSpec {
            program: self.paths.executable.clone(),
            args: vec![SAVE_FOLDER_FLAG.to_string(), self.locator.save_folder().to_string()],
            cwd: self.paths.executable.parent().map(|p| p.to_path_buf()),
            env,
        }
    }

    async fn wait_for_exit(&self, handle: &ProcessHandle, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            if !self.table.is_alive(handle) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.timings.stop_poll).await;
        }
    }

    /// Lookup that refreshes the remembered handle. Only called under the
    /// lifecycle lock.
    fn locate(&self) -> Option<ProcessHandle> {
        let remembered = self.remembered_handle();
        let found = self.locator.find(self.table.as_ref(), remembered.as_ref());
        *self.remembered.lock().unwrap_or_else(|e| e.into_inner()) = found.clone();
        found
    }

    fn remembered_handle(&self) -> Option<ProcessHandle> {
        self.remembered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn forget(&self) {
        *self.remembered.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn enter(&self, phase: LifecyclePhase) -> PhaseGuard<'_> {
        *self.transition.lock().unwrap_or_else(|e| e.into_inner()) = Some(phase);
        PhaseGuard {
            slot: &self.transition,
        }
    }
}

struct PhaseGuard<'a> {
    slot: &'a Mutex<Option<LifecyclePhase>>,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

fn log_restore(report: &RestoreReport) {
    let failures = report.failures();
    if failures.is_empty() {
        tracing::debug!(hook_removed = report.hook_removed, "configuration restored");
    } else {
        tracing::error!(?failures, "configuration restore incomplete");
    }
}
