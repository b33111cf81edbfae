//! Test doubles and filesystem fixtures shared by unit and integration tests.

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};

use sortie_process::ProcessHandle;
use tempfile::TempDir;

use crate::config::{AppConfig, Config, ServerConfig, UserCredential};
use crate::process_table::{LaunchSpec, ObservedProcess, ProcessTable, unix_now};
use crate::supervisor::SupervisorTimings;

/// Stock sandbox script, CRLF as shipped by DCS.
pub const SANITIZE_FIXTURE: &str = "--Initialization script for the Mission lua Environment (SSE)\r\n\r\ndofile('Scripts/ScriptingSystem.lua')\r\n\r\n--Sanitize Mission Scripting environment\r\n--This makes unavailable some unsecure functions.\r\n--Mission downloaded from server to client may contain potentialy harmful lua code that may use these functions.\r\n--You can remove the code below and make availble these functions at your own risk.\r\n\r\nlocal function sanitizeModule(name)\r\n\t_G[name] = nil\r\n\tpackage.loaded[name] = nil\r\nend\r\n\r\ndo\r\n\tsanitizeModule('os')\r\n\tsanitizeModule('io')\r\n\tsanitizeModule('lfs')\r\n\t_G['require'] = nil\r\n\t_G['loadlib'] = nil\r\n\t_G['package'] = nil\r\nend\r\n";

pub const SETTINGS_FIXTURE: &str = "cfg = \n{\n\t[\"description\"] = \"\",\n\t[\"require_pure_textures\"] = true,\n\t[\"listStartIndex\"] = 3,\n\t[\"advanced\"] = \n\t{\n\t\t[\"allow_change_tailno\"] = true,\n\t\t[\"event_Role\"] = false,\n\t\t[\"maxPing\"] = 0,\n\t}, -- end of [\"advanced\"]\n\t[\"port\"] = 10308,\n\t[\"mode\"] = 0,\n\t[\"bind_address\"] = \"\",\n\t[\"isPublic\"] = true,\n\t[\"listShuffle\"] = false,\n\t[\"password\"] = \"\",\n\t[\"listLoop\"] = false,\n\t[\"name\"] = \"Retribution\",\n\t[\"missionList\"] = \n\t{\n\t\t[1] = \"C:\\\\Users\\\\dcs\\\\Saved Games\\\\DCS.server_test\\\\Missions\\\\old.miz\",\n\t}, -- end of [\"missionList\"]\n\t[\"maxPlayers\"] = 16,\n\t[\"lastSelectedMission\"] = \"C:\\\\Users\\\\dcs\\\\Saved Games\\\\DCS.server_test\\\\Missions\\\\old.miz\",\n} -- end of cfg\n";

const HOOK_FIXTURE: &str = "local export = {}\r\nfunction export.onSimulationStart()\r\n    net.log('retribution-control: simulation start')\r\nend\r\nDCS.setUserCallbacks(export)\r\n";

pub const SERVER_EXE: &str = "DCS_server.exe";
pub const SAVE_FOLDER: &str = "DCS.server_test";

/// Millisecond-scale timings for tests.
pub fn fast_timings() -> SupervisorTimings {
    SupervisorTimings {
        start_attempts: 5,
        start_poll: Duration::from_millis(10),
        stop_timeout: Duration::from_millis(200),
        stop_poll: Duration::from_millis(10),
        kill_grace: Duration::from_millis(50),
    }
}

// ============================================================================
// FakeProcessTable
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum LaunchBehavior {
    #[default]
    Appear,
    Never,
    Fail,
}

#[derive(Debug, Default)]
struct FakeState {
    processes: Vec<ObservedProcess>,
    next_pid: u32,
    launch: LaunchBehavior,
    ignore_terminate: bool,
    launches: Vec<LaunchSpec>,
    scans: usize,
    terminate_calls: usize,
    kill_calls: usize,
}

/// In-memory process list. Launches appear immediately unless configured
/// otherwise.
#[derive(Debug, Default)]
pub struct FakeProcessTable {
    state: Mutex<FakeState>,
}

impl FakeProcessTable {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_pid: 1000,
                ..FakeState::default()
            }),
        }
    }

    /// Launches succeed but no process ever shows up.
    pub fn never_appear(&self) {
        self.state.lock().unwrap().launch = LaunchBehavior::Never;
    }

    pub fn fail_launches(&self) {
        self.state.lock().unwrap().launch = LaunchBehavior::Fail;
    }

    /// Termination requests are accepted but ignored; only `kill` removes.
    pub fn ignore_terminate(&self) {
        self.state.lock().unwrap().ignore_terminate = true;
    }

    pub fn add_process(&self, name: &str, cmd: &[&str]) -> u32 {
        self.add_process_started_at(name, cmd, unix_now())
    }

    pub fn add_process_started_at(&self, name: &str, cmd: &[&str], started_at: u64) -> u32 {
        let mut s = self.state.lock().unwrap();
        s.next_pid += 1;
        let pid = s.next_pid;
        s.processes.push(ObservedProcess {
            pid,
            name: name.to_string(),
            cmd: cmd.iter().map(|a| a.to_string()).collect(),
            started_at,
        });
        pid
    }

    pub fn remove_process(&self, pid: u32) -> bool {
        let mut s = self.state.lock().unwrap();
        let before = s.processes.len();
        s.processes.retain(|p| p.pid != pid);
        s.processes.len() != before
    }

    pub fn launches(&self) -> Vec<LaunchSpec> {
        self.state.lock().unwrap().launches.clone()
    }

    pub fn scan_count(&self) -> usize {
        self.state.lock().unwrap().scans
    }

    pub fn terminate_calls(&self) -> usize {
        self.state.lock().unwrap().terminate_calls
    }

    pub fn kill_calls(&self) -> usize {
        self.state.lock().unwrap().kill_calls
    }
}

impl ProcessTable for FakeProcessTable {
    fn processes(&self) -> Vec<ObservedProcess> {
        let mut s = self.state.lock().unwrap();
        s.scans += 1;
        s.processes.clone()
    }

    fn is_alive(&self, handle: &ProcessHandle) -> bool {
        self.state
            .lock()
            .unwrap()
            .processes
            .iter()
            .any(|p| p.pid == handle.pid && p.started_at == handle.started_at)
    }

    fn terminate(&self, pid: u32) -> bool {
        let ignore = {
            let mut s = self.state.lock().unwrap();
            s.terminate_calls += 1;
            if !s.processes.iter().any(|p| p.pid == pid) {
                return false;
            }
            s.ignore_terminate
        };
        if !ignore {
            self.remove_process(pid);
        }
        true
    }

    fn kill(&self, pid: u32) -> bool {
        self.state.lock().unwrap().kill_calls += 1;
        self.remove_process(pid)
    }

    fn launch(&self, spec: &LaunchSpec) -> std::io::Result<()> {
        let behavior = {
            let mut s = self.state.lock().unwrap();
            s.launches.push(spec.clone());
            s.launch
        };
        match behavior {
            LaunchBehavior::Fail => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "executable not found",
            )),
            LaunchBehavior::Never => Ok(()),
            LaunchBehavior::Appear => {
                let name = spec
                    .program
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let program = spec.program.to_string_lossy().into_owned();
                let mut cmd: Vec<&str> = vec![program.as_str()];
                cmd.extend(spec.args.iter().map(String::as_str));
                self.add_process(&name, &cmd);
                Ok(())
            }
        }
    }
}

// ============================================================================
// ServerLayout
// ============================================================================

/// Temporary DCS install + saved-games tree:
///
/// ```text
/// <root>/install/bin/DCS_server.exe
/// <root>/install/Scripts/MissionScripting.lua
/// <root>/saved/DCS.server_test/Config/serverSettings.lua
/// <root>/saved/DCS.server_test/Missions/
/// <root>/resources/retribution-control.lua
/// ```
pub struct ServerLayout {
    dir: TempDir,
}

impl Default for ServerLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerLayout {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let layout = Self { dir };

        std::fs::create_dir_all(layout.install_dir().join("bin")).unwrap();
        std::fs::write(layout.executable(), b"").unwrap();
        std::fs::create_dir_all(layout.install_dir().join("Scripts")).unwrap();
        std::fs::write(layout.sanitize_file(), SANITIZE_FIXTURE).unwrap();

        std::fs::create_dir_all(layout.mission_dir()).unwrap();
        std::fs::create_dir_all(layout.save_dir().join("Config")).unwrap();
        std::fs::write(layout.settings_file(), SETTINGS_FIXTURE).unwrap();

        std::fs::create_dir_all(layout.root().join("resources")).unwrap();
        std::fs::write(layout.hook_source(), HOOK_FIXTURE).unwrap();

        layout
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn install_dir(&self) -> PathBuf {
        self.root().join("install")
    }

    pub fn executable(&self) -> PathBuf {
        self.install_dir().join("bin").join(SERVER_EXE)
    }

    pub fn sanitize_file(&self) -> PathBuf {
        self.install_dir().join("Scripts").join("MissionScripting.lua")
    }

    pub fn save_dir(&self) -> PathBuf {
        self.root().join("saved").join(SAVE_FOLDER)
    }

    pub fn mission_dir(&self) -> PathBuf {
        self.save_dir().join("Missions")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.save_dir().join("Config").join("serverSettings.lua")
    }

    pub fn hook_source(&self) -> PathBuf {
        self.root().join("resources").join("retribution-control.lua")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root().join("data")
    }

    pub fn write_mission(&self, name: &str) -> PathBuf {
        let path = self.mission_dir().join(name);
        std::fs::write(&path, b"PK\x03\x04miz").unwrap();
        path
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            dcs_server_exe: self.executable(),
            dcs_mission_dir: self.mission_dir(),
            max_running_time: 0,
            hook_script: self.hook_source(),
            data_dir: self.data_dir(),
        }
    }

    /// Full config whose only allowed upload is `mission.miz`.
    pub fn config(&self) -> Config {
        Config {
            app: AppConfig {
                allowed_filenames: vec!["mission.miz".to_string()],
                allowed_max_size: 1024,
                ..AppConfig::default()
            },
            server: self.server_config(),
            users: vec![UserCredential {
                username: "admin".to_string(),
                password: "secret".to_string(),
            }],
        }
    }
}
