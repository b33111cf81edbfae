use std::path::{Path, PathBuf};

use crate::config::{ConfigError, ServerConfig};

pub const DEFAULT_SAVE_FOLDER: &str = "DCS.release_server";

const SETTINGS_FILE: &str = "serverSettings.lua";
const SANITIZE_FILE: &str = "MissionScripting.lua";
const LAST_UPLOAD_FILE: &str = "retRemoteLastUpload.txt";
const STATE_FILE: &str = "state.json";
const BACKUP_EXTENSION: &str = "original.lua";

/// Every location the supervisor touches, resolved once at startup.
#[derive(Debug, Clone)]
pub struct ServerPaths {
    pub install_dir: PathBuf,
    pub executable: PathBuf,
    pub mission_dir: PathBuf,
    /// `Saved Games/<folder>`; its name is the `-w` identity.
    pub save_dir: PathBuf,
    pub settings_file: PathBuf,
    pub settings_backup: PathBuf,
    pub sanitize_file: PathBuf,
    pub sanitize_backup: PathBuf,
    pub hooks_dir: PathBuf,
    pub hook_script: PathBuf,
    pub data_dir: PathBuf,
    pub state_file: PathBuf,
    pub last_upload_file: PathBuf,
    /// Folder the server uses when launched without `-w`.
    pub default_save_folder: String,
}

impl ServerPaths {
    /// Validates the pre-existing server files, then creates the
    /// supervisor-owned directories. Nothing is created unless every check
    /// passes.
    pub fn resolve(cfg: &ServerConfig) -> Result<Self, ConfigError> {
        let mission_dir = absolute(&cfg.dcs_mission_dir);
        if !mission_dir.is_dir() {
            return Err(missing("DCS mission directory", &mission_dir));
        }
        let save_dir = mission_dir
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| invalid("DCS mission directory", &mission_dir))?;

        let settings_file = save_dir.join("Config").join(SETTINGS_FILE);
        if !settings_file.is_file() {
            return Err(missing(SETTINGS_FILE, &settings_file));
        }

        let executable = absolute(&cfg.dcs_server_exe);
        if !executable.is_file() {
            return Err(missing("DCS server executable", &executable));
        }
        let install_dir = executable
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .ok_or_else(|| invalid("DCS server executable", &executable))?;

        let sanitize_file = install_dir.join("Scripts").join(SANITIZE_FILE);
        if !sanitize_file.is_file() {
            return Err(missing(SANITIZE_FILE, &sanitize_file));
        }

        let hook_name = cfg
            .hook_script
            .file_name()
            .ok_or_else(|| invalid("hook script", &cfg.hook_script))?;
        let hooks_dir = save_dir.join("Scripts").join("Hooks");
        let hook_script = hooks_dir.join(hook_name);

        let data_dir = absolute(&cfg.data_dir);

        for (what, dir) in [("hooks directory", &hooks_dir), ("data directory", &data_dir)] {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
                what,
                path: dir.clone(),
                source,
            })?;
        }

        let default_save_folder = read_default_save_folder(&install_dir);

        let paths = Self {
            settings_backup: settings_file.with_extension(BACKUP_EXTENSION),
            sanitize_backup: sanitize_file.with_extension(BACKUP_EXTENSION),
            last_upload_file: settings_file.with_file_name(LAST_UPLOAD_FILE),
            state_file: data_dir.join(STATE_FILE),
            install_dir,
            executable,
            mission_dir,
            save_dir,
            settings_file,
            sanitize_file,
            hooks_dir,
            hook_script,
            data_dir,
            default_save_folder,
        };

        tracing::info!(mission_dir = %paths.mission_dir.display(), "DCS mission directory");
        tracing::info!(executable = %paths.executable.display(), "DCS server executable");
        tracing::info!(state_file = %paths.state_file.display(), "state.json export location");

        Ok(paths)
    }

    pub fn executable_name(&self) -> String {
        self.executable
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Identity passed as `-w` at launch.
    pub fn save_folder(&self) -> String {
        self.save_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// `DCS.<variant>` from `<install>/variant.txt`, else `DCS.release_server`.
fn read_default_save_folder(install_dir: &Path) -> String {
    match std::fs::read_to_string(install_dir.join("variant.txt")) {
        Ok(v) if !v.trim().is_empty() => format!("DCS.{}", v.trim()),
        _ => DEFAULT_SAVE_FOLDER.to_string(),
    }
}

fn absolute(p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(p)
    }
}

fn missing(what: &'static str, path: &Path) -> ConfigError {
    ConfigError::MissingPath {
        what,
        path: path.to_path_buf(),
    }
}

fn invalid(what: &'static str, path: &Path) -> ConfigError {
    ConfigError::InvalidPath {
        what,
        path: path.to_path_buf(),
    }
}
