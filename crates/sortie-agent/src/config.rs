use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub const CONFIG_ENV: &str = "SORTIE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub users: Vec<UserCredential>,
}

impl Config {
    /// Path from `SORTIE_CONFIG`, falling back to `./config.yaml`.
    pub fn default_path() -> PathBuf {
        std::env::var(CONFIG_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Loads once at startup. A missing file is fatal: the server paths
    /// cannot be guessed reliably.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Err(ConfigError::Empty);
        }
        let mut cfg: Config = serde_yaml::from_str(contents)?;
        cfg.server.dcs_server_exe = expand_home(&cfg.server.dcs_server_exe);
        cfg.server.dcs_mission_dir = expand_home(&cfg.server.dcs_mission_dir);
        Ok(cfg)
    }
}

// ============================================================================
// AppConfig
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_allowed_filenames")]
    pub allowed_filenames: Vec<String>,
    /// Bytes.
    #[serde(default = "default_allowed_max_size")]
    pub allowed_max_size: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            debug: false,
            allowed_filenames: default_allowed_filenames(),
            allowed_max_size: default_allowed_max_size(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_allowed_filenames() -> Vec<String> {
    vec!["retribution_nextturn.miz".to_string()]
}

fn default_allowed_max_size() -> u64 {
    50 * 1024 * 1024
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_exe")]
    pub dcs_server_exe: PathBuf,
    #[serde(default = "default_mission_dir")]
    pub dcs_mission_dir: PathBuf,
    /// Minutes. Zero disables the watchdog.
    #[serde(default)]
    pub max_running_time: u64,
    #[serde(default = "default_hook_script")]
    pub hook_script: PathBuf,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            dcs_server_exe: default_server_exe(),
            dcs_mission_dir: default_mission_dir(),
            max_running_time: 0,
            hook_script: default_hook_script(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_server_exe() -> PathBuf {
    PathBuf::from(r"C:\Program Files\Eagle Dynamics\DCS World Server\bin\DCS_server.exe")
}

fn default_mission_dir() -> PathBuf {
    expand_home(Path::new("~/Saved Games/DCS.release_server/Missions"))
}

fn default_hook_script() -> PathBuf {
    PathBuf::from("resources/retribution-control.lua")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct UserCredential {
    pub username: String,
    // YAML happily reads `password: 1234` as a number.
    #[serde(deserialize_with = "string_or_number")]
    pub password: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_yaml::Value::deserialize(deserializer)?;
    match v {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "password must be a scalar, got {other:?}"
        ))),
    }
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_home(p: &Path) -> PathBuf {
    let Some(s) = p.to_str() else {
        return p.to_path_buf();
    };
    let rest = if s == "~" {
        ""
    } else if let Some(r) = s.strip_prefix("~/").or_else(|| s.strip_prefix("~\\")) {
        r
    } else {
        return p.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => p.to_path_buf(),
    }
}

// ============================================================================
// ConfigError
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration file is empty or invalid")]
    Empty,

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{what} not found at: {}", path.display())]
    MissingPath { what: &'static str, path: PathBuf },

    #[error("invalid {what}: {}", path.display())]
    InvalidPath { what: &'static str, path: PathBuf },

    #[error("failed to create {what} at {}: {source}", path.display())]
    CreateDir {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_yaml_uses_defaults() {
        let cfg = Config::from_yaml(
            r#"
app:
  port: 9000
server:
  max_running_time: 240
"#,
        )
        .unwrap();
        assert_eq!(cfg.app.host, "0.0.0.0");
        assert_eq!(cfg.app.port, 9000);
        assert_eq!(cfg.app.allowed_filenames, vec!["retribution_nextturn.miz"]);
        assert_eq!(cfg.app.allowed_max_size, 50 * 1024 * 1024);
        assert_eq!(cfg.server.max_running_time, 240);
        assert_eq!(
            cfg.server.hook_script,
            PathBuf::from("resources/retribution-control.lua")
        );
        assert!(cfg.users.is_empty());
    }

    #[test]
    fn numeric_passwords_are_read_as_strings() {
        let cfg = Config::from_yaml(
            r#"
users:
  - username: alice
    password: 1234
  - username: bob
    password: "s3cret"
"#,
        )
        .unwrap();
        assert_eq!(cfg.users[0].password, "1234");
        assert_eq!(cfg.users[1].password, "s3cret");
    }

    #[test]
    fn empty_file_is_rejected() {
        let err = Config::from_yaml("   \n").unwrap_err();
        assert!(matches!(err, ConfigError::Empty));
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = Config::load(tmp.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
app:
  allowed_filenames: [a.miz, b.miz]
  allowed_max_size: 10
"#
        )
        .unwrap();
        let cfg = Config::load(file.path()).unwrap();
        assert_eq!(cfg.app.allowed_filenames, vec!["a.miz", "b.miz"]);
        assert_eq!(cfg.app.allowed_max_size, 10);
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let err = Config::from_yaml("app: [").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn expand_home_leaves_plain_paths_alone() {
        let p = Path::new("/srv/dcs/Missions");
        assert_eq!(expand_home(p), p.to_path_buf());
    }

    #[test]
    fn tilde_expands_to_home_dir() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(expand_home(Path::new("~")), home);
        assert_eq!(
            expand_home(Path::new("~/Saved Games/DCS/Missions")),
            home.join("Saved Games/DCS/Missions")
        );
        assert_eq!(expand_home(Path::new("~\\Missions")), home.join("Missions"));
        assert_eq!(
            expand_home(Path::new("~other/Missions")),
            PathBuf::from("~other/Missions")
        );
    }
}
