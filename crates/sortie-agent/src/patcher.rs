//! Reversible edits applied to the DCS install before launch.
//!
//! Each patched file has a sibling `*.original.lua` backup. The backup's
//! presence on disk is the only record that a patch is applied; nothing is
//! tracked in memory, so a supervisor restart at any point can still restore.

use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::lua_table::{LuaAssignment, LuaParseError, LuaTable, LuaValue};
use crate::missions::UploadedMission;
use crate::paths::ServerPaths;
use crate::support::{write_atomic, write_text_lf};

/// Statements in `MissionScripting.lua` that strip `os`, `io` and `lfs` from
/// the mission environment.
pub const SANITIZE_STATEMENTS: [&str; 3] = [
    "sanitizeModule('os')",
    "sanitizeModule('io')",
    "sanitizeModule('lfs')",
];

const SETTINGS_INDENT: &str = "    ";

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: LuaParseError,
    },
}

fn io_err<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> PatchError + 'a {
    move |source| PatchError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

// ============================================================================
// BackupRecord
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    /// Nothing to restore; either never applied or already restored.
    BackupMissing,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct BackupRecord {
    pub live: PathBuf,
    pub backup: PathBuf,
}

impl BackupRecord {
    pub fn new(live: impl Into<PathBuf>, backup: impl Into<PathBuf>) -> Self {
        Self {
            live: live.into(),
            backup: backup.into(),
        }
    }

    pub fn is_applied(&self) -> bool {
        self.backup.exists()
    }

    /// Byte-for-byte copy of the live file, written only if no backup exists
    /// yet. An existing backup already holds the true original.
    pub fn ensure_backup(&self) -> Result<bool, PatchError> {
        if self.is_applied() {
            return Ok(false);
        }
        let bytes = std::fs::read(&self.live).map_err(io_err("read", &self.live))?;
        write_atomic(&self.backup, &bytes).map_err(io_err("write backup", &self.backup))?;
        Ok(true)
    }

    pub fn restore(&self) -> Result<RestoreOutcome, PatchError> {
        if !self.is_applied() {
            return Ok(RestoreOutcome::BackupMissing);
        }
        let bytes = std::fs::read(&self.backup).map_err(io_err("read backup", &self.backup))?;
        write_atomic(&self.live, &bytes).map_err(io_err("restore", &self.live))?;
        std::fs::remove_file(&self.backup).map_err(io_err("delete backup", &self.backup))?;
        Ok(RestoreOutcome::Restored)
    }
}

// ============================================================================
// ConfigPatcher
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsOutcome {
    Injected(PathBuf),
    /// Selected mission does not exist; settings left untouched.
    MissionMissing(PathBuf),
    /// No upload recorded and no allowed filename to fall back to.
    NoMissionConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub hook_removed: bool,
    pub sanitize: RestoreOutcome,
    pub settings: RestoreOutcome,
}

impl RestoreReport {
    pub fn failures(&self) -> Vec<&str> {
        [&self.sanitize, &self.settings]
            .into_iter()
            .filter_map(|o| match o {
                RestoreOutcome::Failed(msg) => Some(msg.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPatcher {
    hook_source: PathBuf,
    hook_target: PathBuf,
    sanitize: BackupRecord,
    settings: BackupRecord,
    last_upload: UploadedMission,
    default_mission: Option<PathBuf>,
}

impl ConfigPatcher {
    /// `default_mission` is a file name inside the mission directory used
    /// when nothing has been uploaded yet.
    pub fn new(
        paths: &ServerPaths,
        hook_source: impl Into<PathBuf>,
        default_mission: Option<&str>,
    ) -> Self {
        Self {
            hook_source: hook_source.into(),
            hook_target: paths.hook_script.clone(),
            sanitize: BackupRecord::new(&paths.sanitize_file, &paths.sanitize_backup),
            settings: BackupRecord::new(&paths.settings_file, &paths.settings_backup),
            last_upload: UploadedMission::new(&paths.last_upload_file),
            default_mission: default_mission.map(|name| paths.mission_dir.join(name)),
        }
    }

    pub fn sanitize_record(&self) -> &BackupRecord {
        &self.sanitize
    }

    pub fn settings_record(&self) -> &BackupRecord {
        &self.settings
    }

    /// Hook, then sandbox, then settings. A missing mission is logged and
    /// skipped; I/O and parse failures abort.
    pub fn apply_all(&self) -> Result<SettingsOutcome, PatchError> {
        self.install_hook()?;
        self.desanitize()?;
        self.inject_settings()
    }

    /// The hook script is supervisor-owned: always overwritten, never backed up.
    pub fn install_hook(&self) -> Result<(), PatchError> {
        let text = std::fs::read_to_string(&self.hook_source)
            .map_err(io_err("read hook script", &self.hook_source))?;
        write_text_lf(&self.hook_target, &text)
            .map_err(io_err("install hook script", &self.hook_target))?;
        tracing::debug!(path = %self.hook_target.display(), "hooks script installed");
        Ok(())
    }

    /// Comments out the sanitize statements. Returns how many lines changed.
    pub fn desanitize(&self) -> Result<usize, PatchError> {
        let live = &self.sanitize.live;
        let text = std::fs::read_to_string(live).map_err(io_err("read", live))?;
        if self.sanitize.ensure_backup()? {
            tracing::debug!(path = %self.sanitize.backup.display(), "MissionScripting.lua backup created");
        }

        let (patched, changed) = desanitize_text(&text);
        write_text_lf(live, &patched).map_err(io_err("write", live))?;
        tracing::debug!(changed, "MissionScripting.lua de-sanitized");
        Ok(changed)
    }

    /// Last upload if recorded, else the default mission.
    pub fn selected_mission(&self) -> Option<PathBuf> {
        self.last_upload
            .read()
            .or_else(|| self.default_mission.clone())
    }

    /// Points `missionList` at the selected mission.
    pub fn inject_settings(&self) -> Result<SettingsOutcome, PatchError> {
        let Some(mission) = self.selected_mission() else {
            tracing::error!("no mission uploaded and no default mission configured");
            return Ok(SettingsOutcome::NoMissionConfigured);
        };
        if !mission.is_file() {
            tracing::error!(path = %mission.display(), "last uploaded mission file not found");
            return Ok(SettingsOutcome::MissionMissing(mission));
        }

        let live = &self.settings.live;
        let text = std::fs::read_to_string(live).map_err(io_err("read", live))?;
        let mut doc = LuaAssignment::parse(&text).map_err(|source| PatchError::Settings {
            path: live.clone(),
            source,
        })?;

        let mission_str = mission.to_string_lossy().into_owned();
        doc.table.set("listStartIndex", 1i64);
        doc.table.set(
            "missionList",
            LuaTable::from_list([LuaValue::from(mission_str.as_str())]),
        );
        if doc.table.contains_key("lastSelectedMission") {
            doc.table.set("lastSelectedMission", mission_str.as_str());
        }

        if self.settings.ensure_backup()? {
            tracing::debug!(path = %self.settings.backup.display(), "serverSettings.lua backup created");
        }
        write_text_lf(live, &doc.to_lua(SETTINGS_INDENT)).map_err(io_err("write", live))?;
        tracing::debug!(mission = %mission.display(), "serverSettings.lua set to run mission");
        Ok(SettingsOutcome::Injected(mission))
    }

    /// Never fails as a whole: each file is restored independently and
    /// problems are logged.
    pub fn restore_all(&self) -> RestoreReport {
        let hook_removed = match std::fs::remove_file(&self.hook_target) {
            Ok(()) => {
                tracing::debug!("hooks script deleted");
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!(error = %e, path = %self.hook_target.display(), "failed to delete hooks script");
                false
            }
        };

        RestoreReport {
            hook_removed,
            sanitize: restore_logged("MissionScripting.lua", &self.sanitize),
            settings: restore_logged("serverSettings.lua", &self.settings),
        }
    }
}

fn restore_logged(name: &str, record: &BackupRecord) -> RestoreOutcome {
    match record.restore() {
        Ok(RestoreOutcome::BackupMissing) => {
            tracing::warn!(file = name, "backup not found, cannot restore");
            RestoreOutcome::BackupMissing
        }
        Ok(outcome) => {
            tracing::debug!(file = name, "restored");
            outcome
        }
        Err(e) => {
            tracing::error!(file = name, error = %e, "restore failed");
            RestoreOutcome::Failed(e.to_string())
        }
    }
}

/// Rewrites each sanitize statement as `\t-- <statement>`. Other lines are
/// kept verbatim; line endings become `\n`.
pub fn desanitize_text(src: &str) -> (String, usize) {
    let mut changed = 0;
    let mut out: Vec<String> = Vec::new();
    for line in src.lines() {
        let trimmed = line.trim();
        if SANITIZE_STATEMENTS.contains(&trimmed) {
            changed += 1;
            out.push(format!("\t-- {trimmed}"));
        } else {
            out.push(line.to_string());
        }
    }
    let mut text = out.join("\n");
    if src.ends_with('\n') {
        text.push('\n');
    }
    (text, changed)
}
