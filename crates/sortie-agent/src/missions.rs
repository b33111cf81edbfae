use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::support::write_atomic;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid file name: {0}")]
    RejectedFilename(String),

    #[error("file too large: {size} bytes exceeds the {max} byte limit")]
    RejectedSize { size: u64, max: u64 },

    #[error("permission denied writing {}; is the mission file in use?", path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The state export has not been written yet. Normal right after a start.
#[derive(Debug, Error)]
#[error("state file not found: {}", path.display())]
pub struct StateFileNotFound {
    pub path: PathBuf,
}

/// On-disk pointer to the most recently accepted mission: one line holding
/// an absolute path.
#[derive(Debug, Clone)]
pub struct UploadedMission {
    pointer: PathBuf,
}

impl UploadedMission {
    pub fn new(pointer: impl Into<PathBuf>) -> Self {
        Self {
            pointer: pointer.into(),
        }
    }

    pub fn pointer_path(&self) -> &Path {
        &self.pointer
    }

    pub fn read(&self) -> Option<PathBuf> {
        let raw = std::fs::read_to_string(&self.pointer).ok()?;
        let line = raw.trim();
        (!line.is_empty()).then(|| PathBuf::from(line))
    }

    pub fn record(&self, mission: &Path) -> std::io::Result<()> {
        let line = format!("{}\n", mission.display());
        write_atomic(&self.pointer, line.as_bytes())
    }
}

#[derive(Debug, Clone)]
pub struct MissionFileStore {
    mission_dir: PathBuf,
    allowed_filenames: Vec<String>,
    max_size: u64,
    last_upload: UploadedMission,
    state_file: PathBuf,
}

impl MissionFileStore {
    pub fn new(
        mission_dir: impl Into<PathBuf>,
        allowed_filenames: Vec<String>,
        max_size: u64,
        last_upload: UploadedMission,
        state_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            mission_dir: mission_dir.into(),
            allowed_filenames,
            max_size,
            last_upload,
            state_file: state_file.into(),
        }
    }

    pub fn allowed_filenames(&self) -> &[String] {
        &self.allowed_filenames
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Validates, writes `<mission dir>/<filename>` (overwriting), then
    /// records it as the mission to run at next start.
    pub fn save(&self, bytes: &[u8], filename: &str) -> Result<PathBuf, UploadError> {
        if !self.allowed_filenames.iter().any(|f| f == filename) {
            return Err(UploadError::RejectedFilename(filename.to_string()));
        }
        let size = bytes.len() as u64;
        if size > self.max_size {
            return Err(UploadError::RejectedSize {
                size,
                max: self.max_size,
            });
        }

        let path = self.mission_dir.join(filename);
        std::fs::write(&path, bytes).map_err(|e| write_error(&path, e))?;
        tracing::debug!(path = %path.display(), size, "mission file saved");

        self.last_upload
            .record(&path)
            .map_err(|e| write_error(self.last_upload.pointer_path(), e))?;
        Ok(path)
    }

    pub fn state_file(&self) -> Result<PathBuf, StateFileNotFound> {
        if self.state_file.is_file() {
            Ok(self.state_file.clone())
        } else {
            Err(StateFileNotFound {
                path: self.state_file.clone(),
            })
        }
    }
}

fn write_error(path: &Path, source: std::io::Error) -> UploadError {
    if is_permission_denied(&source) {
        UploadError::PermissionDenied {
            path: path.to_path_buf(),
            source,
        }
    } else {
        UploadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn is_permission_denied(e: &std::io::Error) -> bool {
    // ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION: the server has the
    // mission open.
    #[cfg(windows)]
    {
        if matches!(e.raw_os_error(), Some(32) | Some(33)) {
            return true;
        }
    }
    e.kind() == std::io::ErrorKind::PermissionDenied
}
