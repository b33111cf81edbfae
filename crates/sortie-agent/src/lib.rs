//! Supervisor for a single DCS World dedicated server: locates the process,
//! applies reversible configuration patches around its lifetime, and stores
//! uploaded missions.

pub mod config;
pub mod locator;
pub mod lua_table;
pub mod missions;
pub mod patcher;
pub mod paths;
pub mod process_table;
pub mod supervisor;
pub mod support;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{Config, ConfigError};
pub use missions::{StateFileNotFound, UploadError};
pub use sortie_process::{LifecyclePhase, ServerStatus};
pub use supervisor::{Supervisor, SupervisorError, SupervisorOptions, SupervisorTimings};
