use sortie_process::ProcessHandle;

use crate::process_table::{ObservedProcess, ProcessTable};

/// Launch flag that names the `Saved Games` folder a server instance uses.
pub const SAVE_FOLDER_FLAG: &str = "-w";

/// Save-folder identity of a command line: the token after the first `-w`,
/// or `default_folder` when the flag is absent or dangling.
pub fn save_folder_of<'a>(cmd: &'a [String], default_folder: &'a str) -> &'a str {
    cmd.iter()
        .position(|a| a == SAVE_FOLDER_FLAG)
        .and_then(|i| cmd.get(i + 1))
        .map(String::as_str)
        .unwrap_or(default_folder)
}

/// First process named `executable_name` whose save folder is `save_folder`.
pub fn match_process(
    processes: &[ObservedProcess],
    executable_name: &str,
    save_folder: &str,
    default_folder: &str,
) -> Option<ProcessHandle> {
    processes
        .iter()
        .filter(|p| p.name == executable_name)
        .find(|p| save_folder_of(&p.cmd, default_folder) == save_folder)
        .map(|p| ProcessHandle {
            pid: p.pid,
            started_at: p.started_at,
            save_folder: save_folder.to_string(),
        })
}

/// Remembered handle if the OS still confirms it, otherwise a full scan.
pub fn locate(
    table: &dyn ProcessTable,
    remembered: Option<&ProcessHandle>,
    executable_name: &str,
    save_folder: &str,
    default_folder: &str,
) -> Option<ProcessHandle> {
    if let Some(h) = remembered
        && table.is_alive(h)
    {
        return Some(h.clone());
    }

    match_process(&table.processes(), executable_name, save_folder, default_folder)
}

#[derive(Debug, Clone)]
pub struct ProcessLocator {
    executable_name: String,
    save_folder: String,
    default_folder: String,
}

impl ProcessLocator {
    pub fn new(
        executable_name: impl Into<String>,
        save_folder: impl Into<String>,
        default_folder: impl Into<String>,
    ) -> Self {
        Self {
            executable_name: executable_name.into(),
            save_folder: save_folder.into(),
            default_folder: default_folder.into(),
        }
    }

    pub fn executable_name(&self) -> &str {
        &self.executable_name
    }

    pub fn save_folder(&self) -> &str {
        &self.save_folder
    }

    pub fn find(
        &self,
        table: &dyn ProcessTable,
        remembered: Option<&ProcessHandle>,
    ) -> Option<ProcessHandle> {
        locate(
            table,
            remembered,
            &self.executable_name,
            &self.save_folder,
            &self.default_folder,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProcessTable;

    fn proc(pid: u32, name: &str, cmd: &[&str]) -> ObservedProcess {
        ObservedProcess {
            pid,
            name: name.to_string(),
            cmd: cmd.iter().map(|s| s.to_string()).collect(),
            started_at: 1_700_000_000 + pid as u64,
        }
    }

    #[test]
    fn save_folder_reads_token_after_flag() {
        let cmd: Vec<String> = ["DCS_server.exe", "-w", "DCS.server1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(save_folder_of(&cmd, "DCS.release_server"), "DCS.server1");
    }

    #[test]
    fn save_folder_falls_back_to_default() {
        let no_flag = vec!["DCS_server.exe".to_string()];
        assert_eq!(save_folder_of(&no_flag, "DCS.release_server"), "DCS.release_server");

        let dangling = vec!["DCS_server.exe".to_string(), "-w".to_string()];
        assert_eq!(save_folder_of(&dangling, "DCS.release_server"), "DCS.release_server");
    }

    #[test]
    fn matches_only_configured_save_folder() {
        let list = vec![
            proc(10, "DCS_server.exe", &["DCS_server.exe", "-w", "DCS.other"]),
            proc(11, "notepad.exe", &["notepad.exe", "-w", "DCS.mine"]),
            proc(12, "DCS_server.exe", &["DCS_server.exe", "-w", "DCS.mine"]),
        ];
        let h = match_process(&list, "DCS_server.exe", "DCS.mine", "DCS.release_server").unwrap();
        assert_eq!(h.pid, 12);
        assert_eq!(h.started_at, 1_700_000_012);
        assert_eq!(h.save_folder, "DCS.mine");

        assert!(match_process(&list, "DCS_server.exe", "DCS.none", "DCS.release_server").is_none());
    }

    #[test]
    fn default_folder_matches_flagless_process() {
        let list = vec![proc(5, "DCS_server.exe", &["DCS_server.exe"])];
        let h = match_process(
            &list,
            "DCS_server.exe",
            "DCS.release_server",
            "DCS.release_server",
        );
        assert_eq!(h.map(|h| h.pid), Some(5));
    }

    #[test]
    fn remembered_handle_skips_scan_while_alive() {
        let table = FakeProcessTable::new();
        let pid = table.add_process("DCS_server.exe", &["DCS_server.exe", "-w", "DCS.mine"]);
        let locator = ProcessLocator::new("DCS_server.exe", "DCS.mine", "DCS.release_server");

        let first = locator.find(&table, None).unwrap();
        assert_eq!(first.pid, pid);
        let scans = table.scan_count();

        let again = locator.find(&table, Some(&first)).unwrap();
        assert_eq!(again, first);
        assert_eq!(table.scan_count(), scans);
    }

    #[test]
    fn stale_remembered_handle_triggers_rescan() {
        let table = FakeProcessTable::new();
        let old = table.add_process("DCS_server.exe", &["DCS_server.exe", "-w", "DCS.mine"]);
        let locator = ProcessLocator::new("DCS_server.exe", "DCS.mine", "DCS.release_server");
        let stale = locator.find(&table, None).unwrap();

        table.remove_process(old);
        let new = table.add_process("DCS_server.exe", &["DCS_server.exe", "-w", "DCS.mine"]);

        let found = locator.find(&table, Some(&stale)).unwrap();
        assert_eq!(found.pid, new);
    }

    #[test]
    fn reused_pid_with_new_start_time_is_not_alive() {
        let table = FakeProcessTable::new();
        let pid = table.add_process("DCS_server.exe", &["DCS_server.exe", "-w", "DCS.mine"]);
        let locator = ProcessLocator::new("DCS_server.exe", "DCS.mine", "DCS.release_server");
        let mut h = locator.find(&table, None).unwrap();
        h.started_at -= 100;

        assert!(!table.is_alive(&h));
        let found = locator.find(&table, Some(&h)).unwrap();
        assert_eq!(found.pid, pid);
        assert_ne!(found.started_at, h.started_at);
    }
}
