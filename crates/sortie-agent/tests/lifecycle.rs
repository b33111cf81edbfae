use std::sync::Arc;

use sortie_agent::lua_table::{LuaAssignment, LuaTable, LuaValue};
use sortie_agent::paths::ServerPaths;
use sortie_agent::process_table::ProcessTable;
use sortie_agent::testing::{
    FakeProcessTable, SANITIZE_FIXTURE, SAVE_FOLDER, SERVER_EXE, SETTINGS_FIXTURE, ServerLayout,
    fast_timings,
};
use sortie_agent::{Supervisor, SupervisorError, SupervisorOptions};
use sortie_process::LifecyclePhase;

fn supervisor(layout: &ServerLayout, table: Arc<FakeProcessTable>) -> Supervisor {
    let paths = ServerPaths::resolve(&layout.server_config()).unwrap();
    let mut options = SupervisorOptions::from_config(&layout.config());
    options.timings = fast_timings();
    Supervisor::new(paths, options, table)
}

fn modified(path: &std::path::Path) -> std::time::SystemTime {
    std::fs::metadata(path).unwrap().modified().unwrap()
}

#[tokio::test]
async fn fresh_start_status_stop_status() {
    let layout = ServerLayout::new();
    let table = Arc::new(FakeProcessTable::new());
    let sup = supervisor(&layout, table.clone());

    assert!(!sup.status().running);
    assert_eq!(sup.status().uptime_display(), "N/A");

    let mission = sup.save_mission(b"PK\x03\x04", "mission.miz").await.unwrap();
    sup.start().await.unwrap();

    let status = sup.status();
    assert!(status.running);
    assert!(status.uptime_secs.is_some());
    assert!(status.uptime_secs <= Some(1));
    assert_eq!(sup.phase(), LifecyclePhase::Running);

    let paths = sup.paths();
    assert!(paths.hook_script.is_file());
    assert!(paths.sanitize_backup.is_file());
    assert!(paths.settings_backup.is_file());
    let settings =
        LuaAssignment::parse(&std::fs::read_to_string(&paths.settings_file).unwrap()).unwrap();
    assert_eq!(
        settings.table.get_str("missionList"),
        Some(&LuaValue::Table(LuaTable::from_list([LuaValue::from(
            mission.to_string_lossy().into_owned()
        )])))
    );

    sup.stop().await.unwrap();

    assert!(!sup.status().running);
    assert_eq!(sup.phase(), LifecyclePhase::Stopped);
    assert!(!paths.hook_script.exists());
    assert!(!paths.sanitize_backup.exists());
    assert!(!paths.settings_backup.exists());
    assert_eq!(
        std::fs::read(&paths.sanitize_file).unwrap(),
        SANITIZE_FIXTURE.as_bytes()
    );
    assert_eq!(
        std::fs::read(&paths.settings_file).unwrap(),
        SETTINGS_FIXTURE.as_bytes()
    );
}

#[tokio::test]
async fn start_twice_launches_once_and_keeps_backups() {
    let layout = ServerLayout::new();
    layout.write_mission("mission.miz");
    let table = Arc::new(FakeProcessTable::new());
    let sup = supervisor(&layout, table.clone());

    sup.start().await.unwrap();
    let backup = sup.paths().settings_backup.clone();
    let before = modified(&backup);

    sup.start().await.unwrap();

    assert_eq!(table.launches().len(), 1);
    assert_eq!(modified(&backup), before);
    assert_eq!(std::fs::read(&backup).unwrap(), SETTINGS_FIXTURE.as_bytes());
}

#[tokio::test]
async fn stop_while_stopped_writes_nothing() {
    let layout = ServerLayout::new();
    let table = Arc::new(FakeProcessTable::new());
    let sup = supervisor(&layout, table.clone());

    let settings_before = modified(&layout.settings_file());
    sup.stop().await.unwrap();
    sup.stop().await.unwrap();

    assert_eq!(table.terminate_calls(), 0);
    assert_eq!(modified(&layout.settings_file()), settings_before);
    assert!(!sup.paths().settings_backup.exists());
    assert!(!sup.paths().sanitize_backup.exists());
}

#[tokio::test]
async fn start_timeout_leaves_patches_applied() {
    let layout = ServerLayout::new();
    layout.write_mission("mission.miz");
    let table = Arc::new(FakeProcessTable::new());
    table.never_appear();
    let sup = supervisor(&layout, table.clone());

    let err = sup.start().await.unwrap_err();
    assert!(matches!(err, SupervisorError::StartTimeout { attempts: 5 }));
    assert!(sup.paths().sanitize_backup.exists());
    assert!(sup.paths().settings_backup.exists());
    assert_eq!(sup.phase(), LifecyclePhase::Stopped);
}

#[tokio::test]
async fn stop_forces_kill_and_still_restores() {
    let layout = ServerLayout::new();
    layout.write_mission("mission.miz");
    let table = Arc::new(FakeProcessTable::new());
    table.ignore_terminate();
    let sup = supervisor(&layout, table.clone());

    sup.start().await.unwrap();
    let pid = sup.status().pid.unwrap();

    let started = std::time::Instant::now();
    let err = sup.stop().await.unwrap_err();
    assert!(started.elapsed() < std::time::Duration::from_secs(5));

    match err {
        SupervisorError::StopForced { pid: forced, .. } => assert_eq!(forced, pid),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(table.terminate_calls(), 1);
    assert_eq!(table.kill_calls(), 1);
    assert!(!sup.status().running);
    assert!(!sup.paths().settings_backup.exists());
    assert_eq!(
        std::fs::read(layout.sanitize_file()).unwrap(),
        SANITIZE_FIXTURE.as_bytes()
    );
}

#[tokio::test]
async fn new_supervisor_adopts_running_server_and_restores_on_stop() {
    let layout = ServerLayout::new();
    layout.write_mission("mission.miz");
    let table = Arc::new(FakeProcessTable::new());

    {
        let first = supervisor(&layout, table.clone());
        first.start().await.unwrap();
    }

    // Supervisor restarted while DCS kept running.
    let second = supervisor(&layout, table.clone());
    assert!(second.status().running);

    second.start().await.unwrap();
    assert_eq!(table.launches().len(), 1);

    second.stop().await.unwrap();
    assert_eq!(
        std::fs::read(layout.settings_file()).unwrap(),
        SETTINGS_FIXTURE.as_bytes()
    );
}

#[tokio::test]
async fn server_crash_is_seen_as_stopped() {
    let layout = ServerLayout::new();
    layout.write_mission("mission.miz");
    let table = Arc::new(FakeProcessTable::new());
    let sup = supervisor(&layout, table.clone());

    sup.start().await.unwrap();
    let pid = sup.status().pid.unwrap();
    assert!(table.remove_process(pid));

    assert!(!sup.status().running);

    // A later start relaunches without re-backing-up over the originals.
    sup.start().await.unwrap();
    assert_eq!(table.launches().len(), 2);
    assert_eq!(
        std::fs::read(&sup.paths().sanitize_backup).unwrap(),
        SANITIZE_FIXTURE.as_bytes()
    );
}

#[tokio::test]
async fn other_instance_with_different_save_folder_is_ignored() {
    let layout = ServerLayout::new();
    layout.write_mission("mission.miz");
    let table = Arc::new(FakeProcessTable::new());
    let other = table.add_process(SERVER_EXE, &[SERVER_EXE, "-w", "DCS.someone_else"]);
    let sup = supervisor(&layout, table.clone());

    assert!(!sup.status().running);
    sup.start().await.unwrap();

    let ours = sup.status().pid.unwrap();
    assert_ne!(ours, other);

    sup.stop().await.unwrap();
    assert!(
        table
            .processes()
            .iter()
            .any(|p| p.pid == other && p.cmd.contains(&"DCS.someone_else".to_string()))
    );
    assert!(!table.processes().iter().any(|p| p.cmd.contains(&SAVE_FOLDER.to_string())));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_launch_once() {
    let layout = ServerLayout::new();
    layout.write_mission("mission.miz");
    let table = Arc::new(FakeProcessTable::new());
    let sup = Arc::new(supervisor(&layout, table.clone()));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let sup = sup.clone();
            tokio::spawn(async move { sup.start().await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(table.launches().len(), 1);
    assert!(sup.status().running);
    assert_eq!(
        std::fs::read(&sup.paths().settings_backup).unwrap(),
        SETTINGS_FIXTURE.as_bytes()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_start_and_stop_leave_a_consistent_tree() {
    let layout = ServerLayout::new();
    layout.write_mission("mission.miz");
    let table = Arc::new(FakeProcessTable::new());
    let sup = Arc::new(supervisor(&layout, table.clone()));

    for _ in 0..5 {
        let starter = {
            let sup = sup.clone();
            tokio::spawn(async move { sup.start().await })
        };
        let stopper = {
            let sup = sup.clone();
            tokio::spawn(async move { sup.stop().await })
        };
        starter.await.unwrap().unwrap();
        stopper.await.unwrap().unwrap();

        let paths = sup.paths();
        if sup.status().running {
            assert_eq!(sup.phase(), LifecyclePhase::Running);
            assert!(paths.hook_script.is_file());
            assert_eq!(
                std::fs::read(&paths.sanitize_backup).unwrap(),
                SANITIZE_FIXTURE.as_bytes()
            );
            assert_eq!(
                std::fs::read(&paths.settings_backup).unwrap(),
                SETTINGS_FIXTURE.as_bytes()
            );
        } else {
            assert_eq!(sup.phase(), LifecyclePhase::Stopped);
            assert!(!paths.hook_script.exists());
            assert!(!paths.sanitize_backup.exists());
            assert!(!paths.settings_backup.exists());
            assert_eq!(
                std::fs::read(&paths.sanitize_file).unwrap(),
                SANITIZE_FIXTURE.as_bytes()
            );
            assert_eq!(
                std::fs::read(&paths.settings_file).unwrap(),
                SETTINGS_FIXTURE.as_bytes()
            );
        }

        sup.stop().await.unwrap();
        assert!(!sup.status().running);
    }
}
