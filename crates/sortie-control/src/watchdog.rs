use std::{sync::Arc, time::Duration};

use sortie_agent::Supervisor;
use sortie_agent::support::format_error_chain;

pub const WATCHDOG_TICK: Duration = Duration::from_secs(30);

/// Periodically enforces `server.max_running_time`. Returns `None` when the
/// budget is disabled.
pub fn spawn(supervisor: Arc<Supervisor>, tick: Duration) -> Option<tokio::task::JoinHandle<()>> {
    let budget = supervisor.max_running_time()?;
    tracing::info!(max_running_time = ?budget, "max running time watchdog enabled");

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match supervisor.enforce_max_running_time().await {
                Ok(true) => tracing::info!("DCS server stopped by max running time watchdog"),
                Ok(false) => {}
                Err(e) => tracing::error!(
                    error = %format_error_chain(&e),
                    "max running time watchdog failed to stop DCS server"
                ),
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sortie_agent::SupervisorOptions;
    use sortie_agent::paths::ServerPaths;
    use sortie_agent::process_table::unix_now;
    use sortie_agent::testing::{FakeProcessTable, SAVE_FOLDER, SERVER_EXE, ServerLayout, fast_timings};

    fn supervisor(
        layout: &ServerLayout,
        table: Arc<FakeProcessTable>,
        budget: Option<Duration>,
    ) -> Arc<Supervisor> {
        let paths = ServerPaths::resolve(&layout.server_config()).unwrap();
        let mut options = SupervisorOptions::from_config(&layout.config());
        options.timings = fast_timings();
        options.max_running_time = budget;
        Arc::new(Supervisor::new(paths, options, table))
    }

    #[tokio::test]
    async fn disabled_budget_spawns_nothing() {
        let layout = ServerLayout::new();
        let sup = supervisor(&layout, Arc::new(FakeProcessTable::new()), None);
        assert!(spawn(sup, Duration::from_millis(10)).is_none());
    }

    #[tokio::test]
    async fn stops_server_past_budget() {
        let layout = ServerLayout::new();
        let table = Arc::new(FakeProcessTable::new());
        table.add_process_started_at(SERVER_EXE, &[SERVER_EXE, "-w", SAVE_FOLDER], unix_now() - 600);
        let sup = supervisor(&layout, table.clone(), Some(Duration::from_secs(60)));

        let task = spawn(sup.clone(), Duration::from_millis(10)).unwrap();
        for _ in 0..200 {
            if !sup.status().running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        task.abort();

        assert!(!sup.status().running);
        assert_eq!(table.terminate_calls(), 1);
    }
}
