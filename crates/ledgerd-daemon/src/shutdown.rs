//! Signal handling and the bounded shutdown sequence.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use ledgerd_scheduler::{LifecycleManager, ShutdownReport};

/// Resolve on SIGINT (Ctrl-C) or, on Unix, SIGTERM.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl-C"),
        _ = terminate => info!("received SIGTERM"),
    }
}

/// Run the lifecycle sequence, giving up after `grace`.
///
/// Returns `None` when the grace period ran out first.
pub async fn shutdown_within(
    lifecycle: Arc<LifecycleManager>,
    grace: Duration,
) -> Option<ShutdownReport> {
    let task = tokio::task::spawn_blocking(move || lifecycle.shutdown());
    match tokio::time::timeout(grace, task).await {
        Ok(Ok(report)) => {
            info!("shutdown complete:\n{}", report.lines().join("\n"));
            Some(report)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "shutdown sequence aborted");
            None
        }
        Err(_) => {
            warn!(grace_secs = grace.as_secs(), "shutdown grace period elapsed; exiting anyway");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use rusqlite::Connection;

    use ledgerd_scheduler::{
        CronClock, JobStatus, JobStore, RoutineTable, RunLogStore, Scheduler, SchedulerOptions,
    };

    #[tokio::test]
    async fn shutdown_cancels_armed_jobs_within_grace() {
        let conn = Connection::open_in_memory().unwrap();
        ledgerd_scheduler::db::init_db(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let jobs = JobStore::new(Arc::clone(&conn));
        jobs.insert("nightly", "0 0 0 * * *", JobStatus::Active).unwrap();

        let scheduler = Arc::new(Scheduler::new(
            jobs.clone(),
            RunLogStore::new(conn),
            RoutineTable::new(),
            Arc::new(CronClock::new()),
            SchedulerOptions::default(),
        ));
        scheduler.load_active_jobs().unwrap();

        let lifecycle = Arc::new(LifecycleManager::new(Arc::clone(&scheduler)));
        let quiesced = lifecycle.subscribe();
        let report = shutdown_within(lifecycle, Duration::from_secs(5))
            .await
            .expect("shutdown timed out");

        assert_eq!(report.jobs_cancelled, 1);
        assert!(*quiesced.borrow());
        assert!(scheduler.armed_jobs().is_empty());
        assert_eq!(
            jobs.get_by_name("nightly").unwrap().unwrap().status,
            JobStatus::Cancelled
        );
    }
}
