use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{info, warn};

use ledgerd_core::LedgerdConfig;
use ledgerd_ledger::{
    jobs::routine_table, CsvExporter, ReportGenerator, SqliteTransactionStore, TransactionProcessor,
};
use ledgerd_scheduler::{CronClock, JobStore, RunLogStore, Scheduler, SchedulerOptions};

/// Stores and settings shared by every subcommand.
pub struct App {
    pub config: LedgerdConfig,
    pub jobs: JobStore,
    pub runs: RunLogStore,
    pub transactions: Arc<SqliteTransactionStore>,
}

impl App {
    /// Open the database, run schema setup and build the stores.
    ///
    /// The scheduler tables and the transaction table each get their own
    /// connection to the same file.
    pub fn open(config: LedgerdConfig) -> anyhow::Result<Self> {
        let db_path = config.database.path.clone();
        if let Err(e) = ensure_parent_dir(&db_path) {
            warn!(path = %db_path, error = %e, "could not create database directory");
        }
        info!(path = %db_path, "opening SQLite database");

        let scheduler_db = open_connection(&db_path)?;
        ledgerd_scheduler::db::init_db(&scheduler_db)?;
        let ledger_db = open_connection(&db_path)?;
        ledgerd_ledger::db::init_db(&ledger_db)?;
        info!("database schema ready");

        let scheduler_db = Arc::new(Mutex::new(scheduler_db));
        Ok(Self {
            jobs: JobStore::new(Arc::clone(&scheduler_db)),
            runs: RunLogStore::new(scheduler_db),
            transactions: Arc::new(SqliteTransactionStore::new(Arc::new(Mutex::new(ledger_db)))),
            config,
        })
    }

    /// Wire both routines into a scheduler driven by the production clock.
    pub fn scheduler(&self) -> Scheduler {
        let processor = Arc::new(TransactionProcessor::new(
            self.transactions.clone(),
            self.config.processing.page_size,
        ));
        let reports = &self.config.reports;
        let generator = Arc::new(
            ReportGenerator::new(
                self.transactions.clone(),
                Arc::new(CsvExporter::new(&reports.directory)),
            )
            .with_headers(reports.headers)
            .with_timestamp(reports.include_timestamp),
        );

        Scheduler::new(
            self.jobs.clone(),
            self.runs.clone(),
            routine_table(processor, generator),
            Arc::new(CronClock::new()),
            SchedulerOptions {
                allow_overlapping_runs: self.config.scheduler.allow_overlapping_runs,
            },
        )
    }
}

fn open_connection(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
    Ok(conn)
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) -> std::io::Result<()> {
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_schema_in_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LedgerdConfig::default();
        config.database.path = dir.path().join("data/ledgerd.db").to_string_lossy().into_owned();

        let app = App::open(config.clone()).unwrap();
        assert!(app.jobs.list().unwrap().is_empty());
        assert!(app.runs.recent(None, 5).unwrap().is_empty());

        // Re-opening the same file is fine.
        drop(app);
        App::open(config).unwrap();
    }

    #[test]
    fn parent_dir_error_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let under_file = blocker.join("data/ledgerd.db");
        assert!(ensure_parent_dir(&under_file.to_string_lossy()).is_err());

        let nested = dir.path().join("a/b/ledgerd.db");
        ensure_parent_dir(&nested.to_string_lossy()).unwrap();
        assert!(dir.path().join("a/b").is_dir());
        ensure_parent_dir("ledgerd.db").unwrap();

        let mut config = LedgerdConfig::default();
        config.database.path = under_file.to_string_lossy().into_owned();
        assert!(App::open(config).is_err());
    }

    #[tokio::test]
    async fn scheduler_arms_seeded_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LedgerdConfig::default();
        config.database.path = dir.path().join("ledgerd.db").to_string_lossy().into_owned();
        let app = App::open(config).unwrap();
        ledgerd_ledger::jobs::seed_default_jobs(&app.jobs).unwrap();

        let scheduler = app.scheduler();
        assert_eq!(scheduler.load_active_jobs().unwrap(), 2);
        assert!(scheduler
            .next_fire_time(ledgerd_ledger::jobs::PROCESS_TRANSACTIONS)
            .is_some());
        scheduler.shutdown();
    }
}
