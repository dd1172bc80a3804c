//! Job names this crate provides routines for.

use std::sync::Arc;

use tracing::info;

use ledgerd_scheduler::{JobStatus, JobStore, RoutineTable};

use crate::{processor::TransactionProcessor, report::ReportGenerator};

pub const PROCESS_TRANSACTIONS: &str = "process-transactions";
pub const GENERATE_DAILY_REPORTS: &str = "generate-daily-reports";

/// Every day at 17:36:00 local time.
pub const DEFAULT_SCHEDULE: &str = "00 36 17 * * *";

/// Dispatch table for the scheduler.
pub fn routine_table(
    processor: Arc<TransactionProcessor>,
    reports: Arc<ReportGenerator>,
) -> RoutineTable {
    RoutineTable::new()
        .with(PROCESS_TRANSACTIONS, processor)
        .with(GENERATE_DAILY_REPORTS, reports)
}

/// Insert both default jobs as active unless a job with that name exists.
/// Returns how many were inserted.
pub fn seed_default_jobs(jobs: &JobStore) -> ledgerd_scheduler::Result<usize> {
    let mut inserted = 0;
    for name in [PROCESS_TRANSACTIONS, GENERATE_DAILY_REPORTS] {
        if jobs.insert_if_absent(name, DEFAULT_SCHEDULE, JobStatus::Active)? {
            info!(job = %name, schedule = DEFAULT_SCHEDULE, "default job seeded");
            inserted += 1;
        }
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use rusqlite::Connection;

    use crate::{
        export::CsvExporter,
        store::{SqliteTransactionStore, TransactionStore},
    };

    #[test]
    fn seeding_twice_inserts_once() {
        let conn = Connection::open_in_memory().unwrap();
        ledgerd_scheduler::db::init_db(&conn).unwrap();
        let jobs = JobStore::new(Arc::new(Mutex::new(conn)));

        assert_eq!(seed_default_jobs(&jobs).unwrap(), 2);
        assert_eq!(seed_default_jobs(&jobs).unwrap(), 0);

        let all = jobs.list().unwrap();
        assert_eq!(all.len(), 2);
        assert!(all
            .iter()
            .all(|j| j.schedule == DEFAULT_SCHEDULE && j.status == JobStatus::Active));
        assert!(ledgerd_scheduler::schedule::parse_cron(DEFAULT_SCHEDULE).is_ok());
    }

    #[test]
    fn table_resolves_both_jobs() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        let store: Arc<dyn TransactionStore> =
            Arc::new(SqliteTransactionStore::new(Arc::new(Mutex::new(conn))));
        let table = routine_table(
            Arc::new(TransactionProcessor::new(Arc::clone(&store), 10)),
            Arc::new(ReportGenerator::new(store, Arc::new(CsvExporter::new("unused")))),
        );
        assert_eq!(table.names(), vec![GENERATE_DAILY_REPORTS, PROCESS_TRANSACTIONS]);
    }
}
