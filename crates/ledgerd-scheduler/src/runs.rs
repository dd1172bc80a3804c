use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

use ledgerd_core::time::format_timestamp;

use crate::{
    db::{optional_timestamp_column, parsed_column, timestamp_column},
    error::{Result, SchedulerError},
    routine::RunOutcome,
    types::{RunLog, RunStatus},
};

const RUN_COLUMNS: &str = "id, job_name, cron_expression, started_at, finished_at, status,
     total_processed, total_success, total_failure, failure_reason";

/// Persistence for execution attempts (`batch_job_logs`).
#[derive(Clone)]
pub struct RunLogStore {
    conn: Arc<Mutex<Connection>>,
}

impl RunLogStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn db(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a `running` row with zeroed counters and return its id.
    pub fn open(&self, job_name: &str, schedule: &str, started_at: DateTime<Utc>) -> Result<i64> {
        let db = self.db();
        db.execute(
            "INSERT INTO batch_job_logs
             (job_name, cron_expression, started_at, status,
              total_processed, total_success, total_failure)
             VALUES (?1, ?2, ?3, 'running', 0, 0, 0)",
            rusqlite::params![job_name, schedule, format_timestamp(started_at)],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// Close an open run with the routine's outcome.
    ///
    /// The status is derived from the outcome (`failed` iff `failure > 0`).
    /// Closing a row that is not `running` fails with [`SchedulerError::RunNotOpen`].
    pub fn close(&self, id: i64, outcome: &RunOutcome, finished_at: DateTime<Utc>) -> Result<RunStatus> {
        let status = outcome.status();
        let reason = (!outcome.failure_reason.is_empty()).then_some(outcome.failure_reason.as_str());
        let n = self.db().execute(
            "UPDATE batch_job_logs
             SET status = ?1, finished_at = ?2, total_processed = ?3,
                 total_success = ?4, total_failure = ?5, failure_reason = ?6
             WHERE id = ?7 AND status = 'running'",
            rusqlite::params![
                status.to_string(),
                format_timestamp(finished_at),
                outcome.total,
                outcome.success,
                outcome.failure,
                reason,
                id
            ],
        )?;
        if n == 0 {
            return Err(SchedulerError::RunNotOpen { id });
        }
        Ok(status)
    }

    pub fn get(&self, id: i64) -> Result<Option<RunLog>> {
        let run = self
            .db()
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM batch_job_logs WHERE id = ?1"),
                [id],
                row_to_run,
            )
            .optional()?;
        Ok(run)
    }

    /// Most recent runs first, optionally restricted to one job.
    pub fn recent(&self, job_name: Option<&str>, limit: usize) -> Result<Vec<RunLog>> {
        let db = self.db();
        let mut stmt = db.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM batch_job_logs
             WHERE ?1 IS NULL OR job_name = ?1
             ORDER BY id DESC LIMIT ?2"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let runs: Vec<RunLog> = stmt
            .query_map(rusqlite::params![job_name, limit], row_to_run)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(runs)
    }
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<RunLog> {
    Ok(RunLog {
        id: row.get(0)?,
        job_name: row.get(1)?,
        schedule: row.get(2)?,
        started_at: timestamp_column(row, 3)?,
        finished_at: optional_timestamp_column(row, 4)?,
        status: parsed_column(row, 5)?,
        total_processed: row.get(6)?,
        total_success: row.get(7)?,
        total_failure: row.get(8)?,
        failure_reason: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    fn store() -> RunLogStore {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        RunLogStore::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn open_creates_running_row_with_zero_counters() {
        let runs = store();
        let id = runs.open("process-transactions", "0 * * * * *", Utc::now()).unwrap();
        let run = runs.get(id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.finished_at, None);
        assert_eq!(
            (run.total_processed, run.total_success, run.total_failure),
            (0, 0, 0)
        );
        assert_eq!(run.failure_reason, None);
    }

    #[test]
    fn close_with_failures_marks_failed() {
        let runs = store();
        let id = runs.open("job", "0 * * * * *", Utc::now()).unwrap();
        let outcome = RunOutcome {
            total: 20,
            success: 18,
            failure: 2,
            failure_reason: "tx-1: locked\ntx-2: locked".to_string(),
        };
        assert_eq!(runs.close(id, &outcome, Utc::now()).unwrap(), RunStatus::Failed);

        let run = runs.get(id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.finished_at.is_some());
        assert_eq!(run.total_failure, 2);
        assert_eq!(run.failure_reason.as_deref(), Some("tx-1: locked\ntx-2: locked"));
    }

    #[test]
    fn clean_close_stores_no_reason() {
        let runs = store();
        let id = runs.open("job", "0 * * * * *", Utc::now()).unwrap();
        let outcome = RunOutcome {
            total: 5,
            success: 5,
            ..RunOutcome::default()
        };
        assert_eq!(runs.close(id, &outcome, Utc::now()).unwrap(), RunStatus::Success);
        assert_eq!(runs.get(id).unwrap().unwrap().failure_reason, None);
    }

    #[test]
    fn closed_runs_are_immutable() {
        let runs = store();
        let id = runs.open("job", "0 * * * * *", Utc::now()).unwrap();
        runs.close(id, &RunOutcome::default(), Utc::now()).unwrap();
        let err = runs.close(id, &RunOutcome::failed("late"), Utc::now()).unwrap_err();
        assert!(matches!(err, SchedulerError::RunNotOpen { .. }));
        assert_eq!(runs.get(id).unwrap().unwrap().status, RunStatus::Success);
    }

    #[test]
    fn recent_filters_by_job_newest_first() {
        let runs = store();
        let a1 = runs.open("a", "0 * * * * *", Utc::now()).unwrap();
        runs.open("b", "0 * * * * *", Utc::now()).unwrap();
        let a2 = runs.open("a", "0 * * * * *", Utc::now()).unwrap();

        let ids: Vec<i64> = runs.recent(Some("a"), 10).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a2, a1]);
        assert_eq!(runs.recent(None, 2).unwrap().len(), 2);
    }
}
