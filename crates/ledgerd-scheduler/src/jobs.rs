use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{debug, info};

use ledgerd_core::time::format_timestamp;

use crate::{
    db::{optional_timestamp_column, parsed_column, timestamp_column},
    error::{Result, SchedulerError},
    types::{Job, JobStatus},
};

const JOB_COLUMNS: &str =
    "id, job_name, cron_expression, status, last_run_at, next_run_at, created_at";

/// Persistence for job definitions (`batch_jobs`).
///
/// Cheap to clone; every clone shares the same connection.
#[derive(Clone)]
pub struct JobStore {
    conn: Arc<Mutex<Connection>>,
}

impl JobStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn db(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a new job. Fails on a duplicate name.
    pub fn insert(&self, name: &str, schedule: &str, status: JobStatus) -> Result<Job> {
        let db = self.db();
        let now = Utc::now();
        db.execute(
            "INSERT INTO batch_jobs (job_name, cron_expression, status, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![name, schedule, status.to_string(), format_timestamp(now)],
        )?;
        let id = db.last_insert_rowid();
        info!(job_id = id, job = %name, %schedule, %status, "job inserted");
        Ok(Job {
            id,
            name: name.to_string(),
            schedule: schedule.to_string(),
            status,
            last_run_at: None,
            next_run_at: None,
            created_at: now,
        })
    }

    /// Insert a job unless one with the same name exists. Returns whether a row was added.
    pub fn insert_if_absent(&self, name: &str, schedule: &str, status: JobStatus) -> Result<bool> {
        let n = self.db().execute(
            "INSERT OR IGNORE INTO batch_jobs (job_name, cron_expression, status, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![name, schedule, status.to_string(), format_timestamp(Utc::now())],
        )?;
        Ok(n > 0)
    }

    pub fn get_by_name(&self, name: &str) -> Result<Option<Job>> {
        let job = self
            .db()
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM batch_jobs WHERE job_name = ?1"),
                [name],
                row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    /// All jobs ordered by id.
    pub fn list(&self) -> Result<Vec<Job>> {
        let db = self.db();
        let mut stmt = db.prepare(&format!("SELECT {JOB_COLUMNS} FROM batch_jobs ORDER BY id"))?;
        let jobs: Vec<Job> = stmt
            .query_map([], row_to_job)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(jobs)
    }

    /// Jobs in the given lifecycle state, ordered by id.
    pub fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>> {
        let db = self.db();
        let mut stmt = db.prepare_cached(&format!(
            "SELECT {JOB_COLUMNS} FROM batch_jobs WHERE status = ?1 ORDER BY id"
        ))?;
        let jobs: Vec<Job> = stmt
            .query_map([status.to_string()], row_to_job)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(jobs)
    }

    pub fn set_last_run(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        self.db().execute(
            "UPDATE batch_jobs SET last_run_at = ?1 WHERE id = ?2",
            rusqlite::params![format_timestamp(at), id],
        )?;
        Ok(())
    }

    /// Cache the trigger's next instant. `None` clears the column.
    pub fn set_next_run(&self, id: i64, at: Option<DateTime<Utc>>) -> Result<()> {
        self.db().execute(
            "UPDATE batch_jobs SET next_run_at = ?1 WHERE id = ?2",
            rusqlite::params![at.map(format_timestamp), id],
        )?;
        debug!(job_id = id, next_run_at = ?at, "next run recorded");
        Ok(())
    }

    /// Mark a job cancelled by name and clear its cached next run.
    pub fn mark_cancelled(&self, name: &str) -> Result<()> {
        let n = self.db().execute(
            "UPDATE batch_jobs SET status = 'cancelled', next_run_at = NULL WHERE job_name = ?1",
            [name],
        )?;
        if n == 0 {
            return Err(SchedulerError::JobNotFound {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        name: row.get(1)?,
        schedule: row.get(2)?,
        status: parsed_column(row, 3)?,
        last_run_at: optional_timestamp_column(row, 4)?,
        next_run_at: optional_timestamp_column(row, 5)?,
        created_at: timestamp_column(row, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use chrono::TimeZone;

    fn store() -> JobStore {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        JobStore::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let jobs = store();
        jobs.insert("process-transactions", "0 * * * * *", JobStatus::Active)
            .unwrap();
        let err = jobs
            .insert("process-transactions", "0 0 * * * *", JobStatus::Active)
            .unwrap_err();
        assert!(matches!(err, SchedulerError::Database(_)));
    }

    #[test]
    fn insert_if_absent_is_idempotent() {
        let jobs = store();
        assert!(jobs.insert_if_absent("a", "0 * * * * *", JobStatus::Active).unwrap());
        assert!(!jobs.insert_if_absent("a", "0 * * * * *", JobStatus::Active).unwrap());
        assert_eq!(jobs.list().unwrap().len(), 1);
    }

    #[test]
    fn list_by_status_filters() {
        let jobs = store();
        jobs.insert("a", "0 * * * * *", JobStatus::Active).unwrap();
        jobs.insert("b", "0 * * * * *", JobStatus::Inactive).unwrap();
        jobs.insert("c", "0 * * * * *", JobStatus::Active).unwrap();
        let names: Vec<_> = jobs
            .list_by_status(JobStatus::Active)
            .unwrap()
            .into_iter()
            .map(|j| j.name)
            .collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn timestamps_round_trip() {
        let jobs = store();
        let job = jobs.insert("a", "0 * * * * *", JobStatus::Active).unwrap();
        let last = Utc.with_ymd_and_hms(2025, 7, 18, 17, 36, 0).unwrap();
        let next = Utc.with_ymd_and_hms(2025, 7, 19, 17, 36, 0).unwrap();
        jobs.set_last_run(job.id, last).unwrap();
        jobs.set_next_run(job.id, Some(next)).unwrap();

        let loaded = jobs.get_by_name("a").unwrap().unwrap();
        assert_eq!(loaded.last_run_at, Some(last));
        assert_eq!(loaded.next_run_at, Some(next));

        jobs.set_next_run(job.id, None).unwrap();
        assert_eq!(jobs.get_by_name("a").unwrap().unwrap().next_run_at, None);
    }

    #[test]
    fn mark_cancelled_clears_next_run() {
        let jobs = store();
        let job = jobs.insert("a", "0 * * * * *", JobStatus::Active).unwrap();
        jobs.set_next_run(job.id, Some(Utc::now())).unwrap();
        jobs.mark_cancelled("a").unwrap();

        let loaded = jobs.get_by_name("a").unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Cancelled);
        assert_eq!(loaded.next_run_at, None);
    }

    #[test]
    fn mark_cancelled_unknown_job() {
        let jobs = store();
        let err = jobs.mark_cancelled("missing").unwrap_err();
        assert!(matches!(err, SchedulerError::JobNotFound { .. }));
    }
}
