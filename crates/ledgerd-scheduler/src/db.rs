use chrono::{DateTime, Utc};
use rusqlite::{types::Type, Connection, Row};

use ledgerd_core::time::parse_timestamp;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`.
///
/// Creates `batch_jobs` and `batch_job_logs` (idempotent). Timestamps are
/// stored as fixed-width RFC 3339 UTC text.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS batch_jobs (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            job_name        TEXT    NOT NULL UNIQUE,
            cron_expression TEXT    NOT NULL,
            status          TEXT    NOT NULL
                            CHECK (status IN ('active', 'inactive', 'cancelled')),
            last_run_at     TEXT,
            next_run_at     TEXT,
            created_at      TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS batch_job_logs (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            job_name        TEXT    NOT NULL,
            cron_expression TEXT    NOT NULL,
            started_at      TEXT    NOT NULL,
            finished_at     TEXT,
            status          TEXT    NOT NULL
                            CHECK (status IN ('running', 'success', 'failed')),
            total_processed INTEGER NOT NULL DEFAULT 0 CHECK (total_processed >= 0),
            total_success   INTEGER NOT NULL DEFAULT 0 CHECK (total_success >= 0),
            total_failure   INTEGER NOT NULL DEFAULT 0 CHECK (total_failure >= 0),
            failure_reason  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_batch_job_logs_job
            ON batch_job_logs (job_name, started_at DESC);
        ",
    )?;
    Ok(())
}

pub(crate) fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn optional_timestamp_column(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

/// Parse a text column through `FromStr`, surfacing failures as conversion errors.
pub(crate) fn parsed_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}
