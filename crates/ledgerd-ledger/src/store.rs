use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use ledgerd_core::time::format_timestamp;

use crate::{
    db::{amount_column, amount_text, optional_timestamp_column, parsed_column, timestamp_column},
    error::{LedgerError, Result},
    types::{NewTransaction, ProcessingStatus, Transaction},
    window::DayWindow,
};

/// The reads and the single write the batch routines need.
pub trait TransactionStore: Send + Sync {
    /// Up to `limit` pending rows created inside `window`, oldest first.
    fn pending_in_window(&self, window: &DayWindow, limit: usize) -> Result<Vec<Transaction>>;

    /// Move one row from `pending` to `completed`.
    ///
    /// Fails with [`LedgerError::NotPending`] when the row is missing or has
    /// already left `pending`, so two callers can never both complete it.
    fn complete(&self, id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Every row created inside `window`, whatever its status.
    fn in_window(&self, window: &DayWindow) -> Result<Vec<Transaction>>;
}

const TRANSACTION_COLUMNS: &str =
    "id, kind, amount, status, consumer_id, created_at, updated_at";

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        kind: parsed_column(row, 1)?,
        amount: amount_column(row, 2)?,
        status: parsed_column(row, 3)?,
        consumer_id: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
        updated_at: optional_timestamp_column(row, 6)?,
    })
}

/// SQLite-backed transaction table.
#[derive(Clone)]
pub struct SqliteTransactionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTransactionStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn db(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert every row in one SQL transaction. Returns the generated ids in
    /// input order.
    pub fn insert_many(&self, rows: &[NewTransaction]) -> Result<Vec<String>> {
        let mut db = self.db();
        let tx = db.transaction()?;
        let mut ids = Vec::with_capacity(rows.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO transactions (id, kind, amount, status, consumer_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for row in rows {
                if row.amount.is_sign_negative() {
                    return Err(LedgerError::InvalidRecord(format!(
                        "negative amount {}",
                        row.amount
                    )));
                }
                let id = Uuid::new_v4().to_string();
                stmt.execute(params![
                    id,
                    row.kind.to_string(),
                    amount_text(row.amount),
                    row.status.to_string(),
                    row.consumer_id,
                    format_timestamp(row.created_at),
                ])?;
                ids.push(id);
            }
        }
        tx.commit()?;
        debug!(count = ids.len(), "transactions inserted");
        Ok(ids)
    }

    pub fn get(&self, id: &str) -> Result<Option<Transaction>> {
        let db = self.db();
        let tx = db
            .query_row(
                &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"),
                params![id],
                row_to_transaction,
            )
            .optional()?;
        Ok(tx)
    }

    /// Row counts per status; statuses with no rows are reported as zero.
    pub fn count_by_status(&self) -> Result<HashMap<ProcessingStatus, u64>> {
        let db = self.db();
        let mut counts: HashMap<ProcessingStatus, u64> =
            ProcessingStatus::ALL.iter().map(|s| (*s, 0)).collect();
        let mut stmt = db.prepare("SELECT status, COUNT(*) FROM transactions GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((parsed_column::<ProcessingStatus>(row, 0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            counts.insert(status, count.max(0) as u64);
        }
        Ok(counts)
    }
}

impl TransactionStore for SqliteTransactionStore {
    fn pending_in_window(&self, window: &DayWindow, limit: usize) -> Result<Vec<Transaction>> {
        let db = self.db();
        let mut stmt = db.prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions
             WHERE status = 'pending' AND created_at BETWEEN ?1 AND ?2
             ORDER BY created_at, id
             LIMIT ?3"
        ))?;
        let rows = stmt
            .query_map(
                params![
                    format_timestamp(window.start),
                    format_timestamp(window.end),
                    i64::try_from(limit).unwrap_or(i64::MAX),
                ],
                row_to_transaction,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn complete(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let db = self.db();
        let changed = db.execute(
            "UPDATE transactions SET status = 'completed', updated_at = ?2
             WHERE id = ?1 AND status = 'pending'",
            params![id, format_timestamp(at)],
        )?;
        if changed == 0 {
            return Err(LedgerError::NotPending { id: id.to_string() });
        }
        Ok(())
    }

    fn in_window(&self, window: &DayWindow) -> Result<Vec<Transaction>> {
        let db = self.db();
        let mut stmt = db.prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions
             WHERE created_at BETWEEN ?1 AND ?2
             ORDER BY created_at, id"
        ))?;
        let rows = stmt
            .query_map(
                params![format_timestamp(window.start), format_timestamp(window.end)],
                row_to_transaction,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::init_db, types::TransactionKind};
    use chrono::{Duration, NaiveDate};
    use rust_decimal::Decimal;

    fn store() -> SqliteTransactionStore {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        SqliteTransactionStore::new(Arc::new(Mutex::new(conn)))
    }

    fn window() -> DayWindow {
        DayWindow::for_date_in(NaiveDate::from_ymd_opt(2025, 7, 17).unwrap(), &Utc)
    }

    fn row(status: ProcessingStatus, created_at: DateTime<Utc>) -> NewTransaction {
        NewTransaction {
            kind: TransactionKind::Payment,
            amount: Decimal::new(1250, 1),
            status,
            consumer_id: "c-1".to_string(),
            created_at,
        }
    }

    #[test]
    fn pending_query_honours_window_status_and_limit() {
        let store = store();
        let w = window();
        store
            .insert_many(&[
                row(ProcessingStatus::Pending, w.start + Duration::hours(3)),
                row(ProcessingStatus::Pending, w.start),
                row(ProcessingStatus::Pending, w.end),
                row(ProcessingStatus::Completed, w.start + Duration::hours(1)),
                row(ProcessingStatus::Pending, w.start - Duration::milliseconds(1)),
                row(ProcessingStatus::Pending, w.end + Duration::milliseconds(1)),
            ])
            .unwrap();

        let pending = store.pending_in_window(&w, 10).unwrap();
        assert_eq!(pending.len(), 3);
        assert!(pending.windows(2).all(|p| p[0].created_at <= p[1].created_at));
        assert!(pending.iter().all(|t| t.status == ProcessingStatus::Pending));

        assert_eq!(store.pending_in_window(&w, 2).unwrap().len(), 2);
        assert_eq!(store.in_window(&w).unwrap().len(), 4);
    }

    #[test]
    fn completion_is_conditional_on_pending() {
        let store = store();
        let ids = store
            .insert_many(&[row(ProcessingStatus::Pending, window().start)])
            .unwrap();
        let at = Utc::now();

        store.complete(&ids[0], at).unwrap();
        let err = store.complete(&ids[0], at).unwrap_err();
        assert!(matches!(err, LedgerError::NotPending { .. }));

        let stored = store.get(&ids[0]).unwrap().unwrap();
        assert_eq!(stored.status, ProcessingStatus::Completed);
        assert!(stored.updated_at.is_some());

        assert!(matches!(
            store.complete("missing", at),
            Err(LedgerError::NotPending { .. })
        ));
    }

    #[test]
    fn amount_round_trips_with_two_digits() {
        let store = store();
        let ids = store
            .insert_many(&[row(ProcessingStatus::Pending, window().start)])
            .unwrap();
        let stored = store.get(&ids[0]).unwrap().unwrap();
        assert_eq!(stored.amount.to_string(), "125.00");
        assert_eq!(stored.kind, TransactionKind::Payment);
    }

    #[test]
    fn negative_amount_rolls_back_whole_batch() {
        let store = store();
        let mut bad = row(ProcessingStatus::Pending, window().start);
        bad.amount = Decimal::new(-1, 0);
        let err = store
            .insert_many(&[row(ProcessingStatus::Pending, window().start), bad])
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRecord(_)));
        assert_eq!(store.count_by_status().unwrap()[&ProcessingStatus::Pending], 0);
    }

    #[test]
    fn counts_include_empty_statuses() {
        let store = store();
        store
            .insert_many(&[
                row(ProcessingStatus::Pending, window().start),
                row(ProcessingStatus::Failed, window().start),
                row(ProcessingStatus::Pending, window().end),
            ])
            .unwrap();
        let counts = store.count_by_status().unwrap();
        assert_eq!(counts[&ProcessingStatus::Pending], 2);
        assert_eq!(counts[&ProcessingStatus::Failed], 1);
        assert_eq!(counts[&ProcessingStatus::Completed], 0);
    }
}
