use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{types::Type, Connection, Row};
use rust_decimal::Decimal;

use ledgerd_core::time::parse_timestamp;

use crate::error::Result;

/// Initialise the ledger schema in `conn` (idempotent).
///
/// `amount` is stored as decimal text with exactly two fractional digits;
/// timestamps as fixed-width RFC 3339 UTC text so `BETWEEN` works lexically.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS transactions (
            id          TEXT PRIMARY KEY,
            kind        TEXT NOT NULL
                        CHECK (kind IN ('payment', 'withdrawal', 'disbursement')),
            amount      TEXT NOT NULL,
            status      TEXT NOT NULL
                        CHECK (status IN ('pending', 'completed', 'failed')),
            consumer_id TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_transactions_status_created
            ON transactions (status, created_at);
        CREATE INDEX IF NOT EXISTS idx_transactions_created
            ON transactions (created_at);
        ",
    )?;
    Ok(())
}

/// Canonical two-digit text form of an amount.
pub(crate) fn amount_text(amount: Decimal) -> String {
    let mut rounded = amount.round_dp(2);
    rounded.rescale(2);
    rounded.to_string()
}

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

pub(crate) fn amount_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn optional_timestamp_column(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| parse_timestamp(&raw).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn parsed_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
    }

    #[test]
    fn amounts_always_carry_two_digits() {
        assert_eq!(amount_text(Decimal::new(125, 1)), "12.50");
        assert_eq!(amount_text(Decimal::new(1000, 0)), "1000.00");
        assert_eq!(amount_text(Decimal::new(10005, 3)), "10.00");
    }
}
