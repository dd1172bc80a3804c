use chrono::Duration;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    types::{NewTransaction, ProcessingStatus, TransactionKind},
    window::DayWindow,
};

/// `count` demo transactions spread evenly across `window`.
///
/// Kinds rotate through every variant. Three in five rows are pending, the
/// rest split between completed and failed. Amounts fall in 10.00..=9999.99.
pub fn demo_transactions(count: usize, window: &DayWindow) -> Vec<NewTransaction> {
    let span_ms = (window.end - window.start).num_milliseconds().max(0);
    (0..count)
        .map(|i| {
            let offset = if count > 1 {
                span_ms * i as i64 / (count as i64 - 1)
            } else {
                0
            };
            let status = match i % 5 {
                3 => ProcessingStatus::Completed,
                4 => ProcessingStatus::Failed,
                _ => ProcessingStatus::Pending,
            };
            let cents = 1_000 + (i as i64 * 7_919) % 999_000;
            NewTransaction {
                kind: TransactionKind::ALL[i % TransactionKind::ALL.len()],
                amount: Decimal::new(cents, 2),
                status,
                consumer_id: Uuid::new_v4().to_string(),
                created_at: window.start + Duration::milliseconds(offset),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    #[test]
    fn rows_stay_inside_window() {
        let window = DayWindow::for_date_in(NaiveDate::from_ymd_opt(2025, 7, 17).unwrap(), &Utc);
        let rows = demo_transactions(1000, &window);

        assert_eq!(rows.len(), 1000);
        assert!(rows.iter().all(|r| window.contains(r.created_at)));
        assert_eq!(rows.first().unwrap().created_at, window.start);
        assert_eq!(rows.last().unwrap().created_at, window.end);

        let pending = rows
            .iter()
            .filter(|r| r.status == ProcessingStatus::Pending)
            .count();
        assert_eq!(pending, 600);
        assert!(rows
            .iter()
            .all(|r| r.amount >= Decimal::new(1000, 2) && r.amount < Decimal::new(1_000_000, 2)));
    }

    #[test]
    fn single_row_lands_at_window_start() {
        let window = DayWindow::for_date_in(NaiveDate::from_ymd_opt(2025, 7, 17).unwrap(), &Utc);
        let rows = demo_transactions(1, &window);
        assert_eq!(rows[0].created_at, window.start);
        assert!(demo_transactions(0, &window).is_empty());
    }
}
