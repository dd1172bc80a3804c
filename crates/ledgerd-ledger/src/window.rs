//! Calendar-day windows over `created_at`.
//!
//! Both batch routines work on "yesterday": the local calendar day before the
//! moment they run, from its first millisecond to its last.

use chrono::{DateTime, Days, Duration, Local, LocalResult, NaiveDate, TimeZone, Utc};

/// A closed `[start, end]` interval covering one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    /// Last millisecond of the day.
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// The local day before today.
    pub fn previous_day() -> Self {
        Self::preceding(Local::now())
    }

    /// The calendar day before `now`, in `now`'s time zone.
    pub fn preceding<Tz: TimeZone>(now: DateTime<Tz>) -> Self {
        let today = now.date_naive();
        let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        Self::for_date_in(yesterday, &now.timezone())
    }

    /// The window for `date` as observed in `tz`.
    pub fn for_date_in<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Self {
        let start = start_of_day(date, tz);
        let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
        let end = if next == date {
            start + Duration::days(1) - Duration::milliseconds(1)
        } else {
            start_of_day(next, tz) - Duration::milliseconds(1)
        };
        Self { date, start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }

    /// `YYYY-MM-DD` of the local day.
    pub fn iso_date(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// First instant of `date` in `tz`. When midnight falls in a DST gap the day
/// starts at the first local time that exists.
fn start_of_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    let mut probe = midnight;
    for _ in 0..=24 * 4 {
        match tz.from_local_datetime(&probe) {
            LocalResult::Single(at) => return at.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => probe += Duration::minutes(15),
        }
    }
    Utc.from_utc_datetime(&midnight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn preceding_covers_whole_previous_day_in_utc() {
        let now = Utc.with_ymd_and_hms(2025, 7, 18, 17, 36, 0).unwrap();
        let window = DayWindow::preceding(now);

        assert_eq!(window.iso_date(), "2025-07-17");
        assert_eq!(window.start, Utc.with_ymd_and_hms(2025, 7, 17, 0, 0, 0).unwrap());
        assert_eq!(
            window.end,
            Utc.with_ymd_and_hms(2025, 7, 17, 23, 59, 59).unwrap() + Duration::milliseconds(999)
        );
    }

    #[test]
    fn offset_zone_shifts_bounds() {
        let tz = FixedOffset::east_opt(7 * 3600).unwrap();
        // 01:00 local on the 1st is still June 30th in UTC.
        let now = tz.with_ymd_and_hms(2025, 7, 1, 1, 0, 0).unwrap();
        let window = DayWindow::preceding(now);

        assert_eq!(window.iso_date(), "2025-06-30");
        assert_eq!(window.start, Utc.with_ymd_and_hms(2025, 6, 29, 17, 0, 0).unwrap());
        assert_eq!(window.end - window.start, Duration::days(1) - Duration::milliseconds(1));
    }

    #[test]
    fn bounds_are_inclusive() {
        let window = DayWindow::for_date_in(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), &Utc);
        assert!(window.contains(window.start));
        assert!(window.contains(window.end));
        assert!(!window.contains(window.start - Duration::milliseconds(1)));
        assert!(!window.contains(window.end + Duration::milliseconds(1)));
    }

    #[test]
    fn month_and_year_rollover() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 1).unwrap();
        assert_eq!(DayWindow::preceding(now).iso_date(), "2025-12-31");
    }
}
