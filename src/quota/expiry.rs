//! Expiry-date arithmetic. All ledger timestamps are truncated to whole
//! seconds before storage and comparison.

use chrono::{
    DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, SubsecRound,
    TimeZone, Utc,
};

pub fn truncate_to_second(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.trunc_subsecs(0)
}

/// 23:59:59 on the last day of the given month.
fn month_end(year: i32, month: u32) -> Option<NaiveDateTime> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()?
        .and_hms_opt(23, 59, 59)
}

/// Expiry date granted to a strategy recharge: end of the current month, or
/// end of the next month when fewer than 30 days of the current month remain.
pub fn strategy_expiry(now: DateTime<Local>) -> DateTime<Local> {
    let date = now.date_naive();
    let target = match month_end(date.year(), date.month()) {
        Some(end_of_month) => {
            if end_of_month - now.naive_local() < Duration::days(30) {
                let (next_year, next_month) = if date.month() == 12 {
                    (date.year() + 1, 1)
                } else {
                    (date.year(), date.month() + 1)
                };
                month_end(next_year, next_month).unwrap_or(end_of_month)
            } else {
                end_of_month
            }
        }
        None => now.naive_local(),
    };

    match Local.from_local_datetime(&target) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(dt, _) => dt,
        LocalResult::None => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn month_end_handles_lengths_and_leap_years() {
        assert_eq!(
            month_end(2025, 1).unwrap().date(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
        );
        assert_eq!(
            month_end(2024, 2).unwrap().date(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            month_end(2025, 2).unwrap().date(),
            NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
        );
        assert_eq!(
            month_end(2025, 12).unwrap().date(),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
        );
        assert_eq!(month_end(2025, 4).unwrap().time().hour(), 23);
    }

    #[test]
    fn start_of_long_month_expires_same_month() {
        // 2025-03-01 00:00: 30.99 days remain, not within the 30-day window
        let now = Local.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let expiry = strategy_expiry(now);
        assert_eq!(expiry.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
    }

    #[test]
    fn late_in_month_rolls_to_next_month() {
        let now = Local.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap();
        let expiry = strategy_expiry(now);
        assert_eq!(expiry.date_naive(), NaiveDate::from_ymd_opt(2025, 4, 30).unwrap());
    }

    #[test]
    fn february_always_rolls_forward() {
        // February is shorter than 30 days, so every day rolls to end of March
        let now = Local.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let expiry = strategy_expiry(now);
        assert_eq!(expiry.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
    }

    #[test]
    fn december_rolls_into_january() {
        let now = Local.with_ymd_and_hms(2025, 12, 20, 0, 0, 0).unwrap();
        let expiry = strategy_expiry(now);
        assert_eq!(expiry.date_naive(), NaiveDate::from_ymd_opt(2026, 1, 31).unwrap());
    }

    #[test]
    fn truncate_drops_subseconds() {
        let dt = Utc.with_ymd_and_hms(2025, 3, 1, 10, 20, 30).unwrap()
            + Duration::milliseconds(750);
        assert_eq!(truncate_to_second(dt).timestamp_subsec_millis(), 0);
    }
}
