//! Business-day enumeration in exchange local time.
//!
//! Business days are Monday through Friday. Exchange holidays are not known
//! here; a holiday simply yields a no-data page.

use chrono::{Datelike, Days, FixedOffset, NaiveDate, Utc, Weekday};

/// Taipei is UTC+8 with no daylight saving.
const TAIPEI_OFFSET_SECS: i32 = 8 * 3600;

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Calendar anchored at a fixed "today" so results never depend on wall-clock
/// time mid-computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCalendar {
    today: NaiveDate,
}

impl BusinessCalendar {
    /// Anchored at the current date in Taipei.
    pub fn taipei_today() -> Self {
        let today = FixedOffset::east_opt(TAIPEI_OFFSET_SECS)
            .map(|tz| Utc::now().with_timezone(&tz).date_naive())
            .unwrap_or_else(|| Utc::now().date_naive());
        Self { today }
    }

    pub fn as_of(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Monday–Friday dates in `start..=end`, ascending.
    ///
    /// `end` is clamped to today. `start > end` (after clamping) is empty.
    pub fn business_days(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let end = end.min(self.today);
        let mut days = Vec::new();
        let mut d = start;
        while d <= end {
            if is_business_day(d) {
                days.push(d);
            }
            match d.checked_add_days(Days::new(1)) {
                Some(next) => d = next,
                None => break,
            }
        }
        days
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn far_future() -> BusinessCalendar {
        BusinessCalendar::as_of(d(2100, 1, 1))
    }

    #[test]
    fn week_straddling_weekend_has_five_days() {
        // Thu 2024-06-06 .. Wed 2024-06-12
        let days = far_future().business_days(d(2024, 6, 6), d(2024, 6, 12));
        assert_eq!(
            days,
            vec![
                d(2024, 6, 6),
                d(2024, 6, 7),
                d(2024, 6, 10),
                d(2024, 6, 11),
                d(2024, 6, 12)
            ]
        );
    }

    #[test]
    fn reversed_range_is_empty() {
        assert!(far_future().business_days(d(2024, 6, 12), d(2024, 6, 6)).is_empty());
    }

    #[test]
    fn weekend_only_range_is_empty() {
        assert!(far_future().business_days(d(2024, 6, 8), d(2024, 6, 9)).is_empty());
    }

    #[test]
    fn future_end_is_clamped_to_today() {
        let cal = BusinessCalendar::as_of(d(2024, 6, 11));
        let days = cal.business_days(d(2024, 6, 10), d(2024, 12, 31));
        assert_eq!(days, vec![d(2024, 6, 10), d(2024, 6, 11)]);
    }

    #[test]
    fn start_after_today_is_empty() {
        let cal = BusinessCalendar::as_of(d(2024, 6, 11));
        assert!(cal.business_days(d(2024, 6, 12), d(2024, 6, 14)).is_empty());
    }

    #[test]
    fn taipei_today_is_near_utc_today() {
        let cal = BusinessCalendar::taipei_today();
        let utc = Utc::now().date_naive();
        let gap = (cal.today() - utc).num_days();
        assert!((0..=1).contains(&gap), "gap {gap}");
    }

    proptest! {
        /// Output is ascending, within range, weekdays only, and idempotent.
        #[test]
        fn business_days_are_sorted_weekdays(start in 0i64..20_000, len in 0i64..120) {
            let base = d(1990, 1, 1);
            let s = base + chrono::Duration::days(start);
            let e = s + chrono::Duration::days(len);
            let cal = far_future();
            let days = cal.business_days(s, e);

            prop_assert!(days.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(days.iter().all(|x| *x >= s && *x <= e && is_business_day(*x)));
            prop_assert_eq!(&days, &cal.business_days(s, e));

            let weekdays = (0..=len)
                .map(|i| s + chrono::Duration::days(i))
                .filter(|x| is_business_day(*x))
                .count();
            prop_assert_eq!(days.len(), weekdays);
        }
    }
}
