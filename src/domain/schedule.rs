//! Trigger times for the periodic run loop.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Weekday};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Time of day (UTC) at which a cycle fires.
    pub run_at: NaiveTime,
    pub weekdays_only: bool,
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule {
            run_at: NaiveTime::from_hms_opt(8, 30, 0).unwrap_or(NaiveTime::MIN),
            weekdays_only: true,
        }
    }
}

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

impl Schedule {
    /// First trigger strictly after `now`.
    pub fn next_run_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        let mut candidate = now.date().and_time(self.run_at);
        if candidate <= now {
            candidate += Duration::days(1);
        }
        while self.weekdays_only && is_weekend(candidate.weekday()) {
            candidate += Duration::days(1);
        }
        candidate
    }
}
