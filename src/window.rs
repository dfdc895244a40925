//! Window boundary calculation for the four roll-up granularities.
//!
//! Everything here is pure: given a local reference instant, compute which
//! calendar span a granularity should summarize. The hourly window is the
//! hour *containing* the reference instant; day, week and month always look
//! back at the previous complete period.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;

// ---

/// Summary granularity, one per derived table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
    Week,
    Month,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }

    /// The window this granularity summarizes when triggered at `now`.
    pub fn window_for(self, now: NaiveDateTime) -> Window {
        // ---
        let today = now.date();
        match self {
            Granularity::Hour => Window::hour_of(now),
            Granularity::Day => Window::yesterday(today),
            Granularity::Week => Window::last_week(today),
            Granularity::Month => Window::last_month(today),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown granularity '{0}' (expected hour, day, week or month)")]
pub struct UnknownGranularity(pub String);

impl FromStr for Granularity {
    type Err = UnknownGranularity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hour" | "hourly" => Ok(Granularity::Hour),
            "day" | "daily" => Ok(Granularity::Day),
            "week" | "weekly" => Ok(Granularity::Week),
            "month" | "monthly" => Ok(Granularity::Month),
            _ => Err(UnknownGranularity(s.to_string())),
        }
    }
}

/// A concrete aggregation window together with its natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "granularity", rename_all = "lowercase")]
pub enum Window {
    Hour {
        date: NaiveDate,
        hour: u32,
    },
    Day {
        date: NaiveDate,
    },
    Week {
        year: i32,
        week: u32,
        start: NaiveDate,
        end: NaiveDate,
    },
    Month {
        year: i32,
        month: u32,
        first: NaiveDate,
        last: NaiveDate,
    },
}

impl Window {
    // ---

    /// Hour of day containing `at`.
    pub fn hour_of(at: NaiveDateTime) -> Self {
        Window::Hour {
            date: at.date(),
            hour: at.hour(),
        }
    }

    /// The calendar day before `today`.
    pub fn yesterday(today: NaiveDate) -> Self {
        // NaiveDate::MIN has no predecessor; clamp rather than fail.
        let date = today.pred_opt().unwrap_or(today);
        Window::Day { date }
    }

    /// The ISO week preceding the one containing `today`.
    ///
    /// Sunday is the last day of its ISO week, so a Sunday reference steps
    /// back 13 days to reach the previous Monday.
    pub fn last_week(today: NaiveDate) -> Self {
        // ---
        let back = u64::from(today.weekday().num_days_from_monday()) + 7;
        let start = today.checked_sub_days(Days::new(back)).unwrap_or(today);
        let end = start.checked_add_days(Days::new(6)).unwrap_or(start);
        let iso = start.iso_week();

        Window::Week {
            year: iso.year(),
            week: iso.week(),
            start,
            end,
        }
    }

    /// First and last day of the calendar month preceding `today`'s month.
    pub fn last_month(today: NaiveDate) -> Self {
        // ---
        let this_first = today.with_day(1).unwrap_or(today);
        let last = this_first.pred_opt().unwrap_or(this_first);
        let first = last.with_day(1).unwrap_or(last);

        Window::Month {
            year: first.year(),
            month: first.month(),
            first,
            last,
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            Window::Hour { .. } => Granularity::Hour,
            Window::Day { .. } => Granularity::Day,
            Window::Week { .. } => Granularity::Week,
            Window::Month { .. } => Granularity::Month,
        }
    }

    /// Half-open `[start, end)` range of measurement timestamps covered.
    pub fn bounds(&self) -> (NaiveDateTime, NaiveDateTime) {
        // ---
        match *self {
            Window::Hour { date, hour } => {
                let start = date.and_time(NaiveTime::MIN) + Duration::hours(i64::from(hour));
                (start, start + Duration::hours(1))
            }
            Window::Day { date } => day_span(date, date),
            Window::Week { start, end, .. } => day_span(start, end),
            Window::Month { first, last, .. } => day_span(first, last),
        }
    }
}

/// Inclusive calendar-day span as a half-open timestamp range.
fn day_span(first: NaiveDate, last: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = first.and_time(NaiveTime::MIN);
    let end = last.and_time(NaiveTime::MIN) + Duration::days(1);
    (start, end)
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Hour { date, hour } => write!(f, "hour {date} {hour:02}:00"),
            Window::Day { date } => write!(f, "day {date}"),
            Window::Week {
                year,
                week,
                start,
                end,
            } => write!(f, "week {year}-W{week:02} ({start}..{end})"),
            Window::Month { year, month, .. } => write!(f, "month {year}-{month:02}"),
        }
    }
}
