use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};

use crate::models::ClockTime;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Formats minutes as "HH:MM", wrapping past midnight the way a wall clock does.
pub fn minutes_to_time(minutes: u32) -> String {
    let wrapped = minutes % MINUTES_PER_DAY;
    format!("{:02}:{:02}", wrapped / 60, wrapped % 60)
}

/// Minutes since midnight at which something starting at `start` ends. May exceed 24h.
pub fn end_minutes(start: ClockTime, duration_minutes: u32) -> u32 {
    start.minutes().saturating_add(duration_minutes)
}

pub fn calculate_end_time(start: ClockTime, duration_minutes: u32) -> String {
    minutes_to_time(end_minutes(start, duration_minutes))
}

pub fn is_date_in_past(date: NaiveDate, today: NaiveDate) -> bool {
    date < today
}

pub fn is_date_time_in_past(date: NaiveDate, time: Option<ClockTime>, now: NaiveDateTime) -> bool {
    match time {
        Some(time) => date.and_time(time.to_naive_time()) < now,
        None => date.and_hms_opt(0, 0, 0).map(|dt| dt < now).unwrap_or(false),
    }
}

/// True when `date` lies between today and `max_months` from now, inclusive.
pub fn is_date_in_range(date: NaiveDate, today: NaiveDate, max_months: u32) -> bool {
    let max_date = today
        .checked_add_months(Months::new(max_months))
        .unwrap_or(NaiveDate::MAX);
    date >= today && date <= max_date
}

pub fn format_date(date: NaiveDate, include_day: bool) -> String {
    if include_day {
        format!("{}, {}", date.weekday(), date.format("%-d %B %Y"))
    } else {
        date.format("%-d %B %Y").to_string()
    }
}
