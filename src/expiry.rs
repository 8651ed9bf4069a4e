//! Task expiry classification.
//!
//! A task is active until the wall clock passes its end time on the day it
//! was created. Nothing about expiry is stored: callers re-run [`partition`]
//! whenever the clock may have moved.

use crate::task::{Task, DATE_FORMAT};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Parses an `H:M` end time. Anything that is not exactly two numeric
/// segments forming a valid 24-hour time yields `None`.
pub fn parse_end_time(end: &str) -> Option<NaiveTime> {
    let mut parts = end.trim().split(':');
    let (h, m) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !numeric(h) || !numeric(m) {
        return None;
    }
    NaiveTime::from_hms_opt(h.parse().ok()?, m.parse().ok()?, 0)
}

/// The instant a task stops being active, or `None` if it never expires.
///
/// Falls back to `now`'s date when the task has no usable creation date.
pub fn expires_at(end: &str, date: Option<&str>, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let time = parse_end_time(end)?;
    let day = date
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), DATE_FORMAT).ok())
        .unwrap_or_else(|| now.date());
    Some(day.and_time(time))
}

/// Strictly after: a task ending at 09:00 is still active at 09:00:00.
pub fn is_expired(end: &str, date: Option<&str>, now: NaiveDateTime) -> bool {
    expires_at(end, date, now).is_some_and(|deadline| now > deadline)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Partition {
    pub active: Vec<Task>,
    pub history: Vec<Task>,
}

/// Splits tasks into active and history, keeping their relative order.
pub fn partition(tasks: Vec<Task>, now: NaiveDateTime) -> Partition {
    let (history, active): (Vec<Task>, Vec<Task>) =
        tasks.into_iter().partition(|t| t.is_expired(now));
    Partition { active, history }
}
