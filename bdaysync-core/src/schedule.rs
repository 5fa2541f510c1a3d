//! Cron and interval due-checks.
//!
//! Schedules are written as standard five-field cron (`min hour dom month dow`)
//! but evaluated with the `cron` crate, which wants a leading seconds field and
//! numbers weekdays from Sunday = 1. [`CronSchedule::parse`] bridges the two.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone};
use cron::Schedule;

use crate::error::{SyncError, SyncResult};

/// Used when a configured expression cannot be parsed: top of every hour.
pub const HOURLY_FALLBACK: &str = "0 0 * * * *";

const WEEKDAYS: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

/// A parsed cron expression.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expr: String,
    schedule: Schedule,
    fallback: bool,
}

impl CronSchedule {
    /// Parse a cron expression.
    ///
    /// Five-field expressions get a zero seconds field and numeric weekdays
    /// (`0`–`7`, both ends Sunday) rewritten to names. Six/seven-field and
    /// `@daily`-style forms are passed to the `cron` crate unchanged.
    pub fn parse(expr: &str) -> SyncResult<Self> {
        let expr = expr.trim();
        let normalized = normalize(expr).map_err(|reason| SyncError::InvalidSchedule {
            expr: expr.to_string(),
            reason,
        })?;
        let schedule = Schedule::from_str(&normalized).map_err(|e| SyncError::InvalidSchedule {
            expr: expr.to_string(),
            reason: e.to_string(),
        })?;

        Ok(CronSchedule {
            expr: expr.to_string(),
            schedule,
            fallback: false,
        })
    }

    /// Parse `expr`, or log the problem and fall back to an hourly schedule.
    pub fn parse_or_hourly(expr: &str) -> Self {
        match Self::parse(expr) {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::warn!(%e, fallback = HOURLY_FALLBACK, "invalid schedule, running hourly instead");
                Self::hourly()
            }
        }
    }

    pub fn hourly() -> Self {
        CronSchedule {
            expr: HOURLY_FALLBACK.to_string(),
            schedule: hourly_schedule(),
            fallback: true,
        }
    }

    /// The expression as written (or the fallback expression).
    pub fn expr(&self) -> &str {
        &self.expr
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// First fire time strictly after `after`.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.schedule.after(after).next()
    }

    /// True if the schedule fires in the window `(now - tick, now]`.
    ///
    /// Called once per tick, so every fire time is seen exactly once.
    pub fn is_due<Tz: TimeZone>(&self, now: &DateTime<Tz>, tick: Duration) -> bool {
        let since = now.clone() - tick;
        self.next_after(&since).is_some_and(|next| next <= *now)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fallback {
            write!(f, "{} (fallback)", self.expr)
        } else {
            write!(f, "{}", self.expr)
        }
    }
}

fn hourly_schedule() -> Schedule {
    // A constant expression; parsing cannot fail.
    match Schedule::from_str(HOURLY_FALLBACK) {
        Ok(schedule) => schedule,
        Err(e) => unreachable!("hourly fallback schedule is invalid: {e}"),
    }
}

/// Rewrite a five-field expression into the `cron` crate's dialect.
fn normalize(expr: &str) -> Result<String, String> {
    if expr.is_empty() {
        return Err("empty expression".to_string());
    }
    if expr.starts_with('@') {
        return Ok(expr.to_string());
    }

    let fields: Vec<&str> = expr.split_whitespace().collect();
    match fields.len() {
        5 => {
            let dow = weekday_names(fields[4])?;
            Ok(format!(
                "0 {} {} {} {} {}",
                fields[0], fields[1], fields[2], fields[3], dow
            ))
        }
        6 | 7 => Ok(fields.join(" ")),
        n => Err(format!("expected 5 fields, found {n}")),
    }
}

/// Replace numeric weekdays with names.
///
/// A range reaching Sunday from the end (`5-7`, `6-0`) or wrapping past
/// Saturday is spelled out day by day, since the `cron` crate only accepts
/// ascending named ranges within SUN..SAT.
fn weekday_names(field: &str) -> Result<String, String> {
    let parts: Vec<String> = field.split(',').map(weekday_term).collect::<Result<_, String>>()?;
    Ok(parts.join(","))
}

fn weekday_term(term: &str) -> Result<String, String> {
    let (base, step) = match term.split_once('/') {
        Some((base, step)) => (base, Some(step)),
        None => (term, None),
    };

    // `*` and named days are already in the crate's dialect.
    if base == "*" || !base.starts_with(|c: char| c.is_ascii_digit()) {
        return Ok(term.to_string());
    }

    let (start, end) = match base.split_once('-') {
        Some((start, end)) => (weekday_number(start)?, Some(weekday_number(end)?)),
        None => (weekday_number(base)?, None),
    };
    let start = start % 7;

    let step = match step {
        Some(step) => step
            .parse::<usize>()
            .ok()
            .filter(|s| *s > 0)
            .ok_or_else(|| format!("bad weekday step '{step}'"))?,
        None => 1,
    };

    let Some(end) = end else {
        return if step == 1 {
            Ok(WEEKDAYS[start].to_string())
        } else {
            Ok(spelled_out((start..=6).step_by(step)))
        };
    };

    // Sunday closing a range counts as day 7.
    let end = if end == 0 && start > 0 { 7 } else { end };

    if start <= end {
        if step == 1 && end < 7 {
            return Ok(format!("{}-{}", WEEKDAYS[start], WEEKDAYS[end]));
        }
        return Ok(spelled_out((start..=end).step_by(step)));
    }
    Ok(spelled_out((start..=6).chain(0..=end).step_by(step)))
}

fn weekday_number(digits: &str) -> Result<usize, String> {
    let day: usize = digits.parse().map_err(|_| format!("bad weekday '{digits}'"))?;
    if day >= WEEKDAYS.len() {
        return Err(format!("weekday {day} out of range 0-7"));
    }
    Ok(day)
}

/// Comma-separated day names, each day once.
fn spelled_out(days: impl Iterator<Item = usize>) -> String {
    let mut names: Vec<&str> = Vec::new();
    for day in days {
        let name = WEEKDAYS[day % 7];
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names.join(",")
}

/// When a sync pass is due.
#[derive(Debug, Clone)]
pub enum SyncCadence {
    /// Every N hours after the last successful sync.
    Interval { hours: u32 },
    Cron(CronSchedule),
}

impl SyncCadence {
    /// A positive `interval_hours` takes precedence over the cron schedule.
    pub fn new(schedule: CronSchedule, interval_hours: u32) -> Self {
        if interval_hours > 0 {
            SyncCadence::Interval { hours: interval_hours }
        } else {
            SyncCadence::Cron(schedule)
        }
    }

    pub fn is_due<Tz: TimeZone>(&self, now: &DateTime<Tz>, last_sync: Option<&DateTime<Tz>>, tick: Duration) -> bool {
        match self {
            SyncCadence::Interval { hours } => match last_sync {
                None => true,
                Some(last) => now.clone() - last.clone() >= Duration::hours(i64::from(*hours)),
            },
            SyncCadence::Cron(schedule) => schedule.is_due(now, tick),
        }
    }

    /// Next time a sync will be due, for logging.
    pub fn next_due<Tz: TimeZone>(&self, now: &DateTime<Tz>, last_sync: Option<&DateTime<Tz>>) -> Option<DateTime<Tz>> {
        match self {
            SyncCadence::Interval { hours } => match last_sync {
                None => Some(now.clone()),
                Some(last) => Some(last.clone() + Duration::hours(i64::from(*hours))),
            },
            SyncCadence::Cron(schedule) => schedule.next_after(now),
        }
    }
}

impl fmt::Display for SyncCadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncCadence::Interval { hours } => write!(f, "every {hours}h"),
            SyncCadence::Cron(schedule) => write!(f, "cron {schedule}"),
        }
    }
}
