//! Expiry calculator.
//!
//! Pure date arithmetic: callers supply `today` and persist the result.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Which renewal rule produced a new expiry date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionKind {
    /// Tenant had never been billed; the cycle starts today.
    FirstActivation,
    /// Expiry was current or inside the grace window; the anchor date is kept.
    AnchorPreserved,
    /// Expiry lapsed beyond the grace window; the backlog is discarded.
    Reactivated,
}

/// Result of applying one billing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Extension {
    pub new_expiry: NaiveDate,
    pub kind: ExtensionKind,
}

/// Apply one billing cycle and report which rule fired.
///
/// Rules, in order:
/// 1. no expiry: `today + cycle_days`
/// 2. `current < today - grace_days`: `today + cycle_days`
/// 3. otherwise: `current + cycle_days`
pub fn extend_with_kind(
    current_expiry: Option<NaiveDate>,
    today: NaiveDate,
    cycle_days: i64,
    grace_days: i64,
) -> Extension {
    match current_expiry {
        None => Extension {
            new_expiry: add_days(today, cycle_days),
            kind: ExtensionKind::FirstActivation,
        },
        Some(current) if current < add_days(today, -grace_days) => Extension {
            new_expiry: add_days(today, cycle_days),
            kind: ExtensionKind::Reactivated,
        },
        Some(current) => Extension {
            new_expiry: add_days(current, cycle_days),
            kind: ExtensionKind::AnchorPreserved,
        },
    }
}

/// `date + days`, saturating at the ends of the calendar.
fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    Duration::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .unwrap_or(if days < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// New expiry date after one paid cycle.
///
/// Not idempotent: each call adds another cycle.
pub fn extend(
    current_expiry: Option<NaiveDate>,
    today: NaiveDate,
    cycle_days: i64,
    grace_days: i64,
) -> NaiveDate {
    extend_with_kind(current_expiry, today, cycle_days, grace_days).new_expiry
}

/// New expiry date after a manual courtesy grant.
///
/// Unlike [`extend`] there is no grace window: anything already lapsed
/// restarts from today.
pub fn grant_courtesy(current_expiry: Option<NaiveDate>, today: NaiveDate, days: i64) -> NaiveDate {
    match current_expiry {
        Some(current) if current >= today => add_days(current, days),
        _ => add_days(today, days),
    }
}

/// Next date on or after `today` whose day-of-month is `preferred_day`.
///
/// Months shorter than `preferred_day` clamp to their last day. Used for
/// invoice due dates only.
pub fn next_due_date(today: NaiveDate, preferred_day: u32) -> NaiveDate {
    let day = preferred_day.clamp(1, 31);

    let this_month = clamped_date(today.year(), today.month(), day);
    if this_month >= today {
        return this_month;
    }

    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    clamped_date(year, month, day)
}

fn clamped_date(year: i32, month: u32, day: u32) -> NaiveDate {
    let day = day.min(last_day_of_month(year, month));
    // day is within 1..=last_day_of_month, so the date exists.
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}
