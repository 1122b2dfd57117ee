//! Source of "today" for billing decisions.
//!
//! Expiry dates are calendar dates in the operating timezone, so every
//! comparison goes through a [`Clock`] instead of reading the system time
//! directly. Tests use [`FixedClock`].

use chrono::{FixedOffset, NaiveDate, Utc};

use crate::errors::{DespachoError, DespachoResult};

/// Provides the current calendar date.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall clock shifted to a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Build a clock from an offset in minutes (e.g. `-180` for UTC-03:00).
    pub fn with_offset_minutes(minutes: i32) -> DespachoResult<Self> {
        FixedOffset::east_opt(minutes * 60)
            .map(Self::new)
            .ok_or_else(|| {
                DespachoError::ConfigError(format!("invalid UTC offset: {minutes} minutes"))
            })
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// Clock pinned to a single date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
