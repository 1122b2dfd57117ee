//! Subscription status classification.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a tenant stands relative to its expiry date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// No expiry date: lifetime access.
    Unlimited,
    Healthy,
    /// Expires within the warning window (today included).
    ExpiringSoon,
    Expired,
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubscriptionStatus::Unlimited => "unlimited",
            SubscriptionStatus::Healthy => "healthy",
            SubscriptionStatus::ExpiringSoon => "expiring_soon",
            SubscriptionStatus::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

/// Status plus the day count it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub status: SubscriptionStatus,
    /// `expiry - today` in days; `None` when unlimited.
    pub days_remaining: Option<i64>,
}

impl Classification {
    pub fn is_expired(&self) -> bool {
        self.status == SubscriptionStatus::Expired
    }

    /// Days since expiry, `0` when not expired.
    pub fn days_overdue(&self) -> i64 {
        match self.days_remaining {
            Some(days) if days < 0 => -days,
            _ => 0,
        }
    }
}

/// Classify an expiry date against `today`.
///
/// `expiring_soon_days` is the inclusive upper bound of the warning window.
pub fn classify(
    expiry_date: Option<NaiveDate>,
    today: NaiveDate,
    expiring_soon_days: i64,
) -> Classification {
    let Some(expiry) = expiry_date else {
        return Classification {
            status: SubscriptionStatus::Unlimited,
            days_remaining: None,
        };
    };

    let days = (expiry - today).num_days();
    let status = if days < 0 {
        SubscriptionStatus::Expired
    } else if days <= expiring_soon_days {
        SubscriptionStatus::ExpiringSoon
    } else {
        SubscriptionStatus::Healthy
    };

    Classification {
        status,
        days_remaining: Some(days),
    }
}
