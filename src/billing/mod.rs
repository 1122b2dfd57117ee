//! Subscription validity and billing rules.
//!
//! - `expiry`    → expiry calculator, courtesy grants, invoice due dates
//! - `status`    → classification of an expiry date against today
//! - `reference` → charge reference encoding the tenant id
//! - `plan`      → ordered subscription tiers

pub mod expiry;
pub mod plan;
pub mod reference;
pub mod status;

use chrono::NaiveDate;

pub use expiry::{
    extend, extend_with_kind, grant_courtesy, next_due_date, Extension, ExtensionKind,
};
pub use plan::Plan;
pub use reference::{tenant_id_from_reference, ExternalReference};
pub use status::{classify, Classification, SubscriptionStatus};

/// Calendar parameters shared by the calculator and the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPolicy {
    pub cycle_days: i64,
    pub grace_days: i64,
    pub expiring_soon_days: i64,
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            cycle_days: 30,
            grace_days: 60,
            expiring_soon_days: 5,
        }
    }
}

impl BillingPolicy {
    /// Apply one paid cycle under this policy.
    pub fn extend(&self, current_expiry: Option<NaiveDate>, today: NaiveDate) -> Extension {
        extend_with_kind(current_expiry, today, self.cycle_days, self.grace_days)
    }

    pub fn classify(&self, expiry_date: Option<NaiveDate>, today: NaiveDate) -> Classification {
        classify(expiry_date, today, self.expiring_soon_days)
    }
}
