//! Subscription plan tiers.
//!
//! Tiers are ordered: a tenant on a higher plan can use everything a lower
//! plan includes.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    #[default]
    Basic,
    Medium,
    Premium,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Basic => "BASIC",
            Plan::Medium => "MEDIUM",
            Plan::Premium => "PREMIUM",
        }
    }

    /// Case-insensitive; `None` for unknown names.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "BASIC" => Some(Plan::Basic),
            "MEDIUM" => Some(Plan::Medium),
            "PREMIUM" => Some(Plan::Premium),
            _ => None,
        }
    }

    /// Display name shown to tenants.
    pub fn label(&self) -> &'static str {
        match self {
            Plan::Basic => "Básico",
            Plan::Medium => "Médio",
            Plan::Premium => "Premium",
        }
    }

    /// Whether this plan includes features that require `required`.
    pub fn includes(&self, required: Plan) -> bool {
        *self >= required
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
