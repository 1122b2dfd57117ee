//! External reference attached to monthly charges.
//!
//! Charges carry `mensalidade_<tenant_id>_<MMYYYY>` so a payment event can be
//! mapped back to the tenant even when the gateway customer id is unknown.

use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

use crate::errors::DespachoError;

const PREFIX: &str = "mensalidade_";

/// Parsed charge reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalReference {
    pub tenant_id: i64,
    pub month: u32,
    pub year: i32,
}

impl ExternalReference {
    /// Reference for a charge issued on `issued_on`.
    pub fn for_charge(tenant_id: i64, issued_on: NaiveDate) -> Self {
        Self {
            tenant_id,
            month: issued_on.month(),
            year: issued_on.year(),
        }
    }
}

impl fmt::Display for ExternalReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}{}_{:02}{:04}", self.tenant_id, self.month, self.year)
    }
}

impl FromStr for ExternalReference {
    type Err = DespachoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DespachoError::InvalidInput(format!("invalid charge reference: {s}"));

        let rest = s.strip_prefix(PREFIX).ok_or_else(invalid)?;
        let (id, period) = rest.split_once('_').ok_or_else(invalid)?;
        if period.len() != 6 || !period.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let tenant_id = id.parse::<i64>().map_err(|_| invalid())?;
        let month = period[..2].parse::<u32>().map_err(|_| invalid())?;
        let year = period[2..].parse::<i32>().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }

        Ok(Self {
            tenant_id,
            month,
            year,
        })
    }
}

/// Tenant id encoded in a reference, ignoring the period suffix.
///
/// Accepts anything shaped like `mensalidade_<id>[_...]`; returns `None` when
/// the id segment is not numeric.
pub fn tenant_id_from_reference(reference: &str) -> Option<i64> {
    let rest = reference.strip_prefix(PREFIX)?;
    let id = rest.split('_').next()?;
    id.parse::<i64>().ok()
}
