//! Input validation for tenant registration and billing requests.

use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::gateway::digits_only;

/// Validation error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = Result<T, ValidationError>;

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

/// How far ahead of today a registered expiry date may lie.
pub const MAX_EXPIRY_YEARS_AHEAD: i32 = 10;

/// Earliest year accepted for a registered expiry date.
pub const MIN_EXPIRY_YEAR: i32 = 2000;

/// Longest courtesy grant an operator may issue in one action.
pub const MAX_COURTESY_DAYS: i64 = 365;

/// Validate that a string is not empty or whitespace only.
///
/// # Example
/// ```
/// use despacho::validation::validate_not_empty;
///
/// assert!(validate_not_empty("Despachante Centro", "trade_name").is_ok());
/// assert!(validate_not_empty("   ", "trade_name").is_err());
/// ```
pub fn validate_not_empty(value: &str, field_name: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        Err(ValidationError::new(field_name, "cannot be empty"))
    } else {
        Ok(())
    }
}

/// Validate string length (in characters) is within bounds.
pub fn validate_length(
    value: &str,
    min: usize,
    max: usize,
    field_name: &str,
) -> ValidationResult<()> {
    let len = value.chars().count();
    if len < min {
        Err(ValidationError::new(
            field_name,
            format!("must be at least {min} characters"),
        ))
    } else if len > max {
        Err(ValidationError::new(
            field_name,
            format!("must be at most {max} characters"),
        ))
    } else {
        Ok(())
    }
}

/// Validate a CPF (11 digits) or CNPJ (14 digits), punctuation ignored.
///
/// Only the digit count is checked; verifier digits are the gateway's concern.
///
/// # Example
/// ```
/// use despacho::validation::validate_tax_id;
///
/// assert!(validate_tax_id("123.456.789-09", "tax_id").is_ok());
/// assert!(validate_tax_id("12.345.678/0001-90", "tax_id").is_ok());
/// assert!(validate_tax_id("1234", "tax_id").is_err());
/// ```
pub fn validate_tax_id(value: &str, field_name: &str) -> ValidationResult<()> {
    match digits_only(value).len() {
        11 | 14 => Ok(()),
        _ => Err(ValidationError::new(
            field_name,
            "must contain 11 (CPF) or 14 (CNPJ) digits",
        )),
    }
}

/// Validate an email address shape.
pub fn validate_email(value: &str, field_name: &str) -> ValidationResult<()> {
    let matches = regex::Regex::new(EMAIL_PATTERN)
        .map(|re| re.is_match(value))
        .unwrap_or(false);

    if matches {
        Ok(())
    } else {
        Err(ValidationError::new(field_name, "invalid email address"))
    }
}

/// Validate an optional email; `None` and blank strings are accepted.
pub fn validate_optional_email(value: Option<&str>, field_name: &str) -> ValidationResult<()> {
    match value {
        Some(v) if !v.trim().is_empty() => validate_email(v, field_name),
        _ => Ok(()),
    }
}

/// Preferred invoice day must exist in every month.
pub fn validate_due_day(day: i64, field_name: &str) -> ValidationResult<()> {
    if (1..=28).contains(&day) {
        Ok(())
    } else {
        Err(ValidationError::new(field_name, "must be between 1 and 28"))
    }
}

pub fn validate_fee_cents(cents: i64, field_name: &str) -> ValidationResult<()> {
    if cents < 0 {
        Err(ValidationError::new(field_name, "cannot be negative"))
    } else {
        Ok(())
    }
}

pub fn validate_courtesy_days(days: i64, field_name: &str) -> ValidationResult<()> {
    if (1..=MAX_COURTESY_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(ValidationError::new(
            field_name,
            format!("must be between 1 and {MAX_COURTESY_DAYS}"),
        ))
    }
}

/// Validate an expiry date given at registration.
///
/// Past dates are allowed (migrated tenants that already lapsed), but the
/// year must lie between [`MIN_EXPIRY_YEAR`] and
/// [`MAX_EXPIRY_YEARS_AHEAD`] years after `today`.
pub fn validate_expiry_date(
    date: NaiveDate,
    today: NaiveDate,
    field_name: &str,
) -> ValidationResult<()> {
    let latest = today.year() + MAX_EXPIRY_YEARS_AHEAD;
    if (MIN_EXPIRY_YEAR..=latest).contains(&date.year()) {
        Ok(())
    } else {
        Err(ValidationError::new(
            field_name,
            format!("year must be between {MIN_EXPIRY_YEAR} and {latest}"),
        ))
    }
}
