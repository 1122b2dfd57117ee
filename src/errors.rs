//! Error types shared by the billing core and the server.

use thiserror::Error;

/// Errors raised by configuration, persistence and input handling.
#[derive(Debug, Error)]
pub enum DespachoError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("payment gateway error: {0}")]
    GatewayError(String),

    #[error("server error: {0}")]
    ServerError(String),
}

pub type DespachoResult<T> = Result<T, DespachoError>;
