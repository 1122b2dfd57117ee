//! Standardized API error responses for all despacho endpoints.
//!
//! # Response Format
//!
//! ```json
//! {
//!   "error": {
//!     "code": "TENANT_SUSPENDED",
//!     "message": "Tenant access is suspended",
//!     "details": null
//!   }
//! }
//! ```
//!
//! The `details` field is optional and may contain additional context.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::DespachoError;
use crate::gateway::GatewayError;
use crate::validation::ValidationError;

/// Machine-readable error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // === Access Gate (403) ===
    /// Tenant was administratively suspended
    TenantSuspended,
    /// Subscription expired; only the tenant administrator can settle it
    BillingPending,
    /// Authenticated user has no tenant profile
    ProfileMissing,
    /// Feature belongs to a higher plan than the tenant's
    PlanRequired,

    // === Validation Errors (400) ===
    InvalidRequest,
    MissingField,
    InvalidField,

    // === Authentication Errors (401/403) ===
    MissingToken,
    InvalidHeader,
    InvalidToken,
    TokenExpired,
    /// Webhook shared token missing or wrong
    InvalidWebhookToken,
    InsufficientScope,

    // === Resource Errors (404/409) ===
    TenantNotFound,
    NotFound,
    Conflict,

    // === Server Errors (5xx) ===
    DatabaseError,
    ConfigError,
    /// Payment gateway refused or failed the call
    GatewayError,
    /// No gateway credentials configured
    GatewayUnavailable,
    InternalError,
}

impl ErrorCode {
    /// Returns the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidRequest
            | ErrorCode::MissingField
            | ErrorCode::InvalidField
            | ErrorCode::InvalidHeader => StatusCode::BAD_REQUEST,

            ErrorCode::MissingToken
            | ErrorCode::InvalidToken
            | ErrorCode::TokenExpired
            | ErrorCode::InvalidWebhookToken => StatusCode::UNAUTHORIZED,

            ErrorCode::TenantSuspended
            | ErrorCode::BillingPending
            | ErrorCode::ProfileMissing
            | ErrorCode::PlanRequired
            | ErrorCode::InsufficientScope => StatusCode::FORBIDDEN,

            ErrorCode::TenantNotFound | ErrorCode::NotFound => StatusCode::NOT_FOUND,

            ErrorCode::Conflict => StatusCode::CONFLICT,

            ErrorCode::DatabaseError | ErrorCode::ConfigError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            ErrorCode::GatewayError => StatusCode::BAD_GATEWAY,
            ErrorCode::GatewayUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Returns a default human-readable message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::TenantSuspended => "Tenant access is suspended",
            ErrorCode::BillingPending => {
                "Subscription payment is pending; contact your administrator"
            }
            ErrorCode::ProfileMissing => "User is not linked to any tenant",
            ErrorCode::PlanRequired => "Feature is not included in the tenant's plan",
            ErrorCode::InvalidRequest => "Request payload is invalid",
            ErrorCode::MissingField => "A required field is missing",
            ErrorCode::InvalidField => "A field value is invalid",
            ErrorCode::MissingToken => "Authentication token is required",
            ErrorCode::InvalidHeader => "Authorization header is malformed",
            ErrorCode::InvalidToken => "Authentication token is invalid",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::InvalidWebhookToken => "Webhook token is missing or invalid",
            ErrorCode::InsufficientScope => "Insufficient permissions for this operation",
            ErrorCode::TenantNotFound => "The requested tenant does not exist",
            ErrorCode::NotFound => "The requested resource was not found",
            ErrorCode::Conflict => "Operation conflicts with current resource state",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ConfigError => "Server configuration error",
            ErrorCode::GatewayError => "Payment gateway request failed",
            ErrorCode::GatewayUnavailable => "Payment gateway is not configured",
            ErrorCode::InternalError => "An unexpected error occurred",
        }
    }
}

/// The inner error object containing code, message, and optional details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Standardized API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ErrorBody,
}

impl ApiError {
    /// Creates a new API error with the default message for `code`.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: code.default_message().to_string(),
                details: None,
            },
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: ErrorCode,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.error.code.status_code()
    }

    pub fn tenant_not_found(id: i64) -> Self {
        Self::with_message(ErrorCode::TenantNotFound, format!("Tenant {id} not found"))
    }

    /// Invalid request error with field details.
    pub fn invalid_field(field: &str, reason: &str) -> Self {
        Self::with_details(
            ErrorCode::InvalidField,
            format!("Invalid value for '{field}': {reason}"),
            serde_json::json!({ "field": field }),
        )
    }

    /// Database error (internal details hidden from client).
    pub fn database_error() -> Self {
        Self::new(ErrorCode::DatabaseError)
    }

    pub fn internal_error() -> Self {
        Self::new(ErrorCode::InternalError)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.error.code.default_message(),
            self.error.message
        )
    }
}

impl std::error::Error for ApiError {}

impl From<DespachoError> for ApiError {
    fn from(err: DespachoError) -> Self {
        match err {
            DespachoError::InvalidInput(msg) => {
                ApiError::with_message(ErrorCode::InvalidRequest, msg)
            }
            DespachoError::NotFound(msg) => ApiError::with_message(ErrorCode::NotFound, msg),
            DespachoError::Conflict(msg) => ApiError::with_message(ErrorCode::Conflict, msg),
            DespachoError::ConfigError(msg) => ApiError::with_message(ErrorCode::ConfigError, msg),
            // Driver messages stay in the logs
            DespachoError::DatabaseError(_) => ApiError::database_error(),
            DespachoError::GatewayError(msg) => {
                ApiError::with_message(ErrorCode::GatewayError, msg)
            }
            DespachoError::ServerError(msg) => {
                ApiError::with_message(ErrorCode::InternalError, msg)
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotConfigured => ApiError::new(ErrorCode::GatewayUnavailable),
            GatewayError::Rejected { status, ref body } => ApiError::with_details(
                ErrorCode::GatewayError,
                err.to_string(),
                serde_json::json!({ "gateway_status": status, "gateway_body": body }),
            ),
            other => ApiError::with_message(ErrorCode::GatewayError, other.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::invalid_field(&err.field, &err.message)
    }
}
