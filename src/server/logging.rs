//! Request logging middleware and billing audit events.
//!
//! Every request gets a UUID, a span carrying method and path, a completion
//! line with status and duration, and an `X-Request-Id` response header.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, Response},
    middleware::Next,
};
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Tenant billing state changes worth auditing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingEvent {
    /// Expiry moved forward by one paid cycle
    Extended,
    /// Tenant re-enabled (operator action or payment)
    Reactivated,
    Suspended,
    CourtesyGranted,
    ChargeCreated,
    /// Tenant linked to a gateway customer
    CustomerLinked,
    /// Webhook could not be mapped to a tenant
    WebhookIgnored,
    DuplicatePayment,
    OverdueNotice,
    AccessBlocked,
    NotificationFailed,
}

impl std::fmt::Display for BillingEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BillingEvent::Extended => "extended",
            BillingEvent::Reactivated => "reactivated",
            BillingEvent::Suspended => "suspended",
            BillingEvent::CourtesyGranted => "courtesy_granted",
            BillingEvent::ChargeCreated => "charge_created",
            BillingEvent::CustomerLinked => "customer_linked",
            BillingEvent::WebhookIgnored => "webhook_ignored",
            BillingEvent::DuplicatePayment => "duplicate_payment",
            BillingEvent::OverdueNotice => "overdue_notice",
            BillingEvent::AccessBlocked => "access_blocked",
            BillingEvent::NotificationFailed => "notification_failed",
        };
        write!(f, "{}", s)
    }
}

/// Log a billing event for a tenant.
///
/// `tenant_id` is `None` when the event could not be mapped to a tenant.
pub fn log_billing_event(event: BillingEvent, tenant_id: Option<i64>, details: Option<&str>) {
    let tenant = tenant_id.map_or_else(|| "unknown".to_string(), |id| id.to_string());
    let span = info_span!(
        "billing_event",
        event = %event,
        tenant_id = %tenant,
    );
    let _enter = span.enter();

    match event {
        BillingEvent::WebhookIgnored
        | BillingEvent::AccessBlocked
        | BillingEvent::NotificationFailed
        | BillingEvent::OverdueNotice => {
            if let Some(d) = details {
                warn!(reason = %d, "Billing event occurred");
            } else {
                warn!("Billing event occurred");
            }
        }
        _ => {
            if let Some(d) = details {
                info!(details = %d, "Billing event occurred");
            } else {
                info!("Billing event occurred");
            }
        }
    }
}

/// Header name for the request ID.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Logging middleware that tracks request timing and generates request IDs.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response<Body> {
    let request_id = generate_request_id();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    let start = Instant::now();

    let response = async move {
        info!("Started processing request");
        next.run(request).await
    }
    .instrument(span.clone())
    .await;

    let duration = start.elapsed();
    let status = response.status();

    let _enter = span.enter();
    info!(
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        "Request completed"
    );

    let (mut parts, body) = response.into_parts();
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        parts.headers.insert(REQUEST_ID_HEADER, header_value);
    }

    Response::from_parts(parts, body)
}

/// Health check response structure.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    pub service: String,
    pub version: String,
    pub database: DatabaseHealth,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DatabaseHealth {
    pub connected: bool,
    /// sqlite or postgres
    pub db_type: String,
}

impl HealthResponse {
    pub fn from_db_check(db_connected: bool, db_type: &str) -> Self {
        Self {
            status: if db_connected { "healthy" } else { "degraded" }.to_string(),
            service: "despacho".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: DatabaseHealth {
                connected: db_connected,
                db_type: db_type.to_string(),
            },
        }
    }
}
