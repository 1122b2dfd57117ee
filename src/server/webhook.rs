//! Payment gateway webhook.
//!
//! The gateway posts `{"event": ..., "payment": {...}}`. Confirmed and
//! received payments extend the tenant by one cycle; overdue notices are
//! logged; anything else is acknowledged. Unknown tenants get a 200 so the
//! gateway stops retrying.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::billing::{tenant_id_from_reference, ExternalReference};
use crate::server::api_error::{ApiError, ErrorCode};
use crate::server::database::Tenant;
use crate::server::handlers::AppState;
use crate::server::logging::{log_billing_event, BillingEvent};
use crate::server::renewal::{apply_paid_cycle, Renewal};

/// Header carrying the shared webhook token.
pub const WEBHOOK_TOKEN_HEADER: &str = "asaas-access-token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEventKind {
    Confirmed,
    Received,
    Overdue,
    Other(String),
}

impl PaymentEventKind {
    pub fn parse(event: &str) -> Self {
        match event {
            "PAYMENT_CONFIRMED" => PaymentEventKind::Confirmed,
            "PAYMENT_RECEIVED" => PaymentEventKind::Received,
            "PAYMENT_OVERDUE" => PaymentEventKind::Overdue,
            other => PaymentEventKind::Other(other.to_string()),
        }
    }

    /// Whether this event moves the expiry date.
    pub fn extends(&self) -> bool {
        matches!(self, PaymentEventKind::Confirmed | PaymentEventKind::Received)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub event: String,
    pub payment: Option<PaymentPayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub id: Option<String>,
    pub customer: Option<String>,
    pub external_reference: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    /// Expiry extended
    Success,
    /// Tenant could not be resolved
    Ignored,
    /// Payment id already applied
    Duplicate,
    /// Acknowledged without changes
    Received,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status: WebhookStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
}

impl WebhookResponse {
    fn status(status: WebhookStatus) -> Json<Self> {
        Json(Self {
            status,
            tenant_id: None,
            expiry_date: None,
        })
    }
}

fn check_token(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.webhook_token.as_deref() else {
        return Ok(());
    };

    let provided = headers
        .get(WEBHOOK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    if provided == Some(expected) {
        Ok(())
    } else {
        Err(ApiError::new(ErrorCode::InvalidWebhookToken))
    }
}

/// Tenant id of a charge reference.
///
/// References we issued parse fully; hand-made ones such as
/// `mensalidade_7_manual` still yield their id segment.
fn reference_tenant_id(reference: &str) -> Option<i64> {
    match reference.parse::<ExternalReference>() {
        Ok(parsed) => {
            debug!(
                "Reference {} covers {:02}/{}",
                reference, parsed.month, parsed.year
            );
            Some(parsed.tenant_id)
        }
        Err(_) => {
            let id = tenant_id_from_reference(reference);
            if id.is_some() {
                debug!("Non-standard charge reference {}", reference);
            }
            id
        }
    }
}

/// Customer id first, then the tenant id embedded in the charge reference.
async fn resolve_tenant(
    state: &AppState,
    payment: &PaymentPayload,
) -> Result<Option<Tenant>, ApiError> {
    if let Some(customer) = payment.customer.as_deref().filter(|c| !c.is_empty()) {
        if let Some(tenant) = state.db.get_tenant_by_gateway_customer(customer).await? {
            return Ok(Some(tenant));
        }
    }

    match payment
        .external_reference
        .as_deref()
        .and_then(reference_tenant_id)
    {
        Some(id) => Ok(state.db.get_tenant(id).await?),
        None => Ok(None),
    }
}

/// `POST /api/webhook/asaas`
pub async fn payment_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    check_token(&state, &headers)?;

    let payload: WebhookPayload = serde_json::from_slice(&body).map_err(|e| {
        ApiError::with_message(ErrorCode::InvalidRequest, format!("invalid webhook body: {e}"))
    })?;

    let kind = PaymentEventKind::parse(&payload.event);
    info!("Received gateway event {}", payload.event);

    if let PaymentEventKind::Other(_) = kind {
        return Ok(WebhookResponse::status(WebhookStatus::Received));
    }

    let Some(payment) = payload.payment else {
        log_billing_event(BillingEvent::WebhookIgnored, None, Some("event without payment"));
        return Ok(WebhookResponse::status(WebhookStatus::Ignored));
    };

    let Some(tenant) = resolve_tenant(&state, &payment).await? else {
        let details = format!(
            "no tenant for customer={:?} reference={:?}",
            payment.customer, payment.external_reference
        );
        log_billing_event(BillingEvent::WebhookIgnored, None, Some(&details));
        return Ok(WebhookResponse::status(WebhookStatus::Ignored));
    };

    if !kind.extends() {
        log_billing_event(
            BillingEvent::OverdueNotice,
            Some(tenant.id),
            payment.id.as_deref(),
        );
        return Ok(Json(WebhookResponse {
            status: WebhookStatus::Received,
            tenant_id: Some(tenant.id),
            expiry_date: tenant.expiry_date,
        }));
    }

    let payment_id = payment.id.as_deref().filter(|id| !id.is_empty());
    match apply_paid_cycle(&state, &tenant, payment_id).await? {
        Renewal::Applied { extension, .. } => Ok(Json(WebhookResponse {
            status: WebhookStatus::Success,
            tenant_id: Some(tenant.id),
            expiry_date: Some(extension.new_expiry),
        })),
        Renewal::Duplicate => Ok(Json(WebhookResponse {
            status: WebhookStatus::Duplicate,
            tenant_id: Some(tenant.id),
            expiry_date: tenant.expiry_date,
        })),
    }
}
