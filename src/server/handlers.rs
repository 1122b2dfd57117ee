use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::billing::{BillingPolicy, Classification, Plan, SubscriptionStatus};
use crate::clock::Clock;
use crate::config::BillingConfig;
use crate::gateway::PaymentGateway;
use crate::notify::BillingNotifier;
use crate::server::api_error::ApiError;
use crate::server::auth::{AuthState, Principal, TenantMember};
use crate::server::database::{Database, PaymentRecord, Tenant};
use crate::server::gate::require_plan;
use crate::server::logging::HealthResponse;
use crate::server::renewal;

/// Path of the self-service payment action.
pub const PAY_PATH: &str = "/billing/pay";

/// Path of the billing-required page.
pub const BILLING_REQUIRED_PATH: &str = "/billing/required";

/// Lowest plan that includes the payment history.
pub const PAYMENT_HISTORY_PLAN: Plan = Plan::Medium;

/// Shared application state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn BillingNotifier>,
    pub clock: Arc<dyn Clock>,
    pub auth: AuthState,
    pub billing: BillingConfig,
    /// Expected `asaas-access-token` value; unchecked when `None`
    pub webhook_token: Option<String>,
}

impl AppState {
    pub fn new(
        db: Arc<Database>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn BillingNotifier>,
        clock: Arc<dyn Clock>,
        auth: AuthState,
    ) -> Self {
        Self {
            db,
            gateway,
            notifier,
            clock,
            auth,
            billing: BillingConfig::default(),
            webhook_token: None,
        }
    }

    pub fn with_billing(mut self, billing: BillingConfig) -> Self {
        self.billing = billing;
        self
    }

    pub fn with_webhook_token(mut self, token: Option<String>) -> Self {
        self.webhook_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn policy(&self) -> BillingPolicy {
        self.billing.policy()
    }

    /// Load a tenant or fail with `TENANT_NOT_FOUND`.
    pub async fn require_tenant(&self, id: i64) -> Result<Tenant, ApiError> {
        self.db
            .get_tenant(id)
            .await?
            .ok_or_else(|| ApiError::tenant_not_found(id))
    }
}

/// Subscription state as shown to tenants and operators.
#[derive(Debug, Serialize, Deserialize)]
pub struct BillingStatusResponse {
    pub tenant_id: i64,
    pub trade_name: String,
    pub active: bool,
    pub plan: Plan,
    pub expiry_date: Option<NaiveDate>,
    pub status: SubscriptionStatus,
    pub days_remaining: Option<i64>,
}

impl BillingStatusResponse {
    pub fn new(tenant: &Tenant, classification: Classification) -> Self {
        Self {
            tenant_id: tenant.id,
            trade_name: tenant.trade_name.clone(),
            active: tenant.active,
            plan: tenant.plan(),
            expiry_date: tenant.expiry_date,
            status: classification.status,
            days_remaining: classification.days_remaining,
        }
    }
}

/// Payload for the page shown to an administrator whose subscription lapsed.
#[derive(Debug, Serialize, Deserialize)]
pub struct BillingRequiredResponse {
    pub tenant_id: i64,
    pub trade_name: String,
    pub expiry_date: Option<NaiveDate>,
    pub days_overdue: i64,
    pub monthly_fee_cents: i64,
    pub pay_path: String,
}

/// `GET /health`
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = state.db.ping().await;
    Json(HealthResponse::from_db_check(connected, state.db.db_type()))
}

/// `GET /logout`, `POST /logout`
///
/// Tokens are stateless, so this only records the sign-out. Always answers,
/// even for stale or missing tokens.
pub async fn logout_handler(principal: Option<Extension<Principal>>) -> StatusCode {
    match principal.map(|Extension(p)| p) {
        Some(Principal::Member { user_id, .. }) => info!("User {} signed out", user_id),
        Some(Principal::Superuser { subject }) => info!("Operator {} signed out", subject),
        _ => {}
    }
    StatusCode::NO_CONTENT
}

/// `GET /api/v1/billing/status`
pub async fn billing_status_handler(
    State(state): State<AppState>,
    member: TenantMember,
) -> Result<Json<BillingStatusResponse>, ApiError> {
    let tenant = state.require_tenant(member.profile.tenant_id).await?;
    let classification = state.policy().classify(tenant.expiry_date, state.today());
    Ok(Json(BillingStatusResponse::new(&tenant, classification)))
}

#[derive(Debug, Serialize)]
pub struct PaymentHistoryResponse {
    pub tenant_id: i64,
    pub payments: Vec<PaymentRecord>,
}

/// `GET /api/v1/billing/payments`
///
/// Payments applied to the caller's tenant. Needs [`PAYMENT_HISTORY_PLAN`].
pub async fn payment_history_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    member: TenantMember,
) -> Result<Json<PaymentHistoryResponse>, ApiError> {
    require_plan(&state, &principal, PAYMENT_HISTORY_PLAN).await?;

    let payments = state.db.list_payments(member.profile.tenant_id).await?;
    Ok(Json(PaymentHistoryResponse {
        tenant_id: member.profile.tenant_id,
        payments,
    }))
}

/// `GET /billing/required`
pub async fn billing_required_handler(
    State(state): State<AppState>,
    member: TenantMember,
) -> Result<Json<BillingRequiredResponse>, ApiError> {
    let tenant = state.require_tenant(member.profile.tenant_id).await?;
    let classification = state.policy().classify(tenant.expiry_date, state.today());

    Ok(Json(BillingRequiredResponse {
        tenant_id: tenant.id,
        trade_name: tenant.trade_name.clone(),
        expiry_date: tenant.expiry_date,
        days_overdue: classification.days_overdue(),
        monthly_fee_cents: tenant.monthly_fee_cents,
        pay_path: PAY_PATH.to_string(),
    }))
}

/// `POST /billing/pay`
///
/// Issues a charge and sends the member to the gateway invoice. The expiry
/// only moves when the payment webhook arrives.
pub async fn pay_handler(
    State(state): State<AppState>,
    member: TenantMember,
) -> Result<Response, ApiError> {
    let tenant = state.require_tenant(member.profile.tenant_id).await?;
    let charge = renewal::issue_charge(&state, &tenant).await?;

    info!(
        "User {} opened invoice {} for tenant {}",
        member.user_id, charge.id, tenant.id
    );
    Ok(Redirect::to(&charge.invoice_url).into_response())
}
