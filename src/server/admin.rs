//! Operator API for tenant billing.
//!
//! Every handler requires a `superuser` token (see [`Operator`]). The
//! `/admin` prefix bypasses the access gate.
//!
//! # Endpoints
//!
//! - `POST /admin/tenants` - Register a tenant
//! - `GET /admin/tenants/{id}` - Tenant with its subscription status
//! - `POST /admin/tenants/{id}/charge` - Charge the tenant and extend it by one cycle
//! - `POST /admin/tenants/{id}/courtesy` - Grant free days
//! - `POST /admin/tenants/{id}/gateway-customer` - Link the tenant to a gateway customer
//! - `POST /admin/tenants/{id}/suspend` - Block the tenant
//! - `POST /admin/tenants/{id}/reactivate` - Unblock the tenant
//! - `POST /admin/tenants/{id}/plan` - Change the plan tier
//! - `POST /admin/profiles` - Attach a user to a tenant

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::billing::{grant_courtesy, ExtensionKind, Plan, SubscriptionStatus};
use crate::gateway::Charge;
use crate::server::api_error::{ApiError, ErrorCode};
use crate::server::auth::Operator;
use crate::server::database::{NewTenant, ProfileRole, Tenant, TenantProfile};
use crate::server::handlers::AppState;
use crate::server::logging::{log_billing_event, BillingEvent};
use crate::server::renewal::{self, Renewal};
use crate::validation::{
    validate_courtesy_days, validate_due_day, validate_email, validate_expiry_date,
    validate_fee_cents, validate_length, validate_not_empty, validate_optional_email,
    validate_tax_id,
};

// ============================================================================
// Request/Response Types
// ============================================================================

fn default_due_day() -> i64 {
    10
}

fn default_active() -> bool {
    true
}

/// Request body for registering a tenant.
#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub trade_name: String,
    pub legal_name: Option<String>,
    /// CPF or CNPJ
    pub tax_id: String,
    pub email: String,
    pub billing_email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Monthly fee in cents
    #[serde(default)]
    pub monthly_fee_cents: i64,
    #[serde(default = "default_due_day")]
    pub preferred_due_day: i64,
    /// Omitted for unlimited access
    pub expiry_date: Option<NaiveDate>,
    #[serde(default = "default_active")]
    pub active: bool,
    /// `BASIC`, `MEDIUM` or `PREMIUM`; defaults to `BASIC`
    #[serde(default)]
    pub plan: Plan,
}

/// Tenant plus its current classification.
#[derive(Debug, Serialize)]
pub struct TenantResponse {
    #[serde(flatten)]
    pub tenant: Tenant,
    pub status: SubscriptionStatus,
    pub days_remaining: Option<i64>,
}

impl TenantResponse {
    fn new(state: &AppState, tenant: Tenant) -> Self {
        let classification = state.policy().classify(tenant.expiry_date, state.today());
        Self {
            tenant,
            status: classification.status,
            days_remaining: classification.days_remaining,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChargeResponse {
    pub tenant_id: i64,
    pub charge: Charge,
    pub previous_expiry: Option<NaiveDate>,
    pub expiry_date: NaiveDate,
    pub extension: ExtensionKind,
    pub active: bool,
    /// Non-fatal problems, such as a failed invoice email
    pub warnings: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CourtesyRequest {
    /// Defaults to `billing.courtesy_days`
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CourtesyResponse {
    pub tenant_id: i64,
    pub days: i64,
    pub previous_expiry: Option<NaiveDate>,
    pub expiry_date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct GatewayCustomerResponse {
    pub tenant_id: i64,
    pub gateway_customer_id: String,
}

#[derive(Debug, Serialize)]
pub struct ActiveResponse {
    pub tenant_id: i64,
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetPlanRequest {
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub tenant_id: i64,
    pub plan: Plan,
}

#[derive(Debug, Deserialize)]
pub struct CreateProfileRequest {
    pub user_id: String,
    pub tenant_id: i64,
    /// `owner` or `staff`
    pub role: String,
}

fn parse_courtesy_request(body: &[u8]) -> Result<CourtesyRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CourtesyRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        ApiError::with_message(ErrorCode::InvalidRequest, format!("Invalid courtesy request: {e}"))
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// `POST /admin/tenants`
pub async fn create_tenant_handler(
    State(state): State<AppState>,
    operator: Operator,
    Json(payload): Json<CreateTenantRequest>,
) -> Result<(StatusCode, Json<TenantResponse>), ApiError> {
    validate_not_empty(&payload.trade_name, "trade_name")?;
    validate_length(&payload.trade_name, 1, 200, "trade_name")?;
    validate_tax_id(&payload.tax_id, "tax_id")?;
    validate_email(&payload.email, "email")?;
    validate_optional_email(payload.billing_email.as_deref(), "billing_email")?;
    validate_fee_cents(payload.monthly_fee_cents, "monthly_fee_cents")?;
    validate_due_day(payload.preferred_due_day, "preferred_due_day")?;
    if let Some(expiry) = payload.expiry_date {
        validate_expiry_date(expiry, state.today(), "expiry_date")?;
    }

    let tenant = state
        .db
        .insert_tenant(&NewTenant {
            trade_name: payload.trade_name.trim().to_string(),
            legal_name: payload.legal_name,
            tax_id: payload.tax_id,
            email: Some(payload.email),
            billing_email: payload.billing_email.filter(|e| !e.trim().is_empty()),
            phone: payload.phone,
            address: payload.address,
            active: payload.active,
            expiry_date: payload.expiry_date,
            monthly_fee_cents: payload.monthly_fee_cents,
            preferred_due_day: payload.preferred_due_day,
            plan: payload.plan,
        })
        .await?;

    info!(
        "Operator {} registered tenant {} ({})",
        operator.subject, tenant.id, tenant.trade_name
    );
    Ok((StatusCode::CREATED, Json(TenantResponse::new(&state, tenant))))
}

/// `GET /admin/tenants/{id}`
pub async fn get_tenant_handler(
    State(state): State<AppState>,
    _operator: Operator,
    Path(id): Path<i64>,
) -> Result<Json<TenantResponse>, ApiError> {
    let tenant = state.require_tenant(id).await?;
    Ok(Json(TenantResponse::new(&state, tenant)))
}

/// `POST /admin/tenants/{id}/charge`
///
/// Ensures the gateway customer, issues the charge, emails the invoice and
/// extends the tenant by one cycle. The charge id is recorded as processed,
/// so the gateway's confirmation of this same payment does not extend twice.
pub async fn charge_tenant_handler(
    State(state): State<AppState>,
    operator: Operator,
    Path(id): Path<i64>,
) -> Result<Json<ChargeResponse>, ApiError> {
    let tenant = state.require_tenant(id).await?;
    let charge = renewal::issue_charge(&state, &tenant).await?;

    let mut warnings = Vec::new();
    if let Some(warning) = renewal::send_invoice(&state, &tenant, &charge).await {
        warnings.push(warning);
    }

    let (previous_expiry, extension, active) =
        match renewal::apply_paid_cycle(&state, &tenant, Some(&charge.id)).await? {
            Renewal::Applied {
                previous_expiry,
                extension,
                active,
                ..
            } => (previous_expiry, extension, active),
            Renewal::Duplicate => {
                return Err(ApiError::with_message(
                    ErrorCode::Conflict,
                    format!("Charge {} was already applied", charge.id),
                ))
            }
        };

    info!(
        "Operator {} charged tenant {}: {:?} -> {}",
        operator.subject, tenant.id, previous_expiry, extension.new_expiry
    );

    Ok(Json(ChargeResponse {
        tenant_id: tenant.id,
        charge,
        previous_expiry,
        expiry_date: extension.new_expiry,
        extension: extension.kind,
        active,
        warnings,
    }))
}

/// `POST /admin/tenants/{id}/courtesy`
///
/// Lapsed or unlimited tenants get `today + days`; current ones get
/// `expiry + days`. The active flag is left alone. An empty body grants the
/// configured default; a body that does not parse grants nothing.
pub async fn courtesy_handler(
    State(state): State<AppState>,
    operator: Operator,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<CourtesyResponse>, ApiError> {
    let request = parse_courtesy_request(&body)?;
    let days = request.days.unwrap_or(state.billing.courtesy_days);
    validate_courtesy_days(days, "days")?;

    let tenant = state.require_tenant(id).await?;
    let new_expiry = grant_courtesy(tenant.expiry_date, state.today(), days);
    state
        .db
        .update_tenant_billing(tenant.id, Some(new_expiry), tenant.active)
        .await?;

    log_billing_event(
        BillingEvent::CourtesyGranted,
        Some(tenant.id),
        Some(&format!("{days} days by {}, now {new_expiry}", operator.subject)),
    );

    Ok(Json(CourtesyResponse {
        tenant_id: tenant.id,
        days,
        previous_expiry: tenant.expiry_date,
        expiry_date: new_expiry,
    }))
}

/// `POST /admin/tenants/{id}/gateway-customer`
pub async fn link_gateway_customer_handler(
    State(state): State<AppState>,
    _operator: Operator,
    Path(id): Path<i64>,
) -> Result<Json<GatewayCustomerResponse>, ApiError> {
    let tenant = state.require_tenant(id).await?;
    let customer_id = renewal::ensure_gateway_customer(&state, &tenant).await?;

    Ok(Json(GatewayCustomerResponse {
        tenant_id: tenant.id,
        gateway_customer_id: customer_id,
    }))
}

async fn set_active(
    state: &AppState,
    operator: &Operator,
    id: i64,
    active: bool,
) -> Result<Json<ActiveResponse>, ApiError> {
    if !state.db.set_active(id, active).await? {
        return Err(ApiError::tenant_not_found(id));
    }

    let event = if active {
        BillingEvent::Reactivated
    } else {
        BillingEvent::Suspended
    };
    log_billing_event(event, Some(id), Some(&format!("by operator {}", operator.subject)));

    Ok(Json(ActiveResponse {
        tenant_id: id,
        active,
    }))
}

/// `POST /admin/tenants/{id}/suspend`
pub async fn suspend_tenant_handler(
    State(state): State<AppState>,
    operator: Operator,
    Path(id): Path<i64>,
) -> Result<Json<ActiveResponse>, ApiError> {
    set_active(&state, &operator, id, false).await
}

/// `POST /admin/tenants/{id}/reactivate`
pub async fn reactivate_tenant_handler(
    State(state): State<AppState>,
    operator: Operator,
    Path(id): Path<i64>,
) -> Result<Json<ActiveResponse>, ApiError> {
    set_active(&state, &operator, id, true).await
}

/// `POST /admin/tenants/{id}/plan`
pub async fn set_plan_handler(
    State(state): State<AppState>,
    operator: Operator,
    Path(id): Path<i64>,
    Json(payload): Json<SetPlanRequest>,
) -> Result<Json<PlanResponse>, ApiError> {
    let plan = Plan::parse(&payload.plan).ok_or_else(|| {
        ApiError::invalid_field("plan", "must be 'BASIC', 'MEDIUM' or 'PREMIUM'")
    })?;

    if !state.db.set_plan(id, plan).await? {
        return Err(ApiError::tenant_not_found(id));
    }

    info!("Operator {} moved tenant {} to plan {}", operator.subject, id, plan);
    Ok(Json(PlanResponse { tenant_id: id, plan }))
}

/// `POST /admin/profiles`
pub async fn create_profile_handler(
    State(state): State<AppState>,
    _operator: Operator,
    Json(payload): Json<CreateProfileRequest>,
) -> Result<(StatusCode, Json<TenantProfile>), ApiError> {
    validate_not_empty(&payload.user_id, "user_id")?;
    let role = ProfileRole::parse(&payload.role)
        .ok_or_else(|| ApiError::invalid_field("role", "must be 'owner' or 'staff'"))?;

    state.require_tenant(payload.tenant_id).await?;
    let profile = state
        .db
        .upsert_profile(payload.user_id.trim(), payload.tenant_id, role)
        .await?;

    info!(
        "User {} linked to tenant {} as {}",
        profile.user_id, profile.tenant_id, profile.role
    );
    Ok((StatusCode::CREATED, Json(profile)))
}
