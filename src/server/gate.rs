//! Access gate applied to every request.
//!
//! The middleware resolves the caller into a [`Principal`], stores it in the
//! request extensions and then asks [`evaluate`] whether the request may
//! proceed. The decision itself is pure so it can be tested without HTTP.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::NaiveDate;
use tracing::debug;

use crate::billing::{BillingPolicy, Plan};
use crate::server::api_error::{ApiError, ErrorCode};
use crate::server::auth::{AuthFailure, Principal, SUPERUSER_SCOPE};
use crate::server::database::Tenant;
use crate::server::handlers::{AppState, BILLING_REQUIRED_PATH, PAY_PATH};
use crate::server::logging::{log_billing_event, BillingEvent};

/// Route prefixes that skip the gate entirely.
pub const BYPASS_ROUTES: &[&str] = &[
    "/logout",
    "/admin",
    PAY_PATH,
    BILLING_REQUIRED_PATH,
    "/api/webhook",
    "/health",
];

/// Bypass routes that never look at the bearer token.
const UNAUTHENTICATED_ROUTES: &[&str] = &["/api/webhook", "/health"];

fn under_any(path: &str, routes: &[&str]) -> bool {
    routes.iter().any(|route| {
        path == *route
            || path
                .strip_prefix(route)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// `true` when `path` is a bypass route or lies below one.
pub fn is_bypassed(path: &str) -> bool {
    under_any(path, BYPASS_ROUTES)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Block(Block),
}

/// Why a request was stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// `active = false`
    Suspended { tenant_name: String },
    /// Expired; the caller is the tenant administrator
    BillingRequired,
    /// Expired; the caller is staff
    ContactAdministrator { tenant_name: String },
    /// Authenticated user with no usable tenant profile
    MissingProfile,
    /// Tenant plan is below the one the feature needs
    PlanRequired { required: Plan },
}

impl Block {
    /// Error reported for this block when it is not a redirect.
    pub fn to_api_error(&self) -> ApiError {
        match self {
            Block::Suspended { tenant_name } => ApiError::with_message(
                ErrorCode::TenantSuspended,
                format!("Access for '{tenant_name}' is suspended"),
            ),
            Block::BillingRequired => ApiError::with_message(
                ErrorCode::BillingPending,
                format!("Subscription has expired; settle it at {BILLING_REQUIRED_PATH}"),
            ),
            Block::ContactAdministrator { tenant_name } => ApiError::with_message(
                ErrorCode::BillingPending,
                format!("Subscription of '{tenant_name}' has expired; contact your administrator"),
            ),
            Block::MissingProfile => ApiError::new(ErrorCode::ProfileMissing),
            Block::PlanRequired { required } => ApiError::with_details(
                ErrorCode::PlanRequired,
                format!("Feature available from the {} plan", required.label()),
                serde_json::json!({ "required_plan": required }),
            ),
        }
    }
}

/// Decide whether a request may proceed.
///
/// `tenant` is the tenant of the member's profile, `None` when it could not
/// be loaded.
pub fn evaluate(
    path: &str,
    principal: &Principal,
    tenant: Option<&Tenant>,
    today: NaiveDate,
    policy: &BillingPolicy,
) -> GateDecision {
    if is_bypassed(path) {
        return GateDecision::Allow;
    }

    let profile = match principal {
        // Handlers reject anonymous callers themselves
        Principal::Anonymous | Principal::Superuser { .. } => return GateDecision::Allow,
        Principal::Member { profile: None, .. } => {
            return GateDecision::Block(Block::MissingProfile)
        }
        Principal::Member {
            profile: Some(profile),
            ..
        } => profile,
    };

    let Some(tenant) = tenant.filter(|t| t.id == profile.tenant_id) else {
        return GateDecision::Block(Block::MissingProfile);
    };

    if !tenant.active {
        return GateDecision::Block(Block::Suspended {
            tenant_name: tenant.trade_name.clone(),
        });
    }

    if policy.classify(tenant.expiry_date, today).is_expired() {
        if profile.is_owner() {
            return GateDecision::Block(Block::BillingRequired);
        }
        return GateDecision::Block(Block::ContactAdministrator {
            tenant_name: tenant.trade_name.clone(),
        });
    }

    GateDecision::Allow
}

/// Decide whether `principal` may use a feature that needs `required`.
///
/// Operators always pass. Members need a profile whose tenant is `tenant`;
/// anything else fails closed.
pub fn evaluate_plan(principal: &Principal, tenant: Option<&Tenant>, required: Plan) -> GateDecision {
    let profile = match principal {
        Principal::Superuser { .. } => return GateDecision::Allow,
        Principal::Anonymous | Principal::Member { profile: None, .. } => {
            return GateDecision::Block(Block::MissingProfile)
        }
        Principal::Member {
            profile: Some(profile),
            ..
        } => profile,
    };

    match tenant.filter(|t| t.id == profile.tenant_id) {
        Some(tenant) if tenant.plan().includes(required) => GateDecision::Allow,
        Some(_) => GateDecision::Block(Block::PlanRequired { required }),
        None => GateDecision::Block(Block::MissingProfile),
    }
}

/// Reject the request unless the caller's tenant is on `required` or above.
pub async fn require_plan(
    state: &AppState,
    principal: &Principal,
    required: Plan,
) -> Result<(), ApiError> {
    let tenant = match principal {
        Principal::Member {
            profile: Some(profile),
            ..
        } => state.db.get_tenant(profile.tenant_id).await?,
        _ => None,
    };

    match evaluate_plan(principal, tenant.as_ref(), required) {
        GateDecision::Allow => Ok(()),
        GateDecision::Block(block) => {
            log_billing_event(
                BillingEvent::AccessBlocked,
                tenant.map(|t| t.id),
                Some(&format!("{:?}", block)),
            );
            Err(block.to_api_error())
        }
    }
}

async fn resolve_principal(state: &AppState, headers: &HeaderMap) -> Result<Principal, ApiError> {
    let Some(claims) = state.auth.bearer_claims(headers)? else {
        return Ok(Principal::Anonymous);
    };

    if claims.has_scope(SUPERUSER_SCOPE) {
        return Ok(Principal::Superuser {
            subject: claims.sub,
        });
    }

    let profile = state.db.get_profile(&claims.sub).await?;
    Ok(Principal::Member {
        user_id: claims.sub,
        profile,
    })
}

fn blocked_response(block: Block, tenant_id: Option<i64>) -> Response {
    if block == Block::BillingRequired {
        return Redirect::to(BILLING_REQUIRED_PATH).into_response();
    }

    let error = block.to_api_error();

    log_billing_event(
        BillingEvent::AccessBlocked,
        tenant_id,
        Some(&format!("{:?}", error.error.code)),
    );
    error.into_response()
}

/// Middleware enforcing the access gate.
///
/// Bypass routes always reach their handler. A bad token there leaves the
/// caller anonymous and is recorded as an [`AuthFailure`] for the extractors.
pub async fn access_gate_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if is_bypassed(&path) {
        if !under_any(&path, UNAUTHENTICATED_ROUTES) {
            match resolve_principal(&state, request.headers()).await {
                Ok(principal) => {
                    request.extensions_mut().insert(principal);
                }
                Err(err) => {
                    debug!("Credentials rejected on bypass route {}: {}", path, err);
                    request.extensions_mut().insert(AuthFailure(err));
                }
            }
        }
        if request.extensions().get::<Principal>().is_none() {
            request.extensions_mut().insert(Principal::Anonymous);
        }
        return next.run(request).await;
    }

    let principal = match resolve_principal(&state, request.headers()).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    let tenant = match &principal {
        Principal::Member {
            profile: Some(profile),
            ..
        } => match state.db.get_tenant(profile.tenant_id).await {
            Ok(tenant) => tenant,
            Err(err) => return ApiError::from(err).into_response(),
        },
        _ => None,
    };

    let decision = evaluate(
        &path,
        &principal,
        tenant.as_ref(),
        state.today(),
        &state.policy(),
    );
    if let GateDecision::Block(block) = decision {
        return blocked_response(block, tenant.map(|t| t.id));
    }

    request.extensions_mut().insert(principal);
    next.run(request).await
}
