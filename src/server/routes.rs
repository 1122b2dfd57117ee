use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::server::admin::{
    charge_tenant_handler, courtesy_handler, create_profile_handler, create_tenant_handler,
    get_tenant_handler, link_gateway_customer_handler, reactivate_tenant_handler,
    set_plan_handler, suspend_tenant_handler,
};
use crate::server::gate::access_gate_middleware;
use crate::server::handlers::{
    billing_required_handler, billing_status_handler, health_handler, logout_handler,
    pay_handler, payment_history_handler, AppState,
    BILLING_REQUIRED_PATH, PAY_PATH,
};
use crate::server::logging::request_logging_middleware;
use crate::server::webhook::payment_webhook_handler;

/// Build the application router.
///
/// Every route sits behind the access gate; request logging wraps the gate
/// so blocked requests are logged too.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Liveness and database check
/// - `POST /api/webhook/asaas` - Payment gateway notifications
/// - `GET|POST /logout` - Sign out
///
/// ## Tenant members
/// - `GET /api/v1/billing/status` - Subscription status of the caller's tenant
/// - `GET /api/v1/billing/payments` - Applied payments (Medium plan and above)
/// - `GET /billing/required` - Billing page data for an expired tenant
/// - `POST /billing/pay` - Issue a charge and redirect to the invoice
///
/// ## Operators (`superuser` scope)
/// - `POST /admin/tenants` - Register a tenant
/// - `GET /admin/tenants/{id}` - Get a tenant
/// - `POST /admin/tenants/{id}/charge` - Charge and extend one cycle
/// - `POST /admin/tenants/{id}/courtesy` - Grant courtesy days
/// - `POST /admin/tenants/{id}/gateway-customer` - Register at the gateway
/// - `POST /admin/tenants/{id}/suspend` - Suspend access
/// - `POST /admin/tenants/{id}/reactivate` - Restore access
/// - `POST /admin/tenants/{id}/plan` - Change the plan tier
/// - `POST /admin/profiles` - Attach a user to a tenant
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/webhook/asaas", post(payment_webhook_handler))
        .route("/logout", get(logout_handler).post(logout_handler))
        // Tenant self-service
        .route("/api/v1/billing/status", get(billing_status_handler))
        .route("/api/v1/billing/payments", get(payment_history_handler))
        .route(BILLING_REQUIRED_PATH, get(billing_required_handler))
        .route(PAY_PATH, post(pay_handler))
        // Operator API
        .route("/admin/tenants", post(create_tenant_handler))
        .route("/admin/tenants/:id", get(get_tenant_handler))
        .route("/admin/tenants/:id/charge", post(charge_tenant_handler))
        .route("/admin/tenants/:id/courtesy", post(courtesy_handler))
        .route(
            "/admin/tenants/:id/gateway-customer",
            post(link_gateway_customer_handler),
        )
        .route("/admin/tenants/:id/suspend", post(suspend_tenant_handler))
        .route(
            "/admin/tenants/:id/reactivate",
            post(reactivate_tenant_handler),
        )
        .route("/admin/tenants/:id/plan", post(set_plan_handler))
        .route("/admin/profiles", post(create_profile_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            access_gate_middleware,
        ))
        .layer(middleware::from_fn(request_logging_middleware))
        .with_state(state)
}
