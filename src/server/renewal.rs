//! Billing actions shared by the operator API, self-service and the webhook.
//!
//! These functions read the tenant, call the gateway or the expiry
//! calculator, and persist the result. Each one touches a single tenant.

use chrono::{Datelike, NaiveDate};

use crate::billing::{next_due_date, Extension, ExternalReference};
use crate::gateway::{Charge, ChargeRequest, CustomerInfo};
use crate::notify::{invoice_recipient, InvoiceNotice};
use crate::server::api_error::ApiError;
use crate::server::database::Tenant;
use crate::server::handlers::AppState;
use crate::server::logging::{log_billing_event, BillingEvent};

/// Outcome of applying a paid cycle to a tenant.
#[derive(Debug, Clone)]
pub enum Renewal {
    Applied {
        previous_expiry: Option<NaiveDate>,
        extension: Extension,
        active: bool,
        /// Payment re-enabled an administratively suspended tenant
        lifted_suspension: bool,
    },
    /// The payment id was already applied; nothing changed.
    Duplicate,
}

/// Gateway customer id of the tenant, registering it on first use.
pub async fn ensure_gateway_customer(state: &AppState, tenant: &Tenant) -> Result<String, ApiError> {
    if let Some(id) = tenant
        .gateway_customer_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
    {
        return Ok(id.to_string());
    }

    let info = CustomerInfo {
        tenant_id: tenant.id,
        name: tenant.billing_name().to_string(),
        tax_id: tenant.tax_id.clone(),
        email: invoice_recipient(tenant.billing_email.as_deref(), tenant.email.as_deref())
            .unwrap_or_default(),
        phone: tenant.phone.clone(),
        address: tenant.address.clone(),
    };

    let customer_id = state.gateway.register_customer(&info).await?;
    state
        .db
        .set_gateway_customer_id(tenant.id, &customer_id)
        .await?;

    log_billing_event(
        BillingEvent::CustomerLinked,
        Some(tenant.id),
        Some(&customer_id),
    );
    Ok(customer_id)
}

/// Issue this month's charge for the tenant.
///
/// The due date follows the tenant's preferred day; the reference encodes
/// the tenant id so the payment webhook can find it.
pub async fn issue_charge(state: &AppState, tenant: &Tenant) -> Result<Charge, ApiError> {
    let customer_id = ensure_gateway_customer(state, tenant).await?;
    let today = state.today();
    let reference = ExternalReference::for_charge(tenant.id, today);

    let request = ChargeRequest {
        customer_id,
        amount_cents: tenant.monthly_fee_cents,
        due_date: next_due_date(today, tenant.due_day()),
        description: format!(
            "Mensalidade {} - {:02}/{}",
            tenant.trade_name,
            today.month(),
            today.year()
        ),
        external_reference: reference.to_string(),
    };

    let charge = state.gateway.create_charge(&request).await?;
    log_billing_event(
        BillingEvent::ChargeCreated,
        Some(tenant.id),
        Some(&format!("{} due {}", charge.id, charge.due_date)),
    );
    Ok(charge)
}

/// Email the invoice. Failures come back as a warning instead of an error.
pub async fn send_invoice(state: &AppState, tenant: &Tenant, charge: &Charge) -> Option<String> {
    let notice = InvoiceNotice {
        tenant_id: tenant.id,
        tenant_name: tenant.trade_name.clone(),
        recipient: invoice_recipient(tenant.billing_email.as_deref(), tenant.email.as_deref()),
        amount_cents: tenant.monthly_fee_cents,
        due_date: charge.due_date,
        invoice_url: charge.invoice_url.clone(),
    };

    match state.notifier.send_invoice(&notice).await {
        Ok(()) => None,
        Err(e) => {
            let warning = format!("invoice email not sent: {e}");
            log_billing_event(BillingEvent::NotificationFailed, Some(tenant.id), Some(&warning));
            Some(warning)
        }
    }
}

/// Extend the tenant by one cycle.
///
/// With a `payment_id`, the id is recorded in the same transaction and a
/// repeat of it changes nothing.
pub async fn apply_paid_cycle(
    state: &AppState,
    tenant: &Tenant,
    payment_id: Option<&str>,
) -> Result<Renewal, ApiError> {
    let extension = state.policy().extend(tenant.expiry_date, state.today());
    let lifted_suspension = !tenant.active && state.billing.payment_lifts_suspension;
    let active = tenant.active || lifted_suspension;

    match payment_id {
        Some(payment_id) => {
            let applied = state
                .db
                .apply_payment(tenant.id, payment_id, extension.new_expiry, active)
                .await?;
            if !applied {
                log_billing_event(
                    BillingEvent::DuplicatePayment,
                    Some(tenant.id),
                    Some(payment_id),
                );
                return Ok(Renewal::Duplicate);
            }
        }
        None => {
            state
                .db
                .update_tenant_billing(tenant.id, Some(extension.new_expiry), active)
                .await?;
        }
    }

    log_billing_event(
        BillingEvent::Extended,
        Some(tenant.id),
        Some(&format!(
            "{} -> {} ({:?})",
            tenant
                .expiry_date
                .map_or_else(|| "none".to_string(), |d| d.to_string()),
            extension.new_expiry,
            extension.kind
        )),
    );
    if lifted_suspension {
        log_billing_event(
            BillingEvent::Reactivated,
            Some(tenant.id),
            Some("payment lifted suspension"),
        );
    }

    Ok(Renewal::Applied {
        previous_expiry: tenant.expiry_date,
        extension,
        active,
        lifted_suspension,
    })
}
