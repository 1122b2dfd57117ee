//! Integration tests for the operator API.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Duration;
use common::{date, send, setup_app, setup_app_with};
use despacho::billing::Plan;
use despacho::config::{BillingConfig, NotifyConfig, SmtpSecurity};
use despacho::gateway::SimulatedGateway;
use despacho::notify::SmtpNotifier;
use despacho::server::{NewTenant, ProfileRole};
use serde_json::json;

fn tenant_payload(tax_id: &str) -> serde_json::Value {
    json!({
        "trade_name": "Despachante Avenida",
        "legal_name": "Avenida Servicos Automotivos Ltda",
        "tax_id": tax_id,
        "email": "contato@avenida.test",
        "billing_email": "financeiro@avenida.test",
        "monthly_fee_cents": 19990,
        "preferred_due_day": 5
    })
}

#[tokio::test]
async fn create_tenant_returns_created() {
    let app = setup_app(date(2024, 1, 15)).await;
    let token = app.operator_token();

    let (status, _, body) = send(
        app.router(),
        "POST",
        "/admin/tenants",
        Some(&token),
        Some(tenant_payload("12.345.678/0001-90")),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["trade_name"], "Despachante Avenida");
    assert_eq!(body["status"], "UNLIMITED");
    assert_eq!(body["active"], true);
    assert!(body["id"].as_i64().is_some());
}

#[tokio::test]
async fn create_tenant_validates_input() {
    let app = setup_app(date(2024, 1, 15)).await;
    let token = app.operator_token();

    let mut payload = tenant_payload("123");
    let (status, _, body) =
        send(app.router(), "POST", "/admin/tenants", Some(&token), Some(payload.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["field"], "tax_id");

    payload["tax_id"] = json!("12345678909");
    payload["preferred_due_day"] = json!(31);
    let (status, _, body) =
        send(app.router(), "POST", "/admin/tenants", Some(&token), Some(payload.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["field"], "preferred_due_day");

    payload["preferred_due_day"] = json!(5);
    payload["expiry_date"] = json!("9999-12-31");
    let (status, _, body) =
        send(app.router(), "POST", "/admin/tenants", Some(&token), Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["field"], "expiry_date");
}

#[tokio::test]
async fn duplicate_tax_id_conflicts() {
    let app = setup_app(date(2024, 1, 15)).await;
    let token = app.operator_token();

    let (status, _, _) = send(
        app.router(),
        "POST",
        "/admin/tenants",
        Some(&token),
        Some(tenant_payload("12345678909")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, body) = send(
        app.router(),
        "POST",
        "/admin/tenants",
        Some(&token),
        Some(tenant_payload("12345678909")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn operator_endpoints_require_superuser() {
    let app = setup_app(date(2024, 1, 15)).await;
    let t = app.seed_tenant("12345678909", None, true).await;
    app.link_user("owner", t.id, ProfileRole::Owner).await;
    let uri = format!("/admin/tenants/{}", t.id);

    let (status, _, body) = send(app.router(), "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "MISSING_TOKEN");

    let member = app.member_token("owner");
    let (status, _, body) = send(app.router(), "GET", &uri, Some(&member), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_SCOPE");
}

#[tokio::test]
async fn get_tenant_reports_status() {
    let today = date(2024, 1, 15);
    let app = setup_app(today).await;
    let t = app
        .seed_tenant("12345678909", Some(today - Duration::days(2)), true)
        .await;

    let (status, _, body) = send(
        app.router(),
        "GET",
        &format!("/admin/tenants/{}", t.id),
        Some(&app.operator_token()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "EXPIRED");
    assert_eq!(body["days_remaining"], -2);

    let (status, _, body) = send(
        app.router(),
        "GET",
        "/admin/tenants/404",
        Some(&app.operator_token()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "TENANT_NOT_FOUND");
}

#[tokio::test]
async fn charge_extends_and_registers_customer() {
    let app = setup_app(date(2024, 1, 15)).await;
    let t = app
        .seed_tenant("12345678909", Some(date(2024, 1, 10)), true)
        .await;

    let (status, _, body) = send(
        app.router(),
        "POST",
        &format!("/admin/tenants/{}/charge", t.id),
        Some(&app.operator_token()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["previous_expiry"], "2024-01-10");
    assert_eq!(body["expiry_date"], "2024-02-09");
    assert_eq!(body["extension"], "anchor_preserved");
    assert_eq!(body["warnings"], json!([]));

    let charges = app.gateway.charges();
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].amount_cents, 14990);
    assert_eq!(charges[0].due_date, date(2024, 2, 10));
    assert_eq!(
        charges[0].external_reference,
        format!("mensalidade_{}_012024", t.id)
    );

    let stored = app.tenant(t.id).await;
    assert_eq!(stored.expiry_date, Some(date(2024, 2, 9)));
    assert!(stored.gateway_customer_id.is_some());
}

#[tokio::test]
async fn charge_confirmation_webhook_does_not_extend_again() {
    let app = setup_app(date(2024, 1, 15)).await;
    let t = app
        .seed_tenant("12345678909", Some(date(2024, 1, 10)), true)
        .await;

    let (_, _, body) = send(
        app.router(),
        "POST",
        &format!("/admin/tenants/{}/charge", t.id),
        Some(&app.operator_token()),
        None,
    )
    .await;
    let payment_id = body["charge"]["id"].as_str().unwrap().to_string();
    let customer = app.tenant(t.id).await.gateway_customer_id.unwrap();

    let (status, _, body) = send(
        app.router(),
        "POST",
        "/api/webhook/asaas",
        None,
        Some(json!({
            "event": "PAYMENT_RECEIVED",
            "payment": { "id": payment_id, "customer": customer }
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "duplicate");
    assert_eq!(app.tenant(t.id).await.expiry_date, Some(date(2024, 2, 9)));
}

#[tokio::test]
async fn charge_keeps_extension_when_email_fails() {
    let app = setup_app(date(2024, 1, 15)).await;
    // No address to mail the invoice to
    let t = app
        .state
        .db
        .insert_tenant(&NewTenant {
            trade_name: "Despachante Sem Email".to_string(),
            legal_name: None,
            tax_id: "12345678909".to_string(),
            email: None,
            billing_email: None,
            phone: None,
            address: None,
            active: true,
            expiry_date: None,
            monthly_fee_cents: 9990,
            preferred_due_day: 20,
            plan: Plan::Basic,
        })
        .await
        .unwrap();

    let (status, _, body) = send(
        app.router(),
        "POST",
        &format!("/admin/tenants/{}/charge", t.id),
        Some(&app.operator_token()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["extension"], "first_activation");
    assert_eq!(body["warnings"].as_array().unwrap().len(), 1);
    assert_eq!(app.tenant(t.id).await.expiry_date, Some(date(2024, 2, 14)));
}

#[tokio::test]
async fn charge_keeps_extension_when_smtp_relay_is_down() {
    let mut app = setup_app(date(2024, 1, 15)).await;
    let relay = NotifyConfig {
        smtp_host: Some("127.0.0.1".to_string()),
        smtp_port: 1,
        smtp_security: SmtpSecurity::Plain,
        smtp_timeout_secs: 2,
        ..NotifyConfig::default()
    };
    app.state.notifier = Arc::new(SmtpNotifier::from_config(&relay).unwrap());
    let t = app
        .seed_tenant("12345678909", Some(date(2024, 1, 10)), true)
        .await;

    let (status, _, body) = send(
        app.router(),
        "POST",
        &format!("/admin/tenants/{}/charge", t.id),
        Some(&app.operator_token()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let warning = body["warnings"][0].as_str().unwrap();
    assert!(warning.starts_with("invoice email not sent"), "{warning}");
    assert_eq!(app.tenant(t.id).await.expiry_date, Some(date(2024, 2, 9)));
}

#[tokio::test]
async fn charge_gateway_failure_leaves_tenant_unchanged() {
    let app = setup_app_with(
        date(2024, 1, 15),
        SimulatedGateway::rejecting_charges(),
        BillingConfig::default(),
    )
    .await;
    let t = app
        .seed_tenant("12345678909", Some(date(2024, 1, 10)), true)
        .await;

    let (status, _, body) = send(
        app.router(),
        "POST",
        &format!("/admin/tenants/{}/charge", t.id),
        Some(&app.operator_token()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "GATEWAY_ERROR");
    assert_eq!(app.tenant(t.id).await.expiry_date, Some(date(2024, 1, 10)));
}

#[tokio::test]
async fn charge_lifts_suspension_by_default() {
    let app = setup_app(date(2024, 1, 15)).await;
    let t = app
        .seed_tenant("12345678909", Some(date(2024, 1, 10)), false)
        .await;

    let (status, _, body) = send(
        app.router(),
        "POST",
        &format!("/admin/tenants/{}/charge", t.id),
        Some(&app.operator_token()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], true);
    assert!(app.tenant(t.id).await.active);
}

#[tokio::test]
async fn courtesy_uses_configured_default() {
    let today = date(2024, 1, 15);
    let app = setup_app(today).await;
    let lapsed = app
        .seed_tenant("11111111111", Some(today - Duration::days(3)), false)
        .await;
    let current = app
        .seed_tenant("22222222222", Some(date(2024, 1, 20)), true)
        .await;
    let token = app.operator_token();

    let (status, _, body) = send(
        app.router(),
        "POST",
        &format!("/admin/tenants/{}/courtesy", lapsed.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["days"], BillingConfig::default().courtesy_days);
    let stored = app.tenant(lapsed.id).await;
    assert_eq!(
        stored.expiry_date,
        Some(today + Duration::days(BillingConfig::default().courtesy_days))
    );
    // Courtesy never touches the active flag
    assert!(!stored.active);

    let (status, _, body) = send(
        app.router(),
        "POST",
        &format!("/admin/tenants/{}/courtesy", current.id),
        Some(&token),
        Some(json!({ "days": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expiry_date"], "2024-01-30");
}

#[tokio::test]
async fn courtesy_rejects_bad_day_counts() {
    let app = setup_app(date(2024, 1, 15)).await;
    let t = app.seed_tenant("12345678909", None, true).await;

    let (status, _, body) = send(
        app.router(),
        "POST",
        &format!("/admin/tenants/{}/courtesy", t.id),
        Some(&app.operator_token()),
        Some(json!({ "days": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["field"], "days");
    assert_eq!(app.tenant(t.id).await.expiry_date, None);
}

#[tokio::test]
async fn courtesy_rejects_malformed_body() {
    let app = setup_app(date(2024, 1, 15)).await;
    let t = app
        .seed_tenant("12345678909", Some(date(2024, 1, 17)), true)
        .await;

    let (status, _, body) = send(
        app.router(),
        "POST",
        &format!("/admin/tenants/{}/courtesy", t.id),
        Some(&app.operator_token()),
        Some(json!({ "days": "five" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
    assert_eq!(app.tenant(t.id).await.expiry_date, Some(date(2024, 1, 17)));
}

#[tokio::test]
async fn plan_set_at_registration_and_changed() {
    let app = setup_app(date(2024, 1, 15)).await;
    let token = app.operator_token();

    let mut payload = tenant_payload("12345678909");
    payload["plan"] = json!("PREMIUM");
    let (status, _, body) =
        send(app.router(), "POST", "/admin/tenants", Some(&token), Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["plan"], "PREMIUM");
    let id = body["id"].as_i64().unwrap();

    let uri = format!("/admin/tenants/{id}/plan");
    let (status, _, body) =
        send(app.router(), "POST", &uri, Some(&token), Some(json!({ "plan": "gold" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["field"], "plan");

    let (status, _, _) =
        send(app.router(), "POST", &uri, Some(&token), Some(json!({ "plan": "BASIC" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.tenant(id).await.plan(), Plan::Basic);

    let (status, _, _) = send(
        app.router(),
        "POST",
        "/admin/tenants/404/plan",
        Some(&token),
        Some(json!({ "plan": "BASIC" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn gateway_customer_linked_once() {
    let app = setup_app(date(2024, 1, 15)).await;
    let t = app.seed_tenant("12345678909", None, true).await;
    let uri = format!("/admin/tenants/{}/gateway-customer", t.id);
    let token = app.operator_token();

    let (status, _, first) = send(app.router(), "POST", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, _, second) = send(app.router(), "POST", &uri, Some(&token), None).await;

    assert_eq!(first["gateway_customer_id"], second["gateway_customer_id"]);
    assert_eq!(app.gateway.customer_count(), 1);
}

#[tokio::test]
async fn gateway_customer_rejection_surfaces() {
    let app = setup_app_with(
        date(2024, 1, 15),
        SimulatedGateway::rejecting_customers(),
        BillingConfig::default(),
    )
    .await;
    let t = app.seed_tenant("12345678909", None, true).await;

    let (status, _, body) = send(
        app.router(),
        "POST",
        &format!("/admin/tenants/{}/gateway-customer", t.id),
        Some(&app.operator_token()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["details"]["gateway_status"], 400);
    assert!(app.tenant(t.id).await.gateway_customer_id.is_none());
}

#[tokio::test]
async fn suspend_and_reactivate() {
    let app = setup_app(date(2024, 1, 15)).await;
    let t = app.seed_tenant("12345678909", None, true).await;
    let token = app.operator_token();

    let (status, _, body) = send(
        app.router(),
        "POST",
        &format!("/admin/tenants/{}/suspend", t.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], false);
    assert!(!app.tenant(t.id).await.active);

    let (status, _, body) = send(
        app.router(),
        "POST",
        &format!("/admin/tenants/{}/reactivate", t.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], true);

    let (status, _, _) = send(
        app.router(),
        "POST",
        "/admin/tenants/999/suspend",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_profile_links_user() {
    let app = setup_app(date(2024, 1, 15)).await;
    let t = app.seed_tenant("12345678909", None, true).await;
    let token = app.operator_token();

    let (status, _, body) = send(
        app.router(),
        "POST",
        "/admin/profiles",
        Some(&token),
        Some(json!({ "user_id": "joana", "tenant_id": t.id, "role": "owner" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "owner");

    let (status, _, body) = send(
        app.router(),
        "POST",
        "/admin/profiles",
        Some(&token),
        Some(json!({ "user_id": "joana", "tenant_id": t.id, "role": "boss" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["field"], "role");

    let (status, _, _) = send(
        app.router(),
        "POST",
        "/admin/profiles",
        Some(&token),
        Some(json!({ "user_id": "joana", "tenant_id": 999, "role": "staff" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
