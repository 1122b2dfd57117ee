//! Shared setup for the HTTP integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use despacho::billing::Plan;
use despacho::clock::FixedClock;
use despacho::config::{AuthConfig, BillingConfig};
use despacho::gateway::SimulatedGateway;
use despacho::notify::LogNotifier;
use despacho::server::{
    build_router, AppState, AuthState, Database, NewTenant, ProfileRole, Tenant,
};
use serde_json::{json, Value};
use tower::ServiceExt;

pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<SimulatedGateway>,
}

impl TestApp {
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn operator_token(&self) -> String {
        self.state
            .auth
            .validator
            .create_token("ops@despacho.test", &["superuser"])
            .unwrap()
    }

    pub fn member_token(&self, user_id: &str) -> String {
        self.state
            .auth
            .validator
            .create_token(user_id, &[])
            .unwrap()
    }

    /// Insert a tenant straight into the database.
    pub async fn seed_tenant(
        &self,
        tax_id: &str,
        expiry_date: Option<NaiveDate>,
        active: bool,
    ) -> Tenant {
        self.state
            .db
            .insert_tenant(&NewTenant {
                trade_name: format!("Despachante {tax_id}"),
                legal_name: None,
                tax_id: tax_id.to_string(),
                email: Some(format!("contato{tax_id}@despachante.test")),
                billing_email: None,
                phone: None,
                address: None,
                active,
                expiry_date,
                monthly_fee_cents: 14990,
                preferred_due_day: 10,
                plan: Plan::Basic,
            })
            .await
            .unwrap()
    }

    pub async fn link_user(&self, user_id: &str, tenant_id: i64, role: ProfileRole) {
        self.state
            .db
            .upsert_profile(user_id, tenant_id, role)
            .await
            .unwrap();
    }

    pub async fn tenant(&self, id: i64) -> Tenant {
        self.state.db.get_tenant(id).await.unwrap().unwrap()
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn test_auth() -> AuthState {
    AuthState::from_config(&AuthConfig {
        jwt_secret: "integration-test-secret".to_string(),
        ..AuthConfig::default()
    })
    .unwrap()
}

pub async fn setup_app(today: NaiveDate) -> TestApp {
    setup_app_with(today, SimulatedGateway::new(), BillingConfig::default()).await
}

/// App over an in-memory database, pinned to `today`.
pub async fn setup_app_with(
    today: NaiveDate,
    gateway: SimulatedGateway,
    billing: BillingConfig,
) -> TestApp {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("failed to create database");
    db.migrate().await.expect("failed to run migrations");

    let gateway = Arc::new(gateway);
    let state = AppState::new(
        Arc::new(db),
        gateway.clone(),
        Arc::new(LogNotifier::new("cobranca@despacho.test")),
        Arc::new(FixedClock(today)),
        test_auth(),
    )
    .with_billing(billing);

    TestApp { state, gateway }
}

/// Send a request and return status, headers and the JSON body (`{}` when empty).
pub async fn send(
    app: Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
    let body_bytes = body
        .map(|v| serde_json::to_vec(&v).unwrap())
        .unwrap_or_default();

    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = builder.body(Body::from(body_bytes)).unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));

    (status, headers, body)
}
