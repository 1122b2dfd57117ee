//! Persistence tests against an in-memory SQLite database.

use chrono::NaiveDate;
use despacho::billing::Plan;
use despacho::errors::DespachoError;
use despacho::server::{Database, NewTenant, ProfileRole};

async fn setup_db() -> Database {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("failed to create database");
    db.migrate().await.expect("failed to run migrations");
    db
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn new_tenant(tax_id: &str) -> NewTenant {
    NewTenant {
        trade_name: "Despachante Centro".to_string(),
        legal_name: Some("Centro Documentacao Veicular Ltda".to_string()),
        tax_id: tax_id.to_string(),
        email: Some("contato@centro.test".to_string()),
        billing_email: None,
        phone: Some("11 99999-0000".to_string()),
        address: None,
        active: true,
        expiry_date: Some(date(2024, 1, 10)),
        monthly_fee_cents: 14990,
        preferred_due_day: 10,
        plan: Plan::Medium,
    }
}

#[tokio::test]
async fn migrate_is_repeatable() {
    let db = setup_db().await;
    db.migrate().await.unwrap();
    assert!(db.ping().await);
    assert_eq!(db.db_type(), "sqlite");
}

#[tokio::test]
async fn tenant_round_trip() {
    let db = setup_db().await;
    let created = db.insert_tenant(&new_tenant("12345678909")).await.unwrap();

    let loaded = db.get_tenant(created.id).await.unwrap().unwrap();
    assert_eq!(loaded.trade_name, "Despachante Centro");
    assert_eq!(loaded.expiry_date, Some(date(2024, 1, 10)));
    assert!(loaded.active);
    assert_eq!(loaded.billing_name(), "Centro Documentacao Veicular Ltda");
    assert!(loaded.gateway_customer_id.is_none());

    assert!(db.get_tenant(created.id + 100).await.unwrap().is_none());
}

#[tokio::test]
async fn unlimited_expiry_stored_as_null() {
    let db = setup_db().await;
    let mut tenant = new_tenant("12345678909");
    tenant.expiry_date = None;

    let created = db.insert_tenant(&tenant).await.unwrap();
    let loaded = db.get_tenant(created.id).await.unwrap().unwrap();
    assert_eq!(loaded.expiry_date, None);
}

#[tokio::test]
async fn duplicate_tax_id_is_conflict() {
    let db = setup_db().await;
    db.insert_tenant(&new_tenant("12345678909")).await.unwrap();

    let err = db
        .insert_tenant(&new_tenant("12345678909"))
        .await
        .unwrap_err();
    assert!(matches!(err, DespachoError::Conflict(_)));
}

#[tokio::test]
async fn lookup_by_gateway_customer() {
    let db = setup_db().await;
    let tenant = db.insert_tenant(&new_tenant("12345678909")).await.unwrap();

    assert!(db.set_gateway_customer_id(tenant.id, "cus_42").await.unwrap());
    let found = db
        .get_tenant_by_gateway_customer("cus_42")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, tenant.id);

    assert!(db
        .get_tenant_by_gateway_customer("cus_other")
        .await
        .unwrap()
        .is_none());
    assert!(!db.set_gateway_customer_id(999, "cus_x").await.unwrap());
}

#[tokio::test]
async fn billing_updates_report_missing_rows() {
    let db = setup_db().await;
    let tenant = db.insert_tenant(&new_tenant("12345678909")).await.unwrap();

    assert!(db
        .update_tenant_billing(tenant.id, Some(date(2024, 2, 9)), false)
        .await
        .unwrap());
    let loaded = db.get_tenant(tenant.id).await.unwrap().unwrap();
    assert_eq!(loaded.expiry_date, Some(date(2024, 2, 9)));
    assert!(!loaded.active);

    assert!(db.set_active(tenant.id, true).await.unwrap());
    assert!(db.get_tenant(tenant.id).await.unwrap().unwrap().active);

    assert!(!db.update_tenant_billing(999, None, true).await.unwrap());
    assert!(!db.set_active(999, false).await.unwrap());
}

#[tokio::test]
async fn payment_applied_once() {
    let db = setup_db().await;
    let tenant = db.insert_tenant(&new_tenant("12345678909")).await.unwrap();

    assert!(db
        .apply_payment(tenant.id, "pay_1", date(2024, 2, 9), true)
        .await
        .unwrap());
    let payments = db.list_payments(tenant.id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].payment_id, "pay_1");

    // A replay leaves the stored date alone
    assert!(!db
        .apply_payment(tenant.id, "pay_1", date(2024, 3, 10), true)
        .await
        .unwrap());
    let loaded = db.get_tenant(tenant.id).await.unwrap().unwrap();
    assert_eq!(loaded.expiry_date, Some(date(2024, 2, 9)));

    assert_eq!(db.list_payments(tenant.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn payments_listed_per_tenant() {
    let db = setup_db().await;
    let first = db.insert_tenant(&new_tenant("12345678909")).await.unwrap();
    let second = db.insert_tenant(&new_tenant("98765432100")).await.unwrap();

    for id in ["pay_a", "pay_b"] {
        db.apply_payment(first.id, id, date(2024, 2, 9), true)
            .await
            .unwrap();
    }
    db.apply_payment(second.id, "pay_c", date(2024, 2, 9), true)
        .await
        .unwrap();

    let mut ids: Vec<String> = db
        .list_payments(first.id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.payment_id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["pay_a", "pay_b"]);
    assert!(db.list_payments(999).await.unwrap().is_empty());
}

#[tokio::test]
async fn plan_stored_and_updated() {
    let db = setup_db().await;
    let tenant = db.insert_tenant(&new_tenant("12345678909")).await.unwrap();
    assert_eq!(tenant.plan(), Plan::Medium);

    assert!(db.set_plan(tenant.id, Plan::Premium).await.unwrap());
    let loaded = db.get_tenant(tenant.id).await.unwrap().unwrap();
    assert_eq!(loaded.plan(), Plan::Premium);
    assert_eq!(loaded.plan, "PREMIUM");

    assert!(!db.set_plan(999, Plan::Basic).await.unwrap());
}

#[tokio::test]
async fn profile_upsert_replaces_link() {
    let db = setup_db().await;
    let first = db.insert_tenant(&new_tenant("12345678909")).await.unwrap();
    let second = db.insert_tenant(&new_tenant("98765432100")).await.unwrap();

    db.upsert_profile("ana", first.id, ProfileRole::Owner)
        .await
        .unwrap();
    let profile = db.get_profile("ana").await.unwrap().unwrap();
    assert_eq!(profile.tenant_id, first.id);
    assert!(profile.is_owner());

    db.upsert_profile("ana", second.id, ProfileRole::Staff)
        .await
        .unwrap();
    let profile = db.get_profile("ana").await.unwrap().unwrap();
    assert_eq!(profile.tenant_id, second.id);
    assert_eq!(profile.role(), ProfileRole::Staff);

    assert!(db.get_profile("nobody").await.unwrap().is_none());
}
