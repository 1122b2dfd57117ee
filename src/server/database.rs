use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::{query, query_as, FromRow};
use std::sync::Arc;
use tracing::{error, info};

#[cfg(feature = "sqlite")]
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

#[cfg(feature = "postgres")]
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::billing::Plan;
use crate::config::get_config;
use crate::errors::{DespachoError, DespachoResult};

/// A dispatch agency subscribed to the platform.
///
/// `expiry_date` is the last day of valid access; `None` means unlimited.
/// `active = false` blocks access whatever the dates say.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Tenant {
    pub id: i64,
    pub trade_name: String,
    pub legal_name: Option<String>,
    pub tax_id: String,
    pub email: Option<String>,
    pub billing_email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub active: bool,
    pub expiry_date: Option<NaiveDate>,
    pub monthly_fee_cents: i64,
    pub preferred_due_day: i64,
    pub plan: String,
    pub gateway_customer_id: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Tenant {
    /// Name sent to the gateway: legal name when present, else the trade name.
    pub fn billing_name(&self) -> &str {
        self.legal_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.trade_name)
    }

    pub fn due_day(&self) -> u32 {
        u32::try_from(self.preferred_due_day.clamp(1, 28)).unwrap_or(1)
    }

    /// Unknown plan names count as the lowest tier.
    pub fn plan(&self) -> Plan {
        Plan::parse(&self.plan).unwrap_or_default()
    }
}

/// Fields accepted when registering a tenant.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub trade_name: String,
    pub legal_name: Option<String>,
    pub tax_id: String,
    pub email: Option<String>,
    pub billing_email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub active: bool,
    pub expiry_date: Option<NaiveDate>,
    pub monthly_fee_cents: i64,
    pub preferred_due_day: i64,
    pub plan: Plan,
}

/// A gateway payment already applied to a tenant.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentRecord {
    pub payment_id: String,
    pub processed_at: NaiveDateTime,
}

/// Role of a user inside its tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileRole {
    /// Designated administrator; sent to the billing page when expired
    Owner,
    Staff,
}

impl ProfileRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileRole::Owner => "owner",
            ProfileRole::Staff => "staff",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "owner" => Some(ProfileRole::Owner),
            "staff" => Some(ProfileRole::Staff),
            _ => None,
        }
    }
}

/// Link between an authenticated user and the tenant it works for.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TenantProfile {
    pub user_id: String,
    pub tenant_id: i64,
    pub role: String,
}

impl TenantProfile {
    /// Unknown role strings are treated as staff.
    pub fn role(&self) -> ProfileRole {
        ProfileRole::parse(&self.role).unwrap_or(ProfileRole::Staff)
    }

    pub fn is_owner(&self) -> bool {
        self.role() == ProfileRole::Owner
    }
}

/// Unified database abstraction over SQLite and Postgres.
#[derive(Debug, Clone)]
pub enum Database {
    #[cfg(feature = "sqlite")]
    SQLite(SqlitePool),
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
}

fn db_error(context: &str, e: sqlx::Error) -> DespachoError {
    error!("{context} failed: {e}");
    DespachoError::DatabaseError(e.to_string())
}

/// Unique violations become `Conflict`; everything else goes through [`db_error`].
fn insert_error(context: &str, e: sqlx::Error) -> DespachoError {
    let unique = e
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if unique {
        DespachoError::Conflict("a tenant with this tax id already exists".to_string())
    } else {
        db_error(context, e)
    }
}

const TENANT_COLUMNS: &str = "id, trade_name, legal_name, tax_id, email, billing_email, phone, \
     address, active, expiry_date, monthly_fee_cents, preferred_due_day, plan, \
     gateway_customer_id, created_at";

impl Database {
    /// Initialize the database connection based on configuration.
    pub async fn new() -> DespachoResult<Arc<Self>> {
        let config = get_config()?;
        let db_config = &config.database;

        let url = match db_config.db_type.as_str() {
            "sqlite" => &db_config.sqlite_url,
            "postgres" => &db_config.postgres_url,
            other => {
                return Err(DespachoError::ConfigError(format!(
                    "unsupported database type: {other}"
                )))
            }
        };

        Ok(Arc::new(Self::connect(url).await?))
    }

    /// Connect to an explicit URL; the backend is chosen by its scheme.
    pub async fn connect(url: &str) -> DespachoResult<Self> {
        if url.starts_with("sqlite") {
            Self::connect_sqlite(url).await
        } else if url.starts_with("postgres") {
            Self::connect_postgres(url).await
        } else {
            Err(DespachoError::ConfigError(format!(
                "unsupported database URL: {url}"
            )))
        }
    }

    /// In-memory URLs get a single-connection pool, since every connection
    /// would otherwise see its own empty database.
    #[cfg(feature = "sqlite")]
    async fn connect_sqlite(url: &str) -> DespachoResult<Self> {
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| {
                error!("Failed to connect to SQLite: {e}");
                DespachoError::ServerError(format!("failed to connect to SQLite: {e}"))
            })?;

        Ok(Database::SQLite(pool))
    }

    #[cfg(not(feature = "sqlite"))]
    async fn connect_sqlite(_url: &str) -> DespachoResult<Self> {
        Err(DespachoError::ConfigError(
            "SQLite support not compiled in. Enable the 'sqlite' feature.".to_string(),
        ))
    }

    #[cfg(feature = "postgres")]
    async fn connect_postgres(url: &str) -> DespachoResult<Self> {
        let pool = PgPoolOptions::new().connect(url).await.map_err(|e| {
            error!("Failed to connect to PostgreSQL: {e}");
            DespachoError::ServerError(format!("failed to connect to PostgreSQL: {e}"))
        })?;

        Ok(Database::Postgres(pool))
    }

    #[cfg(not(feature = "postgres"))]
    async fn connect_postgres(_url: &str) -> DespachoResult<Self> {
        Err(DespachoError::ConfigError(
            "PostgreSQL support not compiled in. Enable the 'postgres' feature.".to_string(),
        ))
    }

    pub fn db_type(&self) -> &'static str {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(_) => "sqlite",
            #[cfg(feature = "postgres")]
            Database::Postgres(_) => "postgres",
        }
    }

    /// Create tables if they do not exist yet.
    pub async fn migrate(&self) -> DespachoResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                let statements = [
                    r#"
                    CREATE TABLE IF NOT EXISTS tenants (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        trade_name TEXT NOT NULL,
                        legal_name TEXT,
                        tax_id TEXT NOT NULL UNIQUE,
                        email TEXT,
                        billing_email TEXT,
                        phone TEXT,
                        address TEXT,
                        active BOOLEAN NOT NULL DEFAULT 1,
                        expiry_date DATE,
                        monthly_fee_cents INTEGER NOT NULL DEFAULT 0,
                        preferred_due_day INTEGER NOT NULL DEFAULT 10,
                        plan TEXT NOT NULL DEFAULT 'BASIC',
                        gateway_customer_id TEXT,
                        created_at DATETIME NOT NULL
                    )
                    "#,
                    r#"
                    CREATE TABLE IF NOT EXISTS user_profiles (
                        user_id TEXT PRIMARY KEY,
                        tenant_id INTEGER NOT NULL REFERENCES tenants(id),
                        role TEXT NOT NULL DEFAULT 'staff'
                    )
                    "#,
                    r#"
                    CREATE TABLE IF NOT EXISTS processed_payments (
                        payment_id TEXT PRIMARY KEY,
                        tenant_id INTEGER NOT NULL REFERENCES tenants(id),
                        processed_at DATETIME NOT NULL
                    )
                    "#,
                    "CREATE INDEX IF NOT EXISTS idx_tenants_gateway_customer \
                     ON tenants(gateway_customer_id)",
                ];
                for statement in statements {
                    query(statement)
                        .execute(pool)
                        .await
                        .map_err(|e| db_error("SQLite migrate", e))?;
                }
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                let statements = [
                    r#"
                    CREATE TABLE IF NOT EXISTS tenants (
                        id BIGSERIAL PRIMARY KEY,
                        trade_name TEXT NOT NULL,
                        legal_name TEXT,
                        tax_id TEXT NOT NULL UNIQUE,
                        email TEXT,
                        billing_email TEXT,
                        phone TEXT,
                        address TEXT,
                        active BOOLEAN NOT NULL DEFAULT TRUE,
                        expiry_date DATE,
                        monthly_fee_cents BIGINT NOT NULL DEFAULT 0,
                        preferred_due_day BIGINT NOT NULL DEFAULT 10,
                        plan TEXT NOT NULL DEFAULT 'BASIC',
                        gateway_customer_id TEXT,
                        created_at TIMESTAMP NOT NULL
                    )
                    "#,
                    r#"
                    CREATE TABLE IF NOT EXISTS user_profiles (
                        user_id TEXT PRIMARY KEY,
                        tenant_id BIGINT NOT NULL REFERENCES tenants(id),
                        role TEXT NOT NULL DEFAULT 'staff'
                    )
                    "#,
                    r#"
                    CREATE TABLE IF NOT EXISTS processed_payments (
                        payment_id TEXT PRIMARY KEY,
                        tenant_id BIGINT NOT NULL REFERENCES tenants(id),
                        processed_at TIMESTAMP NOT NULL
                    )
                    "#,
                    "CREATE INDEX IF NOT EXISTS idx_tenants_gateway_customer \
                     ON tenants(gateway_customer_id)",
                ];
                for statement in statements {
                    query(statement)
                        .execute(pool)
                        .await
                        .map_err(|e| db_error("Postgres migrate", e))?;
                }
            }
        }

        info!("Database schema is up to date");
        Ok(())
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> bool {
        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query("SELECT 1").execute(pool).await.map(|_| ()),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query("SELECT 1").execute(pool).await.map(|_| ()),
        };
        result.is_ok()
    }

    /// Insert a tenant and return the stored row.
    pub async fn insert_tenant(&self, tenant: &NewTenant) -> DespachoResult<Tenant> {
        let now = Utc::now().naive_utc();

        let id: i64 = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, (i64,)>(
                r#"
                INSERT INTO tenants (
                    trade_name, legal_name, tax_id, email, billing_email, phone, address,
                    active, expiry_date, monthly_fee_cents, preferred_due_day, plan, created_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                RETURNING id
                "#,
            )
            .bind(&tenant.trade_name)
            .bind(&tenant.legal_name)
            .bind(&tenant.tax_id)
            .bind(&tenant.email)
            .bind(&tenant.billing_email)
            .bind(&tenant.phone)
            .bind(&tenant.address)
            .bind(tenant.active)
            .bind(tenant.expiry_date)
            .bind(tenant.monthly_fee_cents)
            .bind(tenant.preferred_due_day)
            .bind(tenant.plan.as_str())
            .bind(now)
            .fetch_one(pool)
            .await
            .map_err(|e| insert_error("SQLite insert_tenant", e))?
            .0,
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, (i64,)>(
                r#"
                INSERT INTO tenants (
                    trade_name, legal_name, tax_id, email, billing_email, phone, address,
                    active, expiry_date, monthly_fee_cents, preferred_due_day, plan, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                RETURNING id
                "#,
            )
            .bind(&tenant.trade_name)
            .bind(&tenant.legal_name)
            .bind(&tenant.tax_id)
            .bind(&tenant.email)
            .bind(&tenant.billing_email)
            .bind(&tenant.phone)
            .bind(&tenant.address)
            .bind(tenant.active)
            .bind(tenant.expiry_date)
            .bind(tenant.monthly_fee_cents)
            .bind(tenant.preferred_due_day)
            .bind(tenant.plan.as_str())
            .bind(now)
            .fetch_one(pool)
            .await
            .map_err(|e| insert_error("Postgres insert_tenant", e))?
            .0,
        };

        self.get_tenant(id)
            .await?
            .ok_or_else(|| DespachoError::DatabaseError(format!("tenant {id} vanished after insert")))
    }

    /// Fetch a tenant by id.
    pub async fn get_tenant(&self, id: i64) -> DespachoResult<Option<Tenant>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_as::<_, Tenant>(&format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?"))
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| db_error("SQLite get_tenant", e))
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, Tenant>(&format!(
                "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1"
            ))
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| db_error("Postgres get_tenant", e)),
        }
    }

    /// Fetch the tenant linked to a gateway customer id.
    pub async fn get_tenant_by_gateway_customer(
        &self,
        customer_id: &str,
    ) -> DespachoResult<Option<Tenant>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, Tenant>(&format!(
                "SELECT {TENANT_COLUMNS} FROM tenants WHERE gateway_customer_id = ? LIMIT 1"
            ))
            .bind(customer_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| db_error("SQLite get_tenant_by_gateway_customer", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, Tenant>(&format!(
                "SELECT {TENANT_COLUMNS} FROM tenants WHERE gateway_customer_id = $1 LIMIT 1"
            ))
            .bind(customer_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| db_error("Postgres get_tenant_by_gateway_customer", e)),
        }
    }

    /// Persist a new expiry date and active flag.
    ///
    /// Returns `Ok(false)` when no tenant has this id.
    pub async fn update_tenant_billing(
        &self,
        id: i64,
        expiry_date: Option<NaiveDate>,
        active: bool,
    ) -> DespachoResult<bool> {
        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query("UPDATE tenants SET expiry_date = ?, active = ? WHERE id = ?")
                    .bind(expiry_date)
                    .bind(active)
                    .bind(id)
                    .execute(pool)
                    .await
                    .map_err(|e| db_error("SQLite update_tenant_billing", e))?
                    .rows_affected()
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query("UPDATE tenants SET expiry_date = $1, active = $2 WHERE id = $3")
                    .bind(expiry_date)
                    .bind(active)
                    .bind(id)
                    .execute(pool)
                    .await
                    .map_err(|e| db_error("Postgres update_tenant_billing", e))?
                    .rows_affected()
            }
        };

        Ok(rows_affected > 0)
    }

    pub async fn set_gateway_customer_id(&self, id: i64, customer_id: &str) -> DespachoResult<bool> {
        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query("UPDATE tenants SET gateway_customer_id = ? WHERE id = ?")
                    .bind(customer_id)
                    .bind(id)
                    .execute(pool)
                    .await
                    .map_err(|e| db_error("SQLite set_gateway_customer_id", e))?
                    .rows_affected()
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query("UPDATE tenants SET gateway_customer_id = $1 WHERE id = $2")
                    .bind(customer_id)
                    .bind(id)
                    .execute(pool)
                    .await
                    .map_err(|e| db_error("Postgres set_gateway_customer_id", e))?
                    .rows_affected()
            }
        };

        Ok(rows_affected > 0)
    }

    pub async fn set_plan(&self, id: i64, plan: Plan) -> DespachoResult<bool> {
        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query("UPDATE tenants SET plan = ? WHERE id = ?")
                .bind(plan.as_str())
                .bind(id)
                .execute(pool)
                .await
                .map_err(|e| db_error("SQLite set_plan", e))?
                .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query("UPDATE tenants SET plan = $1 WHERE id = $2")
                .bind(plan.as_str())
                .bind(id)
                .execute(pool)
                .await
                .map_err(|e| db_error("Postgres set_plan", e))?
                .rows_affected(),
        };

        Ok(rows_affected > 0)
    }

    pub async fn set_active(&self, id: i64, active: bool) -> DespachoResult<bool> {
        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query("UPDATE tenants SET active = ? WHERE id = ?")
                .bind(active)
                .bind(id)
                .execute(pool)
                .await
                .map_err(|e| db_error("SQLite set_active", e))?
                .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query("UPDATE tenants SET active = $1 WHERE id = $2")
                .bind(active)
                .bind(id)
                .execute(pool)
                .await
                .map_err(|e| db_error("Postgres set_active", e))?
                .rows_affected(),
        };

        Ok(rows_affected > 0)
    }

    /// Record a gateway payment id and apply its extension atomically.
    ///
    /// Returns `Ok(false)` without touching the tenant when the payment id
    /// was already processed.
    pub async fn apply_payment(
        &self,
        tenant_id: i64,
        payment_id: &str,
        expiry_date: NaiveDate,
        active: bool,
    ) -> DespachoResult<bool> {
        let now = Utc::now().naive_utc();

        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                let mut tx = pool
                    .begin()
                    .await
                    .map_err(|e| db_error("SQLite apply_payment", e))?;

                let inserted = query(
                    "INSERT INTO processed_payments (payment_id, tenant_id, processed_at) \
                     VALUES (?, ?, ?) ON CONFLICT(payment_id) DO NOTHING",
                )
                .bind(payment_id)
                .bind(tenant_id)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| db_error("SQLite apply_payment", e))?
                .rows_affected();

                if inserted == 0 {
                    return Ok(false);
                }

                query("UPDATE tenants SET expiry_date = ?, active = ? WHERE id = ?")
                    .bind(expiry_date)
                    .bind(active)
                    .bind(tenant_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| db_error("SQLite apply_payment", e))?;

                tx.commit()
                    .await
                    .map_err(|e| db_error("SQLite apply_payment", e))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                let mut tx = pool
                    .begin()
                    .await
                    .map_err(|e| db_error("Postgres apply_payment", e))?;

                let inserted = query(
                    "INSERT INTO processed_payments (payment_id, tenant_id, processed_at) \
                     VALUES ($1, $2, $3) ON CONFLICT (payment_id) DO NOTHING",
                )
                .bind(payment_id)
                .bind(tenant_id)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| db_error("Postgres apply_payment", e))?
                .rows_affected();

                if inserted == 0 {
                    return Ok(false);
                }

                query("UPDATE tenants SET expiry_date = $1, active = $2 WHERE id = $3")
                    .bind(expiry_date)
                    .bind(active)
                    .bind(tenant_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| db_error("Postgres apply_payment", e))?;

                tx.commit()
                    .await
                    .map_err(|e| db_error("Postgres apply_payment", e))?;
            }
        }

        Ok(true)
    }

    /// Payments applied to a tenant, newest first.
    pub async fn list_payments(&self, tenant_id: i64) -> DespachoResult<Vec<PaymentRecord>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, PaymentRecord>(
                "SELECT payment_id, processed_at FROM processed_payments \
                 WHERE tenant_id = ? ORDER BY processed_at DESC, payment_id",
            )
            .bind(tenant_id)
            .fetch_all(pool)
            .await
            .map_err(|e| db_error("SQLite list_payments", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, PaymentRecord>(
                "SELECT payment_id, processed_at FROM processed_payments \
                 WHERE tenant_id = $1 ORDER BY processed_at DESC, payment_id",
            )
            .bind(tenant_id)
            .fetch_all(pool)
            .await
            .map_err(|e| db_error("Postgres list_payments", e)),
        }
    }

    /// Attach a user to a tenant, replacing any previous link.
    pub async fn upsert_profile(
        &self,
        user_id: &str,
        tenant_id: i64,
        role: ProfileRole,
    ) -> DespachoResult<TenantProfile> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    "INSERT INTO user_profiles (user_id, tenant_id, role) VALUES (?, ?, ?) \
                     ON CONFLICT(user_id) DO UPDATE SET \
                         tenant_id = excluded.tenant_id, \
                         role      = excluded.role",
                )
                .bind(user_id)
                .bind(tenant_id)
                .bind(role.as_str())
                .execute(pool)
                .await
                .map_err(|e| db_error("SQLite upsert_profile", e))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    "INSERT INTO user_profiles (user_id, tenant_id, role) VALUES ($1, $2, $3) \
                     ON CONFLICT (user_id) DO UPDATE SET \
                         tenant_id = EXCLUDED.tenant_id, \
                         role      = EXCLUDED.role",
                )
                .bind(user_id)
                .bind(tenant_id)
                .bind(role.as_str())
                .execute(pool)
                .await
                .map_err(|e| db_error("Postgres upsert_profile", e))?;
            }
        }

        Ok(TenantProfile {
            user_id: user_id.to_string(),
            tenant_id,
            role: role.as_str().to_string(),
        })
    }

    /// Fetch the tenant profile of a user.
    pub async fn get_profile(&self, user_id: &str) -> DespachoResult<Option<TenantProfile>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, TenantProfile>(
                "SELECT user_id, tenant_id, role FROM user_profiles WHERE user_id = ?",
            )
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| db_error("SQLite get_profile", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, TenantProfile>(
                "SELECT user_id, tenant_id, role FROM user_profiles WHERE user_id = $1",
            )
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| db_error("Postgres get_profile", e)),
        }
    }
}
