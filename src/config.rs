//! Configuration system for despacho.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `DESPACHO_SERVER_HOST` / `DESPACHO_SERVER_PORT` - Bind address
//! - `DESPACHO_DATABASE_TYPE` - `sqlite` or `postgres`
//! - `DESPACHO_DATABASE_URL` - Connection URL (routed by its scheme)
//! - `DESPACHO_LOGGING_ENABLED` / `DESPACHO_LOG_LEVEL` - Logging
//! - `DESPACHO_JWT_SECRET` / `DESPACHO_JWT_ISSUER` / `DESPACHO_JWT_AUDIENCE`
//! - `DESPACHO_TOKEN_EXPIRATION_SECS` - Lifetime of issued tokens
//! - `DESPACHO_CYCLE_DAYS` / `DESPACHO_GRACE_DAYS` - Billing cycle and grace window
//! - `DESPACHO_UTC_OFFSET_MINUTES` - Operating timezone offset used for "today"
//! - `DESPACHO_PAYMENT_LIFTS_SUSPENSION` - Whether a payment re-enables a suspended tenant
//! - `DESPACHO_GATEWAY_URL` / `DESPACHO_GATEWAY_API_KEY` (falls back to `ASAAS_API_KEY`)
//! - `DESPACHO_WEBHOOK_TOKEN` - Shared token expected on inbound webhooks
//! - `DESPACHO_FROM_ADDRESS` - Sender of billing emails
//! - `DESPACHO_SMTP_HOST` / `DESPACHO_SMTP_PORT` - SMTP relay; unset logs emails instead
//! - `DESPACHO_SMTP_USERNAME` / `DESPACHO_SMTP_PASSWORD` - SMTP credentials
//! - `DESPACHO_SMTP_SECURITY` - `starttls` (default), `tls` or `plain`

use config::Config;
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;

use crate::billing::BillingPolicy;
use crate::clock::SystemClock;
use crate::errors::{DespachoError, DespachoResult};

/// Global configuration singleton.
static CONFIG: OnceLock<DespachoConfig> = OnceLock::new();

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DespachoConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub billing: BillingConfig,
    pub gateway: GatewayConfig,
    pub notify: NotifyConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database type: "sqlite" or "postgres"
    pub db_type: String,
    pub sqlite_url: String,
    pub postgres_url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            sqlite_url: "sqlite://despacho.db?mode=rwc".to_string(),
            postgres_url: "postgres://localhost/despacho".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
        }
    }
}

/// JWT configuration for resolving request principals.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWT secret key (use `env:VAR_NAME` to read from environment)
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    /// Token expiration time in seconds (default: 8 hours)
    pub token_expiration_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_issuer: "despacho".to_string(),
            jwt_audience: "despacho-app".to_string(),
            token_expiration_secs: 8 * 3600,
        }
    }
}

/// Billing rules.
///
/// `cycle_days` and `grace_days` feed the expiry calculator; every call site
/// reads them from here.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// Days of access granted by one paid cycle
    pub cycle_days: i64,
    /// Days a lapsed tenant keeps its billing anchor before renewal restarts from today
    pub grace_days: i64,
    /// Upper bound (inclusive) of days remaining reported as "expiring soon"
    pub expiring_soon_days: i64,
    /// Default length of a manual courtesy grant
    pub courtesy_days: i64,
    /// Offset of the operating timezone from UTC, in minutes
    pub utc_offset_minutes: i32,
    /// Whether a successful payment re-enables an administratively suspended tenant
    pub payment_lifts_suspension: bool,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            cycle_days: 30,
            grace_days: 60,
            expiring_soon_days: 5,
            courtesy_days: 20,
            utc_offset_minutes: -180,
            payment_lifts_suspension: true,
        }
    }
}

impl BillingConfig {
    /// Calendar rules used by the expiry calculator and the access gate.
    pub fn policy(&self) -> BillingPolicy {
        BillingPolicy {
            cycle_days: self.cycle_days,
            grace_days: self.grace_days,
            expiring_soon_days: self.expiring_soon_days,
        }
    }

    /// Wall clock in the operating timezone.
    pub fn clock(&self) -> DespachoResult<SystemClock> {
        SystemClock::with_offset_minutes(self.utc_offset_minutes)
    }
}

/// Payment gateway configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    /// Token the gateway sends in `asaas-access-token`; unchecked when unset
    pub webhook_token: Option<String>,
    /// Postal code sent for customers registered without one
    pub default_postal_code: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sandbox.asaas.com/api/v3".to_string(),
            api_key: String::new(),
            webhook_token: None,
            default_postal_code: "74000-000".to_string(),
        }
    }
}

/// Connection security for the SMTP relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Plain connection upgraded with STARTTLS
    #[default]
    Starttls,
    /// TLS from the first byte (usually port 465)
    Tls,
    /// No encryption; local relays only
    Plain,
}

/// Outgoing billing notification settings.
///
/// Without `smtp_host` invoices are only written to the log.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub from_address: String,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_security: SmtpSecurity,
    /// Seconds before an SMTP exchange is abandoned
    pub smtp_timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            from_address: "financeiro@despacho.local".to_string(),
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_security: SmtpSecurity::default(),
            smtp_timeout_secs: 30,
        }
    }
}

impl NotifyConfig {
    /// Configured SMTP host, ignoring blank values.
    pub fn smtp_host(&self) -> Option<&str> {
        self.smtp_host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
    }
}

fn config_err(e: config::ConfigError) -> DespachoError {
    DespachoError::ConfigError(e.to_string())
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

impl DespachoConfig {
    /// Load configuration from file and environment without caching it.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. `config.toml` file (optional)
    /// 3. Environment variables
    pub fn load() -> DespachoResult<Self> {
        let defaults = DespachoConfig::default();

        let builder = Config::builder()
            .set_default("server.host", defaults.server.host.clone())
            .map_err(config_err)?
            .set_default("server.port", defaults.server.port as i64)
            .map_err(config_err)?
            .set_default("database.db_type", defaults.database.db_type.clone())
            .map_err(config_err)?
            .set_default("database.sqlite_url", defaults.database.sqlite_url.clone())
            .map_err(config_err)?
            .set_default("database.postgres_url", defaults.database.postgres_url.clone())
            .map_err(config_err)?
            .set_default("logging.enabled", defaults.logging.enabled)
            .map_err(config_err)?
            .set_default("logging.level", defaults.logging.level.clone())
            .map_err(config_err)?
            .set_default("billing.cycle_days", defaults.billing.cycle_days)
            .map_err(config_err)?
            .set_default("billing.grace_days", defaults.billing.grace_days)
            .map_err(config_err)?
            .set_default("billing.expiring_soon_days", defaults.billing.expiring_soon_days)
            .map_err(config_err)?
            .set_default("billing.courtesy_days", defaults.billing.courtesy_days)
            .map_err(config_err)?
            .set_default(
                "billing.utc_offset_minutes",
                defaults.billing.utc_offset_minutes as i64,
            )
            .map_err(config_err)?
            .set_default(
                "billing.payment_lifts_suspension",
                defaults.billing.payment_lifts_suspension,
            )
            .map_err(config_err)?
            // Load from config.toml (optional)
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables
            .set_override_option("server.host", env::var("DESPACHO_SERVER_HOST").ok())
            .map_err(config_err)?
            .set_override_option("server.port", env_parsed::<i64>("DESPACHO_SERVER_PORT"))
            .map_err(config_err)?
            .set_override_option("database.db_type", env::var("DESPACHO_DATABASE_TYPE").ok())
            .map_err(config_err)?
            .set_override_option(
                "database.sqlite_url",
                env::var("DESPACHO_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("sqlite")),
            )
            .map_err(config_err)?
            .set_override_option(
                "database.postgres_url",
                env::var("DESPACHO_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("postgres")),
            )
            .map_err(config_err)?
            .set_override_option(
                "logging.enabled",
                env_parsed::<bool>("DESPACHO_LOGGING_ENABLED"),
            )
            .map_err(config_err)?
            .set_override_option("logging.level", env::var("DESPACHO_LOG_LEVEL").ok())
            .map_err(config_err)?
            .set_override_option("auth.jwt_secret", env::var("DESPACHO_JWT_SECRET").ok())
            .map_err(config_err)?
            .set_override_option("auth.jwt_issuer", env::var("DESPACHO_JWT_ISSUER").ok())
            .map_err(config_err)?
            .set_override_option("auth.jwt_audience", env::var("DESPACHO_JWT_AUDIENCE").ok())
            .map_err(config_err)?
            .set_override_option(
                "auth.token_expiration_secs",
                env_parsed::<i64>("DESPACHO_TOKEN_EXPIRATION_SECS"),
            )
            .map_err(config_err)?
            .set_override_option("billing.cycle_days", env_parsed::<i64>("DESPACHO_CYCLE_DAYS"))
            .map_err(config_err)?
            .set_override_option("billing.grace_days", env_parsed::<i64>("DESPACHO_GRACE_DAYS"))
            .map_err(config_err)?
            .set_override_option(
                "billing.utc_offset_minutes",
                env_parsed::<i64>("DESPACHO_UTC_OFFSET_MINUTES"),
            )
            .map_err(config_err)?
            .set_override_option(
                "billing.payment_lifts_suspension",
                env_parsed::<bool>("DESPACHO_PAYMENT_LIFTS_SUSPENSION"),
            )
            .map_err(config_err)?
            .set_override_option("gateway.base_url", env::var("DESPACHO_GATEWAY_URL").ok())
            .map_err(config_err)?
            .set_override_option(
                "gateway.api_key",
                env::var("DESPACHO_GATEWAY_API_KEY")
                    .or_else(|_| env::var("ASAAS_API_KEY"))
                    .ok(),
            )
            .map_err(config_err)?
            .set_override_option(
                "gateway.webhook_token",
                env::var("DESPACHO_WEBHOOK_TOKEN").ok(),
            )
            .map_err(config_err)?
            .set_override_option("notify.from_address", env::var("DESPACHO_FROM_ADDRESS").ok())
            .map_err(config_err)?
            .set_override_option("notify.smtp_host", env::var("DESPACHO_SMTP_HOST").ok())
            .map_err(config_err)?
            .set_override_option("notify.smtp_port", env_parsed::<i64>("DESPACHO_SMTP_PORT"))
            .map_err(config_err)?
            .set_override_option("notify.smtp_username", env::var("DESPACHO_SMTP_USERNAME").ok())
            .map_err(config_err)?
            .set_override_option("notify.smtp_password", env::var("DESPACHO_SMTP_PASSWORD").ok())
            .map_err(config_err)?
            .set_override_option("notify.smtp_security", env::var("DESPACHO_SMTP_SECURITY").ok())
            .map_err(config_err)?;

        let settings = builder
            .build()
            .map_err(|e| DespachoError::ConfigError(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| DespachoError::ConfigError(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> DespachoResult<()> {
        if self.server.port == 0 {
            return Err(DespachoError::ConfigError(
                "server.port must be greater than 0".to_string(),
            ));
        }

        match self.database.db_type.as_str() {
            "sqlite" | "postgres" => {}
            other => {
                return Err(DespachoError::ConfigError(format!(
                    "database.db_type must be 'sqlite' or 'postgres', got '{other}'"
                )));
            }
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(DespachoError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        if self.auth.jwt_secret.is_empty() {
            return Err(DespachoError::ConfigError(
                "auth.jwt_secret is required".to_string(),
            ));
        }

        if self.billing.cycle_days <= 0 {
            return Err(DespachoError::ConfigError(
                "billing.cycle_days must be greater than 0".to_string(),
            ));
        }
        if self.billing.grace_days < 0 {
            return Err(DespachoError::ConfigError(
                "billing.grace_days cannot be negative".to_string(),
            ));
        }
        if self.billing.expiring_soon_days < 0 {
            return Err(DespachoError::ConfigError(
                "billing.expiring_soon_days cannot be negative".to_string(),
            ));
        }
        if self.billing.courtesy_days <= 0 {
            return Err(DespachoError::ConfigError(
                "billing.courtesy_days must be greater than 0".to_string(),
            ));
        }
        if self.notify.smtp_host().is_some() {
            if self.notify.smtp_port == 0 {
                return Err(DespachoError::ConfigError(
                    "notify.smtp_port must be greater than 0".to_string(),
                ));
            }
            if self.notify.smtp_username.is_some() != self.notify.smtp_password.is_some() {
                return Err(DespachoError::ConfigError(
                    "notify.smtp_username and notify.smtp_password must be set together"
                        .to_string(),
                ));
            }
        }

        if self.billing.utc_offset_minutes.abs() > 14 * 60 {
            return Err(DespachoError::ConfigError(format!(
                "billing.utc_offset_minutes must be within +/-840, got {}",
                self.billing.utc_offset_minutes
            )));
        }

        Ok(())
    }
}

/// Get the global configuration.
///
/// This loads the configuration on first access and caches it.
/// Returns an error if configuration loading or validation fails.
pub fn get_config() -> DespachoResult<&'static DespachoConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = DespachoConfig::load()?;
    config.validate()?;

    // Another thread may have won the race; either value is valid.
    let _ = CONFIG.set(config);

    CONFIG
        .get()
        .ok_or_else(|| DespachoError::ConfigError("configuration was not initialised".to_string()))
}

/// Initialize configuration explicitly.
///
/// Call this early in your application to catch configuration errors.
pub fn init_config() -> DespachoResult<&'static DespachoConfig> {
    get_config()
}
