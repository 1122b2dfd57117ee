// src/server/mod.rs

//! Server-side components for despacho.
//!
//! This module contains:
//! - `database`  → DB abstraction over SQLite/Postgres
//! - `handlers`  → Shared state, health and tenant self-service endpoints
//! - `admin`     → Operator API (tenants, charges, courtesy, suspension)
//! - `webhook`   → Payment gateway notifications
//! - `renewal`   → Billing actions shared by the endpoints above
//! - `gate`      → Access gate middleware
//! - `auth`      → JWT principals and extractors
//! - `logging`   → Request logging and billing audit events
//! - `routes`    → Router builder

pub mod admin;
pub mod api_error;
pub mod auth;
pub mod database;
pub mod gate;
pub mod handlers;
pub mod logging;
pub mod renewal;
pub mod routes;
pub mod webhook;

// Convenient re-exports so callers can do `despacho::server::X`
// instead of digging into submodules.

pub use api_error::{ApiError, ErrorCode};
pub use auth::{AuthFailure, AuthState, Claims, JwtValidator, Operator, Principal, TenantMember};
pub use database::{Database, NewTenant, PaymentRecord, ProfileRole, Tenant, TenantProfile};
pub use gate::{
    access_gate_middleware, evaluate, evaluate_plan, require_plan, Block, GateDecision,
};
pub use handlers::AppState;
pub use renewal::Renewal;
pub use routes::build_router;
pub use webhook::{WebhookResponse, WebhookStatus};
