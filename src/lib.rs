//! Despacho - subscription validity and billing reconciliation for
//! multi-tenant dispatch agency back-offices.
//!
//! # Features
//!
//! - `server` - HTTP service (handlers, database, access gate). Enabled by default.
//! - `sqlite` - SQLite database backend. Enabled by default.
//! - `postgres` - PostgreSQL database backend.
//!
//! # Example
//!
//! ```toml
//! # Billing rules and gateway client only
//! despacho-billing = { version = "0.1", default-features = false }
//!
//! # Server with PostgreSQL
//! despacho-billing = { version = "0.1", features = ["server", "postgres"] }
//! ```

// Core modules (always available)
pub mod billing;
pub mod clock;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod notify;
pub mod validation;

// Server-related modules (requires "server" feature)
#[cfg(feature = "server")]
#[path = "server/mod.rs"]
pub mod server;
