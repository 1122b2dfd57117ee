//! Payment gateway integration.
//!
//! The billing flows only need two calls: register (or look up) the tenant
//! as a gateway customer and issue a charge. [`AsaasGateway`] talks to the
//! real API; [`SimulatedGateway`] keeps everything in memory.

mod asaas;
mod sim;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

pub use asaas::AsaasGateway;
pub use sim::SimulatedGateway;

/// Data needed to register a tenant with the gateway.
#[derive(Debug, Clone)]
pub struct CustomerInfo {
    pub tenant_id: i64,
    /// Legal name, falling back to the trade name when empty
    pub name: String,
    /// CPF/CNPJ, punctuation allowed
    pub tax_id: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// A charge to issue against an existing gateway customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub customer_id: String,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub description: String,
    pub external_reference: String,
}

/// A charge accepted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Charge {
    pub id: String,
    /// Page where the customer pays (boleto or Pix)
    pub invoice_url: String,
    pub bank_slip_url: Option<String>,
    pub due_date: NaiveDate,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway API key is not configured")]
    NotConfigured,

    #[error("gateway rejected the request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to reach the payment gateway: {0}")]
    Network(String),

    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Network(err.to_string())
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Register the customer, or return the id of the customer already
    /// registered under the same tax id.
    async fn register_customer(&self, customer: &CustomerInfo) -> Result<String, GatewayError>;

    async fn create_charge(&self, charge: &ChargeRequest) -> Result<Charge, GatewayError>;
}

/// Strip everything but ASCII digits (CPF/CNPJ punctuation, phone masks).
pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}
