use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{digits_only, Charge, ChargeRequest, CustomerInfo, GatewayError, PaymentGateway};

#[derive(Debug, Default)]
struct SimState {
    /// Key: tax id digits, value: customer id
    customers: HashMap<String, String>,
    charges: Vec<ChargeRequest>,
    reject_customers: bool,
    reject_charges: bool,
}

/// In-memory gateway for tests and local runs without gateway credentials.
#[derive(Debug, Default)]
pub struct SimulatedGateway {
    state: Mutex<SimState>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway that refuses every customer registration.
    pub fn rejecting_customers() -> Self {
        let gateway = Self::new();
        if let Ok(mut state) = gateway.state.lock() {
            state.reject_customers = true;
        }
        gateway
    }

    /// Gateway that refuses every charge.
    pub fn rejecting_charges() -> Self {
        let gateway = Self::new();
        if let Ok(mut state) = gateway.state.lock() {
            state.reject_charges = true;
        }
        gateway
    }

    /// Charges issued so far, oldest first.
    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.state
            .lock()
            .map(|s| s.charges.clone())
            .unwrap_or_default()
    }

    pub fn customer_count(&self) -> usize {
        self.state.lock().map(|s| s.customers.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SimState>, GatewayError> {
        self.state
            .lock()
            .map_err(|_| GatewayError::Network("simulated gateway lock poisoned".to_string()))
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn register_customer(&self, customer: &CustomerInfo) -> Result<String, GatewayError> {
        let mut state = self.lock()?;
        if state.reject_customers {
            return Err(GatewayError::Rejected {
                status: 400,
                body: "invalid cpfCnpj".to_string(),
            });
        }

        let key = digits_only(&customer.tax_id);
        let next_id = format!("cus_sim_{:06}", state.customers.len() + 1);
        Ok(state.customers.entry(key).or_insert(next_id).clone())
    }

    async fn create_charge(&self, charge: &ChargeRequest) -> Result<Charge, GatewayError> {
        let mut state = self.lock()?;
        if state.reject_charges {
            return Err(GatewayError::Rejected {
                status: 400,
                body: "charge refused".to_string(),
            });
        }

        state.charges.push(charge.clone());
        let id = format!("pay_sim_{:06}", state.charges.len());

        Ok(Charge {
            invoice_url: format!("https://sandbox.invalid/i/{id}"),
            bank_slip_url: Some(format!("https://sandbox.invalid/b/{id}")),
            due_date: charge.due_date,
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn customer(tax_id: &str) -> CustomerInfo {
        CustomerInfo {
            tenant_id: 1,
            name: "Despachante Centro".to_string(),
            tax_id: tax_id.to_string(),
            email: "contato@centro.test".to_string(),
            phone: None,
            address: None,
        }
    }

    #[tokio::test]
    async fn same_tax_id_maps_to_same_customer() {
        let gateway = SimulatedGateway::new();
        let a = gateway
            .register_customer(&customer("12.345.678/0001-90"))
            .await
            .unwrap();
        let b = gateway
            .register_customer(&customer("12345678000190"))
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(gateway.customer_count(), 1);
    }

    #[tokio::test]
    async fn charges_are_recorded() {
        let gateway = SimulatedGateway::new();
        let request = ChargeRequest {
            customer_id: "cus_sim_000001".to_string(),
            amount_cents: 10000,
            due_date: NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
            description: "Mensalidade".to_string(),
            external_reference: "mensalidade_1_012024".to_string(),
        };

        let charge = gateway.create_charge(&request).await.unwrap();
        assert_eq!(charge.due_date, request.due_date);
        assert_eq!(gateway.charges(), vec![request]);
    }

    #[tokio::test]
    async fn rejecting_gateway_fails() {
        let gateway = SimulatedGateway::rejecting_customers();
        assert!(gateway.register_customer(&customer("1")).await.is_err());
    }
}
