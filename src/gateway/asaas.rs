use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{digits_only, Charge, ChargeRequest, CustomerInfo, GatewayError, PaymentGateway};
use crate::config::GatewayConfig;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewCustomer<'a> {
    name: &'a str,
    cpf_cnpj: String,
    email: &'a str,
    mobile_phone: Option<&'a str>,
    address: Option<&'a str>,
    address_number: &'a str,
    postal_code: &'a str,
    external_reference: String,
}

#[derive(Debug, Deserialize)]
struct CustomerCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CustomerList {
    #[serde(default)]
    data: Vec<CustomerCreated>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewPayment<'a> {
    customer: &'a str,
    billing_type: &'a str,
    value: f64,
    due_date: String,
    description: &'a str,
    postal_service: bool,
    external_reference: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentCreated {
    id: String,
    invoice_url: String,
    bank_slip_url: Option<String>,
    due_date: Option<NaiveDate>,
}

/// Asaas REST client (`/customers`, `/payments`).
#[derive(Clone)]
pub struct AsaasGateway {
    client: Client,
    base_url: String,
    api_key: String,
    default_postal_code: String,
}

impl AsaasGateway {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            default_postal_code: config.default_postal_code.clone(),
        }
    }

    fn ensure_configured(&self) -> Result<(), GatewayError> {
        if self.api_key.is_empty() {
            return Err(GatewayError::NotConfigured);
        }
        Ok(())
    }

    async fn find_customer_by_tax_id(&self, tax_id: &str) -> Result<Option<String>, GatewayError> {
        let response = self
            .client
            .get(format!("{}/customers", self.base_url))
            .query(&[("cpfCnpj", tax_id)])
            .header("access_token", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected { status, body });
        }

        let list: CustomerList = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        Ok(list.data.into_iter().next().map(|c| c.id))
    }
}

impl std::fmt::Debug for AsaasGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsaasGateway")
            .field("base_url", &self.base_url)
            .field("configured", &!self.api_key.is_empty())
            .finish()
    }
}

#[async_trait]
impl PaymentGateway for AsaasGateway {
    async fn register_customer(&self, customer: &CustomerInfo) -> Result<String, GatewayError> {
        self.ensure_configured()?;

        let tax_id = digits_only(&customer.tax_id);
        let payload = NewCustomer {
            name: &customer.name,
            cpf_cnpj: tax_id.clone(),
            email: &customer.email,
            mobile_phone: customer.phone.as_deref(),
            address: customer.address.as_deref(),
            address_number: "S/N",
            postal_code: &self.default_postal_code,
            external_reference: customer.tenant_id.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/customers", self.base_url))
            .header("access_token", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let created: CustomerCreated = response
                .json()
                .await
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
            info!(
                "Registered tenant {} as gateway customer {}",
                customer.tenant_id, created.id
            );
            return Ok(created.id);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && body.contains("already exists") {
            info!(
                "Gateway customer for tenant {} already exists, looking it up",
                customer.tenant_id
            );
            if let Some(id) = self.find_customer_by_tax_id(&tax_id).await? {
                return Ok(id);
            }
        }

        error!(
            "Gateway rejected customer registration for tenant {}: {}",
            customer.tenant_id, body
        );
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    async fn create_charge(&self, charge: &ChargeRequest) -> Result<Charge, GatewayError> {
        self.ensure_configured()?;

        let payload = NewPayment {
            customer: &charge.customer_id,
            billing_type: "BOLETO",
            value: charge.amount_cents as f64 / 100.0,
            due_date: charge.due_date.format("%Y-%m-%d").to_string(),
            description: &charge.description,
            postal_service: false,
            external_reference: &charge.external_reference,
        };

        let response = self
            .client
            .post(format!("{}/payments", self.base_url))
            .header("access_token", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(
                "Gateway rejected charge {}: {}",
                charge.external_reference, body
            );
            return Err(GatewayError::Rejected { status, body });
        }

        let created: PaymentCreated = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        Ok(Charge {
            id: created.id,
            invoice_url: created.invoice_url,
            bank_slip_url: created.bank_slip_url,
            due_date: created.due_date.unwrap_or(charge.due_date),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_gateway_refuses_calls() {
        let gateway = AsaasGateway::new(&GatewayConfig::default());
        let customer = CustomerInfo {
            tenant_id: 1,
            name: "Despachante Centro".to_string(),
            tax_id: "12.345.678/0001-90".to_string(),
            email: "contato@centro.test".to_string(),
            phone: None,
            address: None,
        };

        let result = gateway.register_customer(&customer).await;
        assert!(matches!(result, Err(GatewayError::NotConfigured)));
    }

    #[test]
    fn payment_payload_uses_gateway_field_names() {
        let payload = NewPayment {
            customer: "cus_1",
            billing_type: "BOLETO",
            value: 149.9,
            due_date: "2024-02-10".to_string(),
            description: "Mensalidade",
            postal_service: false,
            external_reference: "mensalidade_1_022024",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["billingType"], "BOLETO");
        assert_eq!(json["dueDate"], "2024-02-10");
        assert_eq!(json["externalReference"], "mensalidade_1_022024");
    }
}
