//! Billing notifications sent to tenants.
//!
//! [`SmtpNotifier`] delivers invoices through an SMTP relay; [`LogNotifier`]
//! only writes them to the log and is used when no relay is configured.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::info;

use crate::config::{NotifyConfig, SmtpSecurity};
use crate::errors::{DespachoError, DespachoResult};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("tenant {0} has no billing or contact email")]
    NoRecipient(i64),

    #[error("failed to deliver notification: {0}")]
    Delivery(String),
}

/// Invoice email content.
#[derive(Debug, Clone)]
pub struct InvoiceNotice {
    pub tenant_id: i64,
    pub tenant_name: String,
    /// Resolved with [`invoice_recipient`]
    pub recipient: Option<String>,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub invoice_url: String,
}

/// Billing email if set, else the main contact email.
pub fn invoice_recipient(billing_email: Option<&str>, email: Option<&str>) -> Option<String> {
    [billing_email, email]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|addr| !addr.is_empty())
        .map(str::to_string)
}

#[async_trait]
pub trait BillingNotifier: Send + Sync {
    async fn send_invoice(&self, notice: &InvoiceNotice) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of sending mail.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    from_address: String,
}

impl LogNotifier {
    pub fn new(from_address: impl Into<String>) -> Self {
        Self {
            from_address: from_address.into(),
        }
    }
}

#[async_trait]
impl BillingNotifier for LogNotifier {
    async fn send_invoice(&self, notice: &InvoiceNotice) -> Result<(), NotifyError> {
        let recipient = notice
            .recipient
            .as_deref()
            .ok_or(NotifyError::NoRecipient(notice.tenant_id))?;

        info!(
            from = %self.from_address,
            to = %recipient,
            tenant_id = notice.tenant_id,
            due_date = %notice.due_date,
            amount_cents = notice.amount_cents,
            invoice_url = %notice.invoice_url,
            "Invoice email for {}",
            notice.tenant_name
        );
        Ok(())
    }
}

/// Sends invoice emails through an SMTP relay.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    relay: String,
}

impl SmtpNotifier {
    pub fn from_config(config: &NotifyConfig) -> DespachoResult<Self> {
        let host = config.smtp_host().ok_or_else(|| {
            DespachoError::ConfigError("notify.smtp_host is required for SMTP".to_string())
        })?;
        let from = config.from_address.parse::<Mailbox>().map_err(|e| {
            DespachoError::ConfigError(format!(
                "notify.from_address '{}' is not a valid address: {e}",
                config.from_address
            ))
        })?;

        let builder = match config.smtp_security {
            SmtpSecurity::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| DespachoError::ConfigError(format!("SMTP relay {host}: {e}")))?,
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| DespachoError::ConfigError(format!("SMTP relay {host}: {e}")))?,
            SmtpSecurity::Plain => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        };
        let mut builder = builder
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(config.smtp_timeout_secs)));
        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            relay: format!("{host}:{}", config.smtp_port),
        })
    }

    fn build_message(&self, notice: &InvoiceNotice, recipient: &str) -> Result<Message, NotifyError> {
        let to = recipient.parse::<Mailbox>().map_err(|e| {
            NotifyError::Delivery(format!("invalid recipient '{recipient}': {e}"))
        })?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(format!("Fatura da mensalidade - {}", notice.tenant_name))
            .header(ContentType::TEXT_PLAIN)
            .body(invoice_body(notice))
            .map_err(|e| NotifyError::Delivery(e.to_string()))
    }
}

impl std::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("from", &self.from.to_string())
            .field("relay", &self.relay)
            .finish()
    }
}

#[async_trait]
impl BillingNotifier for SmtpNotifier {
    async fn send_invoice(&self, notice: &InvoiceNotice) -> Result<(), NotifyError> {
        let recipient = notice
            .recipient
            .as_deref()
            .ok_or(NotifyError::NoRecipient(notice.tenant_id))?;
        let message = self.build_message(notice, recipient)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Delivery(format!("{}: {e}", self.relay)))?;

        info!(
            to = %recipient,
            tenant_id = notice.tenant_id,
            "Invoice email sent for {}",
            notice.tenant_name
        );
        Ok(())
    }
}

/// SMTP notifier when a relay is configured, log-only otherwise.
pub fn notifier_from_config(config: &NotifyConfig) -> DespachoResult<Arc<dyn BillingNotifier>> {
    if config.smtp_host().is_some() {
        Ok(Arc::new(SmtpNotifier::from_config(config)?))
    } else {
        Ok(Arc::new(LogNotifier::new(config.from_address.clone())))
    }
}

/// `14990` -> `R$ 149,90`
fn format_brl(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}R$ {},{:02}", cents / 100, cents % 100)
}

fn invoice_body(notice: &InvoiceNotice) -> String {
    format!(
        "Olá, {}.\n\n\
         A fatura da sua mensalidade está disponível.\n\n\
         Valor: {}\n\
         Vencimento: {}\n\
         Pagamento: {}\n\n\
         O acesso é liberado automaticamente após a confirmação do pagamento.\n",
        notice.tenant_name,
        format_brl(notice.amount_cents),
        notice.due_date.format("%d/%m/%Y"),
        notice.invoice_url
    )
}
