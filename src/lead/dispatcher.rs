//! Server-side lead delivery: spreadsheet webhook plus optional reviewer email.

use std::time::Duration;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use super::{LeadPayload, LeadReceipt, LeadSubmitter};
use crate::config::SmtpConfig;
use crate::error::IntakeError;

const STUB_MESSAGE: &str =
    "Stub ativo: defina SHEETS_WEBHOOK_URL no ambiente para enviar ao Google Sheets.";

/// The lead reached the spreadsheet but the reviewer email did not go out.
pub const EMAIL_SKIPPED_MESSAGE: &str =
    "Ficha enviada para a Paloma revisar. O aviso por e-mail falhou e sera reenviado manualmente.";

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Preencha nome, e-mail e WhatsApp.")]
    MissingContact { missing: Vec<&'static str> },

    #[error("Erro ao enviar para Sheets")]
    Webhook { detail: String },

    #[error("Falha ao enviar e-mail para a revisora.")]
    Email { reason: String },
}

impl From<DispatchError> for IntakeError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::MissingContact { missing } => IntakeError::ValidationFailed { missing },
            DispatchError::Webhook { detail } => IntakeError::DeliveryFailed {
                reason: format!("webhook: {detail}"),
            },
            DispatchError::Email { reason } => IntakeError::DeliveryFailed {
                reason: format!("email: {reason}"),
            },
        }
    }
}

/// Sends the reviewer notification over SMTP.
#[derive(Debug, Clone)]
pub struct LeadMailer {
    config: SmtpConfig,
}

impl LeadMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Runs the blocking SMTP exchange off the async runtime.
    pub async fn send(&self, payload: &LeadPayload) -> Result<(), DispatchError> {
        let (subject, body) = render_email(payload);
        let mailer = self.clone();
        tokio::task::spawn_blocking(move || mailer.send_blocking(&subject, &body))
            .await
            .map_err(|e| DispatchError::Email {
                reason: format!("mail task failed: {e}"),
            })?
    }

    fn send_blocking(&self, subject: &str, body: &str) -> Result<(), DispatchError> {
        let email = Message::builder()
            .from(self.config.from_address.parse().map_err(|e| DispatchError::Email {
                reason: format!("Invalid from address: {e}"),
            })?)
            .to(self.config.to_address.parse().map_err(|e| DispatchError::Email {
                reason: format!("Invalid to address: {e}"),
            })?)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| DispatchError::Email {
                reason: format!("Failed to build email: {e}"),
            })?;

        let creds = Credentials::new(self.config.username.clone(), self.config.password.clone());
        let transport = SmtpTransport::relay(&self.config.host)
            .map_err(|e| DispatchError::Email {
                reason: format!("SMTP relay error: {e}"),
            })?
            .port(self.config.port)
            .credentials(creds)
            .build();

        transport.send(&email).map_err(|e| DispatchError::Email {
            reason: format!("SMTP send failed: {e}"),
        })?;

        tracing::info!(to = %self.config.to_address, "Lead email sent");
        Ok(())
    }
}

/// Subject and plain-text body of the reviewer email.
pub fn render_email(payload: &LeadPayload) -> (String, String) {
    let contact = &payload.contact;
    let mut subject = format!("Nova ficha: {}", contact.name.trim());
    if payload.risk_flag {
        subject.push_str(" [RISCO]");
    }

    let mut body = String::new();
    body.push_str(&format!("Nome: {}\n", contact.name));
    body.push_str(&format!("E-mail: {}\n", contact.email));
    body.push_str(&format!("WhatsApp: {}\n", contact.phone));
    body.push_str(&format!("Plano: {}\n", contact.plan_choice));
    body.push_str(&format!(
        "Flag de risco: {}\n",
        if payload.risk_flag { "SIM" } else { "nao" }
    ));
    if let Some(at) = payload.meta.submitted_at {
        body.push_str(&format!("Enviado em: {}\n", at.to_rfc3339()));
    }

    body.push_str("\nRespostas:\n");
    for (key, value) in payload.answers.iter() {
        body.push_str(&format!("- {key}: {value}\n"));
    }

    body.push_str("\nResumo:\n");
    for line in payload.summary.lines() {
        body.push_str(&format!("- {line}\n"));
    }

    (subject, body)
}

/// Delivers leads to whichever channels are configured.
pub struct LeadDispatcher {
    client: reqwest::Client,
    webhook_url: Option<String>,
    mailer: Option<LeadMailer>,
}

impl LeadDispatcher {
    pub fn new(
        webhook_url: Option<String>,
        mailer: Option<LeadMailer>,
        timeout: Duration,
    ) -> Result<Self, IntakeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IntakeError::DeliveryFailed {
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            webhook_url,
            mailer,
        })
    }

    /// Whether any real delivery channel is configured.
    pub fn is_stub(&self) -> bool {
        self.webhook_url.is_none() && self.mailer.is_none()
    }

    /// Validate and deliver. With no channel configured, answers with a
    /// stub receipt echoing the contact and answers.
    pub async fn dispatch(&self, payload: &LeadPayload) -> Result<LeadReceipt, DispatchError> {
        let missing = payload.missing_contact_fields();
        if !missing.is_empty() {
            tracing::debug!(?missing, "Lead rejected: contact incomplete");
            return Err(DispatchError::MissingContact { missing });
        }

        if self.is_stub() {
            tracing::info!("No lead channel configured, returning stub receipt");
            return Ok(LeadReceipt {
                message: STUB_MESSAGE.to_string(),
                payload_preview: Some(serde_json::json!({
                    "contact": payload.contact,
                    "answers": payload.answers,
                })),
            });
        }

        let recorded = match self.webhook_url {
            Some(ref url) => {
                self.post_webhook(url, payload).await?;
                true
            }
            None => false,
        };

        if let Some(ref mailer) = self.mailer {
            if let Err(e) = mailer.send(payload).await {
                if !recorded {
                    tracing::warn!(error = ?e, "Lead email failed");
                    return Err(e);
                }
                // The spreadsheet already has the lead; a retry would duplicate it.
                tracing::warn!(error = ?e, "Lead recorded but reviewer email failed");
                return Ok(LeadReceipt {
                    message: EMAIL_SKIPPED_MESSAGE.to_string(),
                    payload_preview: None,
                });
            }
        }

        tracing::info!(risk = payload.risk_flag, "Lead delivered");
        Ok(LeadReceipt::delivered())
    }

    async fn post_webhook(&self, url: &str, payload: &LeadPayload) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| DispatchError::Webhook {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(%status, detail = %detail, "Sheets webhook rejected lead");
            return Err(DispatchError::Webhook { detail });
        }
        Ok(())
    }
}

#[async_trait]
impl LeadSubmitter for LeadDispatcher {
    async fn submit(&self, payload: &LeadPayload) -> Result<LeadReceipt, IntakeError> {
        self.dispatch(payload).await.map_err(IntakeError::from)
    }
}
