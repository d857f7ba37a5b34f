//! HTTP client for a remote lead submission endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{LeadPayload, LeadReceipt, LeadSubmitter};
use crate::error::IntakeError;
use crate::question::ErrorBody;

pub struct HttpLeadSubmitter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpLeadSubmitter {
    /// `endpoint` is the full URL, e.g. `https://site/api/submit`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, IntakeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IntakeError::DeliveryFailed {
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl LeadSubmitter for HttpLeadSubmitter {
    async fn submit(&self, payload: &LeadPayload) -> Result<LeadReceipt, IntakeError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| IntakeError::DeliveryFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            return Err(IntakeError::ValidationFailed {
                missing: payload.missing_contact_fields(),
            });
        }
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.message)
                .unwrap_or_else(|_| "Erro ao enviar ficha.".to_string());
            return Err(IntakeError::DeliveryFailed {
                reason: format!("HTTP {status}: {message}"),
            });
        }

        response
            .json()
            .await
            .map_err(|e| IntakeError::DeliveryFailed {
                reason: format!("invalid receipt body: {e}"),
            })
    }
}
