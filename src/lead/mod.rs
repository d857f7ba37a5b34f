//! Lead submission — the finished contact + answers bundle handed to a
//! human reviewer.
//!
//! `LeadSubmitter` is what the engine calls. `HttpLeadSubmitter` posts to a
//! remote `/api/submit`; `LeadDispatcher` is what that endpoint runs and can
//! also be used in-process.

pub mod dispatcher;
pub mod http;

pub use dispatcher::{DispatchError, LeadDispatcher, LeadMailer};
pub use http::HttpLeadSubmitter;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IntakeError;
use crate::intake::model::{AnswerSet, ContactDraft, ConversationState};
use crate::intake::summary::{self, SummaryView};

pub const LEAD_SOURCE: &str = "landing-chat";
pub const LEAD_ETA: &str = "24h uteis";

/// Shown after a successful delivery.
pub const DELIVERED_MESSAGE: &str = "Ficha enviada para a Paloma revisar.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadMeta {
    pub source: String,
    pub eta: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Default for LeadMeta {
    fn default() -> Self {
        Self {
            source: LEAD_SOURCE.to_string(),
            eta: LEAD_ETA.to_string(),
            submitted_at: None,
        }
    }
}

/// Request body of the lead submission service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPayload {
    #[serde(default)]
    pub contact: ContactDraft,
    #[serde(default)]
    pub answers: AnswerSet,
    #[serde(default)]
    pub summary: SummaryView,
    #[serde(default)]
    pub risk_flag: bool,
    #[serde(default)]
    pub meta: LeadMeta,
}

impl LeadPayload {
    /// Bundle the state for delivery, stamped with the current time.
    pub fn from_state(state: &ConversationState) -> Self {
        Self {
            contact: state.contact.clone(),
            answers: state.answers.clone(),
            summary: summary::project(&state.answers),
            risk_flag: state.risk_flag,
            meta: LeadMeta {
                submitted_at: Some(Utc::now()),
                ..LeadMeta::default()
            },
        }
    }

    /// Contact fields the receiving side insists on. Consent is checked
    /// before sending, not here.
    pub fn missing_contact_fields(&self) -> Vec<&'static str> {
        self.contact
            .missing_fields()
            .into_iter()
            .filter(|f| matches!(*f, "name" | "email" | "phone"))
            .collect()
    }
}

/// Successful response of the lead submission service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadReceipt {
    pub message: String,
    /// Echo of what would have been sent when no webhook is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_preview: Option<serde_json::Value>,
}

impl LeadReceipt {
    pub fn delivered() -> Self {
        Self {
            message: DELIVERED_MESSAGE.to_string(),
            payload_preview: None,
        }
    }
}

#[async_trait]
pub trait LeadSubmitter: Send + Sync {
    /// Deliver `payload`. No retries; a failure leaves the caller to retry.
    async fn submit(&self, payload: &LeadPayload) -> Result<LeadReceipt, IntakeError>;
}
