//! Next-question service — decides what the assistant says after an answer.
//!
//! The engine only sees the `NextQuestionService` trait. Two
//! implementations exist: an HTTP client for a remote `/api/chat`
//! endpoint, and the LLM-backed service that endpoint runs in-process.

pub mod assistant;
pub mod http;
pub mod prompts;

pub use assistant::AssistantService;
pub use http::HttpNextQuestionService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IntakeError;
use crate::intake::model::{AnswerSet, Message};

/// Request sent to the service after each accepted answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextQuestionRequest {
    #[serde(alias = "user")]
    pub user_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(default, alias = "question", skip_serializing_if = "Option::is_none")]
    pub current_prompt: Option<String>,
    #[serde(default)]
    pub answers: AnswerSet,
    #[serde(default)]
    pub risk_flag: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transcript: Vec<Message>,
}

/// Wire response of the service.
///
/// `needs_more_detail` is optional; older servers only send `reply`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextQuestionReply {
    pub reply: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_more_detail: Option<bool>,
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

/// What the engine acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextQuestion {
    pub reply: String,
    /// `true` means re-ask the current step instead of advancing.
    pub needs_more_detail: bool,
}

impl NextQuestion {
    /// Build from a bare reply using the question-mark heuristic.
    pub fn from_reply(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        let needs_more_detail = asks_for_more_detail(&reply);
        Self {
            reply,
            needs_more_detail,
        }
    }
}

impl From<NextQuestionReply> for NextQuestion {
    fn from(wire: NextQuestionReply) -> Self {
        match wire.needs_more_detail {
            Some(needs_more_detail) => Self {
                reply: wire.reply,
                needs_more_detail,
            },
            None => Self::from_reply(wire.reply),
        }
    }
}

/// A reply containing `?` anywhere is treated as a clarifying re-ask.
///
/// Fragile: a rhetorical question stalls progress. Kept for parity with
/// replies that carry no structured signal.
pub fn asks_for_more_detail(reply: &str) -> bool {
    reply.contains('?')
}

#[async_trait]
pub trait NextQuestionService: Send + Sync {
    /// Returns `IntakeError::UpstreamUnavailable` on any network, status or
    /// parse failure.
    async fn next_question(&self, request: &NextQuestionRequest)
    -> Result<NextQuestion, IntakeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_mark_anywhere_requests_detail() {
        assert!(asks_for_more_detail("Pode detalhar a frequência?"));
        assert!(asks_for_more_detail("Entendi. E o sono? Conte mais."));
        assert!(!asks_for_more_detail("Obrigado, anotei."));
    }

    #[test]
    fn structured_flag_overrides_heuristic() {
        let wire = NextQuestionReply {
            reply: "Sabia que isso e comum?".into(),
            needs_more_detail: Some(false),
        };
        assert!(!NextQuestion::from(wire).needs_more_detail);

        let wire = NextQuestionReply {
            reply: "Anotado.".into(),
            needs_more_detail: Some(true),
        };
        assert!(NextQuestion::from(wire).needs_more_detail);
    }

    #[test]
    fn missing_flag_falls_back_to_heuristic() {
        let wire: NextQuestionReply =
            serde_json::from_str(r#"{"reply": "Pode detalhar a frequência?"}"#).unwrap();
        assert!(NextQuestion::from(wire).needs_more_detail);
    }

    #[test]
    fn request_accepts_browser_field_names() {
        let request: NextQuestionRequest = serde_json::from_str(
            r#"{"user": "treino 3x", "stepId": "availability", "question": "Dias?", "answers": {"goal": "forca"}, "riskFlag": true}"#,
        )
        .unwrap();
        assert_eq!(request.user_text, "treino 3x");
        assert_eq!(request.step_id.as_deref(), Some("availability"));
        assert_eq!(request.current_prompt.as_deref(), Some("Dias?"));
        assert_eq!(request.answers.get("goal"), Some("forca"));
        assert!(request.risk_flag);
        assert!(request.transcript.is_empty());
    }

    #[test]
    fn request_serializes_camel_case() {
        let request = NextQuestionRequest {
            user_text: "x".into(),
            step_id: Some("goal".into()),
            current_prompt: None,
            answers: AnswerSet::new(),
            risk_flag: false,
            transcript: vec![Message::user("x")],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["userText"], "x");
        assert_eq!(json["stepId"], "goal");
        assert!(json.get("currentPrompt").is_none());
        assert_eq!(json["transcript"][0]["sender"], "user");
    }
}
