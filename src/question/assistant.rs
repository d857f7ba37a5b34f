//! LLM-backed next-question service.

use std::sync::Arc;

use async_trait::async_trait;

use super::prompts::{EMPTY_REPLY_FALLBACK, SYSTEM_PROMPT, build_user_message, missing_topics};
use super::{NextQuestion, NextQuestionRequest, NextQuestionService};
use crate::error::{IntakeError, LlmError};
use crate::intake::catalog::StepCatalog;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

const MAX_TOKENS: u32 = 180;
const TEMPERATURE: f32 = 0.4;

/// Asks the language model for the next assistant line.
///
/// With no provider configured every call fails with `NotConfigured`, which
/// the engine turns into the fallback message.
pub struct AssistantService {
    provider: Option<Arc<dyn LlmProvider>>,
    topic_ids: Vec<String>,
}

impl AssistantService {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, catalog: &StepCatalog) -> Self {
        Self {
            provider,
            topic_ids: catalog.ids().map(String::from).collect(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Raw reply text for `request`.
    pub async fn reply(&self, request: &NextQuestionRequest) -> Result<String, LlmError> {
        let provider = self.provider.as_ref().ok_or_else(|| LlmError::NotConfigured {
            provider: "openai".to_string(),
        })?;

        let missing = missing_topics(&self.topic_ids, &request.answers);
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_user_message(request, &missing)),
        ];
        let completion = CompletionRequest::new(messages)
            .with_max_tokens(MAX_TOKENS)
            .with_temperature(TEMPERATURE);

        let response = provider.complete(completion).await?;
        let reply = response.content.trim();
        if reply.is_empty() {
            Ok(EMPTY_REPLY_FALLBACK.to_string())
        } else {
            Ok(reply.to_string())
        }
    }
}

#[async_trait]
impl NextQuestionService for AssistantService {
    async fn next_question(
        &self,
        request: &NextQuestionRequest,
    ) -> Result<NextQuestion, IntakeError> {
        match self.reply(request).await {
            Ok(reply) => Ok(NextQuestion::from_reply(reply)),
            Err(e) => {
                tracing::warn!(step = ?request.step_id, error = %e, "Next-question call failed");
                Err(IntakeError::UpstreamUnavailable {
                    reason: e.to_string(),
                })
            }
        }
    }
}
