//! Bridges a rig `CompletionModel` to our `LlmProvider` trait.

use std::time::Duration;

use async_trait::async_trait;
use rig::completion::CompletionModel;
use rig::message::{AssistantContent, Message};

use super::provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role};
use crate::error::LlmError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Wraps any rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    provider: String,
    timeout: Duration,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            provider: "openai".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request_failed(&self, reason: impl Into<String>) -> LlmError {
        LlmError::RequestFailed {
            provider: self.provider.clone(),
            reason: reason.into(),
        }
    }
}

/// A transcript reshaped the way rig wants it: system text as the preamble,
/// the final user turn as the prompt, everything in between as history.
#[derive(Debug, PartialEq, Eq)]
struct PromptParts {
    preamble: Option<String>,
    history: Vec<ChatMessage>,
    prompt: String,
}

fn split_transcript(messages: Vec<ChatMessage>) -> Option<PromptParts> {
    let mut system = Vec::new();
    let mut turns = Vec::new();
    for message in messages {
        match message.role {
            Role::System => system.push(message.content),
            Role::User | Role::Assistant => turns.push(message),
        }
    }

    let last = turns.pop()?;
    if last.role != Role::User {
        return None;
    }

    Some(PromptParts {
        preamble: (!system.is_empty()).then(|| system.join("\n\n")),
        history: turns,
        prompt: last.content,
    })
}

fn to_rig(message: ChatMessage) -> Message {
    match message.role {
        Role::Assistant => Message::assistant(message.content),
        Role::User | Role::System => Message::user(message.content),
    }
}

fn token_count(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let parts = split_transcript(request.messages)
            .ok_or_else(|| self.request_failed("transcript must end with a user message"))?;

        let mut builder = self
            .model
            .completion_request(Message::user(parts.prompt))
            .messages(parts.history.into_iter().map(to_rig).collect());
        if let Some(preamble) = parts.preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }

        let response = tokio::time::timeout(self.timeout, builder.send())
            .await
            .map_err(|_| LlmError::Timeout {
                provider: self.provider.clone(),
                timeout: self.timeout,
            })?
            .map_err(|e| {
                tracing::error!(model = %self.model_name, error = %e, "Completion request failed");
                self.request_failed(e.to_string())
            })?;

        let content = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        let input_tokens = token_count(response.usage.input_tokens);
        let output_tokens = token_count(response.usage.output_tokens);
        tracing::debug!(
            model = %self.model_name,
            input_tokens,
            output_tokens,
            "Completion received"
        );

        Ok(CompletionResponse {
            content,
            input_tokens,
            output_tokens,
        })
    }
}
