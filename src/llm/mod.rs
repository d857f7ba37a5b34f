//! LLM integration.
//!
//! A single backend today: OpenAI, via rig-core. `RigAdapter` bridges rig's
//! `CompletionModel` to the `LlmProvider` trait the next-question service
//! depends on.

pub mod provider;
mod rig_adapter;

pub use provider::*;
pub use rig_adapter::RigAdapter;

use std::sync::Arc;
use std::time::Duration;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::config::OpenAiConfig;
use crate::error::LlmError;

/// Create an LLM provider from configuration.
pub fn create_provider(
    config: &OpenAiConfig,
    timeout: Duration,
) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "openai".to_string(),
                reason: format!("Failed to create OpenAI client: {}", e),
            }
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using OpenAI (model: {})", config.model);
    Ok(Arc::new(
        RigAdapter::new(model, &config.model)
            .with_provider("openai")
            .with_timeout(timeout),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_provider_keeps_model_name() {
        // The key is only checked when a request is made.
        let config = OpenAiConfig {
            api_key: secrecy::SecretString::from("sk-test"),
            model: "gpt-4o-mini".to_string(),
        };
        let provider = create_provider(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(provider.model_name(), "gpt-4o-mini");
    }
}
