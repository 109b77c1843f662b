use crate::llm::openai_compat::OpenAICompatClient;
use crate::llm::provider::LLMProvider;
use crate::llm::types::{ChatRequest, ChatResponse, LLMError, ModelInfo, ProviderConfig};
use futures::future::BoxFuture;
use tracing::{debug, warn};

const CUSTOM_CONTEXT_TOKENS: u32 = 8_192;

/// Any self-hosted or third-party OpenAI-compatible endpoint.
///
/// The base URL has no default and must come from configuration.
pub struct CustomProvider {
    client: OpenAICompatClient,
    fallback_check_model: Option<String>,
}

impl CustomProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, LLMError> {
        Ok(Self {
            client: OpenAICompatClient::new(config, "Custom", None)?,
            fallback_check_model: config.default_model.clone().filter(|m| !m.is_empty()),
        })
    }
}

impl LLMProvider for CustomProvider {
    fn chat(&self, request: ChatRequest) -> BoxFuture<'_, Result<ChatResponse, LLMError>> {
        Box::pin(async move { self.client.chat(&request).await })
    }

    fn list_models(&self) -> BoxFuture<'_, Result<Vec<ModelInfo>, LLMError>> {
        Box::pin(async move {
            match self.client.fetch_model_ids().await {
                Ok(ids) => Ok(ids
                    .into_iter()
                    .map(|id| ModelInfo {
                        name: id.clone(),
                        id,
                        max_tokens: CUSTOM_CONTEXT_TOKENS,
                        supports_functions: false,
                    })
                    .collect()),
                Err(e) => {
                    warn!(
                        "Model listing unavailable at {}: {}",
                        self.client.transport().base_url(),
                        e
                    );
                    Ok(Vec::new())
                }
            }
        })
    }

    fn validate_api_key(&self) -> BoxFuture<'_, Result<bool, LLMError>> {
        Box::pin(async move {
            match self.client.check_key_via_models().await {
                // Some servers do not implement /models at all
                Err(e) if e.http_status == Some(404) => match &self.fallback_check_model {
                    Some(model) => {
                        debug!("No /models endpoint, probing with a chat request to {}", model);
                        self.client.check_key_via_chat(model).await
                    }
                    None => Err(e),
                },
                other => other,
            }
        })
    }

    fn provider_name(&self) -> &'static str {
        "Custom"
    }
}
