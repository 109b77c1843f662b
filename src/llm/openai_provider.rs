use crate::llm::openai_compat::OpenAICompatClient;
use crate::llm::provider::LLMProvider;
use crate::llm::types::{ChatRequest, ChatResponse, LLMError, ModelInfo, ProviderConfig};
use futures::future::BoxFuture;
use tracing::warn;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat completions provider.
pub struct OpenAIProvider {
    client: OpenAICompatClient,
}

impl OpenAIProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, LLMError> {
        Ok(Self {
            client: OpenAICompatClient::new(config, "OpenAI", Some(OPENAI_BASE_URL))?,
        })
    }

    pub fn fallback_models() -> Vec<ModelInfo> {
        vec![
            ModelInfo::new("gpt-4-turbo-preview", "GPT-4 Turbo", 128_000, true),
            ModelInfo::new("gpt-4", "GPT-4", 8_192, true),
            ModelInfo::new("gpt-4-32k", "GPT-4 32K", 32_768, true),
            ModelInfo::new("gpt-3.5-turbo", "GPT-3.5 Turbo", 16_385, true),
            ModelInfo::new("gpt-3.5-turbo-16k", "GPT-3.5 Turbo 16K", 16_385, true),
        ]
    }

    /// Context window guessed from the model id.
    pub fn max_tokens_for(model_id: &str) -> u32 {
        if model_id.contains("32k") {
            32_768
        } else if model_id.contains("16k") {
            16_385
        } else if model_id.contains("turbo-preview") || model_id.contains("gpt-4-turbo") {
            128_000
        } else {
            8_192
        }
    }

    async fn discover_models(&self) -> Vec<ModelInfo> {
        match self.client.fetch_model_ids().await {
            Ok(ids) => {
                let models: Vec<ModelInfo> = ids
                    .into_iter()
                    .filter(|id| id.contains("gpt"))
                    .map(|id| ModelInfo {
                        max_tokens: Self::max_tokens_for(&id),
                        name: id.clone(),
                        id,
                        supports_functions: true,
                    })
                    .collect();
                if models.is_empty() {
                    Self::fallback_models()
                } else {
                    models
                }
            }
            Err(e) => {
                warn!("OpenAI model discovery failed, using built-in catalog: {}", e);
                Self::fallback_models()
            }
        }
    }
}

impl LLMProvider for OpenAIProvider {
    fn chat(&self, request: ChatRequest) -> BoxFuture<'_, Result<ChatResponse, LLMError>> {
        Box::pin(async move { self.client.chat(&request).await })
    }

    fn list_models(&self) -> BoxFuture<'_, Result<Vec<ModelInfo>, LLMError>> {
        Box::pin(async move { Ok(self.discover_models().await) })
    }

    fn validate_api_key(&self) -> BoxFuture<'_, Result<bool, LLMError>> {
        Box::pin(async move { self.client.check_key_via_models().await })
    }

    fn provider_name(&self) -> &'static str {
        "OpenAI"
    }
}
