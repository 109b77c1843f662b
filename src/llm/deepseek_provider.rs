use crate::llm::openai_compat::OpenAICompatClient;
use crate::llm::provider::LLMProvider;
use crate::llm::types::{ChatRequest, ChatResponse, LLMError, ModelInfo, ProviderConfig};
use futures::future::BoxFuture;
use tracing::warn;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";

const DEEPSEEK_CONTEXT_TOKENS: u32 = 32_768;

/// DeepSeek, served over the OpenAI-compatible API.
pub struct DeepSeekProvider {
    client: OpenAICompatClient,
}

impl DeepSeekProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, LLMError> {
        Ok(Self {
            client: OpenAICompatClient::new(config, "DeepSeek", Some(DEEPSEEK_BASE_URL))?,
        })
    }

    pub fn fallback_models() -> Vec<ModelInfo> {
        vec![
            ModelInfo::new("deepseek-chat", "DeepSeek Chat", DEEPSEEK_CONTEXT_TOKENS, true),
            ModelInfo::new("deepseek-coder", "DeepSeek Coder", DEEPSEEK_CONTEXT_TOKENS, true),
        ]
    }
}

impl LLMProvider for DeepSeekProvider {
    fn chat(&self, request: ChatRequest) -> BoxFuture<'_, Result<ChatResponse, LLMError>> {
        Box::pin(async move { self.client.chat(&request).await })
    }

    fn list_models(&self) -> BoxFuture<'_, Result<Vec<ModelInfo>, LLMError>> {
        Box::pin(async move {
            match self.client.fetch_model_ids().await {
                Ok(ids) if !ids.is_empty() => Ok(ids
                    .into_iter()
                    .map(|id| ModelInfo {
                        name: id.clone(),
                        id,
                        max_tokens: DEEPSEEK_CONTEXT_TOKENS,
                        supports_functions: true,
                    })
                    .collect()),
                Ok(_) => Ok(Self::fallback_models()),
                Err(e) => {
                    warn!("DeepSeek model discovery failed, using built-in catalog: {}", e);
                    Ok(Self::fallback_models())
                }
            }
        })
    }

    fn validate_api_key(&self) -> BoxFuture<'_, Result<bool, LLMError>> {
        Box::pin(async move { self.client.check_key_via_models().await })
    }

    fn provider_name(&self) -> &'static str {
        "DeepSeek"
    }
}
