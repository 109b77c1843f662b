use crate::llm::openai_compat::OpenAICompatClient;
use crate::llm::provider::LLMProvider;
use crate::llm::types::{ChatRequest, ChatResponse, LLMError, ModelInfo, ProviderConfig};
use futures::future::BoxFuture;

pub const BYTEDANCE_BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";

const KEY_CHECK_MODEL: &str = "doubao-lite-4k";

/// Bytedance Volcano Ark (Doubao models).
pub struct BytedanceProvider {
    client: OpenAICompatClient,
}

impl BytedanceProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, LLMError> {
        Ok(Self {
            client: OpenAICompatClient::new(config, "Bytedance", Some(BYTEDANCE_BASE_URL))?,
        })
    }

    pub fn models() -> Vec<ModelInfo> {
        vec![
            ModelInfo::new("doubao-lite-4k", "Doubao Lite 4K", 4_096, false),
            ModelInfo::new("doubao-pro-4k", "Doubao Pro 4K", 4_096, true),
            ModelInfo::new("doubao-pro-32k", "Doubao Pro 32K", 32_768, true),
            ModelInfo::new("doubao-pro-128k", "Doubao Pro 128K", 131_072, true),
        ]
    }
}

impl LLMProvider for BytedanceProvider {
    fn chat(&self, request: ChatRequest) -> BoxFuture<'_, Result<ChatResponse, LLMError>> {
        Box::pin(async move { self.client.chat(&request).await })
    }

    fn list_models(&self) -> BoxFuture<'_, Result<Vec<ModelInfo>, LLMError>> {
        Box::pin(async { Ok(Self::models()) })
    }

    fn validate_api_key(&self) -> BoxFuture<'_, Result<bool, LLMError>> {
        Box::pin(async move { self.client.check_key_via_chat(KEY_CHECK_MODEL).await })
    }

    fn provider_name(&self) -> &'static str {
        "Bytedance"
    }
}
