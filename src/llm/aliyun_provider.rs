use crate::llm::openai_compat::OpenAICompatClient;
use crate::llm::provider::LLMProvider;
use crate::llm::types::{ChatRequest, ChatResponse, LLMError, ModelInfo, ProviderConfig};
use futures::future::BoxFuture;

pub const ALIYUN_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

/// Model used for the key check; the cheapest Qwen tier.
const KEY_CHECK_MODEL: &str = "qwen-turbo";

/// Aliyun DashScope (Qwen) in OpenAI-compatible mode.
///
/// DashScope has no model listing endpoint, so the catalog is static.
pub struct AliyunProvider {
    client: OpenAICompatClient,
}

impl AliyunProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, LLMError> {
        Ok(Self {
            client: OpenAICompatClient::new(config, "Aliyun", Some(ALIYUN_BASE_URL))?,
        })
    }

    pub fn models() -> Vec<ModelInfo> {
        vec![
            ModelInfo::new("qwen-max", "Qwen Max", 8_000, true),
            ModelInfo::new("qwen-plus", "Qwen Plus", 8_000, true),
            ModelInfo::new("qwen-turbo", "Qwen Turbo", 8_000, true),
            ModelInfo::new("qwen-long", "Qwen Long", 1_000_000, false),
        ]
    }
}

impl LLMProvider for AliyunProvider {
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
        "Aliyun"
    }
}
