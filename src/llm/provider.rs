use crate::llm::types::{ChatRequest, ChatResponse, LLMError, ModelInfo, ProviderConfig, ProviderKind};
use futures::future::BoxFuture;
use std::sync::Arc;

/// Contract shared by every chat backend
pub trait LLMProvider: Send + Sync {
    /// Send one chat completion through the shared retry policy.
    fn chat(&self, request: ChatRequest) -> BoxFuture<'_, Result<ChatResponse, LLMError>>;

    /// List available models.
    ///
    /// Falls back to a built-in catalog when live discovery is unavailable or
    /// fails, so a discovery failure alone never surfaces as an error.
    fn list_models(&self) -> BoxFuture<'_, Result<Vec<ModelInfo>, LLMError>>;

    /// Issue a minimal key validation request.
    ///
    /// Returns `Ok(false)` only when the backend answers HTTP 401/403. Every
    /// other failure propagates so an unreachable backend is never mistaken
    /// for a bad key.
    fn validate_api_key(&self) -> BoxFuture<'_, Result<bool, LLMError>>;

    /// Get provider name/identifier
    fn provider_name(&self) -> &'static str;

    /// Clean up resources
    fn shutdown(&self) -> BoxFuture<'_, Result<(), LLMError>> {
        Box::pin(async { Ok(()) })
    }
}

/// Constructor used by the gateway to build clients on demand.
pub type ProviderFactory =
    Arc<dyn Fn(&ProviderConfig) -> Result<Arc<dyn LLMProvider>, LLMError> + Send + Sync>;

/// Factory for creating LLM providers
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn LLMProvider>, LLMError> {
        match config.kind {
            ProviderKind::OpenAI => Ok(Arc::new(crate::llm::openai_provider::OpenAIProvider::new(
                config,
            )?)),
            ProviderKind::Anthropic => Ok(Arc::new(
                crate::llm::anthropic_provider::AnthropicProvider::new(config)?,
            )),
            ProviderKind::DeepSeek => Ok(Arc::new(
                crate::llm::deepseek_provider::DeepSeekProvider::new(config)?,
            )),
            ProviderKind::Aliyun => Ok(Arc::new(crate::llm::aliyun_provider::AliyunProvider::new(
                config,
            )?)),
            ProviderKind::Bytedance => Ok(Arc::new(
                crate::llm::bytedance_provider::BytedanceProvider::new(config)?,
            )),
            ProviderKind::Custom => Ok(Arc::new(crate::llm::custom_provider::CustomProvider::new(
                config,
            )?)),
        }
    }

    /// The built-in factory as a [`ProviderFactory`] value.
    pub fn shared() -> ProviderFactory {
        Arc::new(Self::create_provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ErrorKind;

    #[test]
    fn test_factory_builds_every_kind() {
        for kind in ProviderKind::ALL {
            let mut config = ProviderConfig::new(kind, "sk-test");
            if kind.requires_base_url() {
                config = config.with_base_url("http://localhost:11434/v1");
            }
            let provider = LLMProviderFactory::create_provider(&config).unwrap();
            assert!(provider.provider_name().eq_ignore_ascii_case(kind.as_str()));
        }
    }

    #[test]
    fn test_factory_rejects_empty_key() {
        for kind in ProviderKind::ALL {
            let config = ProviderConfig::new(kind, "").with_base_url("http://localhost:11434/v1");
            let error = LLMProviderFactory::create_provider(&config)
                .err()
                .expect("empty key must be rejected");
            assert_eq!(error.kind, ErrorKind::Configuration);
        }
    }

    #[test]
    fn test_custom_requires_base_url() {
        let config = ProviderConfig::new(ProviderKind::Custom, "sk-test");
        let error = LLMProviderFactory::create_provider(&config).err().unwrap();
        assert!(error.message.contains("base URL"));
    }
}
