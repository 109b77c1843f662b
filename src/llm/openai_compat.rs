//! OpenAI-compatible chat completion wire format.
//!
//! OpenAI, DeepSeek, Aliyun DashScope, Bytedance Ark and self-hosted
//! endpoints all speak this dialect; each backend wraps one
//! [`OpenAICompatClient`] and only differs in defaults, model catalog and
//! key validation request.

use crate::llm::retry::RetryPolicy;
use crate::llm::transport::HttpTransport;
use crate::llm::types::{
    ChatMessage, ChatRequest, ChatResponse, DEFAULT_TEMPERATURE, LLMError, ProviderConfig,
    TokenUsage,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    pub stream: bool,
}

impl<'a> ChatCompletionRequest<'a> {
    pub fn from_request(request: &'a ChatRequest) -> Self {
        Self {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: request.max_output_tokens,
            top_p: request.top_p,
            stream: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl From<ChatUsage> for TokenUsage {
    fn from(usage: ChatUsage) -> Self {
        let total = if usage.total_tokens > 0 {
            usage.total_tokens
        } else {
            usage.prompt_tokens + usage.completion_tokens
        };
        TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: total,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ModelEntry {
    pub id: String,
}

/// Shared client for the OpenAI-compatible backends
#[derive(Debug, Clone)]
pub struct OpenAICompatClient {
    transport: HttpTransport,
    retry: RetryPolicy,
}

impl OpenAICompatClient {
    pub fn new(
        config: &ProviderConfig,
        provider: &'static str,
        default_base_url: Option<&str>,
    ) -> Result<Self, LLMError> {
        Ok(Self {
            transport: HttpTransport::from_config(config, provider, default_base_url)?,
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LLMError> {
        let body = ChatCompletionRequest::from_request(request);

        let response: ChatCompletionResponse = self
            .retry
            .execute("chat", || self.transport.post("/chat/completions", &body))
            .await?;

        self.map_chat_response(response, &request.model)
    }

    fn map_chat_response(
        &self,
        response: ChatCompletionResponse,
        requested_model: &str,
    ) -> Result<ChatResponse, LLMError> {
        let ChatCompletionResponse {
            model,
            choices,
            usage,
        } = response;

        let choice = choices.into_iter().next().ok_or_else(|| {
            LLMError::invalid_response(self.transport.provider(), "Invalid response: no choices returned")
        })?;

        let text = choice
            .message
            .and_then(|m| m.content)
            .ok_or_else(|| {
                LLMError::invalid_response(
                    self.transport.provider(),
                    "Invalid response: choice has no message content",
                )
            })?;

        Ok(ChatResponse {
            text,
            model: model
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| requested_model.to_string()),
            finish_reason: choice.finish_reason,
            usage: usage.map(TokenUsage::from),
        })
    }

    /// Model ids from `GET /models`.
    pub async fn fetch_model_ids(&self) -> Result<Vec<String>, LLMError> {
        let list: ModelList = self
            .retry
            .execute("list_models", || self.transport.get("/models"))
            .await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    /// Check the key with `GET /models`.
    pub async fn check_key_via_models(&self) -> Result<bool, LLMError> {
        match self.fetch_model_ids().await {
            Ok(_) => Ok(true),
            Err(error) if error.is_auth_rejection() => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Check the key with a tiny chat completion against `model`.
    pub async fn check_key_via_chat(&self, model: &str) -> Result<bool, LLMError> {
        let request = ChatRequest::new(model, vec![ChatMessage::user("Hi")]).with_max_output_tokens(5);
        match self.chat(&request).await {
            Ok(_) => Ok(true),
            Err(error) if error.is_auth_rejection() => Ok(false),
            Err(error) => Err(error),
        }
    }
}
