use crate::llm::provider::LLMProvider;
use crate::llm::retry::RetryPolicy;
use crate::llm::transport::{AuthStyle, HttpTransport};
use crate::llm::types::{
    ChatMessage, ChatRequest, ChatResponse, ChatRole, LLMError, ModelInfo, ProviderConfig,
    TokenUsage,
};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULT_MAX_TOKENS: u32 = 4096;
const KEY_CHECK_MODEL: &str = "claude-3-haiku-20240307";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl<'a> MessagesRequest<'a> {
    /// System messages move to the top-level `system` field; the Messages API
    /// only accepts user/assistant turns.
    fn from_request(request: &'a ChatRequest) -> Self {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let messages = request
            .messages
            .iter()
            .filter_map(|m: &'a ChatMessage| match m.role {
                ChatRole::System => None,
                ChatRole::User => Some(WireMessage {
                    role: "user",
                    content: &m.content,
                }),
                ChatRole::Assistant => Some(WireMessage {
                    role: "assistant",
                    content: &m.content,
                }),
            })
            .collect();

        Self {
            model: &request.model,
            max_tokens: request.max_output_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            temperature: request.temperature,
            top_p: request.top_p,
        }
    }
}

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    transport: HttpTransport,
    retry: RetryPolicy,
}

impl AnthropicProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, LLMError> {
        let transport = HttpTransport::from_config(config, "Anthropic", Some(ANTHROPIC_BASE_URL))?
            .with_auth(AuthStyle::Header("x-api-key"))
            .with_header("anthropic-version", ANTHROPIC_VERSION);

        Ok(Self {
            transport,
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    pub fn models() -> Vec<ModelInfo> {
        vec![
            ModelInfo::new("claude-3-5-sonnet-20241022", "Claude 3.5 Sonnet", 200_000, true),
            ModelInfo::new("claude-3-opus-20240229", "Claude 3 Opus", 200_000, true),
            ModelInfo::new("claude-3-sonnet-20240229", "Claude 3 Sonnet", 200_000, true),
            ModelInfo::new("claude-3-haiku-20240307", "Claude 3 Haiku", 200_000, true),
        ]
    }

    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatResponse, LLMError> {
        let body = MessagesRequest::from_request(request);

        let response: MessagesResponse = self
            .retry
            .execute("chat", || self.transport.post("/messages", &body))
            .await?;

        self.map_response(response, &request.model)
    }

    fn map_response(&self, response: MessagesResponse, requested_model: &str) -> Result<ChatResponse, LLMError> {
        let text = response
            .content
            .into_iter()
            .find(|block| block.block_type == "text" || block.block_type.is_empty())
            .and_then(|block| block.text)
            .ok_or_else(|| {
                LLMError::invalid_response("Anthropic", "Invalid response: no text content block")
            })?;

        Ok(ChatResponse {
            text,
            model: response
                .model
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| requested_model.to_string()),
            finish_reason: response.stop_reason,
            usage: response
                .usage
                .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens)),
        })
    }
}

impl LLMProvider for AnthropicProvider {
    fn chat(&self, request: ChatRequest) -> BoxFuture<'_, Result<ChatResponse, LLMError>> {
        Box::pin(async move { self.send_chat(&request).await })
    }

    fn list_models(&self) -> BoxFuture<'_, Result<Vec<ModelInfo>, LLMError>> {
        Box::pin(async { Ok(Self::models()) })
    }

    fn validate_api_key(&self) -> BoxFuture<'_, Result<bool, LLMError>> {
        Box::pin(async move {
            let request = ChatRequest::new(KEY_CHECK_MODEL, vec![ChatMessage::user("Hi")])
                .with_max_output_tokens(10);
            match self.send_chat(&request).await {
                Ok(_) => Ok(true),
                Err(error) if error.is_auth_rejection() => Ok(false),
                Err(error) => Err(error),
            }
        })
    }

    fn provider_name(&self) -> &'static str {
        "Anthropic"
    }
}
