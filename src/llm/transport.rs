use crate::llm::types::{ErrorKind, LLMError, ProviderConfig};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// How the API key is attached to each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    Bearer,
    Header(&'static str),
}

/// JSON-over-HTTP plumbing shared by the provider clients.
///
/// Every request races against the configured timeout; when the timer wins the
/// in-flight request future is dropped and a retryable timeout error is
/// returned.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    provider: &'static str,
    base_url: String,
    api_key: String,
    auth: AuthStyle,
    extra_headers: Vec<(&'static str, String)>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
}

impl HttpTransport {
    /// Build a transport from a provider config. Fails without touching the
    /// network when the key is empty or no usable base URL is available.
    pub fn from_config(
        config: &ProviderConfig,
        provider: &'static str,
        default_base_url: Option<&str>,
    ) -> Result<Self, LLMError> {
        if !config.has_api_key() {
            return Err(LLMError::configuration(
                provider,
                format!("{} API key is required", provider),
            ));
        }

        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .or(default_base_url)
            .ok_or_else(|| {
                LLMError::configuration(
                    provider,
                    format!("{} provider requires a base URL to be configured", provider),
                )
            })?;

        Url::parse(base_url).map_err(|e| {
            LLMError::configuration(provider, format!("Invalid base URL '{}': {}", base_url, e))
        })?;

        let client = Client::builder().build().map_err(|e| {
            LLMError::configuration(provider, format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.trim().to_string(),
            auth: AuthStyle::Bearer,
            extra_headers: Vec::new(),
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    pub fn with_auth(mut self, auth: AuthStyle) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.extra_headers.push((name, value.into()));
        self
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, LLMError> {
        let builder = self.authorize(self.client.get(self.endpoint(path)));
        self.send(builder, path).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, LLMError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.authorize(self.client.post(self.endpoint(path)).json(body));
        self.send(builder, path).await
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = match self.auth {
            AuthStyle::Bearer => builder.bearer_auth(&self.api_key),
            AuthStyle::Header(name) => builder.header(name, &self.api_key),
        };

        self.extra_headers
            .iter()
            .fold(builder, |builder, (name, value)| builder.header(*name, value))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder, path: &str) -> Result<T, LLMError> {
        debug!(provider = self.provider, path, "sending request");

        let text = self.race_timeout(self.exchange(builder)).await?;

        serde_json::from_str(&text).map_err(|e| {
            LLMError::invalid_response(self.provider, format!("Failed to parse response: {}", e))
        })
    }

    async fn race_timeout<F>(&self, request: F) -> Result<String, LLMError>
    where
        F: Future<Output = Result<String, LLMError>>,
    {
        if self.timeout.is_zero() {
            return request.await;
        }

        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(LLMError::new(
                ErrorKind::Timeout,
                self.provider,
                format!("Request timed out after {}ms", self.timeout.as_millis()),
            )),
        }
    }

    async fn exchange(&self, builder: RequestBuilder) -> Result<String, LLMError> {
        let response = builder.send().await.map_err(|e| self.map_transport_error(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_transport_error(e))?;

        if status.is_success() {
            Ok(text)
        } else {
            Err(self.map_status_error(status, &text))
        }
    }

    fn map_status_error(&self, status: StatusCode, body: &str) -> LLMError {
        let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);

        let message = parsed
            .as_ref()
            .and_then(|e| e.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                format!(
                    "API request failed: {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("")
                )
                .trim_end()
                .to_string()
            });

        let mut error = LLMError::new(ErrorKind::from_status(status.as_u16()), self.provider, message)
            .with_status(status.as_u16());

        let code = parsed.and_then(|e| {
            e.code
                .and_then(|code| match code {
                    serde_json::Value::String(s) => Some(s),
                    serde_json::Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .or(e.error_type)
        });
        if let Some(code) = code {
            error = error.with_code(code);
        }
        error
    }

    fn map_transport_error(&self, error: reqwest::Error) -> LLMError {
        let kind = if error.is_timeout() {
            ErrorKind::Timeout
        } else if is_connection_reset(&error) {
            ErrorKind::ConnectionReset
        } else {
            ErrorKind::Network
        };
        LLMError::new(kind, self.provider, error.to_string())
    }
}

fn is_connection_reset(error: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = error.source();
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>()
            && matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted
            )
        {
            return true;
        }
        let text = err.to_string().to_lowercase();
        if text.contains("connection reset") || text.contains("connection closed before") {
            return true;
        }
        source = err.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ProviderKind;

    #[test]
    fn test_empty_key_fails_without_network() {
        let config = ProviderConfig::new(ProviderKind::OpenAI, "");
        let error = HttpTransport::from_config(&config, "OpenAI", Some("https://api.openai.com/v1"))
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::Configuration);
        assert!(error.message.contains("API key"));
    }

    #[test]
    fn test_missing_base_url_is_configuration_error() {
        let config = ProviderConfig::new(ProviderKind::Custom, "sk-test").with_base_url("   ");
        let error = HttpTransport::from_config(&config, "Custom", None).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Configuration);
        assert!(error.message.contains("base URL"));
    }

    #[test]
    fn test_endpoint_joining_strips_trailing_slash() {
        let config =
            ProviderConfig::new(ProviderKind::Custom, "sk-test").with_base_url("http://localhost:8080/v1/");
        let transport = HttpTransport::from_config(&config, "Custom", None).unwrap();
        assert_eq!(transport.endpoint("/models"), "http://localhost:8080/v1/models");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let config = ProviderConfig::new(ProviderKind::Custom, "sk-test").with_base_url("not a url");
        let error = HttpTransport::from_config(&config, "Custom", None).unwrap_err();
        assert!(error.message.contains("Invalid base URL"));
    }

    #[test]
    fn test_status_error_parsing() {
        let config = ProviderConfig::new(ProviderKind::OpenAI, "sk-test");
        let transport =
            HttpTransport::from_config(&config, "OpenAI", Some("https://api.openai.com/v1")).unwrap();

        let error = transport.map_status_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"model not found","code":"model_not_found"}}"#,
        );
        assert_eq!(error.message, "model not found");
        assert_eq!(error.code, "model_not_found");
        assert_eq!(error.http_status, Some(400));

        let error = transport.map_status_error(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert_eq!(error.kind, ErrorKind::RateLimited);
        assert_eq!(error.code, "rate_limited");
        assert!(error.message.starts_with("API request failed: 429"));
    }
}
