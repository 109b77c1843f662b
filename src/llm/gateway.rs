use crate::llm::provider::{LLMProvider, LLMProviderFactory, ProviderFactory};
use crate::llm::types::{ChatRequest, ChatResponse, LLMError, ModelInfo, ProviderConfig, ProviderKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("Provider {0} is not configured")]
    NotConfigured(ProviderKind),
    #[error("No active provider set")]
    NoActiveProvider,
    #[error(transparent)]
    Provider(#[from] LLMError),
}

/// Outcome of [`ProviderGateway::test_connection`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTest {
    pub success: bool,
    pub message: String,
}

/// Single entry point to every configured backend.
///
/// Holds one config per [`ProviderKind`], builds clients lazily on first use
/// and tracks which backend is active. Calls that omit a kind go to the
/// active backend.
pub struct ProviderGateway {
    configs: HashMap<ProviderKind, ProviderConfig>,
    clients: HashMap<ProviderKind, Arc<dyn LLMProvider>>,
    active: Option<ProviderKind>,
    factory: ProviderFactory,
}

impl ProviderGateway {
    pub fn new() -> Self {
        Self::with_factory(LLMProviderFactory::shared())
    }

    pub fn with_factory(factory: ProviderFactory) -> Self {
        Self {
            configs: HashMap::new(),
            clients: HashMap::new(),
            active: None,
            factory,
        }
    }

    /// Insert or replace the config for `config.kind`. Any cached client for
    /// that kind is dropped so the next call picks up the new credentials.
    pub fn add_or_update_provider(&mut self, config: ProviderConfig) {
        let kind = config.kind;
        if self.clients.remove(&kind).is_some() {
            debug!("Invalidated cached {} client", kind);
        }
        self.configs.insert(kind, config);
    }

    pub fn set_active(&mut self, kind: ProviderKind) -> Result<(), GatewayError> {
        if !self.configs.contains_key(&kind) {
            return Err(GatewayError::NotConfigured(kind));
        }
        info!("Active provider set to {}", kind);
        self.active = Some(kind);
        Ok(())
    }

    pub fn active_provider(&self) -> Option<ProviderKind> {
        self.active
    }

    /// Drop the config and cached client for `kind`. Removing the active
    /// provider leaves no provider active.
    pub fn remove_provider(&mut self, kind: ProviderKind) -> Option<ProviderConfig> {
        self.clients.remove(&kind);
        if self.active == Some(kind) {
            info!("Removed active provider {}; no provider is active now", kind);
            self.active = None;
        }
        self.configs.remove(&kind)
    }

    pub fn provider_config(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.configs.get(&kind)
    }

    pub fn configured_providers(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.configs.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Configured with a non-empty API key.
    pub fn is_provider_configured(&self, kind: ProviderKind) -> bool {
        self.configs.get(&kind).is_some_and(ProviderConfig::has_api_key)
    }

    pub fn default_model(&self, kind: Option<ProviderKind>) -> Option<&str> {
        let kind = kind.or(self.active)?;
        self.configs
            .get(&kind)?
            .default_model
            .as_deref()
            .filter(|m| !m.is_empty())
    }

    /// Update only the default model of an existing config.
    pub fn set_default_model(
        &mut self,
        kind: ProviderKind,
        model: impl Into<String>,
    ) -> Result<(), GatewayError> {
        let config = self
            .configs
            .get_mut(&kind)
            .ok_or(GatewayError::NotConfigured(kind))?;
        config.default_model = Some(model.into());
        self.clients.remove(&kind);
        Ok(())
    }

    fn resolve(&self, kind: Option<ProviderKind>) -> Result<ProviderKind, GatewayError> {
        kind.or(self.active).ok_or(GatewayError::NoActiveProvider)
    }

    fn client(&mut self, kind: ProviderKind) -> Result<Arc<dyn LLMProvider>, GatewayError> {
        if let Some(client) = self.clients.get(&kind) {
            return Ok(Arc::clone(client));
        }

        let config = self
            .configs
            .get(&kind)
            .ok_or(GatewayError::NotConfigured(kind))?;
        let client = (self.factory)(config)?;
        debug!("Created {} client", client.provider_name());
        self.clients.insert(kind, Arc::clone(&client));
        Ok(client)
    }

    /// Send a chat request. An empty `request.model` is filled with the
    /// provider's default model.
    pub async fn chat(
        &mut self,
        mut request: ChatRequest,
        kind: Option<ProviderKind>,
    ) -> Result<ChatResponse, GatewayError> {
        let kind = self.resolve(kind)?;
        if request.model.is_empty()
            && let Some(model) = self.default_model(Some(kind))
        {
            request.model = model.to_string();
        }
        let client = self.client(kind)?;
        Ok(client.chat(request).await?)
    }

    pub async fn list_models(&mut self, kind: Option<ProviderKind>) -> Result<Vec<ModelInfo>, GatewayError> {
        let kind = self.resolve(kind)?;
        let client = self.client(kind)?;
        Ok(client.list_models().await?)
    }

    pub async fn validate_api_key(&mut self, kind: Option<ProviderKind>) -> Result<bool, GatewayError> {
        let kind = self.resolve(kind)?;
        let client = self.client(kind)?;
        Ok(client.validate_api_key().await?)
    }

    /// Validate the key and, when accepted, list models. Provider failures
    /// are reported in the returned summary rather than raised.
    pub async fn test_connection(&mut self, kind: Option<ProviderKind>) -> Result<ConnectionTest, GatewayError> {
        let kind = self.resolve(kind)?;
        let client = match self.client(kind) {
            Ok(client) => client,
            Err(GatewayError::Provider(e)) => {
                return Ok(ConnectionTest {
                    success: false,
                    message: format!("Connection failed: {}", e.message),
                });
            }
            Err(e) => return Err(e),
        };

        let summary = match client.validate_api_key().await {
            Ok(true) => match client.list_models().await {
                Ok(models) => ConnectionTest {
                    success: true,
                    message: format!(
                        "Connected to {}, found {} models",
                        client.provider_name(),
                        models.len()
                    ),
                },
                Err(e) => ConnectionTest {
                    success: false,
                    message: format!("Connection failed: {}", e.message),
                },
            },
            Ok(false) => ConnectionTest {
                success: false,
                message: format!("{} rejected the API key", client.provider_name()),
            },
            Err(e) => ConnectionTest {
                success: false,
                message: format!("Connection failed: {}", e.message),
            },
        };

        if !summary.success {
            warn!("Connection test for {} failed: {}", kind, summary.message);
        }
        Ok(summary)
    }

    /// Release every cached client.
    pub async fn shutdown(&mut self) {
        for (kind, client) in self.clients.drain() {
            if let Err(e) = client.shutdown().await {
                warn!("Failed to shut down {} client: {}", kind, e);
            }
        }
    }
}

impl Default for ProviderGateway {
    fn default() -> Self {
        Self::new()
    }
}
