pub mod aliyun_provider;
pub mod anthropic_provider;
pub mod bytedance_provider;
pub mod custom_provider;
pub mod deepseek_provider;
pub mod gateway;
pub mod openai_compat;
pub mod openai_provider;
pub mod provider;
pub mod retry;
pub mod transport;
pub mod types;

pub use aliyun_provider::AliyunProvider;
pub use anthropic_provider::AnthropicProvider;
pub use bytedance_provider::BytedanceProvider;
pub use custom_provider::CustomProvider;
pub use deepseek_provider::DeepSeekProvider;
pub use gateway::{ConnectionTest, GatewayError, ProviderGateway};
pub use openai_provider::OpenAIProvider;
pub use provider::{LLMProvider, LLMProviderFactory, ProviderFactory};
pub use retry::RetryPolicy;
pub use types::*;
