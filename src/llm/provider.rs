use crate::config::Config;
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse};
use crate::utils::retry::RetryPolicy;
use async_trait::async_trait;

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Configuration for an LLM provider
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
    pub api_base: String,
    pub retry: RetryPolicy,
}

impl LLMProviderConfig {
    pub fn google(config: &Config) -> AppResult<Self> {
        Ok(Self {
            name: "google".to_string(),
            api_key: config.require_api_key()?.to_string(),
            api_base: config.google.api_base.clone(),
            retry: RetryPolicy::new(config.retry.max_retries),
        })
    }
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider_name: String,
}

impl LLM {
    pub fn new(provider: LLMProviderConfig) -> AppResult<Self> {
        let adapter: Box<dyn LLMAdapter> = match provider.name.as_str() {
            "google" | "gemini" => Box::new(
                crate::llm::google::GoogleAdapter::with_api_base(&provider.api_key, &provider.api_base)
                    .with_retry_policy(provider.retry),
            ),
            other => {
                return Err(AppError::InvalidRequest(format!(
                    "Unsupported provider: {}",
                    other
                )))
            }
        };

        Ok(Self {
            adapter,
            provider_name: provider.name,
        })
    }

    /// Wrap an existing adapter.
    pub fn from_adapter(name: impl Into<String>, adapter: Box<dyn LLMAdapter>) -> Self {
        Self {
            adapter,
            provider_name: name.into(),
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }
}
