use std::sync::Arc;

use tracing::debug;

use crate::provider::Provider;
use crate::traits::{CompletionRequest, CompletionResponse, ModelProvider};

/// Represents a client for AI services
pub struct AiClient {
    /// Provider registry for different AI models
    provider: Arc<Provider>,

    /// Default provider to use
    default_provider: String,
}

impl AiClient {
    /// Create a new AI client with the given components
    pub fn new(provider: Arc<Provider>, default_provider: impl Into<String>) -> Self {
        Self {
            provider,
            default_provider: default_provider.into(),
        }
    }

    /// Chat completion with explicit sampling parameters
    pub async fn complete(&self, request: CompletionRequest) -> anyhow::Result<CompletionResponse> {
        let provider = self.get_provider().await?;
        debug!(
            "AiClient: completing {} messages via '{}'",
            request.messages.len(),
            provider.name()
        );
        provider.complete(request).await
    }

    /// The default provider, else the first one registered
    async fn get_provider(&self) -> anyhow::Result<Arc<dyn ModelProvider>> {
        if let Some(provider) = self.provider.get(&self.default_provider).await {
            return Ok(provider);
        }

        // If default provider not found, try to get the first available provider
        let providers = self.provider.get_all().await;
        let first_provider = providers
            .first()
            .ok_or_else(|| anyhow::anyhow!("No AI providers configured"))?;

        self.provider.get(first_provider).await
            .ok_or_else(|| anyhow::anyhow!("Provider not found: {}", first_provider))
    }
}
