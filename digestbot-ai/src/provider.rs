use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tokio::sync::RwLock;

use crate::models::ProviderConfig;
use crate::traits::{CompletionRequest, CompletionResponse, ModelProvider, TokenUsage};

const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";

/// OpenAI provider implementation
pub struct OpenAIProvider {
    config: ProviderConfig,
    client: Client,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with the given configuration
    pub fn new(config: ProviderConfig) -> Self {
        let client = Client::new();
        Self { config, client }
    }

    fn api_base(&self) -> String {
        self.config
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE.to_string())
    }
}

/// Extracts text and usage from a `/chat/completions` response body.
pub(crate) fn parse_completion(data: &serde_json::Value) -> anyhow::Result<CompletionResponse> {
    // Check for API errors
    if let Some(error) = data.get("error") {
        tracing::error!("API returned error: {:?}", error);
        let error_message = error.get("message").and_then(|m| m.as_str()).unwrap_or("Unknown error");
        return Err(anyhow::anyhow!("API error: {}", error_message));
    }

    let choices = data
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow::anyhow!("Response missing 'choices' array"))?;

    // A missing message or null content is an empty answer, not a failure
    let text = choices
        .first()
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .unwrap_or_default()
        .to_string();

    let usage = data
        .get("usage")
        .map(|u| TokenUsage {
            prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
            completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
            total_tokens: u["total_tokens"].as_u64().unwrap_or(0),
        })
        .unwrap_or_default();

    Ok(CompletionResponse { text, usage })
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<CompletionResponse> {
        let api_base = self.api_base();
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone());

        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role,
                    "content": msg.content
                })
            })
            .collect();

        let request_payload = json!({
            "model": model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        tracing::info!(
            "Making API call to {}/chat/completions (model={}, messages={}, max_tokens={})",
            api_base,
            model,
            messages.len(),
            request.max_tokens
        );

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", api_base))
            .header("Authorization", format!("Bearer {}", self.config.api_key));
        if let Some(org) = &self.config.organization {
            builder = builder.header("OpenAI-Organization", org);
        }
        if let Some(project) = &self.config.project {
            builder = builder.header("OpenAI-Project", project);
        }

        let response = builder.json(&request_payload).send().await?;

        // Get the raw response text first for better error handling
        let status = response.status();
        let response_text = response.text().await?;
        tracing::debug!("Raw API response ({}): {}", status, response_text);

        let data = match serde_json::from_str::<serde_json::Value>(&response_text) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to parse API response as JSON: {:?}", e);
                return Err(anyhow::anyhow!("API returned non-JSON response ({}): {}", status, e));
            }
        };

        parse_completion(&data)
    }
}

/// Factory for creating AI providers
pub struct Provider {
    providers: Arc<RwLock<HashMap<String, Arc<dyn ModelProvider>>>>,
}

impl Default for Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider {
    /// Create a new provider factory
    pub fn new() -> Self {
        Self {
            providers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a new provider
    pub async fn register<P: ModelProvider + 'static>(&self, provider: P) {
        let mut providers = self.providers.write().await;
        providers.insert(provider.name().to_string(), Arc::new(provider));
    }

    /// Register an already shared provider
    pub async fn register_shared(&self, provider: Arc<dyn ModelProvider>) {
        let mut providers = self.providers.write().await;
        providers.insert(provider.name().to_string(), provider);
    }

    /// Get a provider by name
    pub async fn get(&self, name: &str) -> Option<Arc<dyn ModelProvider>> {
        let providers = self.providers.read().await;
        providers.get(name).cloned()
    }

    /// Get all registered providers
    pub async fn get_all(&self) -> Vec<String> {
        let providers = self.providers.read().await;
        let mut names: Vec<String> = providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Create an OpenAI provider from a configuration
    pub fn create_openai(config: ProviderConfig) -> OpenAIProvider {
        OpenAIProvider::new(config)
    }
}
