pub mod client;
pub mod models;
pub mod provider;
pub mod traits;

// Re-export public APIs
pub use client::AiClient;
pub use models::ProviderConfig;
pub use provider::{OpenAIProvider, Provider};
pub use traits::{ChatMessage, CompletionRequest, CompletionResponse, ModelProvider, TokenUsage};
