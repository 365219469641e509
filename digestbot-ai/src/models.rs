use serde::{Serialize, Deserialize};

/// Configuration for an AI provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL for API requests
    pub api_base: Option<String>,

    /// API key for authentication
    pub api_key: String,

    /// Default model to use with this provider
    pub default_model: String,

    /// Optional organization header
    pub organization: Option<String>,

    /// Optional project header
    pub project: Option<String>,
}
