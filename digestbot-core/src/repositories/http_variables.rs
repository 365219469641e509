use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, error};

pub(crate) use digestbot_common::traits::VariableStore;
use crate::Error;

/// Variables held by the LAN portal's `/api/v1/sys/variables` endpoint.
#[derive(Clone)]
pub struct HttpVariableStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpVariableStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url, api_key)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn variable_url(&self, name: &str) -> String {
        format!("{}/api/v1/sys/variables/{}", self.base_url, name)
    }
}

/// Pulls `value` out of a `{"value": ...}` body. Non-string values are kept
/// in their JSON form.
fn extract_value(body: &JsonValue) -> Option<String> {
    match body.get("value")? {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl VariableStore for HttpVariableStore {
    async fn get_variable(&self, name: &str) -> Result<Option<String>, Error> {
        let response = self
            .client
            .get(self.variable_url(name))
            .header("X-Authorization", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Variable '{}' does not exist", name);
            return Ok(None);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Failed to get variable '{}'. {}: {}", name, status, text);
            return Err(Error::VariableStore(format!("GET {name} returned {status}")));
        }

        let body: JsonValue = response.json().await?;
        Ok(extract_value(&body))
    }

    async fn set_variable(&self, name: &str, value: &str) -> Result<(), Error> {
        let response = self
            .client
            .put(self.variable_url(name))
            .header("X-Authorization", &self.api_key)
            .json(&json!({ "value": value }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Failed to set variable '{}'. {}: {}", name, status, text);
            return Err(Error::VariableStore(format!("PUT {name} returned {status}")));
        }
        Ok(())
    }
}
