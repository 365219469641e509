use async_trait::async_trait;
use dashmap::DashMap;

use digestbot_common::traits::VariableStore;
use crate::Error;

/// Process-local variables. Used when no portal is configured, and in tests.
#[derive(Default)]
pub struct InMemoryVariableStore {
    values: DashMap<String, String>,
}

impl InMemoryVariableStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VariableStore for InMemoryVariableStore {
    async fn get_variable(&self, name: &str) -> Result<Option<String>, Error> {
        Ok(self.values.get(name).map(|v| v.value().clone()))
    }

    async fn set_variable(&self, name: &str, value: &str) -> Result<(), Error> {
        self.values.insert(name.to_string(), value.to_string());
        Ok(())
    }
}
