use async_trait::async_trait;

use crate::error::Error;

/// Remote key/value store holding runtime-tunable settings and the
/// serialized spend ledger.
#[async_trait]
pub trait VariableStore: Send + Sync {
    /// `Ok(None)` when the variable has never been set.
    async fn get_variable(&self, name: &str) -> Result<Option<String>, Error>;
    async fn set_variable(&self, name: &str, value: &str) -> Result<(), Error>;
}
