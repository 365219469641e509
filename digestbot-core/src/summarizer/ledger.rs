use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use digestbot_common::models::ledger::TokenLedger;
use digestbot_common::models::message::{ChannelRef, Requester};
use digestbot_common::traits::VariableStore;

use crate::Error;

/// Spend ledger persisted as one JSON document in the variable store.
///
/// Appends take `write_lock` for the whole read-modify-write, so concurrent
/// appends in this process never lose an update. Other processes writing
/// the same variable are not coordinated with.
pub struct LedgerService {
    store: Arc<dyn VariableStore>,
    variable: String,
    write_lock: Mutex<()>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn VariableStore>, variable: impl Into<String>) -> Self {
        Self {
            store,
            variable: variable.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The stored ledger, or an empty one if the variable was never written.
    pub async fn load(&self) -> Result<TokenLedger, Error> {
        match self.store.get_variable(&self.variable).await? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(TokenLedger::default()),
        }
    }

    /// Records one usage and returns the updated ledger together with the
    /// rounded cost that was added.
    pub async fn append(
        &self,
        channel: &ChannelRef,
        user: &Requester,
        tokens: u64,
        cost_per_token: f64,
        now: DateTime<Utc>,
    ) -> Result<(TokenLedger, f64), Error> {
        let _guard = self.write_lock.lock().await;

        let mut ledger = self.load().await?;
        let cost = ledger.record(channel, user, tokens, cost_per_token, now);
        let raw = serde_json::to_string(&ledger)?;
        self.store.set_variable(&self.variable, &raw).await?;

        debug!(
            "Ledger: {} tokens (${:.6}) for user {} in channel {}",
            tokens, cost, user.id, channel.id
        );
        Ok((ledger, cost))
    }
}
