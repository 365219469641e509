use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::models::message::{ChannelId, ChannelRef, Requester, UserId};

/// Decimal places kept on every cost figure.
pub const COST_PRECISION: i32 = 6;

/// Rounds a cost figure to [`COST_PRECISION`] decimal places.
pub fn round_cost(value: f64) -> f64 {
    let scale = 10f64.powi(COST_PRECISION);
    (value * scale).round() / scale
}

/// Rounds `tokens * cost_per_token` to [`COST_PRECISION`] decimal places.
pub fn token_cost(tokens: u64, cost_per_token: f64) -> f64 {
    round_cost(tokens as f64 * cost_per_token)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenUserEntry {
    pub id: UserId,
    pub name: String,
    pub display_name: String,
    pub tokens: u64,
    pub cost: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenChannelEntry {
    pub id: ChannelId,
    pub name: String,
    pub tokens: u64,
    pub cost: f64,
    pub created_at: DateTime<Utc>,
}

/// Persisted spend document. Histories are append-only and totals only grow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenLedger {
    pub total_tokens: u64,
    pub total_cost: f64,
    pub user_history: Vec<TokenUserEntry>,
    pub channel_history: Vec<TokenChannelEntry>,
}

fn same_month(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

impl TokenLedger {
    /// Applies one usage record and returns the rounded cost that was added.
    pub fn record(
        &mut self,
        channel: &ChannelRef,
        user: &Requester,
        tokens: u64,
        cost_per_token: f64,
        at: DateTime<Utc>,
    ) -> f64 {
        let cost = token_cost(tokens, cost_per_token);

        self.total_tokens += tokens;
        self.total_cost = round_cost(self.total_cost + cost);
        self.user_history.push(TokenUserEntry {
            id: user.id,
            name: user.name.clone(),
            display_name: user.display_name.clone(),
            tokens,
            cost,
            created_at: at,
        });
        self.channel_history.push(TokenChannelEntry {
            id: channel.id,
            name: channel.name.clone(),
            tokens,
            cost,
            created_at: at,
        });

        cost
    }

    pub fn month_total_for_user(&self, user_id: UserId, month: DateTime<Utc>) -> f64 {
        self.user_history
            .iter()
            .filter(|e| e.id == user_id && same_month(e.created_at, month))
            .fold(0.0, |total, e| round_cost(total + e.cost))
    }

    pub fn month_total_for_channel(&self, channel_id: ChannelId, month: DateTime<Utc>) -> f64 {
        self.channel_history
            .iter()
            .filter(|e| e.id == channel_id && same_month(e.created_at, month))
            .fold(0.0, |total, e| round_cost(total + e.cost))
    }

    pub fn month_total_all_users(&self, month: DateTime<Utc>) -> f64 {
        self.user_history
            .iter()
            .filter(|e| same_month(e.created_at, month))
            .fold(0.0, |total, e| round_cost(total + e.cost))
    }

    pub fn month_total_all_channels(&self, month: DateTime<Utc>) -> f64 {
        self.channel_history
            .iter()
            .filter(|e| same_month(e.created_at, month))
            .fold(0.0, |total, e| round_cost(total + e.cost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn channel(id: ChannelId) -> ChannelRef {
        ChannelRef { id, name: format!("chan-{id}") }
    }

    fn user(id: UserId) -> Requester {
        Requester { id, name: format!("user{id}"), display_name: format!("User {id}") }
    }

    #[test]
    fn cost_is_rounded_to_six_places() {
        assert_eq!(token_cost(1000, 0.00002), 0.02);
        assert_eq!(token_cost(1, 0.0000004), 0.0);
        assert_eq!(token_cost(1234, 0.00002), 0.02468);
    }

    #[test]
    fn month_totals_ignore_other_months_and_ids() {
        let march = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let april = Utc.with_ymd_and_hms(2025, 4, 2, 8, 0, 0).unwrap();
        let march_last_year = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();

        let mut ledger = TokenLedger::default();
        ledger.record(&channel(1), &user(10), 1000, 0.00002, march);
        ledger.record(&channel(2), &user(11), 500, 0.00002, march);
        ledger.record(&channel(1), &user(10), 2000, 0.00002, april);
        ledger.record(&channel(1), &user(10), 4000, 0.00002, march_last_year);

        assert!((ledger.month_total_for_user(10, march) - 0.02).abs() < 1e-12);
        assert!((ledger.month_total_for_channel(2, march) - 0.01).abs() < 1e-12);
        assert!((ledger.month_total_all_users(march) - 0.03).abs() < 1e-12);
        assert!((ledger.month_total_all_channels(april) - 0.04).abs() < 1e-12);
        assert_eq!(ledger.total_tokens, 7500);
    }

    #[test]
    fn running_total_stays_on_the_cost_grid() {
        let at = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap();
        let mut ledger = TokenLedger::default();
        ledger.record(&channel(1), &user(10), 5000, 0.00002, at);
        assert_eq!(ledger.total_cost, 0.1);

        let added = ledger.record(&channel(1), &user(10), 1000, 0.00002, at);
        assert_eq!(added, 0.02);
        assert_eq!(ledger.total_cost, 0.12);
        assert_eq!(ledger.month_total_for_user(10, at), 0.12);

        for _ in 0..50 {
            ledger.record(&channel(2), &user(11), 700, 0.00002, at);
        }
        assert_eq!(ledger.total_cost, 0.82);
        assert_eq!(ledger.user_history.len(), 52);
    }

    #[test]
    fn empty_document_deserializes_to_default() {
        let ledger: TokenLedger = serde_json::from_str("{}").unwrap();
        assert_eq!(ledger, TokenLedger::default());
    }
}
