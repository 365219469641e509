// File: digestbot-common/src/models/mod.rs
pub mod message;
pub mod summary;
pub mod ledger;

pub use message::{ChannelId, ChannelRef, MessageId, MessageRecord, Requester, UserId};
pub use summary::{SummaryCacheEntry, SummaryKey, SummaryUsage};
pub use ledger::{TokenChannelEntry, TokenLedger, TokenUserEntry};
