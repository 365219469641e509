pub mod message_cache;
pub mod response_cache;

pub use message_cache::{CacheConfig, ChannelMessageCache, SenderFilter};
pub use response_cache::SummaryResponseCache;
