pub mod auto_prune;
pub mod cache_maintenance;
pub mod daily_digest;
pub mod startup_hydration;

pub use auto_prune::{spawn_auto_prune_task, AutoPruner};
pub use cache_maintenance::spawn_cache_prune_task;
pub use daily_digest::{spawn_daily_digest_task, DailyDigest};
pub use startup_hydration::StartupHydration;
