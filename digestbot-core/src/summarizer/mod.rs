pub mod hydrator;
pub mod ledger;
pub mod period;
pub mod prompt;
pub mod service;
pub mod settings;

pub use hydrator::{Coverage, Hydrator};
pub use ledger::LedgerService;
pub use period::parse_period;
pub use prompt::PromptBuilder;
pub use service::{
    GeneratedSummary, MonthTotals, SummarizerService, SummaryOutcome, SummaryRequest, UsageReport,
};
pub use settings::SummarizerSettings;
