//! Usage accounting: per-run metering and the durable per-day ledger.

pub mod ledger;
pub mod meter;
pub mod models;

pub use ledger::{LedgerError, UsageLedger};
pub use meter::{Pricing, UsageMeter};
pub use models::{
    DateRange, PaperCounts, StageUsage, UsageEntry, UsageRecord, UsageTotals, UserUsageSummary,
};
