pub mod usage;

pub use usage::{day_key, Identity, QuotaClass, QuotaLimits, UsageDecision, UsageSnapshot};
