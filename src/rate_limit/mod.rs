//! Per-client request gate and its maintenance task.

mod limiter;
mod sweeper;

pub use limiter::{
    Decision, QuotaStatus, RateLimitPolicy, RateLimitStats, RateLimiter, UsageEntry, UsageRecord,
};
pub use sweeper::run_sweeper;
