use std::{sync::Arc, time::Duration};

use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use super::RateLimiter;
use crate::metrics;

/// Periodically drop expired usage records.
///
/// Lazy expiry only reclaims identities that come back, so one-shot clients
/// would otherwise stay in memory forever.
pub async fn run_sweeper(limiter: Arc<RateLimiter>, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick completes immediately
    ticker.tick().await;

    info!("🧹 Rate limit sweeper started - running every {} seconds", every.as_secs());

    loop {
        ticker.tick().await;

        let removed = limiter.cleanup_expired();
        metrics::record_sweep(removed, limiter.tracked_identities());

        info!(
            removed,
            tracked = limiter.tracked_identities(),
            "Cleaned up expired rate limit entries"
        );
    }
}
