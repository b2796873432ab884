//! Background upkeep: revocation ledger pruning and rate-limit bucket
//! eviction.

use std::sync::Arc;
use std::time::Duration;

use chessearn_core::auth::revocation::RevocationLedger;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::middleware::rate_limit::LoginRateLimiter;

/// Buckets idle this long have fully refilled and can be dropped.
const BUCKET_IDLE: Duration = Duration::from_secs(10 * 60);

/// Start the periodic pruner. Runs once immediately, then every `interval`
/// until `shutdown` is cancelled.
pub fn start_revocation_pruner(
    ledger: Arc<dyn RevocationLedger>,
    limiter: Arc<LoginRateLimiter>,
    interval: Duration,
    retention: chrono::Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("revocation pruner stopping");
                    break;
                }
                _ = timer.tick() => {
                    prune_once(ledger.as_ref(), &limiter, retention).await;
                }
            }
        }
    })
}

/// One pruning pass. Failures are logged; the next tick retries.
pub async fn prune_once(
    ledger: &dyn RevocationLedger,
    limiter: &LoginRateLimiter,
    retention: chrono::Duration,
) {
    match ledger.prune_older_than(retention).await {
        Ok(0) => debug!("no revoked tokens to prune"),
        Ok(removed) => info!(removed, "pruned revoked tokens"),
        Err(e) => error!(error = %e, "failed to prune revoked tokens"),
    }

    let evicted = limiter.evict_idle(BUCKET_IDLE);
    if evicted > 0 {
        debug!(evicted, "evicted idle login rate-limit buckets");
    }
}
