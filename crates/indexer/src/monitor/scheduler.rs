use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

use crate::rpc::{ChainHeightSource, RpcError};

/// First multiple of `interval_ms` at or after `now_ms`
pub fn next_boundary_ms(now_ms: u64, interval_ms: u64) -> u64 {
    if interval_ms == 0 {
        return now_ms;
    }
    now_ms.div_ceil(interval_ms) * interval_ms
}

/// Time to sleep from `now` until the next interval boundary
pub fn duration_until_next_boundary(now: DateTime<Utc>, interval: Duration) -> Duration {
    let now_ms = now.timestamp_millis().max(0) as u64;
    let interval_ms = interval.as_millis() as u64;
    Duration::from_millis(next_boundary_ms(now_ms, interval_ms) - now_ms)
}

/// Block until the chain reaches `migration_block`
///
/// A failed height read ends the wait with that error; node fallback has
/// already been applied by the height source.
pub async fn wait_for_migration_block(
    chain: &dyn ChainHeightSource,
    migration_block: u64,
    poll: Duration,
) -> Result<u64, RpcError> {
    let mut announced = false;
    loop {
        let height = chain.current_block().await?;
        if height >= migration_block {
            info!(height, migration_block, "Migration block reached");
            return Ok(height);
        }
        if !announced {
            info!(
                height,
                migration_block,
                remaining = migration_block - height,
                "Waiting for migration block"
            );
            announced = true;
        }
        sleep(poll).await;
    }
}
