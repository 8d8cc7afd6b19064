//! Background eviction of abandoned rooms.

use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn a background task that retires sessions idle past the TTL,
/// whatever phase they were abandoned in. This bounds memory when a
/// room empties without every player sending an explicit leave.
pub fn spawn_session_sweeper(state: Arc<AppState>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(SWEEP_INTERVAL).await;

            let evicted = state.evict_idle().await;
            if evicted > 0 {
                tracing::info!("Sweeper evicted {} idle room(s)", evicted);
            }
        }
    });
}
