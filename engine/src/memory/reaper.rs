//! Background purge of expired sessions
//!
//! Expired sessions are already invisible to readers; the reaper only
//! reclaims their storage.

use super::ContextStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawn a task that purges expired sessions every `interval` until
/// `shutdown` is cancelled
pub fn spawn_reaper(
    store: Arc<dyn ContextStore>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("Session reaper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match store.purge_expired().await {
                        Ok(0) => {}
                        Ok(n) => tracing::info!("Purged {} expired session(s)", n),
                        Err(e) => tracing::warn!("Session purge failed: {}", e),
                    }
                }
            }
        }
    })
}
