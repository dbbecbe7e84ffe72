//! Retention service for periodic session cleanup.
//!
//! Cleanup also runs on demand from the `/session` menu; this task only
//! exists when `sessions.cleanup_interval_seconds` is non-zero.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::session_store::SessionStore;

/// Spawn the retention background task.
///
/// On each tick it keeps the `retain_per_chat` most recent session logs of
/// every chat and deletes the rest. The first tick fires immediately.
#[must_use]
pub fn spawn_retention_task(
    store: Arc<SessionStore>,
    retain_per_chat: usize,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("retention task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    match store.cleanup(retain_per_chat).await {
                        Ok(deleted) => info!(deleted, retain_per_chat, "retention purge completed"),
                        Err(err) => error!(%err, "retention purge failed"),
                    }
                }
            }
        }
    })
}
