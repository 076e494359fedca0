// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::PlatformError;
use crate::platform::hub::EventHub;
use crate::platform::messages::WorkerMessage;
use crate::platform::traits::SyncManager;
use crate::subscription::Subscription;
use crate::sync::flusher::OutboxFlusher;

/// How a failed sync pass is retried before the tag is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based), doubling each time.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

/// Background-sync facility of the host worker.
///
/// Tags are deduplicated by name while a pass is queued or running. Each pass
/// drains the outbox and posts `SYNC_COMPLETE` to clients on success.
pub struct SyncDispatcher {
    queue: mpsc::UnboundedSender<String>,
    registered: Arc<Mutex<HashSet<String>>>,
}

impl SyncDispatcher {
    pub fn spawn(
        flusher: Arc<OutboxFlusher>,
        hub: Arc<EventHub>,
        policy: RetryPolicy,
    ) -> (Arc<Self>, Subscription) {
        let (queue, rx) = mpsc::unbounded_channel();
        let registered = Arc::new(Mutex::new(HashSet::new()));

        let worker = Subscription::spawn(
            "sync-dispatcher",
            run_passes(rx, flusher, hub, policy, Arc::clone(&registered)),
        );

        (Arc::new(Self { queue, registered }), worker)
    }

    #[cfg(test)]
    fn is_registered(&self, tag: &str) -> bool {
        lock(&self.registered).contains(tag)
    }
}

#[async_trait]
impl SyncManager for SyncDispatcher {
    async fn register(&self, tag: &str) -> Result<(), PlatformError> {
        if !lock(&self.registered).insert(tag.to_string()) {
            debug!(tag, "Sync tag already registered");
            return Ok(());
        }

        if self.queue.send(tag.to_string()).is_err() {
            lock(&self.registered).remove(tag);
            return Err(PlatformError::SyncRejected("sync dispatcher stopped".to_string()));
        }

        info!(tag, "Sync tag registered");
        Ok(())
    }
}

async fn run_passes(
    mut rx: mpsc::UnboundedReceiver<String>,
    flusher: Arc<OutboxFlusher>,
    hub: Arc<EventHub>,
    policy: RetryPolicy,
    registered: Arc<Mutex<HashSet<String>>>,
) {
    while let Some(tag) = rx.recv().await {
        let max_attempts = policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match flusher.flush().await {
                Ok(uploaded) => {
                    info!(tag = %tag, uploaded, attempt, "Sync pass complete");
                    hub.post_to_clients(&WorkerMessage::SyncComplete { tag: Some(tag.clone()) });
                    break;
                }
                Err(e) => {
                    warn!(tag = %tag, attempt, error = %e, "Sync pass failed");
                    if attempt < max_attempts {
                        tokio::time::sleep(policy.delay_after(attempt)).await;
                    } else {
                        warn!(tag = %tag, attempts = max_attempts, "Giving up on sync tag");
                    }
                }
            }
        }

        lock(&registered).remove(&tag);
    }
}

fn lock(set: &Mutex<HashSet<String>>) -> std::sync::MutexGuard<'_, HashSet<String>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
