// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use tokio::sync::{mpsc::Receiver, watch};
use tracing::{debug, info, warn};

use crate::platform::{ConnectivitySource, ConnectivityState, WorkerContainer};
use crate::subscription::Subscription;
use crate::sync::PendingSyncTracker;

/// Tracks reachability and asks for a background sync on reconnect.
///
/// Only an `Offline -> Online` transition requests a sync. Reports that
/// repeat the current state are ignored, so flapping sources cannot queue
/// duplicate requests.
pub struct ConnectivityMonitor {
    source: Arc<dyn ConnectivitySource>,
    container: Arc<dyn WorkerContainer>,
    pending: Arc<PendingSyncTracker>,
    sync_tag: String,
    state_tx: watch::Sender<ConnectivityState>,
}

impl ConnectivityMonitor {
    pub fn new(
        source: Arc<dyn ConnectivitySource>,
        container: Arc<dyn WorkerContainer>,
        pending: Arc<PendingSyncTracker>,
        sync_tag: impl Into<String>,
    ) -> Self {
        let initial = ConnectivityState::from_online(source.is_online());
        let (state_tx, _) = watch::channel(initial);
        Self {
            source,
            container,
            pending,
            sync_tag: sync_tag.into(),
            state_tx,
        }
    }

    /// Subscribe to the reachability source. Dropping the returned
    /// subscription stops listening.
    ///
    /// The flag is read again after subscribing. A reconnect since `new` is
    /// handled like any other report and requests a sync.
    pub async fn start(self: &Arc<Self>) -> Subscription {
        let reports = self.source.subscribe();
        let current = ConnectivityState::from_online(self.source.is_online());
        self.handle_report(current).await;
        info!(state = ?current, "Connectivity monitor started");

        Subscription::spawn("connectivity-monitor", Arc::clone(self).run(reports))
    }

    pub async fn handle_report(&self, next: ConnectivityState) {
        let mut previous = next;
        let changed = self.state_tx.send_if_modified(|state| {
            previous = *state;
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
        if !changed {
            debug!(state = ?next, "Reachability report unchanged");
            return;
        }

        match (previous, next) {
            (ConnectivityState::Offline, ConnectivityState::Online) => {
                info!("Back online");
                self.request_sync().await;
            }
            _ => info!("Gone offline"),
        }
    }

    pub fn state(&self) -> ConnectivityState {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state_tx.subscribe()
    }

    async fn run(self: Arc<Self>, mut reports: Receiver<ConnectivityState>) {
        while let Some(report) = reports.recv().await {
            self.handle_report(report).await;
        }
        debug!("Reachability source closed");
    }

    async fn request_sync(&self) {
        let Some(sync) = self.container.sync_manager() else {
            debug!(tag = %self.sync_tag, "Background sync unavailable, skipping request");
            return;
        };

        let newly_marked = self.pending.mark(&self.sync_tag);
        match sync.register(&self.sync_tag).await {
            Ok(()) => info!(tag = %self.sync_tag, "Background sync requested"),
            Err(e) => {
                warn!(tag = %self.sync_tag, error = %e, "Background sync request failed");
                if newly_marked {
                    self.pending.clear(&self.sync_tag);
                }
            }
        }
    }
}
