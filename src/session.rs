// SPDX-License-Identifier: GPL-3.0-only
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::connectivity::ConnectivityMonitor;
use crate::lifecycle::{LifecycleController, LifecycleSession, LifecycleSettings};
use crate::platform::{ConnectivitySource, ConnectivityState, PageReloader, WorkerContainer};
use crate::subscription::Subscription;
use crate::sync::{OutboxFlusher, PendingSyncTracker};
use crate::ui::{ConnectivityBanner, UpdateNotice};

/// Process-wide dependencies every session is built from.
#[derive(Clone)]
pub struct SessionContext {
    pub container: Arc<dyn WorkerContainer>,
    pub connectivity: Arc<dyn ConnectivitySource>,
    pub reloader: Arc<dyn PageReloader>,
    pub flusher: Arc<OutboxFlusher>,
    pub settings: LifecycleSettings,
}

struct SessionTasks {
    lifecycle: LifecycleSession,
    monitor: Subscription,
    uploads: Subscription,
}

/// One application load: a lifecycle controller, a connectivity monitor and
/// the in-memory state they share. A reload replaces the whole session.
pub struct AppSession {
    id: Uuid,
    lifecycle: Arc<LifecycleController>,
    connectivity: Arc<ConnectivityMonitor>,
    pending: Arc<PendingSyncTracker>,
    tasks: Mutex<Option<SessionTasks>>,
}

impl AppSession {
    pub async fn start(ctx: &SessionContext) -> Arc<Self> {
        let id = Uuid::new_v4();
        let pending = Arc::new(PendingSyncTracker::new());

        let lifecycle = Arc::new(LifecycleController::new(
            Arc::clone(&ctx.container),
            Arc::clone(&ctx.reloader),
            Arc::clone(&pending),
            ctx.settings.clone(),
        ));
        let connectivity = Arc::new(ConnectivityMonitor::new(
            Arc::clone(&ctx.connectivity),
            Arc::clone(&ctx.container),
            Arc::clone(&pending),
            ctx.settings.sync_tag.clone(),
        ));

        let lifecycle_session = lifecycle.start().await;
        // Subscribe before the monitor re-reads the flag, so a reconnect
        // during registration reaches the upload task too.
        let uploads = Subscription::spawn(
            "foreground-uploads",
            run_foreground_uploads(
                connectivity.subscribe(),
                Arc::clone(&ctx.container),
                Arc::clone(&ctx.flusher),
            ),
        );
        let monitor = connectivity.start().await;

        info!(
            session = %id,
            state = ?lifecycle.state(),
            offline_support = lifecycle_session.is_active(),
            online = connectivity.state().is_online(),
            "Application session started"
        );

        Arc::new(Self {
            id,
            lifecycle,
            connectivity,
            pending,
            tasks: Mutex::new(Some(SessionTasks {
                lifecycle: lifecycle_session,
                monitor,
                uploads,
            })),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleController> {
        &self.lifecycle
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.connectivity
    }

    pub fn pending(&self) -> &Arc<PendingSyncTracker> {
        &self.pending
    }

    pub fn update_notice(&self) -> UpdateNotice {
        UpdateNotice::new(Arc::clone(&self.lifecycle))
    }

    pub fn banner(&self) -> ConnectivityBanner {
        ConnectivityBanner::new(self.connectivity.subscribe())
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    /// Stop every listener of this session. Safe to call more than once.
    pub fn teardown(&self) {
        let Some(tasks) = self.lock().take() else {
            return;
        };
        tasks.lifecycle.teardown();
        tasks.monitor.unsubscribe();
        tasks.uploads.unsubscribe();
        info!(session = %self.id, "Application session torn down");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<SessionTasks>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Upload directly on reconnect when no background-sync facility exists.
async fn run_foreground_uploads(
    mut states: watch::Receiver<ConnectivityState>,
    container: Arc<dyn WorkerContainer>,
    flusher: Arc<OutboxFlusher>,
) {
    while states.changed().await.is_ok() {
        let online = states.borrow_and_update().is_online();
        if !online || container.sync_manager().is_some() {
            continue;
        }

        match flusher.flush().await {
            Ok(0) => debug!("Nothing to upload after reconnect"),
            Ok(uploaded) => info!(uploaded, "Uploaded queued meal logs after reconnect"),
            Err(e) => warn!(error = %e, "Foreground upload after reconnect failed"),
        }
    }
}
