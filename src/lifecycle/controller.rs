// SPDX-License-Identifier: GPL-3.0-only
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc::UnboundedReceiver, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Environment;
use crate::error::PlatformError;
use crate::lifecycle::state::{LifecycleState, UpdatePrompt};
use crate::platform::{
    ContainerEvent, PageReloader, RegisterOptions, RegistrationHandle, UpdateViaCache,
    WorkerContainer, WorkerMessage, WorkerState, WorkerVersion,
};
use crate::subscription::Subscription;
use crate::sync::PendingSyncTracker;

#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub script_url: String,
    pub scope: String,
    pub environment: Environment,
    pub recheck_interval: Duration,
    /// Tag assumed when `SYNC_COMPLETE` arrives without one
    pub sync_tag: String,
}

#[derive(Debug, Default)]
struct Inner {
    state: LifecycleState,
    started: bool,
    registration: Option<RegistrationHandle>,
    announced: Option<WorkerVersion>,
    reload_requested: bool,
}

/// Listener tasks attached to one successful registration.
///
/// Dropping the session (or calling `teardown`) stops the event loop and the
/// periodic re-check timer.
#[derive(Debug, Default)]
pub struct LifecycleSession {
    subscriptions: Vec<Subscription>,
}

impl LifecycleSession {
    pub fn inactive() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    pub fn teardown(self) {
        for subscription in self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

/// Owns worker registration and turns platform events into an update prompt.
pub struct LifecycleController {
    container: Arc<dyn WorkerContainer>,
    reloader: Arc<dyn PageReloader>,
    pending: Arc<PendingSyncTracker>,
    settings: LifecycleSettings,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<LifecycleState>,
    prompt_tx: watch::Sender<UpdatePrompt>,
}

impl LifecycleController {
    pub fn new(
        container: Arc<dyn WorkerContainer>,
        reloader: Arc<dyn PageReloader>,
        pending: Arc<PendingSyncTracker>,
        settings: LifecycleSettings,
    ) -> Self {
        let (state_tx, _) = watch::channel(LifecycleState::Unregistered);
        let (prompt_tx, _) = watch::channel(UpdatePrompt::default());
        Self {
            container,
            reloader,
            pending,
            settings,
            inner: Mutex::new(Inner::default()),
            state_tx,
            prompt_tx,
        }
    }

    /// Register the worker and attach the update watcher.
    ///
    /// Runs once per controller. Registration failures are logged and leave
    /// the controller `Unregistered` for the rest of the session.
    pub async fn start(self: &Arc<Self>) -> LifecycleSession {
        {
            let mut inner = self.lock();
            if inner.started {
                warn!("Lifecycle controller already started");
                return LifecycleSession::inactive();
            }
            inner.started = true;
        }

        if self.settings.environment.is_development() {
            match self.container.unregister_all().await {
                Ok(removed) => {
                    info!(removed, "Development environment, stale workers unregistered")
                }
                Err(e) => warn!(error = %e, "Failed to unregister workers in development"),
            }
            return LifecycleSession::inactive();
        }

        self.transition_to(LifecycleState::Registering);

        let options = RegisterOptions {
            scope: self.settings.scope.clone(),
            update_via_cache: UpdateViaCache::None,
        };
        let handle = match self.container.register(&self.settings.script_url, options).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(
                    script = %self.settings.script_url,
                    error = %e,
                    "Worker registration failed, continuing without offline support"
                );
                self.transition_to(LifecycleState::Unregistered);
                return LifecycleSession::inactive();
            }
        };

        info!(scope = %handle.scope, active = handle.active_version_present, "Worker registration confirmed");
        let waiting = handle.waiting_version.clone();
        self.lock().registration = Some(handle);
        self.transition_to(LifecycleState::Registered);

        // Watch for updates only once the registration is confirmed, and
        // before any update check can run.
        let events = self.container.subscribe();
        if let Some(version) = waiting {
            self.on_installed(version);
        }

        let event_loop = Subscription::spawn("lifecycle-events", Arc::clone(self).run_events(events));
        let recheck = Subscription::spawn(
            "lifecycle-recheck",
            Arc::clone(self).run_rechecks(self.settings.recheck_interval),
        );

        LifecycleSession {
            subscriptions: vec![event_loop, recheck],
        }
    }

    pub fn handle_event(&self, event: ContainerEvent) {
        match event {
            ContainerEvent::UpdateFound { version } => {
                debug!(version = %version, "Worker update found");
            }
            ContainerEvent::StateChanged { version, state: WorkerState::Installed } => {
                self.on_installed(version);
            }
            ContainerEvent::StateChanged { version, state } => {
                debug!(version = %version, state = ?state, "Worker state changed");
            }
            ContainerEvent::ControllerChange => self.on_controller_change(),
            ContainerEvent::Message(payload) => self.handle_message(&payload),
        }
    }

    pub fn handle_message(&self, payload: &Value) {
        match WorkerMessage::parse(payload) {
            Some(WorkerMessage::CacheUpdated { url }) => {
                info!(url = %url, "Worker refreshed cached asset");
            }
            Some(WorkerMessage::SyncComplete { tag }) => {
                let tag = tag.unwrap_or_else(|| self.settings.sync_tag.clone());
                if self.pending.clear(&tag) {
                    info!(tag = %tag, "Sync pass confirmed complete");
                } else {
                    debug!(tag = %tag, "Sync completion for a tag that was not pending");
                }
            }
            Some(WorkerMessage::SkipWaiting) => {
                debug!("Ignoring SKIP_WAITING addressed to a client");
            }
            None => {
                debug!(payload = %payload, "Ignoring unrecognised worker message");
            }
        }
    }

    /// User accepted the update: ask the waiting worker to take over.
    ///
    /// Returns `Ok(false)` when there is no update to accept.
    pub async fn accept_update(&self) -> Result<bool, PlatformError> {
        if self.state() != LifecycleState::UpdateAvailable {
            debug!(state = ?self.state(), "No update to accept");
            return Ok(false);
        }

        if let Err(e) = self.container.post_to_waiting(WorkerMessage::SkipWaiting).await {
            warn!(error = %e, "Failed to ask waiting worker to activate");
            return Err(e);
        }

        let mut inner = self.lock();
        if inner.state == LifecycleState::UpdateAvailable {
            self.transition(&mut inner, LifecycleState::Updating);
        }
        info!(version = ?inner.announced.as_ref().map(WorkerVersion::as_str), "Update accepted");
        Ok(true)
    }

    /// Hide the prompt. The installed worker keeps waiting and can still be
    /// accepted later or picked up by the next full reload.
    pub fn dismiss_update(&self) -> bool {
        if self.state() != LifecycleState::UpdateAvailable {
            return false;
        }
        let hidden = self.prompt_tx.send_if_modified(|prompt| {
            let was_visible = prompt.update_available;
            prompt.update_available = false;
            was_visible
        });
        if hidden {
            info!("Update prompt dismissed, waiting worker kept");
        }
        hidden
    }

    /// Ask the platform to re-check the registered script.
    pub async fn check_for_update(&self) -> Result<(), PlatformError> {
        if self.lock().registration.is_none() {
            return Err(PlatformError::NoRegistration);
        }

        match self.container.update().await {
            Ok(()) => {
                debug!("Worker update check finished");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Worker update check failed");
                Err(e)
            }
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state_tx.borrow()
    }

    pub fn prompt(&self) -> UpdatePrompt {
        self.prompt_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_prompt(&self) -> watch::Receiver<UpdatePrompt> {
        self.prompt_tx.subscribe()
    }

    async fn run_events(self: Arc<Self>, mut events: UnboundedReceiver<ContainerEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        debug!("Worker event channel closed");
    }

    async fn run_rechecks(self: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            debug!("Periodic worker update check");
            // Failures are logged by check_for_update.
            let _ = self.check_for_update().await;
        }
    }

    fn on_installed(&self, version: WorkerVersion) {
        // Without a controller this is the first install, not an update.
        if !self.container.has_controller() {
            info!(version = %version, "Worker installed for the first time");
            return;
        }

        let mut inner = self.lock();
        let current = inner.state;
        match current {
            LifecycleState::Registered => {
                inner.announced = Some(version.clone());
                if self.transition(&mut inner, LifecycleState::UpdateAvailable) {
                    self.show_prompt(&version);
                    info!(version = %version, "Worker update available");
                }
            }
            LifecycleState::UpdateAvailable => {
                if inner.announced.as_ref() == Some(&version) {
                    debug!(version = %version, "Update already announced");
                    return;
                }
                inner.announced = Some(version.clone());
                self.show_prompt(&version);
                info!(version = %version, "Newer worker replaced the waiting update");
            }
            state => {
                debug!(version = %version, state = ?state, "Ignoring installed worker");
            }
        }
    }

    fn on_controller_change(&self) {
        let mut inner = self.lock();
        let current = inner.state;
        match current {
            LifecycleState::UpdateAvailable | LifecycleState::Updating => {
                if inner.reload_requested {
                    debug!("Reload already requested");
                    return;
                }
                inner.reload_requested = true;
                drop(inner);
                info!("New worker took control, reloading application");
                self.reloader.reload();
            }
            state => {
                debug!(state = ?state, "Controller changed without a pending update");
            }
        }
    }

    fn show_prompt(&self, version: &WorkerVersion) {
        self.prompt_tx.send_replace(UpdatePrompt {
            update_available: true,
            version: Some(version.to_string()),
        });
    }

    fn transition_to(&self, next: LifecycleState) -> bool {
        let mut inner = self.lock();
        self.transition(&mut inner, next)
    }

    fn transition(&self, inner: &mut MutexGuard<'_, Inner>, next: LifecycleState) -> bool {
        let from = inner.state;
        if !from.can_transition_to(next) {
            warn!(from = ?from, to = ?next, "Rejected lifecycle transition");
            return false;
        }
        inner.state = next;
        self.state_tx.send_replace(next);
        debug!(from = ?from, to = ?next, "Lifecycle transition");
        true
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
