// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender, UnboundedReceiver};

use crate::config::Environment;
use crate::error::PlatformError;
use crate::lifecycle::LifecycleSettings;
use crate::outbox::models::MealType;
use crate::outbox::{MealLogDraft, Outbox, QueuedMealLog};
use crate::platform::{
    ConnectivitySource, ConnectivityState, ContainerEvent, EventHub, NotificationPermissions,
    PageReloader, PermissionState, RegisterOptions, RegistrationHandle, WorkerContainer,
    WorkerMessage, WorkerVersion,
};
use crate::platform::traits::SyncManager;
use crate::sync::Uploader;

pub const TEST_SYNC_TAG: &str = "meal-log-upload";

/// Let spawned tasks on the current-thread runtime run to their next await.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

pub fn lifecycle_settings(environment: Environment) -> LifecycleSettings {
    LifecycleSettings {
        script_url: "/sw.js".to_string(),
        scope: "/".to_string(),
        environment,
        recheck_interval: Duration::from_secs(30 * 60),
        sync_tag: TEST_SYNC_TAG.to_string(),
    }
}

pub fn sample_meal(description: &str) -> QueuedMealLog {
    QueuedMealLog::new(MealLogDraft {
        meal_type: MealType::Dinner,
        description: description.to_string(),
        eaten_at: Utc::now(),
        photo_url: None,
    })
}

/// Scriptable stand-in for the platform worker container.
pub struct FakeContainer {
    reject_registration: bool,
    waiting_on_register: Option<WorkerVersion>,
    controller: AtomicBool,
    fail_posts: AtomicBool,
    fail_updates: AtomicBool,
    registered: AtomicBool,
    register_calls: AtomicUsize,
    unregister_calls: AtomicUsize,
    update_calls: AtomicUsize,
    posted: Mutex<Vec<WorkerMessage>>,
    sync: Mutex<Option<Arc<FakeSyncManager>>>,
    on_register: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    hub: EventHub,
}

impl FakeContainer {
    pub fn new() -> Self {
        Self {
            reject_registration: false,
            waiting_on_register: None,
            controller: AtomicBool::new(false),
            fail_posts: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            registered: AtomicBool::new(false),
            register_calls: AtomicUsize::new(0),
            unregister_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            posted: Mutex::new(Vec::new()),
            sync: Mutex::new(None),
            on_register: Mutex::new(None),
            hub: EventHub::new(),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject_registration: true,
            ..Self::new()
        }
    }

    pub fn with_waiting_on_register(mut self, version: &str) -> Self {
        self.waiting_on_register = Some(WorkerVersion::new(version));
        self
    }

    /// Expose a sync manager once registered.
    pub fn with_sync(self, sync: Arc<FakeSyncManager>) -> Self {
        *self.sync.lock().unwrap() = Some(sync);
        self
    }

    /// Run `hook` once, while the next registration is in flight.
    pub fn with_register_hook(self, hook: impl FnOnce() + Send + 'static) -> Self {
        *self.on_register.lock().unwrap() = Some(Box::new(hook));
        self
    }

    pub fn emit(&self, event: ContainerEvent) {
        self.hub.publish(event);
    }

    pub fn set_controller(&self, present: bool) {
        self.controller.store(present, Ordering::SeqCst);
    }

    pub fn set_registered(&self, registered: bool) {
        self.registered.store(registered, Ordering::SeqCst);
    }

    pub fn fail_posts(&self) {
        self.fail_posts.store(true, Ordering::SeqCst);
    }

    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn unregister_calls(&self) -> usize {
        self.unregister_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn posted(&self) -> Vec<WorkerMessage> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkerContainer for FakeContainer {
    async fn register(
        &self,
        _script_url: &str,
        options: RegisterOptions,
    ) -> Result<RegistrationHandle, PlatformError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        let hook = self.on_register.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        if self.reject_registration {
            return Err(PlatformError::RegistrationRejected("script returned 404".to_string()));
        }
        self.registered.store(true, Ordering::SeqCst);
        Ok(RegistrationHandle {
            scope: options.scope,
            active_version_present: true,
            waiting_version: self.waiting_on_register.clone(),
        })
    }

    async fn unregister_all(&self) -> Result<usize, PlatformError> {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        self.registered.store(false, Ordering::SeqCst);
        Ok(1)
    }

    async fn update(&self) -> Result<(), PlatformError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(PlatformError::Io(std::io::Error::other("update check offline")));
        }
        Ok(())
    }

    fn has_controller(&self) -> bool {
        self.controller.load(Ordering::SeqCst)
    }

    async fn post_to_waiting(&self, message: WorkerMessage) -> Result<(), PlatformError> {
        if self.fail_posts.load(Ordering::SeqCst) {
            return Err(PlatformError::NoWaitingWorker);
        }
        self.posted.lock().unwrap().push(message);
        Ok(())
    }

    fn subscribe(&self) -> UnboundedReceiver<ContainerEvent> {
        self.hub.subscribe()
    }

    fn sync_manager(&self) -> Option<Arc<dyn SyncManager>> {
        if !self.registered.load(Ordering::SeqCst) {
            return None;
        }
        let sync = self.sync.lock().unwrap().clone()?;
        Some(sync as Arc<dyn SyncManager>)
    }
}

/// Counts sync registrations per tag.
#[derive(Default)]
pub struct FakeSyncManager {
    calls: Mutex<Vec<String>>,
    reject: AtomicBool,
}

impl FakeSyncManager {
    pub fn rejecting() -> Self {
        Self {
            reject: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncManager for FakeSyncManager {
    async fn register(&self, tag: &str) -> Result<(), PlatformError> {
        self.calls.lock().unwrap().push(tag.to_string());
        if self.reject.load(Ordering::SeqCst) {
            return Err(PlatformError::SyncRejected("quota exceeded".to_string()));
        }
        Ok(())
    }
}

/// Reachability source driven by the test.
pub struct FakeConnectivity {
    online: AtomicBool,
    subscribers: Mutex<Vec<Sender<ConnectivityState>>>,
}

impl FakeConnectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn report(&self, state: ConnectivityState) {
        self.online.store(state.is_online(), Ordering::SeqCst);
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.try_send(state).is_ok());
    }
}

impl ConnectivitySource for FakeConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> Receiver<ConnectivityState> {
        let (tx, rx) = mpsc::channel(16);
        self.subscribers.lock().unwrap().push(tx);
        rx
    }
}

#[derive(Default)]
pub struct CountingReloader {
    count: AtomicUsize,
}

impl CountingReloader {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl PageReloader for CountingReloader {
    fn reload(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Permission prompt that answers with a fixed outcome or fails.
pub struct ScriptedPermissions(pub Option<PermissionState>);

#[async_trait]
impl NotificationPermissions for ScriptedPermissions {
    async fn request_permission(&self) -> Result<PermissionState, PlatformError> {
        self.0.ok_or_else(|| PlatformError::Io(std::io::Error::other("permission prompt unavailable")))
    }
}

/// In-memory outbox keeping insertion order.
#[derive(Default)]
pub struct MemoryOutbox {
    entries: Mutex<Vec<QueuedMealLog>>,
}

#[async_trait]
impl Outbox for MemoryOutbox {
    async fn enqueue(&self, entry: QueuedMealLog) -> anyhow::Result<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    async fn pending(&self, limit: u32) -> anyhow::Result<Vec<QueuedMealLog>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.iter().take(limit as usize).cloned().collect())
    }

    async fn mark_uploaded(&self, ids: &[String]) -> anyhow::Result<()> {
        self.entries.lock().unwrap().retain(|e| !ids.contains(&e.id));
        Ok(())
    }

    async fn record_failure(&self, ids: &[String], error: &str) -> anyhow::Result<()> {
        for entry in self.entries.lock().unwrap().iter_mut() {
            if ids.contains(&entry.id) {
                entry.attempts += 1;
                entry.last_error = Some(error.to_string());
            }
        }
        Ok(())
    }

    async fn count_pending(&self) -> anyhow::Result<u64> {
        Ok(self.entries.lock().unwrap().len() as u64)
    }
}

/// Uploader that records batch sizes, optionally failing every call.
#[derive(Default)]
pub struct RecordingUploader {
    fail: bool,
    batches: Mutex<Vec<usize>>,
}

impl RecordingUploader {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl Uploader for RecordingUploader {
    async fn upload(&self, batch: &[QueuedMealLog]) -> anyhow::Result<()> {
        self.batches.lock().unwrap().push(batch.len());
        if self.fail {
            anyhow::bail!("upload endpoint unavailable");
        }
        Ok(())
    }
}
