// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::PlatformError;
use crate::platform::asset_cache::AssetCache;
use crate::platform::events::{ContainerEvent, WorkerState, WorkerVersion};
use crate::platform::hub::EventHub;
use crate::platform::messages::WorkerMessage;
use crate::platform::traits::{
    RegisterOptions, RegistrationHandle, SyncManager, UpdateViaCache, WorkerContainer,
};
use crate::sync::SyncDispatcher;

/// Worker script as served by the application origin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkerManifest {
    pub version: String,
    #[serde(default)]
    pub precache: Vec<String>,
}

#[derive(Debug, Clone)]
struct Registration {
    script_url: Url,
    scope: String,
    update_via_cache: UpdateViaCache,
    active: Option<WorkerVersion>,
    waiting: Option<WorkerVersion>,
    controlling: bool,
}

impl Registration {
    fn handle(&self) -> RegistrationHandle {
        RegistrationHandle {
            scope: self.scope.clone(),
            active_version_present: self.active.is_some(),
            waiting_version: self.waiting.clone(),
        }
    }
}

/// Native worker container backed by the application origin over HTTP.
///
/// The manifest fetched from the script URL decides the worker version. The
/// first version activates and claims the client straight away; later
/// versions wait until they receive `SKIP_WAITING`. Registration state lives
/// for the whole process, so it survives session reloads.
pub struct HttpWorkerHost {
    client: Client,
    origin: Url,
    cache: AssetCache,
    hub: Arc<EventHub>,
    sync: Option<Arc<SyncDispatcher>>,
    registration: Mutex<Option<Registration>>,
}

impl HttpWorkerHost {
    pub fn new(
        client: Client,
        origin: Url,
        cache: AssetCache,
        hub: Arc<EventHub>,
        sync: Option<Arc<SyncDispatcher>>,
    ) -> Self {
        Self {
            client,
            origin,
            cache,
            hub,
            sync,
            registration: Mutex::new(None),
        }
    }

    #[cfg(test)]
    fn active_version(&self) -> Option<WorkerVersion> {
        self.lock().as_ref().and_then(|reg| reg.active.clone())
    }

    async fn fetch_manifest(
        &self,
        script_url: &Url,
        policy: UpdateViaCache,
    ) -> Result<WorkerManifest, PlatformError> {
        let mut request = self.client.get(script_url.clone());
        if policy != UpdateViaCache::All {
            request = request.header(CACHE_CONTROL, "no-cache");
        }

        let response = request.send().await?.error_for_status()?;
        let body = response.text().await?;
        let manifest: WorkerManifest = serde_json::from_str(&body)
            .map_err(|e| PlatformError::InvalidManifest(e.to_string()))?;

        if manifest.version.trim().is_empty() {
            return Err(PlatformError::InvalidManifest("empty version".to_string()));
        }
        Ok(manifest)
    }

    /// Run the install phase for `manifest`. On success the version is installed
    /// but not yet activated.
    async fn install(&self, manifest: &WorkerManifest) -> Result<WorkerVersion, PlatformError> {
        let version = WorkerVersion::new(manifest.version.clone());
        info!(version = %version, assets = manifest.precache.len(), "Installing worker");

        self.hub.publish(ContainerEvent::UpdateFound { version: version.clone() });
        self.publish_state(&version, WorkerState::Installing);

        for asset in &manifest.precache {
            let result = match self.origin.join(asset) {
                Ok(url) => match self.cache.store(&url).await {
                    Ok(_) => Ok(url),
                    Err(e) => Err(e),
                },
                Err(e) => Err(PlatformError::from(e)),
            };
            match result {
                Ok(url) => {
                    self.hub.post_to_clients(&WorkerMessage::CacheUpdated { url: url.to_string() });
                }
                Err(e) => {
                    warn!(version = %version, asset = %asset, error = %e, "Precache failed, discarding worker");
                    self.publish_state(&version, WorkerState::Redundant);
                    return Err(e);
                }
            }
        }

        self.publish_state(&version, WorkerState::Installed);
        Ok(version)
    }

    fn activate(&self, version: &WorkerVersion, previous: Option<&WorkerVersion>) {
        self.publish_state(version, WorkerState::Activating);
        self.publish_state(version, WorkerState::Activated);
        if let Some(old) = previous {
            self.publish_state(old, WorkerState::Redundant);
        }
        info!(version = %version, "Worker activated and controlling");
        self.hub.publish(ContainerEvent::ControllerChange);
    }

    /// Install `manifest` next to the current registration and park it as the
    /// waiting worker, replacing any older waiting one.
    async fn install_waiting(&self, manifest: &WorkerManifest) -> Result<(), PlatformError> {
        let version = self.install(manifest).await?;

        let replaced = {
            let mut guard = self.lock();
            let reg = guard.as_mut().ok_or(PlatformError::NoRegistration)?;
            reg.waiting.replace(version.clone())
        };
        if let Some(old) = replaced.filter(|old| *old != version) {
            self.publish_state(&old, WorkerState::Redundant);
        }

        info!(version = %version, "Worker installed and waiting");
        Ok(())
    }

    fn publish_state(&self, version: &WorkerVersion, state: WorkerState) {
        self.hub.publish(ContainerEvent::StateChanged {
            version: version.clone(),
            state,
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Registration>> {
        self.registration.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl WorkerContainer for HttpWorkerHost {
    async fn register(
        &self,
        script_url: &str,
        options: RegisterOptions,
    ) -> Result<RegistrationHandle, PlatformError> {
        if !options.scope.starts_with('/') {
            return Err(PlatformError::RegistrationRejected(format!(
                "scope must be an absolute path: {}",
                options.scope
            )));
        }
        let script_url = self.origin.join(script_url)?;
        if script_url.origin() != self.origin.origin() {
            return Err(PlatformError::RegistrationRejected(format!(
                "script {} is not same-origin",
                script_url
            )));
        }

        let manifest = self.fetch_manifest(&script_url, options.update_via_cache).await?;

        let existing = {
            let mut guard = self.lock();
            match guard.as_mut() {
                Some(reg) if reg.script_url == script_url && reg.scope == options.scope => {
                    reg.update_via_cache = options.update_via_cache;
                    Some((reg.active.clone(), reg.waiting.clone()))
                }
                _ => None,
            }
        };

        match existing {
            Some((active, waiting)) => {
                let known = active.as_ref().map(WorkerVersion::as_str) == Some(manifest.version.as_str())
                    || waiting.as_ref().map(WorkerVersion::as_str) == Some(manifest.version.as_str());
                if !known {
                    self.install_waiting(&manifest).await?;
                }
            }
            None => {
                *self.lock() = Some(Registration {
                    script_url: script_url.clone(),
                    scope: options.scope.clone(),
                    update_via_cache: options.update_via_cache,
                    active: None,
                    waiting: None,
                    controlling: false,
                });

                match self.install(&manifest).await {
                    Ok(version) => {
                        if let Some(reg) = self.lock().as_mut() {
                            reg.active = Some(version.clone());
                            reg.controlling = true;
                        }
                        self.activate(&version, None);
                    }
                    Err(e) => {
                        *self.lock() = None;
                        return Err(e);
                    }
                }
            }
        }

        let handle = self.lock().as_ref().map(Registration::handle).ok_or(PlatformError::NoRegistration)?;
        info!(script = %script_url, scope = %handle.scope, "Worker registered");
        Ok(handle)
    }

    async fn unregister_all(&self) -> Result<usize, PlatformError> {
        let removed = self.lock().take();
        match removed {
            Some(reg) => {
                info!(script = %reg.script_url, scope = %reg.scope, "Worker unregistered");
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn update(&self) -> Result<(), PlatformError> {
        let (script_url, policy, active, waiting) = {
            let guard = self.lock();
            let reg = guard.as_ref().ok_or(PlatformError::NoRegistration)?;
            (reg.script_url.clone(), reg.update_via_cache, reg.active.clone(), reg.waiting.clone())
        };

        let manifest = self.fetch_manifest(&script_url, policy).await?;
        let version = manifest.version.as_str();
        if active.as_ref().map(WorkerVersion::as_str) == Some(version)
            || waiting.as_ref().map(WorkerVersion::as_str) == Some(version)
        {
            debug!(version, "Worker script unchanged");
            return Ok(());
        }

        self.install_waiting(&manifest).await
    }

    fn has_controller(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|reg| reg.controlling && reg.active.is_some())
    }

    async fn post_to_waiting(&self, message: WorkerMessage) -> Result<(), PlatformError> {
        let (waiting, previous) = {
            let guard = self.lock();
            let reg = guard.as_ref().ok_or(PlatformError::NoRegistration)?;
            let waiting = reg.waiting.clone().ok_or(PlatformError::NoWaitingWorker)?;
            (waiting, reg.active.clone())
        };

        match message {
            WorkerMessage::SkipWaiting => {
                {
                    let mut guard = self.lock();
                    let reg = guard.as_mut().ok_or(PlatformError::NoRegistration)?;
                    reg.active = reg.waiting.take();
                    reg.controlling = true;
                }
                self.activate(&waiting, previous.as_ref());
            }
            other => {
                debug!(message = ?other, "Waiting worker ignores message");
            }
        }
        Ok(())
    }

    fn subscribe(&self) -> UnboundedReceiver<ContainerEvent> {
        self.hub.subscribe()
    }

    fn sync_manager(&self) -> Option<Arc<dyn SyncManager>> {
        if self.lock().is_none() {
            return None;
        }
        self.sync
            .as_ref()
            .map(|dispatcher| Arc::clone(dispatcher) as Arc<dyn SyncManager>)
    }
}
