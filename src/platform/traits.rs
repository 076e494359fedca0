// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::{Receiver, UnboundedReceiver};

use crate::error::PlatformError;
use crate::platform::events::{ConnectivityState, ContainerEvent, WorkerVersion};
use crate::platform::messages::WorkerMessage;

/// HTTP cache policy applied when fetching the worker script on update checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateViaCache {
    Imports,
    All,
    #[default]
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterOptions {
    pub scope: String,
    pub update_via_cache: UpdateViaCache,
}

/// Opaque reference to the active worker registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationHandle {
    pub scope: String,
    pub active_version_present: bool,
    /// Version already installed and waiting when registration resolved
    pub waiting_version: Option<WorkerVersion>,
}

#[async_trait]
pub trait WorkerContainer: Send + Sync {
    /// Register the worker script for the given scope
    async fn register(
        &self,
        script_url: &str,
        options: RegisterOptions,
    ) -> Result<RegistrationHandle, PlatformError>;

    /// Drop every existing registration, returning how many were removed
    async fn unregister_all(&self) -> Result<usize, PlatformError>;

    /// Re-check the registered script for a newer version
    async fn update(&self) -> Result<(), PlatformError>;

    /// Whether a worker currently controls the client
    fn has_controller(&self) -> bool;

    /// Post a message to the installed-but-waiting worker
    async fn post_to_waiting(&self, message: WorkerMessage) -> Result<(), PlatformError>;

    /// Subscribe to container events. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> UnboundedReceiver<ContainerEvent>;

    /// Background-sync facility of the active registration, if any
    fn sync_manager(&self) -> Option<Arc<dyn SyncManager>>;
}

#[async_trait]
pub trait SyncManager: Send + Sync {
    /// Ask to be woken for the given tag once connectivity allows
    async fn register(&self, tag: &str) -> Result<(), PlatformError>;
}

pub trait ConnectivitySource: Send + Sync {
    /// Current reachability flag
    fn is_online(&self) -> bool;

    /// Subscribe to reachability reports. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> Receiver<ConnectivityState>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    Default,
}

#[async_trait]
pub trait NotificationPermissions: Send + Sync {
    async fn request_permission(&self) -> Result<PermissionState, PlatformError>;
}

pub trait PageReloader: Send + Sync {
    /// Reload the whole application
    fn reload(&self);
}
