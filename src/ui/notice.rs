// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::PlatformError;
use crate::lifecycle::{LifecycleController, UpdatePrompt};
use crate::platform::ConnectivityState;

/// "A new version is available" notice bound to a lifecycle controller.
///
/// Reads the prompt channel and forwards the user's choice. It never touches
/// lifecycle state itself.
#[derive(Clone)]
pub struct UpdateNotice {
    controller: Arc<LifecycleController>,
}

impl UpdateNotice {
    pub fn new(controller: Arc<LifecycleController>) -> Self {
        Self { controller }
    }

    pub fn prompt(&self) -> UpdatePrompt {
        self.controller.prompt()
    }

    pub async fn on_accept(&self) -> Result<bool, PlatformError> {
        self.controller.accept_update().await
    }

    pub fn on_dismiss(&self) -> bool {
        self.controller.dismiss_update()
    }

    pub fn watch(&self) -> watch::Receiver<UpdatePrompt> {
        self.controller.subscribe_prompt()
    }
}

/// Offline indicator.
pub struct ConnectivityBanner {
    state: watch::Receiver<ConnectivityState>,
}

impl ConnectivityBanner {
    pub fn new(state: watch::Receiver<ConnectivityState>) -> Self {
        Self { state }
    }

    pub fn is_online(&self) -> bool {
        self.state.borrow().is_online()
    }

    /// Wait for the next reachability change. Returns `false` once the
    /// monitor is gone.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }
}
