// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use tracing::info;

use crate::error::PlatformError;
use crate::platform::traits::{NotificationPermissions, PermissionState};

/// Headless hosts cannot prompt, so the answer comes from configuration.
pub struct ConfiguredPermissions {
    answer: PermissionState,
}

impl ConfiguredPermissions {
    pub fn new(answer: PermissionState) -> Self {
        Self { answer }
    }
}

#[async_trait]
impl NotificationPermissions for ConfiguredPermissions {
    async fn request_permission(&self) -> Result<PermissionState, PlatformError> {
        info!(answer = ?self.answer, "Notification permission requested");
        Ok(self.answer)
    }
}
