// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::platform::{NotificationPermissions, PermissionState};

/// Records the user's answer to the notification permission prompt.
///
/// Push features stay off unless the last answer was `granted`.
pub struct NotificationGate {
    permissions: Arc<dyn NotificationPermissions>,
    outcome_tx: watch::Sender<Option<PermissionState>>,
}

impl NotificationGate {
    pub fn new(permissions: Arc<dyn NotificationPermissions>) -> Self {
        let (outcome_tx, _) = watch::channel(None);
        Self { permissions, outcome_tx }
    }

    /// Ask for permission. Only called on an explicit user request.
    ///
    /// A platform error counts as no decision (`default`).
    pub async fn request(&self) -> PermissionState {
        let outcome = match self.permissions.request_permission().await {
            Ok(PermissionState::Granted) => {
                info!("Notification permission granted");
                PermissionState::Granted
            }
            Ok(PermissionState::Denied) => {
                warn!("Notification permission denied, push disabled");
                PermissionState::Denied
            }
            Ok(PermissionState::Default) => {
                info!("Notification permission prompt dismissed");
                PermissionState::Default
            }
            Err(e) => {
                warn!(error = %e, "Notification permission request failed, push disabled");
                PermissionState::Default
            }
        };
        self.outcome_tx.send_replace(Some(outcome));
        outcome
    }

    pub fn push_enabled(&self) -> bool {
        *self.outcome_tx.borrow() == Some(PermissionState::Granted)
    }

    #[cfg(test)]
    fn last_outcome(&self) -> Option<PermissionState> {
        *self.outcome_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<PermissionState>> {
        self.outcome_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedPermissions;

    #[tokio::test]
    async fn test_granted_enables_push() {
        let gate = NotificationGate::new(Arc::new(ScriptedPermissions(Some(PermissionState::Granted))));
        assert!(!gate.push_enabled());
        assert_eq!(gate.last_outcome(), None);

        assert_eq!(gate.request().await, PermissionState::Granted);
        assert!(gate.push_enabled());
    }

    #[tokio::test]
    async fn test_denied_disables_push() {
        let gate = NotificationGate::new(Arc::new(ScriptedPermissions(Some(PermissionState::Denied))));

        assert_eq!(gate.request().await, PermissionState::Denied);
        assert!(!gate.push_enabled());
        assert_eq!(gate.last_outcome(), Some(PermissionState::Denied));
    }

    #[tokio::test]
    async fn test_platform_error_degrades() {
        let gate = NotificationGate::new(Arc::new(ScriptedPermissions(None)));

        assert_eq!(gate.request().await, PermissionState::Default);
        assert!(!gate.push_enabled());
    }
}
