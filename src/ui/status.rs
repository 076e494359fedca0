// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};

use crate::lifecycle::LifecycleState;
use crate::notifications::NotificationGate;
use crate::session::AppSession;

/// Everything the UI renders, captured at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub session_id: String,
    pub update_available: bool,
    pub update_version: Option<String>,
    pub lifecycle_state: LifecycleState,
    pub is_online: bool,
    pub pending_sync: Vec<String>,
    pub push_enabled: bool,
}

impl StatusSnapshot {
    pub fn capture(session: &AppSession, notifications: &NotificationGate) -> Self {
        let prompt = session.update_notice().prompt();
        Self {
            session_id: session.id().to_string(),
            update_available: prompt.update_available,
            update_version: prompt.version,
            lifecycle_state: session.lifecycle().state(),
            is_online: session.banner().is_online(),
            pending_sync: session.pending().pending_tags(),
            push_enabled: notifications.push_enabled(),
        }
    }
}
