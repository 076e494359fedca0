// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version string advertised by a worker manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerVersion(String);

impl WorkerVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle phase of a single worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

/// Events delivered by the worker container to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerEvent {
    /// A new worker version started installing.
    UpdateFound { version: WorkerVersion },

    /// A worker version moved to a new phase.
    StateChanged {
        version: WorkerVersion,
        state: WorkerState,
    },

    /// A different worker took control of the client.
    ControllerChange,

    /// Raw payload posted by a worker to its clients.
    Message(serde_json::Value),
}

/// Binary network reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    Online,
    Offline,
}

impl ConnectivityState {
    pub fn from_online(online: bool) -> Self {
        if online {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        }
    }

    pub fn is_online(self) -> bool {
        self == ConnectivityState::Online
    }
}
