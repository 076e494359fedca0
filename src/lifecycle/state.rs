// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};

/// Worker registration lifecycle as seen by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Unregistered,
    Registering,
    Registered,
    UpdateAvailable,
    Updating,
}

impl LifecycleState {
    /// Whether `self -> next` is an edge of the lifecycle graph.
    ///
    /// `UpdateAvailable` is only entered from `Registered` and `Updating` only
    /// from `UpdateAvailable`. Leaving `Updating` happens through a reload,
    /// which starts a new controller, so it has no outgoing edge here.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Unregistered, Registering)
                | (Registering, Registered)
                | (Registering, Unregistered)
                | (Registered, UpdateAvailable)
                | (UpdateAvailable, Updating)
        )
    }
}

/// What the UI layer is told about a pending worker update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePrompt {
    pub update_available: bool,
    pub version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleState::*;

    const ALL: [LifecycleState; 5] = [Unregistered, Registering, Registered, UpdateAvailable, Updating];

    #[test]
    fn test_update_available_only_from_registered() {
        for from in ALL {
            assert_eq!(from.can_transition_to(UpdateAvailable), from == Registered, "{from:?}");
        }
    }

    #[test]
    fn test_updating_only_from_update_available() {
        for from in ALL {
            assert_eq!(from.can_transition_to(Updating), from == UpdateAvailable, "{from:?}");
        }
    }

    #[test]
    fn test_registration_edges() {
        assert!(Unregistered.can_transition_to(Registering));
        assert!(Registering.can_transition_to(Registered));
        assert!(Registering.can_transition_to(Unregistered));
        assert!(!Unregistered.can_transition_to(Registered));
        assert!(!Registered.can_transition_to(Unregistered));
    }

    #[test]
    fn test_no_self_loops() {
        for state in ALL {
            assert!(!state.can_transition_to(state), "{state:?}");
        }
    }

    #[test]
    fn test_serialize_snake_case() {
        assert_eq!(serde_json::to_string(&UpdateAvailable).unwrap(), "\"update_available\"");
    }
}
