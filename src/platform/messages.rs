// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Application-level messages exchanged with a worker over its message channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Ask the waiting worker to activate immediately.
    SkipWaiting,

    /// A cached asset was refreshed.
    CacheUpdated { url: String },

    /// A background-sync batch finished.
    SyncComplete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
    },
}

impl WorkerMessage {
    /// Interpret a raw payload. Unknown types and malformed shapes yield `None`.
    pub fn parse(payload: &Value) -> Option<Self> {
        serde_json::from_value(payload.clone()).ok()
    }

    pub fn to_value(&self) -> Value {
        // Serializing a plain enum of strings cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_skip_waiting_wire_shape() {
        assert_eq!(WorkerMessage::SkipWaiting.to_value(), json!({"type": "SKIP_WAITING"}));
    }

    #[test]
    fn test_parse_cache_updated() {
        let msg = WorkerMessage::parse(&json!({"type": "CACHE_UPDATED", "url": "/index.html"}));
        assert_eq!(
            msg,
            Some(WorkerMessage::CacheUpdated { url: "/index.html".to_string() })
        );
    }

    #[test]
    fn test_parse_sync_complete_without_tag() {
        let msg = WorkerMessage::parse(&json!({"type": "SYNC_COMPLETE"}));
        assert_eq!(msg, Some(WorkerMessage::SyncComplete { tag: None }));
    }

    #[test]
    fn test_parse_sync_complete_with_tag() {
        let msg = WorkerMessage::parse(&json!({"type": "SYNC_COMPLETE", "tag": "meal-log-upload"}));
        assert_eq!(
            msg,
            Some(WorkerMessage::SyncComplete { tag: Some("meal-log-upload".to_string()) })
        );
    }

    #[test]
    fn test_parse_rejects_unknown_and_malformed() {
        assert_eq!(WorkerMessage::parse(&json!({"type": "PING"})), None);
        assert_eq!(WorkerMessage::parse(&json!({"type": "CACHE_UPDATED"})), None);
        assert_eq!(WorkerMessage::parse(&json!("SYNC_COMPLETE")), None);
        assert_eq!(WorkerMessage::parse(&json!(null)), None);
    }
}
