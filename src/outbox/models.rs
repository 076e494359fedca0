// SPDX-License-Identifier: GPL-3.0-only
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

/// A meal log captured on the device, before it has an id in the outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealLogDraft {
    pub meal_type: MealType,

    /// Free-text description of what was eaten
    pub description: String,

    /// When the meal was eaten
    pub eaten_at: DateTime<Utc>,

    /// Optional photo reference already uploaded elsewhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// A local write waiting for upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMealLog {
    pub id: String,
    pub payload: MealLogDraft,
    pub queued_at: DateTime<Utc>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl QueuedMealLog {
    pub fn new(payload: MealLogDraft) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payload,
            queued_at: Utc::now(),
            attempts: 0,
            last_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> MealLogDraft {
        MealLogDraft {
            meal_type: MealType::Lunch,
            description: "Rice and beans".to_string(),
            eaten_at: Utc::now(),
            photo_url: None,
        }
    }

    #[test]
    fn test_queued_meal_log_new() {
        let queued = QueuedMealLog::new(draft());
        assert!(Uuid::parse_str(&queued.id).is_ok());
        assert_eq!(queued.attempts, 0);
        assert_eq!(queued.last_error, None);
        assert!(queued.queued_at <= Utc::now());
    }

    #[test]
    fn test_draft_deserialize_json() {
        let json = r#"{
            "meal_type": "snack",
            "description": "Apple",
            "eaten_at": "2024-01-01T10:00:00Z"
        }"#;
        let draft: MealLogDraft = serde_json::from_str(json).unwrap();
        assert_eq!(draft.meal_type, MealType::Snack);
        assert_eq!(draft.description, "Apple");
        assert_eq!(draft.photo_url, None);
    }

    #[test]
    fn test_draft_serialize_skips_missing_photo() {
        let json = serde_json::to_string(&draft()).unwrap();
        assert!(json.contains("\"meal_type\":\"lunch\""));
        assert!(!json.contains("photo_url"));
    }
}
