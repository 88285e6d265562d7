//! Wire types exchanged with the backend API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabtrack_storage::{Category, Session};

/// Identity the backend assigns to legacy, unauthenticated log entries
pub const DEFAULT_USER_ID: &str = "default_user";

/// Body of `POST /api/activity/advanced`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub user_id: String,
    pub session_id: String,
    pub domain: String,
    pub url: String,
    pub title: String,
    /// Session duration in milliseconds
    pub time_spent: i64,
    pub category: Category,
    /// Final focus score of the session
    pub focus_score: u8,
    pub productivity_score: u8,
    pub metadata: SessionMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub distractions: u32,
    pub keystrokes: u32,
    pub mouse_movements: u32,
    pub scrolls: u32,
    pub clicks: u32,
    pub time_spent_active: i64,
    pub time_spent_idle: i64,
    /// Epoch milliseconds
    pub start_time: i64,
    /// Epoch milliseconds
    pub end_time: i64,
}

impl SessionPayload {
    #[must_use]
    pub fn from_session(user_id: &str, session: &Session) -> Self {
        Self {
            user_id: user_id.to_string(),
            session_id: session.session_id.clone(),
            domain: session.domain.clone(),
            url: session.url.clone(),
            title: session.title.clone(),
            time_spent: session.duration_ms,
            category: session.category,
            focus_score: session.final_focus_score,
            productivity_score: session.productivity_score,
            metadata: SessionMetadata {
                distractions: session.distractions,
                keystrokes: session.keystrokes,
                mouse_movements: session.mouse_movements,
                scrolls: session.scrolls,
                clicks: session.clicks,
                time_spent_active: session.time_spent_active_ms,
                time_spent_idle: session.time_spent_idle_ms,
                start_time: session.start_time.timestamp_millis(),
                end_time: session.end_time.timestamp_millis(),
            },
        }
    }
}

/// Body of the legacy `POST /api/activity/log` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyLog {
    pub domain: String,
    /// Seconds
    pub duration: i64,
}

impl LegacyLog {
    /// The activity document the backend stores for a legacy entry
    #[must_use]
    pub fn into_activity(self) -> ActivityRecord {
        ActivityRecord {
            id: None,
            user_id: DEFAULT_USER_ID.to_string(),
            domain: self.domain,
            url: None,
            title: None,
            time_spent: self.duration * 1000,
            category: Category::Neutral,
            focus_score: 0,
            session_id: None,
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            created_at: None,
        }
    }
}

/// Activity document as returned by the backend query endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub domain: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Milliseconds
    pub time_spent: i64,
    #[serde(default = "default_category")]
    pub category: Category,
    #[serde(default)]
    pub focus_score: u8,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

const fn default_category() -> Category {
    Category::Neutral
}
