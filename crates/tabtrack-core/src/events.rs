//! Messages exchanged with the browser adapter.
//!
//! Inbound frames become [`BrowserEvent`]s, outbound frames are [`Outbound`].
//! Both are JSON objects tagged by `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabtrack_storage::{Category, SettingsPatch};

use crate::session_manager::{ActivityDelta, IdleState, TabInfo};

/// Everything the browser can tell the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BrowserEvent {
    /// A tab became active; `tab` is null if its metadata could not be read
    TabActivated { tab: Option<TabInfo> },
    TabUpdated {
        tab: Option<TabInfo>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        active: bool,
    },
    #[serde(rename_all = "camelCase")]
    NavigationCompleted {
        tab_id: i64,
        frame_id: i64,
        url: String,
    },
    /// `window_id` is null when every browser window lost focus
    #[serde(rename_all = "camelCase")]
    FocusChanged { window_id: Option<i64> },
    IdleChanged { state: IdleState },
    Alarm { name: String },
    #[serde(rename_all = "camelCase")]
    Message {
        #[serde(default)]
        sender_tab_id: Option<i64>,
        #[serde(default)]
        request_id: Option<u64>,
        request: Request,
    },
    /// End the current session without closing the host
    StopSession,
    Shutdown,
}

/// Popup and content-script requests, tagged by `action`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    GetSettings,
    UpdateSettings { settings: SettingsPatch },
    GetCurrentSession,
    GetDailyStats,
    ActivityUpdate { data: ActivityDelta },
    ToggleFocusMode,
    StartPomodoro,
    #[serde(other)]
    Unknown,
}

/// Periodic jobs, named as the browser alarms are
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmKind {
    BreakReminder,
    PerformanceCheck,
    DailySummary,
    Cleanup,
    SyncRetry,
}

impl AlarmKind {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BreakReminder => "breakReminder",
            Self::PerformanceCheck => "performanceCheck",
            Self::DailySummary => "dailySummary",
            Self::Cleanup => "cleanup",
            Self::SyncRetry => "syncRetry",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::BreakReminder,
            Self::PerformanceCheck,
            Self::DailySummary,
            Self::Cleanup,
            Self::SyncRetry,
        ]
        .into_iter()
        .find(|kind| kind.name() == name)
    }

    /// Event the host loop feeds itself when this timer fires
    #[must_use]
    pub fn event(self) -> BrowserEvent {
        BrowserEvent::Alarm {
            name: self.name().to_string(),
        }
    }
}

/// Everything the host can tell the browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Outbound {
    #[serde(rename_all = "camelCase")]
    Response {
        request_id: Option<u64>,
        body: Value,
    },
    Notification {
        id: String,
        title: String,
        message: String,
    },
    Badge { text: String, color: String },
}

impl Outbound {
    #[must_use]
    pub fn notification(id: &str, title: &str, message: impl Into<String>) -> Self {
        Self::Notification {
            id: id.to_string(),
            title: title.to_string(),
            message: message.into(),
        }
    }

    /// Toolbar badge for a session category
    #[must_use]
    pub fn badge(category: Category) -> Self {
        let (text, color) = match category {
            Category::HighlyProductive => ("++", "#00C851"),
            Category::Productive => ("+", "#4CAF50"),
            Category::Neutral => ("", "#FF9800"),
            Category::Unproductive => ("-", "#F44336"),
            Category::Break => ("", "#2196F3"),
        };
        Self::Badge {
            text: text.to_string(),
            color: color.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_tab_events() {
        let event: BrowserEvent = serde_json::from_value(json!({
            "type": "tabActivated",
            "tab": {"id": 4, "url": "https://github.com", "title": "GitHub"}
        }))
        .unwrap();
        assert_eq!(
            event,
            BrowserEvent::TabActivated {
                tab: Some(TabInfo {
                    id: 4,
                    url: Some("https://github.com".to_string()),
                    title: Some("GitHub".to_string()),
                })
            }
        );

        let event: BrowserEvent =
            serde_json::from_value(json!({"type": "tabActivated", "tab": null})).unwrap();
        assert_eq!(event, BrowserEvent::TabActivated { tab: None });

        let event: BrowserEvent = serde_json::from_value(json!({
            "type": "navigationCompleted", "tabId": 1, "frameId": 0, "url": "https://a.example"
        }))
        .unwrap();
        assert!(matches!(
            event,
            BrowserEvent::NavigationCompleted { frame_id: 0, .. }
        ));
    }

    #[test]
    fn test_parse_focus_and_idle() {
        let event: BrowserEvent =
            serde_json::from_value(json!({"type": "focusChanged", "windowId": null})).unwrap();
        assert_eq!(event, BrowserEvent::FocusChanged { window_id: None });

        let event: BrowserEvent =
            serde_json::from_value(json!({"type": "idleChanged", "state": "locked"})).unwrap();
        assert_eq!(
            event,
            BrowserEvent::IdleChanged {
                state: IdleState::Locked
            }
        );
    }

    #[test]
    fn test_parse_requests() {
        let event: BrowserEvent = serde_json::from_value(json!({
            "type": "message",
            "senderTabId": 9,
            "request": {
                "action": "activityUpdate",
                "data": {"keystrokes": 3, "activeTime": 5000}
            }
        }))
        .unwrap();
        let BrowserEvent::Message {
            sender_tab_id,
            request: Request::ActivityUpdate { data },
            ..
        } = event
        else {
            panic!("unexpected event");
        };
        assert_eq!(sender_tab_id, Some(9));
        assert_eq!(data.keystrokes, 3);
        assert_eq!(data.mouse_movements, 0);
        assert_eq!(data.active_time, 5000);

        let request: Request = serde_json::from_value(json!({
            "action": "updateSettings",
            "settings": {"focusMode": true}
        }))
        .unwrap();
        let Request::UpdateSettings { settings } = request else {
            panic!("unexpected request");
        };
        assert_eq!(settings.focus_mode, Some(true));
        assert_eq!(settings.break_interval, None);
    }

    #[test]
    fn test_unknown_action_is_tolerated() {
        let request: Request =
            serde_json::from_value(json!({"action": "exportEverything"})).unwrap();
        assert_eq!(request, Request::Unknown);
    }

    #[test]
    fn test_alarm_names() {
        assert_eq!(
            AlarmKind::from_name("breakReminder"),
            Some(AlarmKind::BreakReminder)
        );
        assert_eq!(AlarmKind::from_name("syncRetry"), Some(AlarmKind::SyncRetry));
        assert_eq!(AlarmKind::from_name("nope"), None);
    }

    #[test]
    fn test_outbound_shape() {
        let json = serde_json::to_value(Outbound::badge(Category::HighlyProductive)).unwrap();
        assert_eq!(json, json!({"type": "badge", "text": "++", "color": "#00C851"}));

        let json = serde_json::to_value(Outbound::Response {
            request_id: Some(2),
            body: json!(true),
        })
        .unwrap();
        assert_eq!(json, json!({"type": "response", "requestId": 2, "body": true}));
    }
}
