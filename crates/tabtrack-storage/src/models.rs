use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Productivity category assigned to a session when it starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    HighlyProductive,
    Productive,
    Neutral,
    Unproductive,
    Break,
}

/// Returned when a string is not one of the five category names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category '{0}' (expected highly_productive, productive, neutral, unproductive or break)")]
pub struct ParseCategoryError(pub String);

impl Category {
    /// All categories, in the order the classifier checks them
    pub const ALL: [Self; 5] = [
        Self::HighlyProductive,
        Self::Productive,
        Self::Neutral,
        Self::Unproductive,
        Self::Break,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HighlyProductive => "highly_productive",
            Self::Productive => "productive",
            Self::Neutral => "neutral",
            Self::Unproductive => "unproductive",
            Self::Break => "break",
        }
    }

    /// Base score used by the productivity score
    #[must_use]
    pub const fn base_score(&self) -> u8 {
        match self {
            Self::HighlyProductive => 100,
            Self::Productive => 80,
            Self::Neutral => 50,
            Self::Unproductive => 20,
            Self::Break => 40,
        }
    }

    /// Whether time in this category counts as productive time
    #[must_use]
    pub const fn is_productive(&self) -> bool {
        matches!(self, Self::HighlyProductive | Self::Productive)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

/// A finished browsing session. Produced once when the live session ends and
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub tab_id: i64,
    pub domain: String,
    pub url: String,
    pub title: String,
    pub category: Category,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Milliseconds between start and end
    pub duration_ms: i64,
    pub time_spent_active_ms: i64,
    pub time_spent_idle_ms: i64,
    pub keystrokes: u32,
    pub mouse_movements: u32,
    pub scrolls: u32,
    pub clicks: u32,
    pub distractions: u32,
    /// Live focus score at the moment the session ended
    pub focus_score: u8,
    pub activity_score: u8,
    pub final_focus_score: u8,
    pub productivity_score: u8,
}

/// Per-calendar-date rollup of ended sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub total_time_ms: i64,
    pub productive_time_ms: i64,
    pub session_count: u32,
    /// Running mean of final focus scores
    pub average_focus: f64,
    pub categories: BTreeMap<Category, i64>,
}

impl DailyAggregate {
    #[must_use]
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            total_time_ms: 0,
            productive_time_ms: 0,
            session_count: 0,
            average_focus: 0.0,
            categories: BTreeMap::new(),
        }
    }
}

/// User settings toggled from the options page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Settings {
    pub focus_mode: bool,
    pub break_reminders: bool,
    pub deep_work_mode: bool,
    pub pomodoro_timer: bool,
    pub block_distractions: bool,
    pub track_mouse_movement: bool,
    pub track_keystrokes: bool,
    /// Milliseconds of inactivity before the browser reports idle
    pub idle_threshold: i64,
    /// Milliseconds of continuous browsing before a break reminder
    pub break_interval: i64,
    pub pomodoro_length: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            focus_mode: false,
            break_reminders: true,
            deep_work_mode: false,
            pomodoro_timer: false,
            block_distractions: false,
            track_mouse_movement: true,
            track_keystrokes: true,
            idle_threshold: 300_000,
            break_interval: 3_000_000,
            pomodoro_length: 1_500_000,
        }
    }
}

/// Partial settings update; absent fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct SettingsPatch {
    pub focus_mode: Option<bool>,
    pub break_reminders: Option<bool>,
    pub deep_work_mode: Option<bool>,
    pub pomodoro_timer: Option<bool>,
    pub block_distractions: Option<bool>,
    pub track_mouse_movement: Option<bool>,
    pub track_keystrokes: Option<bool>,
    pub idle_threshold: Option<i64>,
    pub break_interval: Option<i64>,
    pub pomodoro_length: Option<i64>,
}

/// Returned by [`Settings::set`] for unknown keys or unparsable values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("unknown setting '{0}'")]
    UnknownKey(String),
    #[error("invalid value '{value}' for setting '{key}'")]
    InvalidValue { key: String, value: String },
}

impl Settings {
    /// Merge a partial update over the current values
    pub fn merge(&mut self, patch: SettingsPatch) {
        macro_rules! apply {
            ($($field:ident),*) => {
                $(if let Some(v) = patch.$field { self.$field = v; })*
            };
        }
        apply!(
            focus_mode,
            break_reminders,
            deep_work_mode,
            pomodoro_timer,
            block_distractions,
            track_mouse_movement,
            track_keystrokes,
            idle_threshold,
            break_interval,
            pomodoro_length
        );
    }

    /// Set a single option by its camelCase name, parsing the value from text
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not a recognized option or the value
    /// does not parse as the option's type
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let invalid = || SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let flag = || value.parse::<bool>().map_err(|_| invalid());
        let millis = || {
            value
                .parse::<i64>()
                .ok()
                .filter(|v| *v >= 0)
                .ok_or_else(invalid)
        };

        let mut patch = SettingsPatch::default();
        match key {
            "focusMode" => patch.focus_mode = Some(flag()?),
            "breakReminders" => patch.break_reminders = Some(flag()?),
            "deepWorkMode" => patch.deep_work_mode = Some(flag()?),
            "pomodoroTimer" => patch.pomodoro_timer = Some(flag()?),
            "blockDistractions" => patch.block_distractions = Some(flag()?),
            "trackMouseMovement" => patch.track_mouse_movement = Some(flag()?),
            "trackKeystrokes" => patch.track_keystrokes = Some(flag()?),
            "idleThreshold" => patch.idle_threshold = Some(millis()?),
            "breakInterval" => patch.break_interval = Some(millis()?),
            "pomodoroLength" => patch.pomodoro_length = Some(millis()?),
            _ => return Err(SettingsError::UnknownKey(key.to_string())),
        }
        self.merge(patch);
        Ok(())
    }
}

/// User-defined category for a domain, consulted before the built-in rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainOverride {
    pub domain: String,
    pub category: Category,
    pub created_at: DateTime<Utc>,
}

impl DomainOverride {
    #[must_use]
    pub fn new(domain: String, category: Category) -> Self {
        Self {
            domain,
            category,
            created_at: Utc::now(),
        }
    }
}

/// Serialized sync payload waiting for another delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSync {
    pub id: i64,
    pub session_id: String,
    pub payload: String,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}
