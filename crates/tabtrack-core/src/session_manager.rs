use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabtrack_storage::{generate_id, Category, Session};

use crate::classifier::{extract_domain, Classifier};
use crate::scoring::{self, FocusInputs};

/// URL prefixes of browser-internal pages that never start a session
pub const SYSTEM_URL_PREFIXES: [&str; 4] =
    ["chrome://", "chrome-extension://", "moz-extension://", "about:"];

/// Focus points lost each time the user goes idle
pub const IDLE_FOCUS_PENALTY: u8 = 10;
/// Focus points gained on a good performance check
pub const PERFORMANCE_BONUS: u8 = 5;
/// Minimum session age for a performance bonus (30 minutes)
pub const PERFORMANCE_MIN_ELAPSED_MS: i64 = 1_800_000;
/// Live focus must be strictly above this for a performance bonus
pub const PERFORMANCE_MIN_FOCUS: u8 = 80;

#[must_use]
pub fn is_system_url(url: &str) -> bool {
    SYSTEM_URL_PREFIXES.iter().any(|p| url.starts_with(p))
}

/// Tab metadata as reported by the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: i64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Why a tab change could not start a session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TabError {
    #[error("tab metadata unavailable")]
    Unavailable,
    #[error("tab {0} has no URL")]
    MissingUrl(i64),
}

/// Browser idle-detection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleState {
    Active,
    Idle,
    Locked,
}

/// Input counters reported by the content collaborator since its last report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityDelta {
    pub keystrokes: u32,
    pub mouse_movements: u32,
    pub scrolls: u32,
    pub clicks: u32,
    /// Milliseconds of active time
    pub active_time: i64,
}

/// The session currently being tracked
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    pub session_id: String,
    pub tab_id: i64,
    pub domain: String,
    pub url: String,
    pub title: String,
    pub category: Category,
    pub start_time: DateTime<Utc>,
    pub time_spent_active_ms: i64,
    pub time_spent_idle_ms: i64,
    pub keystrokes: u32,
    pub mouse_movements: u32,
    pub scrolls: u32,
    pub clicks: u32,
    pub distractions: u32,
    pub focus_score: u8,
    pub activity_score: u8,
    pub idle_start_time: Option<DateTime<Utc>>,
    pub last_blur_time: Option<DateTime<Utc>>,
}

impl ActiveSession {
    fn start(
        tab_id: i64,
        url: String,
        title: String,
        category: Category,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: generate_id("session"),
            tab_id,
            domain: extract_domain(&url),
            url,
            title,
            category,
            start_time: now,
            time_spent_active_ms: 0,
            time_spent_idle_ms: 0,
            keystrokes: 0,
            mouse_movements: 0,
            scrolls: 0,
            clicks: 0,
            distractions: 0,
            focus_score: 100,
            activity_score: 100,
            idle_start_time: None,
            last_blur_time: None,
        }
    }

    /// Milliseconds since the session started, never negative
    #[must_use]
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_time).num_milliseconds().max(0)
    }

    fn input_events(&self) -> u64 {
        u64::from(self.keystrokes) + u64::from(self.mouse_movements) + u64::from(self.scrolls)
    }

    fn add_idle_since(&mut self, since: DateTime<Utc>, now: DateTime<Utc>) {
        self.time_spent_idle_ms += (now - since).num_milliseconds().max(0);
    }

    /// Close the session: open idle or blur intervals count as idle time,
    /// then the final scores are computed
    fn finish(mut self, now: DateTime<Utc>) -> Session {
        if let Some(since) = self.idle_start_time.take() {
            self.add_idle_since(since, now);
        }
        if let Some(since) = self.last_blur_time.take() {
            self.add_idle_since(since, now);
        }

        let end_time = now.max(self.start_time);
        let duration_ms = self.elapsed_ms(end_time);
        let final_focus_score = scoring::final_focus_score(&FocusInputs {
            focus_score: self.focus_score,
            time_spent_active_ms: self.time_spent_active_ms,
            time_spent_idle_ms: self.time_spent_idle_ms,
            duration_ms,
            distractions: self.distractions,
        });

        Session {
            session_id: self.session_id,
            tab_id: self.tab_id,
            domain: self.domain,
            url: self.url,
            title: self.title,
            category: self.category,
            start_time: self.start_time,
            end_time,
            duration_ms,
            time_spent_active_ms: self.time_spent_active_ms,
            time_spent_idle_ms: self.time_spent_idle_ms,
            keystrokes: self.keystrokes,
            mouse_movements: self.mouse_movements,
            scrolls: self.scrolls,
            clicks: self.clicks,
            distractions: self.distractions,
            focus_score: self.focus_score,
            activity_score: self.activity_score,
            final_focus_score,
            productivity_score: scoring::productivity_score(self.category, final_focus_score),
        }
    }
}

/// Result of a tab change: the session that ended, if any, and whether a new
/// one started
#[derive(Debug, Default)]
pub struct TabChange {
    pub ended: Option<Session>,
    pub started: bool,
}

/// Owns the single current session and every transition on it
///
/// States are Idle (`current` is `None`) and Active. User-idle and
/// window-blurred are flags on the active session.
#[derive(Debug)]
pub struct SessionManager {
    classifier: Classifier,
    current: Option<ActiveSession>,
}

impl SessionManager {
    #[must_use]
    pub const fn new(classifier: Classifier) -> Self {
        Self {
            classifier,
            current: None,
        }
    }

    #[must_use]
    pub const fn current(&self) -> Option<&ActiveSession> {
        self.current.as_ref()
    }

    #[must_use]
    pub const fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn classifier_mut(&mut self) -> &mut Classifier {
        &mut self.classifier
    }

    /// End the current session (if any), then start one for the new tab
    /// unless its metadata is unusable or it shows a browser-internal page
    pub fn on_tab_change(&mut self, tab: Result<TabInfo, TabError>, now: DateTime<Utc>) -> TabChange {
        let ended = self.end_session(now);

        let tab = match tab.and_then(|t| match t.url {
            Some(url) => Ok((t.id, url, t.title)),
            None => Err(TabError::MissingUrl(t.id)),
        }) {
            Ok(tab) => tab,
            Err(e) => {
                log::warn!("Not starting a session: {e}");
                return TabChange {
                    ended,
                    started: false,
                };
            }
        };

        let (tab_id, url, title) = tab;
        if is_system_url(&url) {
            log::debug!("Ignoring system page {url}");
            return TabChange {
                ended,
                started: false,
            };
        }

        let category = self.classifier.classify(&url);
        let session = ActiveSession::start(
            tab_id,
            url,
            title.unwrap_or_else(|| "Unknown".to_string()),
            category,
            now,
        );
        log::info!(
            "Started session {} on {} ({})",
            session.session_id,
            session.domain,
            session.category
        );
        self.current = Some(session);

        TabChange {
            ended,
            started: true,
        }
    }

    /// End the current session and return it with final scores. No-op when
    /// nothing is being tracked.
    pub fn end_session(&mut self, now: DateTime<Utc>) -> Option<Session> {
        let session = self.current.take()?.finish(now);
        log::info!(
            "Ended session {} on {} after {}s (focus {}, productivity {})",
            session.session_id,
            session.domain,
            session.duration_ms / 1000,
            session.final_focus_score,
            session.productivity_score
        );
        Some(session)
    }

    pub fn on_idle_state(&mut self, state: IdleState, now: DateTime<Utc>) {
        let Some(session) = self.current.as_mut() else {
            return;
        };

        match state {
            IdleState::Idle | IdleState::Locked => {
                // every idle/locked report decays focus; idle time runs from
                // the first one
                if session.idle_start_time.is_none() {
                    session.idle_start_time = Some(now);
                }
                session.focus_score = session.focus_score.saturating_sub(IDLE_FOCUS_PENALTY);
                log::debug!("User {state:?}, focus now {}", session.focus_score);
            }
            IdleState::Active => {
                if let Some(since) = session.idle_start_time.take() {
                    session.add_idle_since(since, now);
                }
            }
        }
    }

    /// Browser window focus lost (`false`) or regained (`true`)
    pub fn on_focus_changed(&mut self, focused: bool, now: DateTime<Utc>) {
        let Some(session) = self.current.as_mut() else {
            return;
        };

        if focused {
            if let Some(since) = session.last_blur_time.take() {
                session.add_idle_since(since, now);
            }
        } else if session.last_blur_time.is_none() {
            session.last_blur_time = Some(now);
        }
    }

    /// Apply input counters from the content collaborator. Returns `false`
    /// when the report was dropped because it came from another tab or no
    /// session is active.
    pub fn on_activity_update(
        &mut self,
        sender_tab_id: Option<i64>,
        delta: &ActivityDelta,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(session) = self.current.as_mut() else {
            log::debug!("Dropping activity report: no current session");
            return false;
        };
        if sender_tab_id != Some(session.tab_id) {
            log::debug!(
                "Dropping activity report from tab {sender_tab_id:?}, tracking {}",
                session.tab_id
            );
            return false;
        }

        session.keystrokes = session.keystrokes.saturating_add(delta.keystrokes);
        session.mouse_movements = session.mouse_movements.saturating_add(delta.mouse_movements);
        session.scrolls = session.scrolls.saturating_add(delta.scrolls);
        session.clicks = session.clicks.saturating_add(delta.clicks);
        session.time_spent_active_ms += delta.active_time.max(0);
        session.activity_score =
            scoring::activity_score(session.elapsed_ms(now), session.input_events());
        true
    }

    /// Count a distraction against the current session
    pub fn record_distraction(&mut self) {
        if let Some(session) = self.current.as_mut() {
            session.distractions = session.distractions.saturating_add(1);
        }
    }

    /// Award the focus bonus to long, focused sessions. Returns whether the
    /// bonus was applied.
    pub fn performance_check(&mut self, now: DateTime<Utc>) -> bool {
        let Some(session) = self.current.as_mut() else {
            return false;
        };
        if session.elapsed_ms(now) < PERFORMANCE_MIN_ELAPSED_MS
            || session.focus_score <= PERFORMANCE_MIN_FOCUS
        {
            return false;
        }
        session.focus_score = session
            .focus_score
            .saturating_add(PERFORMANCE_BONUS)
            .min(100);
        log::debug!("Performance bonus, focus now {}", session.focus_score);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn tab(id: i64, url: &str) -> Result<TabInfo, TabError> {
        Ok(TabInfo {
            id,
            url: Some(url.to_string()),
            title: Some(format!("Tab {id}")),
        })
    }

    fn manager() -> SessionManager {
        SessionManager::new(Classifier::new())
    }

    #[test]
    fn test_tab_change_starts_classified_session() {
        let mut manager = manager();
        let change = manager.on_tab_change(tab(1, "https://www.github.com/rust-lang"), t0());

        assert!(change.ended.is_none());
        assert!(change.started);
        let current = manager.current().unwrap();
        assert_eq!(current.domain, "github.com");
        assert_eq!(current.category, Category::HighlyProductive);
        assert_eq!(current.focus_score, 100);
        assert_eq!(current.activity_score, 100);
        assert!(current.session_id.starts_with("session_"));
    }

    #[test]
    fn test_tab_change_ends_previous_session() {
        let mut manager = manager();
        manager.on_tab_change(tab(1, "https://github.com"), t0());
        let change = manager.on_tab_change(
            tab(2, "https://reddit.com"),
            t0() + Duration::minutes(5),
        );

        let ended = change.ended.unwrap();
        assert_eq!(ended.tab_id, 1);
        assert_eq!(ended.duration_ms, 300_000);
        assert_eq!(manager.current().unwrap().tab_id, 2);
    }

    #[test]
    fn test_system_url_leaves_machine_idle() {
        let mut manager = manager();
        manager.on_tab_change(tab(1, "https://github.com"), t0());
        let change = manager.on_tab_change(tab(2, "chrome://extensions"), t0());
        assert!(change.ended.is_some());
        assert!(!change.started);
        assert!(manager.current().is_none());

        for url in ["about:blank", "moz-extension://x/popup.html", "chrome-extension://y"] {
            assert!(!manager.on_tab_change(tab(3, url), t0()).started);
        }
    }

    #[test]
    fn test_unreadable_tab_leaves_machine_idle() {
        let mut manager = manager();
        assert!(!manager.on_tab_change(Err(TabError::Unavailable), t0()).started);

        let no_url = Ok(TabInfo {
            id: 7,
            url: None,
            title: None,
        });
        assert!(!manager.on_tab_change(no_url, t0()).started);
        assert!(manager.current().is_none());
    }

    #[test]
    fn test_end_without_session_is_noop() {
        let mut manager = manager();
        assert!(manager.end_session(t0()).is_none());
        assert!(manager.end_session(t0()).is_none());
    }

    #[test]
    fn test_at_most_one_session_after_tab_changes() {
        let mut manager = manager();
        let mut ended = 0;
        for i in 0..9 {
            let url = if i % 3 == 0 { "about:newtab" } else { "https://dev.to" };
            let change = manager.on_tab_change(tab(i, url), t0() + Duration::seconds(i));
            ended += usize::from(change.ended.is_some());
        }
        // 6 sessions were started, the last one is still current
        // and every other one was ended exactly once
        assert_eq!(ended, 5);
        assert!(manager.current().is_some());
    }

    #[test]
    fn test_idle_decays_focus_and_accumulates_idle_time() {
        let mut manager = manager();
        manager.on_tab_change(tab(1, "https://github.com"), t0());

        manager.on_idle_state(IdleState::Idle, t0() + Duration::minutes(1));
        manager.on_idle_state(IdleState::Locked, t0() + Duration::minutes(2));
        assert_eq!(manager.current().unwrap().focus_score, 80);

        manager.on_idle_state(IdleState::Active, t0() + Duration::minutes(4));
        let current = manager.current().unwrap();
        assert_eq!(current.time_spent_idle_ms, 180_000);
        assert!(current.idle_start_time.is_none());

        // second idle period decays again
        manager.on_idle_state(IdleState::Idle, t0() + Duration::minutes(5));
        assert_eq!(manager.current().unwrap().focus_score, 70);
    }

    #[test]
    fn test_idle_focus_floors_at_zero() {
        let mut manager = manager();
        manager.on_tab_change(tab(1, "https://github.com"), t0());
        for i in 0..15 {
            manager.on_idle_state(IdleState::Idle, t0() + Duration::minutes(i));
            manager.on_idle_state(IdleState::Active, t0() + Duration::minutes(i));
        }
        assert_eq!(manager.current().unwrap().focus_score, 0);
    }

    #[test]
    fn test_window_blur_counts_as_idle() {
        let mut manager = manager();
        manager.on_tab_change(tab(1, "https://github.com"), t0());
        manager.on_focus_changed(false, t0() + Duration::seconds(10));
        manager.on_focus_changed(false, t0() + Duration::seconds(20));
        manager.on_focus_changed(true, t0() + Duration::seconds(40));

        let current = manager.current().unwrap();
        assert_eq!(current.time_spent_idle_ms, 30_000);
        assert_eq!(current.focus_score, 100);
    }

    #[test]
    fn test_open_blur_interval_closed_at_end() {
        let mut manager = manager();
        manager.on_tab_change(tab(1, "https://github.com"), t0());
        manager.on_focus_changed(false, t0() + Duration::minutes(1));
        let session = manager.end_session(t0() + Duration::minutes(3)).unwrap();
        assert_eq!(session.time_spent_idle_ms, 120_000);
    }

    #[test]
    fn test_activity_update_from_other_tab_is_dropped() {
        let mut manager = manager();
        manager.on_tab_change(tab(1, "https://github.com"), t0());
        let delta = ActivityDelta {
            keystrokes: 10,
            ..ActivityDelta::default()
        };

        assert!(!manager.on_activity_update(Some(2), &delta, t0()));
        assert!(!manager.on_activity_update(None, &delta, t0()));
        assert_eq!(manager.current().unwrap().keystrokes, 0);
    }

    #[test]
    fn test_activity_update_accumulates_and_rescores() {
        let mut manager = manager();
        manager.on_tab_change(tab(1, "https://github.com"), t0());
        let delta = ActivityDelta {
            keystrokes: 50,
            mouse_movements: 30,
            scrolls: 20,
            clicks: 5,
            active_time: 300_000,
        };

        assert!(manager.on_activity_update(Some(1), &delta, t0() + Duration::minutes(10)));
        let current = manager.current().unwrap();
        assert_eq!(current.keystrokes, 50);
        assert_eq!(current.clicks, 5);
        assert_eq!(current.time_spent_active_ms, 300_000);
        // 100 events over 10 minutes
        assert_eq!(current.activity_score, 60);
    }

    #[test]
    fn test_performance_check_bonus_rules() {
        let mut manager = manager();
        assert!(!manager.performance_check(t0()));

        manager.on_tab_change(tab(1, "https://github.com"), t0());
        assert!(!manager.performance_check(t0() + Duration::minutes(29)));

        // focus 90 after one idle period, old enough
        manager.on_idle_state(IdleState::Idle, t0() + Duration::minutes(1));
        manager.on_idle_state(IdleState::Active, t0() + Duration::minutes(1));
        assert!(manager.performance_check(t0() + Duration::minutes(30)));
        assert_eq!(manager.current().unwrap().focus_score, 95);
        assert!(manager.performance_check(t0() + Duration::minutes(45)));
        assert_eq!(manager.current().unwrap().focus_score, 100);

        // capped at 100
        manager.performance_check(t0() + Duration::minutes(60));
        assert_eq!(manager.current().unwrap().focus_score, 100);
    }

    #[test]
    fn test_performance_check_requires_focus_above_80() {
        let mut manager = manager();
        manager.on_tab_change(tab(1, "https://github.com"), t0());
        for i in 0..2 {
            manager.on_idle_state(IdleState::Idle, t0() + Duration::seconds(i));
            manager.on_idle_state(IdleState::Active, t0() + Duration::seconds(i));
        }
        assert_eq!(manager.current().unwrap().focus_score, 80);
        assert!(!manager.performance_check(t0() + Duration::hours(1)));
    }

    #[test]
    fn test_end_computes_final_scores() {
        let mut manager = manager();
        manager.on_tab_change(tab(1, "https://dev.to/post"), t0());
        manager.on_activity_update(
            Some(1),
            &ActivityDelta {
                active_time: 1_500_000,
                ..ActivityDelta::default()
            },
            t0() + Duration::minutes(25),
        );
        manager.record_distraction();
        manager.record_distraction();

        let session = manager.end_session(t0() + Duration::minutes(25)).unwrap();
        assert_eq!(session.category, Category::Productive);
        assert_eq!(session.distractions, 2);
        assert_eq!(session.final_focus_score, 90);
        assert_eq!(session.productivity_score, 72);
        assert!(manager.current().is_none());
    }
}
