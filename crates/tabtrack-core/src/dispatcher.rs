use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tabtrack_storage::{Category, Database, Settings};
use tokio::task::JoinHandle;

use crate::aggregation::{format_duration, AggregationStore};
use crate::classifier::Classifier;
use crate::events::{AlarmKind, BrowserEvent, Outbound, Request};
use crate::session_manager::{ActivityDelta, SessionManager, TabError, TabInfo};
use crate::sync::{FinalizeOutcome, SessionFinalizer};

/// What handling one event produced
#[derive(Debug, Default)]
pub struct Dispatch {
    /// Frames to send back to the browser, in order
    pub outbound: Vec<Outbound>,
    /// Background finalization of sessions that ended
    pub finalizing: Vec<JoinHandle<FinalizeOutcome>>,
    /// The host should stop after this event
    pub shutdown: bool,
}

/// Routes browser events to the session state machine and the stores
///
/// Owns the state machine and the settings; everything runs on the caller's
/// task except session finalization and sync retries, which are spawned.
pub struct Dispatcher {
    sessions: SessionManager,
    settings: Settings,
    database: Arc<Database>,
    store: Arc<AggregationStore>,
    finalizer: SessionFinalizer,
    pomodoro_ends_at: Option<DateTime<Utc>>,
}

impl Dispatcher {
    /// Create a dispatcher with settings and overrides loaded from the database
    ///
    /// # Errors
    ///
    /// Returns an error if settings or overrides cannot be loaded
    pub fn new(
        database: Arc<Database>,
        store: Arc<AggregationStore>,
        finalizer: SessionFinalizer,
    ) -> Result<Self> {
        Ok(Self {
            sessions: SessionManager::new(Classifier::from_database(&database)?),
            settings: database.get_settings()?,
            database,
            store,
            finalizer,
            pomodoro_ends_at: None,
        })
    }

    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn handle(&mut self, event: BrowserEvent, now: DateTime<Utc>) -> Dispatch {
        let mut dispatch = Dispatch::default();

        match event {
            BrowserEvent::TabActivated { tab } => {
                self.tab_changed(tab.ok_or(TabError::Unavailable), now, &mut dispatch);
            }
            BrowserEvent::TabUpdated { tab, status, active } => {
                if active && status.as_deref() == Some("complete") {
                    self.tab_changed(tab.ok_or(TabError::Unavailable), now, &mut dispatch);
                }
            }
            BrowserEvent::NavigationCompleted {
                tab_id,
                frame_id,
                url,
            } => {
                // The matching tabUpdated(complete) drives the tab change
                if frame_id == 0 {
                    log::debug!("Navigation completed in tab {tab_id}: {url}");
                }
            }
            BrowserEvent::FocusChanged { window_id } => {
                self.sessions.on_focus_changed(window_id.is_some(), now);
            }
            BrowserEvent::IdleChanged { state } => {
                self.sessions.on_idle_state(state, now);
            }
            BrowserEvent::Alarm { name } => match AlarmKind::from_name(&name) {
                Some(kind) => self.alarm(kind, now, &mut dispatch),
                None => log::debug!("Ignoring unknown alarm '{name}'"),
            },
            BrowserEvent::Message {
                sender_tab_id,
                request_id,
                request,
            } => {
                if let Some(body) = self.request(request, sender_tab_id, now) {
                    dispatch
                        .outbound
                        .push(Outbound::Response { request_id, body });
                }
            }
            BrowserEvent::StopSession => self.end_session(now, &mut dispatch),
            BrowserEvent::Shutdown => {
                self.end_session(now, &mut dispatch);
                dispatch.shutdown = true;
            }
        }

        dispatch
    }

    fn end_session(&mut self, now: DateTime<Utc>, dispatch: &mut Dispatch) {
        if let Some(ended) = self.sessions.end_session(now) {
            dispatch.finalizing.push(self.finalizer.submit(ended));
        }
    }

    fn tab_changed(
        &mut self,
        tab: Result<TabInfo, TabError>,
        now: DateTime<Utc>,
        dispatch: &mut Dispatch,
    ) {
        let change = self.sessions.on_tab_change(tab, now);
        if let Some(ended) = change.ended {
            dispatch.finalizing.push(self.finalizer.submit(ended));
        }
        if !change.started {
            return;
        }

        let Some(current) = self.sessions.current() else {
            return;
        };
        let (category, domain) = (current.category, current.domain.clone());
        dispatch.outbound.push(Outbound::badge(category));

        if self.settings.focus_mode {
            self.apply_focus_mode(category, &domain, dispatch);
        }
    }

    fn apply_focus_mode(&mut self, category: Category, domain: &str, dispatch: &mut Dispatch) {
        match category {
            Category::Unproductive if self.settings.block_distractions => {
                self.sessions.record_distraction();
                dispatch.outbound.push(Outbound::notification(
                    "focus_alert",
                    "Focus Mode Active",
                    format!("You're visiting {domain} during focus time. Stay on track!"),
                ));
            }
            Category::HighlyProductive if self.settings.deep_work_mode => {
                dispatch.outbound.push(Outbound::notification(
                    "deep_work",
                    "Deep Work Mode",
                    format!("Entering deep work on {domain}. Notifications minimized."),
                ));
            }
            _ => {}
        }
    }

    fn alarm(&mut self, kind: AlarmKind, now: DateTime<Utc>, dispatch: &mut Dispatch) {
        match kind {
            AlarmKind::BreakReminder => {
                if let Some(outbound) = self.break_reminder(now) {
                    dispatch.outbound.push(outbound);
                }
            }
            AlarmKind::PerformanceCheck => {
                self.sessions.performance_check(now);
            }
            AlarmKind::DailySummary => match self.store.today(now) {
                Ok(today) => dispatch.outbound.push(Outbound::notification(
                    "daily_summary",
                    "Daily Productivity Summary",
                    format!(
                        "Productive: {} | Score: {:.0}% | Sessions: {}",
                        format_duration(today.productive_time_ms),
                        today.average_focus,
                        today.session_count
                    ),
                )),
                Err(e) => log::warn!("Failed to load daily summary: {e:#}"),
            },
            AlarmKind::Cleanup => {
                if let Err(e) = self.store.cleanup(now) {
                    log::warn!("Retention sweep failed: {e:#}");
                }
            }
            AlarmKind::SyncRetry => {
                let finalizer = self.finalizer.clone();
                tokio::spawn(async move {
                    if let Err(e) = finalizer.retry_pending().await {
                        log::warn!("Sync retry failed: {e:#}");
                    }
                });
            }
        }
    }

    fn break_reminder(&self, now: DateTime<Utc>) -> Option<Outbound> {
        if !self.settings.break_reminders {
            return None;
        }
        let current = self.sessions.current()?;
        if current.elapsed_ms(now) <= self.settings.break_interval {
            return None;
        }
        Some(Outbound::notification(
            "break_reminder",
            "Time for a Break!",
            format!(
                "You've been working for {} minutes. Take a 10-15 minute break to maintain productivity.",
                current.elapsed_ms(now) / 60_000
            ),
        ))
    }

    /// Handle a popup or content-script request; `None` means no response
    fn request(
        &mut self,
        request: Request,
        sender_tab_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Option<Value> {
        match request {
            Request::GetSettings => Some(to_json(&self.settings)),
            Request::UpdateSettings { settings } => {
                self.settings.merge(settings);
                let saved = self.save_settings();
                Some(json!({ "success": saved }))
            }
            Request::GetCurrentSession => Some(to_json(&self.sessions.current())),
            Request::GetDailyStats => match self.store.today(now) {
                Ok(today) => Some(to_json(&today)),
                Err(e) => {
                    log::warn!("Failed to load daily stats: {e:#}");
                    Some(Value::Null)
                }
            },
            Request::ActivityUpdate { data } => {
                let data = self.filter_tracked_input(data);
                self.sessions.on_activity_update(sender_tab_id, &data, now);
                None
            }
            Request::ToggleFocusMode => {
                self.settings.focus_mode = !self.settings.focus_mode;
                log::info!(
                    "Focus mode {}",
                    if self.settings.focus_mode { "on" } else { "off" }
                );
                self.save_settings();
                Some(json!({ "focusMode": self.settings.focus_mode }))
            }
            Request::StartPomodoro => {
                let ends_at = now + Duration::milliseconds(self.settings.pomodoro_length);
                self.pomodoro_ends_at = Some(ends_at);
                Some(json!({ "success": true, "endsAt": ends_at.timestamp_millis() }))
            }
            Request::Unknown => {
                log::debug!("Ignoring unknown request action");
                None
            }
        }
    }

    /// Zero the counters the user opted out of
    fn filter_tracked_input(&self, mut data: ActivityDelta) -> ActivityDelta {
        if !self.settings.track_keystrokes {
            data.keystrokes = 0;
        }
        if !self.settings.track_mouse_movement {
            data.mouse_movements = 0;
        }
        data
    }

    fn save_settings(&self) -> bool {
        match self.database.save_settings(&self.settings) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to persist settings: {e:#}");
                false
            }
        }
    }

    /// End of the running pomodoro, if one was started
    #[must_use]
    pub const fn pomodoro_ends_at(&self) -> Option<DateTime<Utc>> {
        self.pomodoro_ends_at
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        log::warn!("Failed to encode response: {e}");
        Value::Null
    })
}
