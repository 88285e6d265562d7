//! Persist-then-push delivery of ended sessions.
//!
//! Each ended session is handed to [`SessionFinalizer::submit`], which spawns
//! a task that writes the session and its daily aggregate locally and then
//! pushes the payload to the configured [`SessionSink`]. Failed pushes land in
//! the durable sync queue and are replayed by [`SessionFinalizer::retry_pending`].

use anyhow::Result;
use std::sync::Arc;
use tabtrack_integrations::{SessionPayload, SessionSink};
use tabtrack_storage::{DailyAggregate, Database, Session};
use tokio::{sync::Mutex, task::JoinHandle};

use crate::aggregation::AggregationStore;

/// Queue entries are dropped after this many failed deliveries
pub const MAX_SYNC_ATTEMPTS: u32 = 10;
/// Queue entries replayed per retry pass
pub const RETRY_BATCH: u32 = 50;

/// Outcome of the remote half of finalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// The sink accepted the payload
    Synced,
    /// Delivery failed; the payload is in the retry queue
    Queued { error: String },
    /// Delivery failed and the payload could not be queued either
    Lost { error: String },
    /// No sink configured
    Disabled,
}

/// Everything that happened to one ended session
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizeOutcome {
    pub session_id: String,
    /// Updated daily aggregate, `None` if local persistence failed
    pub aggregate: Option<DailyAggregate>,
    pub sync: SyncStatus,
}

impl FinalizeOutcome {
    #[must_use]
    pub const fn persisted(&self) -> bool {
        self.aggregate.is_some()
    }
}

/// Result of one pass over the sync queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub dropped: usize,
    pub remaining: u32,
    /// Another pass held the queue, nothing was attempted
    pub skipped: bool,
}

/// Hands ended sessions to storage and the backend without blocking the
/// event loop
#[derive(Clone)]
pub struct SessionFinalizer {
    database: Arc<Database>,
    store: Arc<AggregationStore>,
    sink: Option<Arc<dyn SessionSink>>,
    user_id: String,
    /// Held for a whole retry pass so queue entries are pushed at most once
    retry_lock: Arc<Mutex<()>>,
}

impl SessionFinalizer {
    #[must_use]
    pub fn new(
        database: Arc<Database>,
        store: Arc<AggregationStore>,
        sink: Option<Arc<dyn SessionSink>>,
        user_id: String,
    ) -> Self {
        if let Some(sink) = &sink {
            log::info!("Session sync enabled via {}", sink.sink_name());
        } else {
            log::info!("Session sync disabled, sessions are stored locally only");
        }
        Self {
            database,
            store,
            sink,
            user_id,
            retry_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Finalize a session in the background
    #[must_use]
    pub fn submit(&self, session: Session) -> JoinHandle<FinalizeOutcome> {
        let finalizer = self.clone();
        tokio::spawn(async move { finalizer.finalize(session).await })
    }

    async fn finalize(&self, session: Session) -> FinalizeOutcome {
        let aggregate = match self.store.record(&session) {
            Ok(aggregate) => Some(aggregate),
            Err(e) => {
                log::warn!("{e:#}");
                None
            }
        };

        let sync = match &self.sink {
            None => SyncStatus::Disabled,
            Some(sink) => {
                let payload = SessionPayload::from_session(&self.user_id, &session);
                match sink.push_session(&payload).await {
                    Ok(()) => SyncStatus::Synced,
                    Err(e) => {
                        let error = e.to_string();
                        log::warn!(
                            "Failed to sync session {} to {}: {error}",
                            session.session_id,
                            sink.sink_name()
                        );
                        self.enqueue(&payload, error)
                    }
                }
            }
        };

        FinalizeOutcome {
            session_id: session.session_id,
            aggregate,
            sync,
        }
    }

    fn enqueue(&self, payload: &SessionPayload, error: String) -> SyncStatus {
        let queued = serde_json::to_string(payload)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.database.enqueue_sync(&payload.session_id, &json, &error));
        match queued {
            Ok(()) => SyncStatus::Queued { error },
            Err(e) => {
                log::warn!(
                    "Failed to queue session {} for retry: {e:#}",
                    payload.session_id
                );
                SyncStatus::Lost { error }
            }
        }
    }

    /// Replay queued payloads. Delivered entries are removed; failures bump
    /// the attempt count and entries that can never succeed, or have failed
    /// [`MAX_SYNC_ATTEMPTS`] times, are dropped. A pass started while another
    /// is still running returns at once with `skipped` set.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read or updated
    pub async fn retry_pending(&self) -> Result<RetryReport> {
        let Some(sink) = &self.sink else {
            return Ok(RetryReport {
                remaining: self.database.count_pending_syncs()?,
                ..RetryReport::default()
            });
        };
        let Ok(_pass) = self.retry_lock.try_lock() else {
            log::debug!("Sync retry already running, skipping this pass");
            return Ok(RetryReport {
                remaining: self.database.count_pending_syncs()?,
                skipped: true,
                ..RetryReport::default()
            });
        };

        let pending = self.database.get_pending_syncs(RETRY_BATCH)?;
        let mut report = RetryReport {
            attempted: pending.len(),
            ..RetryReport::default()
        };

        for entry in pending {
            let payload: SessionPayload = match serde_json::from_str(&entry.payload) {
                Ok(payload) => payload,
                Err(e) => {
                    log::warn!(
                        "Dropping unreadable queued payload for session {}: {e}",
                        entry.session_id
                    );
                    self.database.remove_pending_sync(entry.id)?;
                    report.dropped += 1;
                    continue;
                }
            };

            match sink.push_session(&payload).await {
                Ok(()) => {
                    self.database.remove_pending_sync(entry.id)?;
                    report.delivered += 1;
                }
                Err(e) if !e.is_retryable() || entry.attempts + 1 >= MAX_SYNC_ATTEMPTS => {
                    log::warn!(
                        "Giving up on session {} after {} attempts: {e}",
                        entry.session_id,
                        entry.attempts + 1
                    );
                    self.database.remove_pending_sync(entry.id)?;
                    report.dropped += 1;
                }
                Err(e) => {
                    log::debug!("Retry of session {} failed: {e}", entry.session_id);
                    self.database.record_sync_failure(entry.id, &e.to_string())?;
                }
            }
        }

        report.remaining = self.database.count_pending_syncs()?;
        if report.attempted > 0 {
            log::info!(
                "Sync retry: {} delivered, {} dropped, {} still queued",
                report.delivered,
                report.dropped,
                report.remaining
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::Mutex;
    use tabtrack_integrations::SyncError;
    use tabtrack_storage::Category;

    /// Sink that answers with a scripted sequence of status codes
    /// (200 = accepted) and records every session it saw
    struct ScriptedSink {
        statuses: Mutex<Vec<u16>>,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedSink {
        fn new(statuses: &[u16]) -> Arc<Self> {
            Arc::new(Self {
                statuses: Mutex::new(statuses.iter().rev().copied().collect()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SessionSink for ScriptedSink {
        async fn push_session(&self, payload: &SessionPayload) -> Result<(), SyncError> {
            self.seen.lock().unwrap().push(payload.session_id.clone());
            match self.statuses.lock().unwrap().pop().unwrap_or(200) {
                200 => Ok(()),
                status => Err(SyncError::Status {
                    api: "Activity".to_string(),
                    status,
                    body: String::new(),
                }),
            }
        }

        fn sink_name(&self) -> &'static str {
            "scripted"
        }
    }

    /// Rejects the first push, then accepts after a delay
    struct SlowSink {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SessionSink for SlowSink {
        async fn push_session(&self, payload: &SessionPayload) -> Result<(), SyncError> {
            let first = {
                let mut seen = self.seen.lock().unwrap();
                seen.push(payload.session_id.clone());
                seen.len() == 1
            };
            if first {
                return Err(SyncError::Status {
                    api: "Activity".to_string(),
                    status: 503,
                    body: String::new(),
                });
            }
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            Ok(())
        }

        fn sink_name(&self) -> &'static str {
            "slow"
        }
    }

    fn session(id: &str) -> Session {
        let end_time = Utc::now();
        Session {
            session_id: id.to_string(),
            tab_id: 3,
            domain: "github.com".to_string(),
            url: "https://github.com".to_string(),
            title: "GitHub".to_string(),
            category: Category::HighlyProductive,
            start_time: end_time - Duration::minutes(10),
            end_time,
            duration_ms: 600_000,
            time_spent_active_ms: 600_000,
            time_spent_idle_ms: 0,
            keystrokes: 10,
            mouse_movements: 10,
            scrolls: 10,
            clicks: 1,
            distractions: 0,
            focus_score: 100,
            activity_score: 100,
            final_focus_score: 70,
            productivity_score: 70,
        }
    }

    fn finalizer(sink: Option<Arc<dyn SessionSink>>) -> (Arc<Database>, SessionFinalizer) {
        let db = Arc::new(Database::in_memory().unwrap());
        let store = Arc::new(AggregationStore::new(db.clone(), 30));
        let finalizer = SessionFinalizer::new(db.clone(), store, sink, "user_1".to_string());
        (db, finalizer)
    }

    #[tokio::test]
    async fn test_submit_persists_and_syncs() {
        let sink = ScriptedSink::new(&[200]);
        let (db, finalizer) = finalizer(Some(sink.clone()));

        let outcome = finalizer.submit(session("s1")).await.unwrap();

        assert!(outcome.persisted());
        assert_eq!(outcome.sync, SyncStatus::Synced);
        assert_eq!(outcome.aggregate.unwrap().session_count, 1);
        assert!(db.get_session("s1").unwrap().is_some());
        assert_eq!(db.count_pending_syncs().unwrap(), 0);
        assert_eq!(*sink.seen.lock().unwrap(), vec!["s1".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_sync_is_queued_and_session_kept() {
        let sink = ScriptedSink::new(&[503]);
        let (db, finalizer) = finalizer(Some(sink));

        let outcome = finalizer.submit(session("s1")).await.unwrap();

        assert!(outcome.persisted());
        assert!(matches!(outcome.sync, SyncStatus::Queued { .. }));
        assert!(db.get_session("s1").unwrap().is_some());
        let pending = db.get_pending_syncs(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].session_id, "s1");
        assert!(pending[0].payload.contains("\"userId\":\"user_1\""));
    }

    #[tokio::test]
    async fn test_disabled_sync_only_persists() {
        let (db, finalizer) = finalizer(None);
        let outcome = finalizer.submit(session("s1")).await.unwrap();
        assert_eq!(outcome.sync, SyncStatus::Disabled);
        assert!(db.get_session("s1").unwrap().is_some());
        assert_eq!(db.count_pending_syncs().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_retry_delivers_and_removes() {
        let sink = ScriptedSink::new(&[500, 200]);
        let (db, finalizer) = finalizer(Some(sink.clone()));
        finalizer.submit(session("s1")).await.unwrap();

        let report = finalizer.retry_pending().await.unwrap();
        assert_eq!(report.attempted, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.remaining, 0);
        assert_eq!(db.count_pending_syncs().unwrap(), 0);
        assert_eq!(sink.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_failure_bumps_attempts() {
        let sink = ScriptedSink::new(&[500, 502]);
        let (db, finalizer) = finalizer(Some(sink));
        finalizer.submit(session("s1")).await.unwrap();

        let report = finalizer.retry_pending().await.unwrap();
        assert_eq!(report.delivered, 0);
        assert_eq!(report.dropped, 0);
        assert_eq!(report.remaining, 1);
        assert_eq!(db.get_pending_syncs(10).unwrap()[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_retry_drops_non_retryable() {
        let sink = ScriptedSink::new(&[500, 400]);
        let (db, finalizer) = finalizer(Some(sink));
        finalizer.submit(session("s1")).await.unwrap();

        let report = finalizer.retry_pending().await.unwrap();
        assert_eq!(report.dropped, 1);
        assert_eq!(db.count_pending_syncs().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let statuses = vec![500; MAX_SYNC_ATTEMPTS as usize];
        let sink = ScriptedSink::new(&statuses);
        let (db, finalizer) = finalizer(Some(sink));
        finalizer.submit(session("s1")).await.unwrap();

        for _ in 1..MAX_SYNC_ATTEMPTS - 1 {
            finalizer.retry_pending().await.unwrap();
        }
        assert_eq!(db.count_pending_syncs().unwrap(), 1);

        let report = finalizer.retry_pending().await.unwrap();
        assert_eq!(report.dropped, 1);
        assert_eq!(db.count_pending_syncs().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_overlapping_retry_passes_push_once() {
        let sink = Arc::new(SlowSink {
            seen: Mutex::new(Vec::new()),
        });
        let (db, finalizer) = finalizer(Some(sink.clone()));
        finalizer.submit(session("s1")).await.unwrap();

        let other = finalizer.clone();
        let (a, b) = tokio::join!(finalizer.retry_pending(), other.retry_pending());
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.delivered + b.delivered, 1);
        assert!(a.skipped != b.skipped);
        assert_eq!(*sink.seen.lock().unwrap(), vec!["s1".to_string(), "s1".to_string()]);
        assert_eq!(db.count_pending_syncs().unwrap(), 0);

        let again = finalizer.retry_pending().await.unwrap();
        assert!(!again.skipped);
        assert_eq!(again.attempted, 0);
    }
}
