use crate::{
    aggregation::AggregationStore,
    config::Config,
    dispatcher::Dispatcher,
    events::{AlarmKind, BrowserEvent},
    host,
    ipc::{listen, HostIpcHandler, SessionSnapshot},
    sync::{FinalizeOutcome, SessionFinalizer},
};
use anyhow::Result;
use std::{path::Path, sync::Arc, time::Duration};
use tabtrack_integrations::{BackendClient, SessionSink};
use tabtrack_storage::Database;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
    task::JoinHandle,
    time::{interval_at, Instant, Interval},
};

const PERFORMANCE_CHECK_PERIOD: Duration = Duration::from_secs(15 * 60);
const DAILY_SUMMARY_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);
const CLEANUP_PERIOD: Duration = Duration::from_secs(6 * 60 * 60);
const SYNC_RETRY_PERIOD: Duration = Duration::from_secs(5 * 60);
const MIN_BREAK_PERIOD: Duration = Duration::from_secs(60);
/// How long shutdown waits for in-flight session finalization
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// First tick one period from now, like a browser alarm with a delay
fn every(period: Duration) -> Interval {
    interval_at(Instant::now() + period, period)
}

/// The native-messaging host: one loop that owns the dispatcher and is fed
/// by browser frames, IPC requests and timers
pub struct Daemon {
    database: Arc<Database>,
    dispatcher: Dispatcher,
    ipc_handler: Arc<HostIpcHandler>,
    ipc_events: mpsc::Receiver<BrowserEvent>,
}

impl Daemon {
    /// Build the host from configuration, syncing to the configured backend
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or the stored state cannot be set up
    pub fn new(db: Database, config: &Config) -> Result<Self> {
        let database = Arc::new(db);
        let sink: Option<Arc<dyn SessionSink>> = if config.sync_enabled {
            Some(Arc::new(BackendClient::new(
                &config.backend_url,
                config.request_timeout(),
            )?))
        } else {
            None
        };
        Self::with_sink(database, config.retention_days, sink)
    }

    /// Build the host with an explicit session sink
    ///
    /// # Errors
    ///
    /// Returns an error if the stored state cannot be loaded
    pub fn with_sink(
        database: Arc<Database>,
        retention_days: u32,
        sink: Option<Arc<dyn SessionSink>>,
    ) -> Result<Self> {
        let store = Arc::new(AggregationStore::new(database.clone(), retention_days));
        let user_id = database.get_or_create_user_id()?;
        let finalizer = SessionFinalizer::new(database.clone(), store.clone(), sink, user_id);
        let (ipc_tx, ipc_events) = mpsc::channel(16);

        Ok(Self {
            dispatcher: Dispatcher::new(database.clone(), store, finalizer)?,
            database,
            ipc_handler: Arc::new(HostIpcHandler::new(ipc_tx)),
            ipc_events,
        })
    }

    /// Run until the browser closes the port, a shutdown is requested or
    /// Ctrl-C. Ends the current session and waits for pending persistence
    /// before returning.
    ///
    /// # Errors
    ///
    /// Returns an error only if the host cannot start
    pub async fn run<R, W>(&mut self, input: R, mut output: W, sock_path: Option<&Path>) -> Result<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin,
    {
        if let Some(sock_path) = sock_path {
            let ipc_handler = self.ipc_handler.clone();
            let sock_path = sock_path.to_path_buf();
            tokio::spawn(async move {
                if let Err(e) = listen(ipc_handler, &sock_path).await {
                    log::error!("IPC listener failed: {e}");
                }
            });
        }

        let mut browser = host::spawn_reader(input);
        let break_ms = u64::try_from(self.dispatcher.settings().break_interval).unwrap_or(0);
        let mut break_reminder = every(Duration::from_millis(break_ms).max(MIN_BREAK_PERIOD));
        let mut performance_check = every(PERFORMANCE_CHECK_PERIOD);
        let mut daily_summary = every(DAILY_SUMMARY_PERIOD);
        let mut cleanup = every(CLEANUP_PERIOD);
        let mut sync_retry = every(SYNC_RETRY_PERIOD);
        let mut pending: Vec<JoinHandle<FinalizeOutcome>> = Vec::new();

        log::info!("Host started");
        self.publish_status().await;

        loop {
            let event = tokio::select! {
                frame = browser.recv() => frame.unwrap_or(BrowserEvent::Shutdown),
                Some(event) = self.ipc_events.recv() => event,
                _ = break_reminder.tick() => AlarmKind::BreakReminder.event(),
                _ = performance_check.tick() => AlarmKind::PerformanceCheck.event(),
                _ = daily_summary.tick() => AlarmKind::DailySummary.event(),
                _ = cleanup.tick() => AlarmKind::Cleanup.event(),
                _ = sync_retry.tick() => AlarmKind::SyncRetry.event(),
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Received Ctrl-C, shutting down...");
                    BrowserEvent::Shutdown
                }
            };

            let dispatch = self.dispatcher.handle(event, chrono::Utc::now());
            for frame in &dispatch.outbound {
                if let Err(e) = host::write_message(&mut output, frame).await {
                    log::error!("Failed to write frame to browser: {e}");
                }
            }
            pending.retain(|handle| !handle.is_finished());
            pending.extend(dispatch.finalizing);
            self.publish_status().await;

            if dispatch.shutdown {
                break;
            }
        }

        for handle in pending {
            match tokio::time::timeout(FLUSH_TIMEOUT, handle).await {
                Ok(Ok(outcome)) => log::debug!("Flushed session {}", outcome.session_id),
                Ok(Err(e)) => log::warn!("Session finalization task failed: {e}"),
                Err(_) => log::warn!("Timed out waiting for session finalization"),
            }
        }
        log::info!("Host shut down gracefully.");
        Ok(())
    }

    async fn publish_status(&self) {
        let now = chrono::Utc::now();
        let snapshot = self
            .dispatcher
            .sessions()
            .current()
            .map(|session| SessionSnapshot::of(session, now));
        let pending_syncs = self.database.count_pending_syncs().unwrap_or_else(|e| {
            log::warn!("Failed to count pending syncs: {e:#}");
            0
        });
        self.ipc_handler.publish(snapshot, pending_syncs).await;
    }
}
