use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{UnixListener, UnixStream},
    sync::{mpsc, Mutex},
};

use crate::events::BrowserEvent;
use crate::session_manager::ActiveSession;

/// IPC request from CLI to the host
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum IpcRequest {
    Status,
    StopSession,
    Shutdown,
}

/// Current session as reported over IPC
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub domain: String,
    pub title: String,
    /// Category name, as stored
    pub category: String,
    pub started_at_ms: i64,
    pub elapsed_ms: i64,
    pub focus_score: u8,
    pub activity_score: u8,
    pub idle: bool,
}

impl SessionSnapshot {
    #[must_use]
    pub fn of(session: &ActiveSession, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            session_id: session.session_id.clone(),
            domain: session.domain.clone(),
            title: session.title.clone(),
            category: session.category.as_str().to_string(),
            started_at_ms: session.start_time.timestamp_millis(),
            elapsed_ms: session.elapsed_ms(now),
            focus_score: session.focus_score,
            activity_score: session.activity_score,
            idle: session.idle_start_time.is_some() || session.last_blur_time.is_some(),
        }
    }
}

/// IPC response from the host to CLI
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum IpcResponse {
    Status {
        running: bool,
        session: Option<SessionSnapshot>,
        pending_syncs: u32,
    },
    Stopped,
    Shutdown,
}

#[derive(Debug)]
pub struct IpcClient {
    sock_path: PathBuf,
}

impl IpcClient {
    #[must_use]
    pub fn new(sock_path: &Path) -> Self {
        Self {
            sock_path: sock_path.to_path_buf(),
        }
    }

    /// Send one request and wait for the reply
    ///
    /// # Errors
    ///
    /// Returns an error if the host is not reachable or replies garbage
    pub async fn send_command(&self, request: IpcRequest) -> Result<IpcResponse> {
        let mut stream = UnixStream::connect(&self.sock_path)
            .await
            .with_context(|| format!("Host not running ({})", self.sock_path.display()))?;

        let encoded = bincode::serialize(&request)?;
        stream.write_all(&encoded).await?;
        stream.shutdown().await?;

        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer).await?;
        let response: IpcResponse = bincode::deserialize(&buffer)?;

        Ok(response)
    }
}

/// State the host publishes for IPC clients, and the way back into its loop
pub struct HostIpcHandler {
    snapshot: Mutex<Option<SessionSnapshot>>,
    pending_syncs: Mutex<u32>,
    events: mpsc::Sender<BrowserEvent>,
}

impl HostIpcHandler {
    #[must_use]
    pub fn new(events: mpsc::Sender<BrowserEvent>) -> Self {
        Self {
            snapshot: Mutex::new(None),
            pending_syncs: Mutex::new(0),
            events,
        }
    }

    pub async fn publish(&self, snapshot: Option<SessionSnapshot>, pending_syncs: u32) {
        *self.snapshot.lock().await = snapshot;
        *self.pending_syncs.lock().await = pending_syncs;
    }

    /// Answer one request. Stop and shutdown are forwarded to the host loop
    /// so the state machine is only touched there.
    ///
    /// # Errors
    ///
    /// Returns an error if the host loop is gone
    pub async fn respond(&self, request: IpcRequest) -> Result<IpcResponse> {
        let response = match request {
            IpcRequest::Status => IpcResponse::Status {
                running: true,
                session: self.snapshot.lock().await.clone(),
                pending_syncs: *self.pending_syncs.lock().await,
            },
            IpcRequest::StopSession => {
                self.forward(BrowserEvent::StopSession).await?;
                IpcResponse::Stopped
            }
            IpcRequest::Shutdown => {
                self.forward(BrowserEvent::Shutdown).await?;
                IpcResponse::Shutdown
            }
        };
        Ok(response)
    }

    async fn forward(&self, event: BrowserEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| anyhow::anyhow!("Host loop has stopped"))
    }

    async fn handle(&self, stream: &mut UnixStream, request: IpcRequest) -> Result<()> {
        let response = self.respond(request).await?;
        let encoded = bincode::serialize(&response)?;
        stream.write_all(&encoded).await?;
        Ok(())
    }
}

/// Accept IPC connections until the listener fails
///
/// # Errors
///
/// Returns an error if the socket cannot be bound
pub async fn listen(handler: Arc<HostIpcHandler>, sock_path: &Path) -> io::Result<()> {
    if sock_path.exists() {
        fs::remove_file(sock_path)?;
    }
    let listener = UnixListener::bind(sock_path)?;

    loop {
        match listener.accept().await {
            Ok((mut stream, _)) => {
                let handler = handler.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0; 1024];
                    match stream.read(&mut buf).await {
                        Ok(n) if n > 0 => match bincode::deserialize::<IpcRequest>(&buf[..n]) {
                            Ok(request) => {
                                if let Err(e) = handler.handle(&mut stream, request).await {
                                    log::error!("IPC handle error: {e}");
                                }
                            }
                            Err(e) => {
                                log::error!("IPC deserialize error: {e}");
                            }
                        },
                        Ok(_) => {} // Connection closed
                        Err(e) => {
                            log::error!("IPC read error: {e}");
                        }
                    }
                });
            }
            Err(e) => {
                log::error!("IPC accept error: {e}");
            }
        }
    }
}
