/// Host lifecycle commands
use anyhow::Result;
use std::path::Path;
use tabtrack_core::{
    aggregation::format_duration,
    config::{get_data_dir, socket_path},
    ipc::{IpcClient, IpcRequest, IpcResponse},
    Config, Daemon,
};

use super::helpers::{open_database, truncate_str};

/// Run the native-messaging host on stdin/stdout. The browser launches this
/// process, so stdout is reserved for protocol frames.
pub async fn run_host() -> Result<()> {
    setup_host_logging()?;
    log::info!("Host process started (PID: {}).", std::process::id());

    if let Err(e) = host_main_logic().await {
        log::error!("Host exited with a fatal error: {e:#}");
        return Err(e);
    }
    Ok(())
}

async fn host_main_logic() -> Result<()> {
    let config = Config::load()?;
    let db = open_database()?;
    let mut daemon = Daemon::new(db, &config)?;
    let sock_path = socket_path()?;

    let result = daemon
        .run(tokio::io::stdin(), tokio::io::stdout(), Some(&sock_path))
        .await;

    if sock_path.exists() {
        if let Err(e) = std::fs::remove_file(&sock_path) {
            log::warn!("Failed to remove socket {}: {e}", sock_path.display());
        }
    }
    result
}

pub async fn show_status(sock_path: &Path) -> Result<()> {
    if !sock_path.exists() {
        println!("Host Status: Not running");
        return Ok(());
    }

    let client = IpcClient::new(sock_path);
    match client.send_command(IpcRequest::Status).await {
        Ok(IpcResponse::Status {
            running,
            session,
            pending_syncs,
        }) => {
            println!(
                "Host Status: {}",
                if running { "Running" } else { "Stopped" }
            );
            match session {
                Some(session) => {
                    println!("\nCurrent Session:");
                    println!("  Domain:   {}", session.domain);
                    println!("  Title:    {}", truncate_str(&session.title, 60));
                    println!("  Category: {}", session.category);
                    println!("  Elapsed:  {}", format_duration(session.elapsed_ms));
                    println!("  Focus:    {}", session.focus_score);
                    println!("  Activity: {}", session.activity_score);
                    if session.idle {
                        println!("  (idle)");
                    }
                }
                None => println!("\nNo active session"),
            }
            println!("\nPending syncs: {pending_syncs}");
        }
        Ok(_) => anyhow::bail!("Unexpected response from host"),
        Err(e) => {
            log::error!("Failed to get status: {e}");
            println!("Host Status: Not running (or not responding)");
        }
    }
    Ok(())
}

/// End the current session, or shut the host down entirely
pub async fn stop(sock_path: &Path, shutdown: bool) -> Result<()> {
    if !sock_path.exists() {
        println!("Host is not running.");
        return Ok(());
    }

    let client = IpcClient::new(sock_path);
    let request = if shutdown {
        IpcRequest::Shutdown
    } else {
        IpcRequest::StopSession
    };

    match client.send_command(request).await? {
        IpcResponse::Stopped => println!("Current session ended."),
        IpcResponse::Shutdown => println!("Host is shutting down."),
        resp @ IpcResponse::Status { .. } => {
            anyhow::bail!("Received unexpected response from host: {resp:?}")
        }
    }
    Ok(())
}

fn setup_host_logging() -> Result<()> {
    use std::fs::{create_dir_all, OpenOptions};

    let log_path = get_data_dir()?.join("tabtrack.log");

    if let Some(parent) = log_path.parent() {
        create_dir_all(parent)?;
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .format_timestamp_millis()
        .init();

    Ok(())
}
