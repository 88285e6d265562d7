//! Native-messaging framing: a 4-byte native-endian length followed by that
//! many bytes of UTF-8 JSON.

use serde::{de::DeserializeOwned, Serialize};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::events::BrowserEvent;

/// Largest inbound frame accepted from the browser
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    TooLarge(usize),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read one frame body. Returns `Ok(None)` when the stream ends cleanly
/// before a new frame starts.
///
/// # Errors
///
/// Returns an error on I/O failure, truncated frames or oversized frames
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    // EOF is clean only before the first byte of the length
    if reader.read(&mut len_buf[..1]).await? == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut len_buf[1..]).await?;

    let len = u32::from_ne_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Read and decode one JSON frame
///
/// # Errors
///
/// Returns an error if the frame cannot be read or decoded
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>, FrameError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    match read_frame(reader).await? {
        Some(body) => Ok(Some(serde_json::from_slice(&body)?)),
        None => Ok(None),
    }
}

/// Encode and write one JSON frame
///
/// # Errors
///
/// Returns an error if encoding or writing fails
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(message)?;
    let len = u32::try_from(body.len()).map_err(|_| FrameError::TooLarge(body.len()))?;
    writer.write_all(&len.to_ne_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Spawn a task that decodes browser frames into the returned channel. The
/// channel closes when the input ends or cannot be read any more; frames
/// that are valid JSON but not a known event are logged and skipped.
pub fn spawn_reader<R>(mut reader: R) -> mpsc::Receiver<BrowserEvent>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        loop {
            match read_message::<_, BrowserEvent>(&mut reader).await {
                Ok(Some(event)) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    log::info!("Browser closed the native-messaging port");
                    break;
                }
                Err(FrameError::Json(e)) => {
                    log::warn!("Skipping unrecognised frame: {e}");
                }
                Err(e) => {
                    log::error!("Native-messaging input failed: {e}");
                    break;
                }
            }
        }
    });
    rx
}
