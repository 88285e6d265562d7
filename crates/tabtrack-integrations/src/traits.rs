use async_trait::async_trait;

use crate::payload::SessionPayload;

/// Why a session could not be delivered to the backend
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The request never produced a response (DNS, refused, timeout)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// The backend answered with a non-2xx status
    #[error("{api} API error ({status}): {body}")]
    Status {
        api: String,
        status: u16,
        body: String,
    },
    /// The payload could not be encoded or the response decoded
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl SyncError {
    /// Whether retrying the same payload later could succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Payload(_) => false,
        }
    }
}

/// Destination for ended sessions
#[async_trait]
pub trait SessionSink: Send + Sync {
    /// Deliver one session payload
    ///
    /// # Errors
    ///
    /// Returns an error if the payload was not accepted
    async fn push_session(&self, payload: &SessionPayload) -> Result<(), SyncError>;

    /// Get the sink name for logging
    #[must_use]
    fn sink_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_errors_retry_only_on_server_side_codes() {
        let status = |code| SyncError::Status {
            api: "Activity".to_string(),
            status: code,
            body: String::new(),
        };
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(404).is_retryable());
    }

    #[test]
    fn test_status_error_message() {
        let err = SyncError::Status {
            api: "Activity".to_string(),
            status: 500,
            body: "db down".to_string(),
        };
        assert_eq!(err.to_string(), "Activity API error (500): db down");
    }
}
